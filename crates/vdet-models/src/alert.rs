//! Violence alerts raised by camera operators.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Alert record, field names as sent by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i64,
    pub date_time: String,
    pub camera_name: String,
    pub violence_type: String,
    pub confidence_score: i64,
}
