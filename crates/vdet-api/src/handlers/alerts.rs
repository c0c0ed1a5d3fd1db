//! Alert handlers.

use axum::extract::State;
use axum::Json;
use tracing::info;
use vdet_models::Alert;

use crate::auth::AuthUser;
use crate::handlers::health::MessageResponse;
use crate::metrics::record_alert_received;
use crate::state::AppState;

/// POST /send_alert_email
///
/// Records the alert. Delivering the email is left to an external mailer.
pub async fn send_alert(
    user: AuthUser,
    State(state): State<AppState>,
    Json(alert): Json<Alert>,
) -> Json<MessageResponse> {
    info!(
        user_id = user.id,
        alert_id = alert.id,
        camera = %alert.camera_name,
        confidence = alert.confidence_score,
        "Alert received"
    );
    let evicted = state.alerts.push(alert);
    if evicted > 0 {
        info!(evicted, "Alert store at capacity");
    }
    record_alert_received();
    Json(MessageResponse::new("Alert recorded"))
}

/// GET /alerts
pub async fn list_alerts(_user: AuthUser, State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.alerts.list())
}
