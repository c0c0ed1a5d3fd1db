//! Token issuance and current-user handlers.

use axum::extract::State;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vdet_models::UserOut;

use crate::auth::{generate_access_token, verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const BAD_CREDENTIALS: &str = "Incorrect email or password";

/// OAuth2 password-grant form.
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    /// The account email.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// POST /token
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .users
        .find_by_email(&form.username)?
        .ok_or_else(|| ApiError::unauthorized(BAD_CREDENTIALS))?;

    let valid = verify_password(&form.password, &user.password_hash).unwrap_or_else(|e| {
        warn!(user_id = user.id, error = %e, "Stored password hash is malformed");
        false
    });
    if !valid {
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    }

    let access_token = generate_access_token(&user.email, user.role, &state.auth)
        .map_err(|e| ApiError::internal(format!("Failed to sign token: {e}")))?;

    info!(user_id = user.id, "Access token issued");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// GET /users/me/ and GET /api/protected
pub async fn current_user(user: AuthUser) -> Json<UserOut> {
    Json(user.to_out())
}
