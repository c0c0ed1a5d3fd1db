//! Authentication extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;
use vdet_models::{Role, UserOut};

use crate::auth::jwt::validate_token;
use crate::error::ApiError;
use crate::state::AppState;

const INVALID_TOKEN: &str = "Invalid or expired token";

/// Authenticated user resolved from a `Bearer` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn to_out(&self) -> UserOut {
        UserOut {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = validate_token(token, &state.auth).map_err(|e| {
            debug!(error = %e, "Token rejected");
            ApiError::unauthorized(INVALID_TOKEN)
        })?;

        // Role is taken from the store, not from the token.
        let user = state
            .users
            .find_by_email(&claims.sub)?
            .ok_or_else(|| ApiError::unauthorized(INVALID_TOKEN))?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }
}

/// [`AuthUser`] with the admin role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}
