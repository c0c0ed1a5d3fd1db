//! User administration handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;
use validator::Validate;
use vdet_models::{CreateUserRequest, Role, UserOut};

use crate::auth::{hash_password, AdminUser, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /admin/users
pub async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<UserOut>>> {
    let users = state.users.list()?;
    Ok(Json(users.iter().map(|u| u.to_out()).collect()))
}

/// GET /admin/users/me
pub async fn admin_me(user: AuthUser) -> Json<UserOut> {
    Json(user.to_out())
}

/// POST /admin/users
///
/// New accounts always get the `user` role.
pub async fn create_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<Json<UserOut>> {
    request.validate()?;

    if state.users.find_by_email(&request.email)?.is_some() {
        return Err(ApiError::bad_request(format!(
            "A user with email {} already exists",
            request.email
        )));
    }

    let hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;
    let user = state.users.create(&request.email, &hash, Role::User)?;

    info!(admin_id = admin.id, user_id = user.id, "User created");
    Ok(Json(user.to_out()))
}

/// DELETE /admin/users/{id}
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.users.delete(user_id)?;
    info!(admin_id = admin.id, user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
