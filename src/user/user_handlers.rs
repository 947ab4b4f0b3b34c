use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    error::Result,
    middleware::CurrentUser,
    state::AppState,
    user::user_dto::{CreateUserRequest, RenameRequest},
};

/// Get current user profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "User profile retrieved successfully", body = crate::user::User),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let user = state.user_service.get_current_user(user.id).await?;

    Ok((StatusCode::OK, Json(user)))
}

/// Change the display name of the current user
#[utoipa::path(
    put,
    path = "/api/users/me",
    tag = "users",
    request_body = RenameRequest,
    responses(
        (status = 200, description = "Username changed successfully", body = crate::user::User),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username already taken"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn rename_current_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<RenameRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let user = state.user_service.rename(&user, &payload.username).await?;

    Ok((StatusCode::OK, Json(user)))
}

// Admin endpoints

/// Register a user (admin only)
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "admin",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = crate::user::User),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username already taken"),
        (status = 403, description = "Forbidden - Admin access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let user = state.user_service.create_user(payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}
