use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use super::reminder_models::Reminder;
use crate::{error::Result, middleware::CurrentUser, state::AppState};

#[utoipa::path(
    get,
    path = "/api/reminders",
    responses(
        (status = 200, description = "All reminders of the authenticated user", body = Vec<Reminder>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "reminders",
    security(("bearer_auth" = []))
)]
pub async fn list_reminders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Reminder>>> {
    let reminders = state.reminder_service.list_for_user(&user.username).await?;
    Ok(Json(reminders))
}

/// Pending reminders whose reminder date is today or earlier
#[utoipa::path(
    get,
    path = "/api/reminders/today",
    responses(
        (status = 200, description = "Reminders due today", body = Vec<Reminder>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "reminders",
    security(("bearer_auth" = []))
)]
pub async fn reminders_due_today(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Reminder>>> {
    let reminders = state
        .reminder_service
        .due_today(&user.username, Utc::now())
        .await?;

    Ok(Json(reminders))
}

#[utoipa::path(
    put,
    path = "/api/reminders/{id}/dismiss",
    params(("id" = Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Reminder dismissed", body = Reminder),
        (status = 404, description = "Reminder not found")
    ),
    tag = "reminders",
    security(("bearer_auth" = []))
)]
pub async fn dismiss_reminder(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(reminder_id): Path<Uuid>,
) -> Result<Json<Reminder>> {
    let reminder = state
        .reminder_service
        .dismiss(reminder_id, &user.username)
        .await?;

    Ok(Json(reminder))
}
