use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{
    meeting_dto::{CreateMeetingRequest, UpdateMeetingRequest},
    meeting_models::Meeting,
};
use crate::{error::Result, middleware::CurrentUser, state::AppState};

/// Meetings the authenticated user organizes or takes part in
#[utoipa::path(
    get,
    path = "/api/meetings",
    responses(
        (status = 200, description = "List of meetings", body = Vec<Meeting>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "meetings",
    security(("bearer_auth" = []))
)]
pub async fn get_meetings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Meeting>>> {
    let meetings = state.meeting_service.list_meetings(&user).await?;
    Ok(Json(meetings))
}

/// Schedule a meeting. Participants are notified in-app and by email.
#[utoipa::path(
    post,
    path = "/api/meetings",
    request_body = CreateMeetingRequest,
    responses(
        (status = 201, description = "Meeting created", body = Meeting),
        (status = 400, description = "Invalid input")
    ),
    tag = "meetings",
    security(("bearer_auth" = []))
)]
pub async fn create_meeting(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateMeetingRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let meeting = state.meeting_service.create_meeting(&user, payload).await?;

    Ok((StatusCode::CREATED, Json(meeting)))
}

#[utoipa::path(
    put,
    path = "/api/meetings/{id}",
    params(("id" = Uuid, Path, description = "Meeting ID")),
    request_body = UpdateMeetingRequest,
    responses(
        (status = 200, description = "Meeting updated", body = Meeting),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Meeting not found")
    ),
    tag = "meetings",
    security(("bearer_auth" = []))
)]
pub async fn update_meeting(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(meeting_id): Path<Uuid>,
    Json(payload): Json<UpdateMeetingRequest>,
) -> Result<Json<Meeting>> {
    payload.validate()?;

    let meeting = state
        .meeting_service
        .update_meeting(&user, meeting_id, payload)
        .await?;

    Ok(Json(meeting))
}

#[utoipa::path(
    delete,
    path = "/api/meetings/{id}",
    params(("id" = Uuid, Path, description = "Meeting ID")),
    responses(
        (status = 204, description = "Meeting cancelled"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Meeting not found")
    ),
    tag = "meetings",
    security(("bearer_auth" = []))
)]
pub async fn delete_meeting(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(meeting_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.meeting_service.delete_meeting(&user, meeting_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
