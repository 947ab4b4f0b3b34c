use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{
    task_dto::{CreateTaskRequest, UpdateTaskRequest, UpdateTaskStatusRequest},
    task_models::Task,
};
use crate::{error::Result, middleware::CurrentUser, state::AppState};

/// Get all tasks the authenticated user owns or is assigned to
#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, description = "List of tasks", body = Vec<Task>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn get_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Task>>> {
    let tasks = state.task_service.list_tasks(&user).await?;
    Ok(Json(tasks))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 404, description = "Task not found")
    ),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>> {
    let task = state.task_service.get_task(&user, task_id).await?;
    Ok(Json(task))
}

/// Create a task. A due date produces one reminder per assigned user.
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid input")
    ),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let task = state.task_service.create_task(&user, payload).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Task not found")
    ),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    payload.validate()?;

    let task = state.task_service.update_task(&user, task_id, payload).await?;

    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Task not found")
    ),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.task_service.delete_task(&user, task_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/api/tasks/{id}/status",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Task),
        (status = 404, description = "Task not found")
    ),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn update_task_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskStatusRequest>,
) -> Result<Json<Task>> {
    let task = state.task_service.update_status(&user, task_id, payload).await?;

    Ok(Json(task))
}
