use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::task_models::TaskStatus;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_users: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// Remove the due date (and with it every reminder).
    #[serde(default)]
    pub clear_due_date: bool,
    pub assigned_users: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskStatusRequest {
    pub status: TaskStatus,
}
