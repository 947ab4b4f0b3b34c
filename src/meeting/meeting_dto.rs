use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMeetingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMeetingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub participants: Option<Vec<String>>,
}
