use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Meeting {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    /// Channel keys of the invited users.
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn new(organizer_id: Uuid, title: &str, starts_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organizer_id,
            title: title.trim().to_string(),
            starts_at,
            participants: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn when(&self) -> String {
        self.starts_at.format("%Y-%m-%d %H:%M UTC").to_string()
    }
}
