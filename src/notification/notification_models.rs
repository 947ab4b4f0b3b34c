use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::websocket::channel_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    NewTask,
    Overdue,
    Completed,
    StatusChanged,
    MeetingCreated,
    MeetingUpdated,
    MeetingDeleted,
    TaskDeleted,
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NotificationCategory::NewTask => "new_task",
            NotificationCategory::Overdue => "overdue",
            NotificationCategory::Completed => "completed",
            NotificationCategory::StatusChanged => "status_changed",
            NotificationCategory::MeetingCreated => "meeting_created",
            NotificationCategory::MeetingUpdated => "meeting_updated",
            NotificationCategory::MeetingDeleted => "meeting_deleted",
            NotificationCategory::TaskDeleted => "task_deleted",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    /// Lowercased user name; doubles as the fan-out channel key.
    pub recipient: String,
    pub message: String,
    pub category: NotificationCategory,
    pub task_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: &str,
        message: &str,
        category: NotificationCategory,
        task_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: channel_key(recipient),
            message: message.to_string(),
            category,
            task_id,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

/// A domain event that should land in one or more users' inboxes.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub category: NotificationCategory,
    pub message: String,
    pub recipients: Vec<String>,
    pub task_id: Option<Uuid>,
}

impl NotificationEvent {
    pub fn new(category: NotificationCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            recipients: Vec::new(),
            task_id: None,
        }
    }

    pub fn to<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.recipients
            .extend(recipients.into_iter().map(|r| r.as_ref().to_string()));
        self
    }

    pub fn for_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Drops `name` from the recipient list, compared by channel key.
    pub fn excluding(mut self, name: &str) -> Self {
        let key = channel_key(name);
        self.recipients.retain(|r| channel_key(r) != key);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display_matches_wire_name() {
        assert_eq!(NotificationCategory::NewTask.to_string(), "new_task");
        assert_eq!(NotificationCategory::MeetingDeleted.to_string(), "meeting_deleted");
        let json = serde_json::to_string(&NotificationCategory::StatusChanged).unwrap();
        assert_eq!(json, "\"status_changed\"");
    }

    #[test]
    fn test_new_notification_folds_recipient() {
        let n = Notification::new("  Alice ", "hi", NotificationCategory::NewTask, None);
        assert_eq!(n.recipient, "alice");
        assert!(!n.is_read);
    }

    #[test]
    fn test_event_excluding_actor() {
        let event = NotificationEvent::new(NotificationCategory::NewTask, "x")
            .to(["alice", "Bob", "carol"])
            .excluding("bob");
        assert_eq!(event.recipients, vec!["alice".to_string(), "carol".to_string()]);
    }
}
