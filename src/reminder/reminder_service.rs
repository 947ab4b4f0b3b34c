use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    reminder_models::{start_of_next_day, Reminder},
    reminder_repository::ReminderStore,
};
use crate::{
    error::{AppError, Result},
    task::{Task, TaskStatus},
    websocket::channel_key,
};

/// Due-date reminders: one per (task, assignee) while the task has a due
/// date and is not completed.
#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn ReminderStore>,
}

impl ReminderService {
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self { store }
    }

    /// Rebuild the task's reminder set from its current due date and
    /// assignees, replacing whatever was there.
    pub async fn regenerate_for_task(&self, task: &Task) -> Result<Vec<Reminder>> {
        let reminders: Vec<Reminder> = match task.due_date {
            Some(due) if task.status != TaskStatus::Completed => task
                .assigned_users
                .iter()
                .map(|user| Reminder::new(task.id, &task.title, user, due))
                .collect(),
            _ => Vec::new(),
        };

        self.store.replace_for_task(task.id, &reminders).await?;
        tracing::debug!("Task {} now has {} reminder(s)", task.id, reminders.len());

        Ok(reminders)
    }

    pub async fn clear_for_task(&self, task_id: Uuid) -> Result<u64> {
        self.store.delete_for_task(task_id).await
    }

    pub async fn list_for_task(&self, task_id: Uuid) -> Result<Vec<Reminder>> {
        self.store.find_by_task(task_id).await
    }

    pub async fn list_for_user(&self, recipient: &str) -> Result<Vec<Reminder>> {
        self.store.find_by_recipient(&channel_key(recipient)).await
    }

    /// Pending reminders whose reminder date falls on or before today (UTC).
    pub async fn due_today(&self, recipient: &str, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        self.store
            .find_pending_before(&channel_key(recipient), start_of_next_day(now))
            .await
    }

    /// `pending -> dismissed`. Dismissing twice is a no-op success.
    pub async fn dismiss(&self, id: Uuid, recipient: &str) -> Result<Reminder> {
        self.store
            .dismiss(id, &channel_key(recipient))
            .await?
            .ok_or_else(|| AppError::NotFound("Reminder not found".to_string()))
    }

    pub async fn find_due_unnotified(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        self.store.find_due_unnotified(now).await
    }

    pub async fn mark_notified(&self, ids: &[Uuid]) -> Result<u64> {
        self.store.mark_notified(ids).await
    }

    pub async fn rename_recipient(&self, from: &str, to: &str) -> Result<u64> {
        self.store
            .rename_recipient(&channel_key(from), &channel_key(to))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryStore, reminder::ReminderStatus};
    use chrono::{Duration, TimeZone};

    fn task_due(due: Option<DateTime<Utc>>, assignees: &[&str]) -> Task {
        let mut task = Task::new(Uuid::new_v4(), "Quarterly report", None, due);
        task.assigned_users = assignees.iter().map(|a| a.to_string()).collect();
        task
    }

    #[tokio::test]
    async fn test_one_reminder_per_assignee() {
        let service = ReminderService::new(Arc::new(MemoryStore::new()));
        let due = Utc.with_ymd_and_hms(2026, 5, 20, 9, 0, 0).unwrap();
        let task = task_due(Some(due), &["alice", "bob"]);

        service.regenerate_for_task(&task).await.unwrap();

        let reminders = service.list_for_task(task.id).await.unwrap();
        assert_eq!(reminders.len(), 2);
        for reminder in &reminders {
            assert_eq!(reminder.due_date, due);
            assert_eq!(reminder.reminder_date, due - Duration::days(1));
            assert_eq!(reminder.status, ReminderStatus::Pending);
        }
    }

    #[tokio::test]
    async fn test_regenerate_replaces_previous_set() {
        let service = ReminderService::new(Arc::new(MemoryStore::new()));
        let due = Utc::now() + Duration::days(3);
        let mut task = task_due(Some(due), &["alice", "bob", "carol"]);
        service.regenerate_for_task(&task).await.unwrap();

        task.assigned_users = vec!["dave".to_string()];
        service.regenerate_for_task(&task).await.unwrap();

        let reminders = service.list_for_task(task.id).await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].recipient, "dave");

        task.due_date = None;
        service.regenerate_for_task(&task).await.unwrap();
        assert!(service.list_for_task(task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completed_task_has_no_reminders() {
        let service = ReminderService::new(Arc::new(MemoryStore::new()));
        let mut task = task_due(Some(Utc::now() + Duration::days(2)), &["alice"]);
        task.status = TaskStatus::Completed;

        assert!(service.regenerate_for_task(&task).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dismissed_reminder_leaves_today_list() {
        let service = ReminderService::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        let task = task_due(Some(now + Duration::days(1)), &["bob"]);
        let created = service.regenerate_for_task(&task).await.unwrap();

        assert_eq!(service.due_today("bob", now).await.unwrap().len(), 1);

        let dismissed = service.dismiss(created[0].id, "bob").await.unwrap();
        assert_eq!(dismissed.status, ReminderStatus::Dismissed);
        assert!(service.due_today("bob", now).await.unwrap().is_empty());

        let again = service.dismiss(created[0].id, "bob").await.unwrap();
        assert_eq!(again.status, ReminderStatus::Dismissed);
    }

    #[tokio::test]
    async fn test_due_today_excludes_later_reminders() {
        let service = ReminderService::new(Arc::new(MemoryStore::new()));
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap();
        let soon = task_due(Some(now + Duration::hours(30)), &["bob"]);
        let later = task_due(Some(now + Duration::days(5)), &["bob"]);
        service.regenerate_for_task(&soon).await.unwrap();
        service.regenerate_for_task(&later).await.unwrap();

        let today = service.due_today("bob", now).await.unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].task_id, soon.id);
        assert_eq!(service.list_for_user("bob").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dismiss_requires_ownership() {
        let service = ReminderService::new(Arc::new(MemoryStore::new()));
        let task = task_due(Some(Utc::now() + Duration::days(1)), &["bob"]);
        let created = service.regenerate_for_task(&task).await.unwrap();

        assert!(matches!(
            service.dismiss(created[0].id, "alice").await,
            Err(AppError::NotFound(_))
        ));
    }
}
