use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{
    notification_models::{Notification, NotificationEvent},
    notification_repository::NotificationStore,
};
use crate::{
    error::{AppError, Result},
    mailer::Mailer,
    user::User,
    websocket::{channel_key, ChannelHub, WsMessage},
};

/// Notifications older than this are removed by the retention sweep.
pub const RETENTION_HOURS: i64 = 24;

/// Turns domain events into persisted notifications and pushes each one to
/// its recipient's live channel.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    channels: ChannelHub,
    mailer: Arc<dyn Mailer>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        channels: ChannelHub,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            store,
            channels,
            mailer,
        }
    }

    /// Persist one notification per distinct recipient in a single batch,
    /// then broadcast them. Nothing is broadcast if the write fails.
    pub async fn notify(&self, event: NotificationEvent) -> Result<Vec<Notification>> {
        if event.message.trim().is_empty() {
            return Err(AppError::Validation("Notification message is required".to_string()));
        }

        let mut seen = HashSet::new();
        let mut notifications = Vec::with_capacity(event.recipients.len());
        for recipient in &event.recipients {
            let key = channel_key(recipient);
            if key.is_empty() {
                return Err(AppError::Validation("Notification recipient is required".to_string()));
            }
            if seen.insert(key.clone()) {
                notifications.push(Notification::new(
                    &key,
                    &event.message,
                    event.category,
                    event.task_id,
                ));
            }
        }

        if notifications.is_empty() {
            return Ok(notifications);
        }

        self.store.insert_many(&notifications).await?;

        for notification in &notifications {
            let delivered = self.channels.broadcast(
                &notification.recipient,
                WsMessage::Notification(notification.clone()),
            );
            tracing::debug!(
                "Notification {} ({}) delivered to {} live connection(s) of {}",
                notification.id,
                notification.category,
                delivered,
                notification.recipient
            );
        }

        Ok(notifications)
    }

    /// [`notify`](Self::notify) for callers whose own work already succeeded:
    /// a failure is logged and the event is dropped.
    pub async fn notify_or_log(&self, event: NotificationEvent) -> usize {
        let category = event.category;
        match self.notify(event).await {
            Ok(created) => created.len(),
            Err(e) => {
                tracing::error!("Failed to create {} notifications: {:?}", category, e);
                0
            }
        }
    }

    /// Best-effort email to each user. A failed send is logged and skipped.
    /// Returns how many sends succeeded.
    pub async fn email_users(&self, users: &[User], subject: &str, body: &str) -> usize {
        let mut sent = 0;
        for user in users {
            match self.mailer.send(&user.email, subject, body).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!("Failed to email {} <{}>: {}", user.username, user.email, e);
                }
            }
        }
        sent
    }

    pub async fn list_for_user(&self, recipient: &str, include_read: bool) -> Result<Vec<Notification>> {
        self.store
            .find_by_recipient(&channel_key(recipient), include_read)
            .await
    }

    /// Flips the read flag. Marking an already-read notification succeeds again.
    pub async fn mark_read(&self, id: Uuid, recipient: &str) -> Result<Notification> {
        self.store
            .mark_as_read(id, &channel_key(recipient))
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
    }

    pub async fn clear_read(&self, recipient: &str) -> Result<u64> {
        self.store.delete_read(&channel_key(recipient)).await
    }

    /// Deletes every notification created more than [`RETENTION_HOURS`]
    /// before `now`, read or not. One exactly at the threshold survives.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - Duration::hours(RETENTION_HOURS);
        let deleted = self.store.delete_created_before(cutoff).await?;
        tracing::info!("Retention sweep removed {} notification(s) older than {}", deleted, cutoff);
        Ok(deleted)
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
    use crate::{
        mailer::{testing::RecordingMailer, LogMailer},
        memory::MemoryStore,
        notification::NotificationCategory,
        user::UserRole,
    };
    use tokio::sync::mpsc;

    fn service_with(store: Arc<MemoryStore>, channels: ChannelHub) -> NotificationService {
        NotificationService::new(store, channels, Arc::new(LogMailer::new("noreply@test.local")))
    }

    fn aged(recipient: &str, now: DateTime<Utc>, hours: i64) -> Notification {
        let mut n = Notification::new(recipient, "old", NotificationCategory::Overdue, None);
        n.created_at = now - Duration::hours(hours);
        n
    }

    #[tokio::test]
    async fn test_notify_persists_then_broadcasts() {
        let store = Arc::new(MemoryStore::new());
        let channels = ChannelHub::new();
        let service = service_with(store.clone(), channels.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = channels.join("alice", Uuid::new_v4(), tx);

        let created = service
            .notify(
                NotificationEvent::new(NotificationCategory::NewTask, "New task: Ship it")
                    .to(["Alice", "bob"]),
            )
            .await
            .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(service.list_for_user("alice", false).await.unwrap().len(), 1);
        assert_eq!(service.list_for_user("bob", false).await.unwrap().len(), 1);

        match rx.try_recv().unwrap() {
            WsMessage::Notification(n) => {
                assert_eq!(n.recipient, "alice");
                assert_eq!(n.message, "New task: Ship it");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notify_collapses_duplicate_recipients() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store, ChannelHub::new());

        let created = service
            .notify(NotificationEvent::new(NotificationCategory::Completed, "done").to(["bob", " BOB "]))
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn test_notify_rejects_blank_message_and_recipient() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), ChannelHub::new());

        let blank_message = service
            .notify(NotificationEvent::new(NotificationCategory::NewTask, "  ").to(["bob"]))
            .await;
        assert!(matches!(blank_message, Err(AppError::Validation(_))));

        let blank_recipient = service
            .notify(NotificationEvent::new(NotificationCategory::NewTask, "hi").to(["bob", " "]))
            .await;
        assert!(matches!(blank_recipient, Err(AppError::Validation(_))));

        assert!(service.list_for_user("bob", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_broadcasts_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);
        let channels = ChannelHub::new();
        let service = service_with(store, channels.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = channels.join("bob", Uuid::new_v4(), tx);

        let result = service
            .notify(NotificationEvent::new(NotificationCategory::NewTask, "hi").to(["bob"]))
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(rx.try_recv().is_err());
        assert_eq!(
            service
                .notify_or_log(NotificationEvent::new(NotificationCategory::NewTask, "hi").to(["bob"]))
                .await,
            0
        );
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store, ChannelHub::new());
        let created = service
            .notify(NotificationEvent::new(NotificationCategory::NewTask, "hi").to(["bob"]))
            .await
            .unwrap();
        let id = created[0].id;

        let first = service.mark_read(id, "bob").await.unwrap();
        let second = service.mark_read(id, "Bob").await.unwrap();

        assert!(first.is_read);
        assert!(second.is_read);
        assert!(service.list_for_user("bob", false).await.unwrap().is_empty());
        assert_eq!(service.list_for_user("bob", true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_or_foreign_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store, ChannelHub::new());
        let created = service
            .notify(NotificationEvent::new(NotificationCategory::NewTask, "hi").to(["bob"]))
            .await
            .unwrap();

        assert!(matches!(
            service.mark_read(Uuid::new_v4(), "bob").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.mark_read(created[0].id, "alice").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_read_keeps_unread() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store, ChannelHub::new());
        let created = service
            .notify(NotificationEvent::new(NotificationCategory::NewTask, "one").to(["bob"]))
            .await
            .unwrap();
        service
            .notify(NotificationEvent::new(NotificationCategory::NewTask, "two").to(["bob"]))
            .await
            .unwrap();
        service.mark_read(created[0].id, "bob").await.unwrap();

        assert_eq!(service.clear_read("bob").await.unwrap(), 1);
        let left = service.list_for_user("bob", true).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].message, "two");
    }

    #[tokio::test]
    async fn test_sweep_boundary_keeps_exactly_24h() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), ChannelHub::new());
        let now = Utc::now();
        let mut read_old = aged("bob", now, 30);
        read_old.is_read = true;
        store
            .insert_many(&[aged("bob", now, 23), aged("bob", now, 24), aged("bob", now, 25), read_old])
            .await
            .unwrap();

        assert_eq!(service.sweep_expired(now).await.unwrap(), 2);

        let mut ages: Vec<i64> = service
            .list_for_user("bob", true)
            .await
            .unwrap()
            .iter()
            .map(|n| (now - n.created_at).num_hours())
            .collect();
        ages.sort();
        assert_eq!(ages, vec![23, 24]);

        assert_eq!(service.sweep_expired(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_email_failures_do_not_stop_other_sends() {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::failing_for(&["bob@example.com"]));
        let service = NotificationService::new(store, ChannelHub::new(), mailer.clone());
        let users = vec![
            User::new("alice", "alice@example.com", UserRole::User),
            User::new("bob", "bob@example.com", UserRole::User),
            User::new("carol", "carol@example.com", UserRole::User),
        ];

        let sent = service.email_users(&users, "Meeting", "body").await;

        assert_eq!(sent, 2);
        assert_eq!(mailer.sent(), vec!["alice@example.com", "carol@example.com"]);
    }
}
