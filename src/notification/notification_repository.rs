use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::notification_models::Notification;
use crate::error::Result;

/// Persistence for the notification inbox. Recipients are always passed
/// already folded to their channel key.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Writes every record in one statement. Either all land or none do.
    async fn insert_many(&self, notifications: &[Notification]) -> Result<()>;

    async fn find_by_recipient(&self, recipient: &str, include_read: bool)
        -> Result<Vec<Notification>>;

    async fn mark_as_read(&self, id: Uuid, recipient: &str) -> Result<Option<Notification>>;

    async fn delete_read(&self, recipient: &str) -> Result<u64>;

    /// Removes notifications strictly older than `cutoff`.
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn rename_recipient(&self, from: &str, to: &str) -> Result<u64>;
}

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert_many(&self, notifications: &[Notification]) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO notifications (id, recipient, message, category, task_id, is_read, created_at) ",
        );
        builder.push_values(notifications, |mut row, n| {
            row.push_bind(n.id)
                .push_bind(&n.recipient)
                .push_bind(&n.message)
                .push_bind(n.category)
                .push_bind(n.task_id)
                .push_bind(n.is_read)
                .push_bind(n.created_at);
        });
        builder.build().execute(&self.pool).await?;

        Ok(())
    }

    async fn find_by_recipient(
        &self,
        recipient: &str,
        include_read: bool,
    ) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications
             WHERE recipient = $1 AND ($2 OR is_read = false)
             ORDER BY created_at DESC",
        )
        .bind(recipient)
        .bind(include_read)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn mark_as_read(&self, id: Uuid, recipient: &str) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = true WHERE id = $1 AND recipient = $2 RETURNING *",
        )
        .bind(id)
        .bind(recipient)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn delete_read(&self, recipient: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE recipient = $1 AND is_read = true")
            .bind(recipient)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn rename_recipient(&self, from: &str, to: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET recipient = $2 WHERE recipient = $1")
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
