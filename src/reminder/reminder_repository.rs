use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::reminder_models::Reminder;
use crate::error::Result;

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Swap the task's reminder set for `reminders`. An empty slice just
    /// clears it.
    async fn replace_for_task(&self, task_id: Uuid, reminders: &[Reminder]) -> Result<()>;

    async fn delete_for_task(&self, task_id: Uuid) -> Result<u64>;

    async fn find_by_task(&self, task_id: Uuid) -> Result<Vec<Reminder>>;

    async fn find_by_recipient(&self, recipient: &str) -> Result<Vec<Reminder>>;

    /// Pending reminders for `recipient` whose reminder date is before `before`.
    async fn find_pending_before(&self, recipient: &str, before: DateTime<Utc>)
        -> Result<Vec<Reminder>>;

    /// Only a pending reminder changes; a dismissed one is returned as is.
    async fn dismiss(&self, id: Uuid, recipient: &str) -> Result<Option<Reminder>>;

    async fn find_due_unnotified(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>>;

    async fn mark_notified(&self, ids: &[Uuid]) -> Result<u64>;

    async fn rename_recipient(&self, from: &str, to: &str) -> Result<u64>;
}

#[derive(Clone)]
pub struct ReminderRepository {
    pool: PgPool,
}

impl ReminderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for ReminderRepository {
    async fn replace_for_task(&self, task_id: Uuid, reminders: &[Reminder]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM reminders WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        if !reminders.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO reminders
                 (id, task_id, recipient, due_date, reminder_date, status, message, notified, created_at) ",
            );
            builder.push_values(reminders, |mut row, r| {
                row.push_bind(r.id)
                    .push_bind(r.task_id)
                    .push_bind(&r.recipient)
                    .push_bind(r.due_date)
                    .push_bind(r.reminder_date)
                    .push_bind(r.status)
                    .push_bind(&r.message)
                    .push_bind(r.notified)
                    .push_bind(r.created_at);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_for_task(&self, task_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM reminders WHERE task_id = $1")
            .bind(task_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_by_task(&self, task_id: Uuid) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders WHERE task_id = $1 ORDER BY recipient",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    async fn find_by_recipient(&self, recipient: &str) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders WHERE recipient = $1 ORDER BY reminder_date ASC",
        )
        .bind(recipient)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    async fn find_pending_before(
        &self,
        recipient: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders
             WHERE recipient = $1 AND status = 'pending' AND reminder_date < $2
             ORDER BY reminder_date ASC",
        )
        .bind(recipient)
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    async fn dismiss(&self, id: Uuid, recipient: &str) -> Result<Option<Reminder>> {
        let reminder = sqlx::query_as::<_, Reminder>(
            "UPDATE reminders SET status = 'dismissed'
             WHERE id = $1 AND recipient = $2
             RETURNING *",
        )
        .bind(id)
        .bind(recipient)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reminder)
    }

    async fn find_due_unnotified(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders
             WHERE status = 'pending' AND notified = false AND reminder_date <= $1
             ORDER BY reminder_date ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    async fn mark_notified(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("UPDATE reminders SET notified = true WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn rename_recipient(&self, from: &str, to: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE reminders SET recipient = $2 WHERE recipient = $1")
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
