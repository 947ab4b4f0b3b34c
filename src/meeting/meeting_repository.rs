use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::meeting_models::Meeting;
use crate::error::Result;

#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn create(&self, meeting: &Meeting) -> Result<Meeting>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Meeting>>;

    /// Meetings the user organizes or is invited to.
    async fn find_for_user(&self, organizer_id: Uuid, participant: &str) -> Result<Vec<Meeting>>;

    async fn update(&self, meeting: &Meeting) -> Result<Option<Meeting>>;

    async fn delete(&self, id: Uuid) -> Result<u64>;

    async fn rename_participant(&self, from: &str, to: &str) -> Result<u64>;
}

#[derive(Clone)]
pub struct MeetingRepository {
    pool: PgPool,
}

impl MeetingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MeetingStore for MeetingRepository {
    async fn create(&self, meeting: &Meeting) -> Result<Meeting> {
        let meeting = sqlx::query_as::<_, Meeting>(
            "INSERT INTO meetings (id, organizer_id, title, starts_at, participants, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(meeting.id)
        .bind(meeting.organizer_id)
        .bind(&meeting.title)
        .bind(meeting.starts_at)
        .bind(&meeting.participants)
        .bind(meeting.created_at)
        .bind(meeting.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(meeting)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Meeting>> {
        let meeting = sqlx::query_as::<_, Meeting>("SELECT * FROM meetings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(meeting)
    }

    async fn find_for_user(&self, organizer_id: Uuid, participant: &str) -> Result<Vec<Meeting>> {
        let meetings = sqlx::query_as::<_, Meeting>(
            "SELECT * FROM meetings
             WHERE organizer_id = $1 OR $2 = ANY(participants)
             ORDER BY starts_at ASC",
        )
        .bind(organizer_id)
        .bind(participant)
        .fetch_all(&self.pool)
        .await?;

        Ok(meetings)
    }

    async fn update(&self, meeting: &Meeting) -> Result<Option<Meeting>> {
        let meeting = sqlx::query_as::<_, Meeting>(
            "UPDATE meetings SET title = $1, starts_at = $2, participants = $3, updated_at = NOW()
             WHERE id = $4
             RETURNING *",
        )
        .bind(&meeting.title)
        .bind(meeting.starts_at)
        .bind(&meeting.participants)
        .bind(meeting.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(meeting)
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM meetings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn rename_participant(&self, from: &str, to: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE meetings SET participants = array_replace(participants, $1, $2)
             WHERE $1 = ANY(participants)",
        )
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
