use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::task_models::Task;
use crate::error::Result;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: &Task) -> Result<Task>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>>;

    /// Tasks the user owns or is assigned to.
    async fn find_visible(&self, owner_id: Uuid, assignee: &str) -> Result<Vec<Task>>;

    /// Write back every mutable column of `task`.
    async fn update(&self, task: &Task) -> Result<Option<Task>>;

    async fn delete(&self, id: Uuid) -> Result<u64>;

    async fn rename_assignee(&self, from: &str, to: &str) -> Result<u64>;
}

#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for TaskRepository {
    async fn create(&self, task: &Task) -> Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks
             (id, owner_id, title, description, status, due_date, assigned_users, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(task.id)
        .bind(task.owner_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.due_date)
        .bind(&task.assigned_users)
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(task)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(task)
    }

    async fn find_visible(&self, owner_id: Uuid, assignee: &str) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks
             WHERE owner_id = $1 OR $2 = ANY(assigned_users)
             ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .bind(assignee)
        .fetch_all(&self.pool)
        .await?;

        Ok(tasks)
    }

    async fn update(&self, task: &Task) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            "UPDATE tasks SET
                title = $1,
                description = $2,
                status = $3,
                due_date = $4,
                assigned_users = $5,
                updated_at = NOW()
             WHERE id = $6
             RETURNING *",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.due_date)
        .bind(&task.assigned_users)
        .bind(task.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(task)
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn rename_assignee(&self, from: &str, to: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE tasks SET assigned_users = array_replace(assigned_users, $1, $2)
             WHERE $1 = ANY(assigned_users)",
        )
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
