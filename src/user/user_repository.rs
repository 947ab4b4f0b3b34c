use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::user_models::User;
use crate::error::Result;

/// User lookups. Name arguments are channel keys (folded names).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn find_by_username(&self, key: &str) -> Result<Option<User>>;

    async fn find_by_usernames(&self, keys: &[String]) -> Result<Vec<User>>;

    async fn find_admins(&self) -> Result<Vec<User>>;

    async fn update_username(&self, user_id: Uuid, username: &str) -> Result<Option<User>>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, email, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_username(&self, key: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_usernames(&self, keys: &[String]) -> Result<Vec<User>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(username) = ANY($1) ORDER BY username",
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn find_admins(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE role = 'admin' ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn update_username(&self, user_id: Uuid, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET username = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(username)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
