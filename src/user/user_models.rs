use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::websocket::channel_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    /// Display name. Its folded form is the user's recipient id and channel key.
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: &str, email: &str, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn channel_key(&self) -> String {
        channel_key(&self.username)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_key_is_folded_username() {
        let user = User::new(" Alice ", "alice@example.com", UserRole::User);
        assert_eq!(user.username, "Alice");
        assert_eq!(user.channel_key(), "alice");
        assert!(!user.is_admin());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!(UserRole::User.to_string(), "user");
    }
}
