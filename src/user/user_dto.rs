use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;
use validator::Validate;

use super::user_models::UserRole;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenameRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 3, max = 50))]
    pub username: String,
}

// Admin DTOs
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    pub role: Option<UserRole>,
}

/// Names are stored trimmed, so length limits apply to the trimmed form.
fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

/// Allowed characters in a display name: ASCII letters, digits, `_`, `-`, `.`.
pub fn is_valid_username(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_charset() {
        assert!(is_valid_username("alice_01"));
        assert!(is_valid_username("Bob.Smith"));
        assert!(!is_valid_username("room:ops"));
        assert!(!is_valid_username("two words"));
        assert!(!is_valid_username("   "));
    }

    #[test]
    fn test_rename_request_length() {
        let request = RenameRequest {
            username: "ab".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_padding_does_not_count_towards_length() {
        let request: RenameRequest = serde_json::from_str(r#"{"username":" ab "}"#).unwrap();
        assert_eq!(request.username, "ab");
        assert!(request.validate().is_err());

        let request: CreateUserRequest =
            serde_json::from_str(r#"{"username":"  dave  ","email":"dave@example.com"}"#).unwrap();
        assert_eq!(request.username, "dave");
        assert!(request.validate().is_ok());
    }
}
