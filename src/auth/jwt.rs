use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub role: String,
    pub exp: i64,
}

/// Verify JWT token and extract claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
}

/// Tokens are issued elsewhere; tests mint their own.
#[cfg(test)]
pub fn create_access_token(user_id: uuid::Uuid, role: &str, secret: &str) -> String {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::minutes(15)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
