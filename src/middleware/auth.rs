use crate::{
    auth::verify_jwt,
    error::AppError,
    state::AppState,
    user::{User, UserRole},
    websocket::channel_key,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use uuid::Uuid;

/// The authenticated caller, resolved fresh from the user store on every
/// request so a rename takes effect immediately.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn channel_key(&self) -> String {
        channel_key(&self.username)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header_token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    // Browsers cannot set headers on a WebSocket handshake.
    let token = match header_token {
        Some(token) => token,
        None => Query::<TokenQuery>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(q)| q.token)
            .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?,
    };

    let claims = verify_jwt(&token, &state.config.jwt_secret)?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthorized("Unknown user".to_string()))?;

    req.extensions_mut().insert(CurrentUser::from(user));

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))
    }
}
