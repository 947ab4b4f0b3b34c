use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware::CurrentUser,
    notification::{notification_service::NotificationService, NotificationCategory, NotificationEvent},
    state::Stores,
    user::{
        user_dto::{is_valid_username, CreateUserRequest},
        user_models::{User, UserRole},
        user_repository::UserStore,
    },
    websocket::{channel_key, ChannelHub, ChannelPayload, WsMessage},
};

/// Fold and de-duplicate `names`, failing if any of them is not a known user.
pub async fn resolve_known_users(users: &dyn UserStore, names: &[String]) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let key = channel_key(name);
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }

    let known: Vec<String> = users
        .find_by_usernames(&keys)
        .await?
        .iter()
        .map(User::channel_key)
        .collect();
    let unknown: Vec<&str> = keys
        .iter()
        .filter(|k| !known.contains(k))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::Validation(format!("Unknown users: {}", unknown.join(", "))));
    }

    Ok(keys)
}

#[derive(Clone)]
pub struct UserService {
    stores: Stores,
    channels: ChannelHub,
    notifications: NotificationService,
}

impl UserService {
    pub fn new(stores: Stores, channels: ChannelHub, notifications: NotificationService) -> Self {
        Self {
            stores,
            channels,
            notifications,
        }
    }

    pub async fn get_current_user(&self, user_id: Uuid) -> Result<User> {
        self.stores
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn create_user(&self, payload: CreateUserRequest) -> Result<User> {
        if !is_valid_username(&payload.username) {
            return Err(AppError::Validation(
                "Username may only contain letters, digits, '_', '-' and '.'".to_string(),
            ));
        }
        if self
            .stores
            .users
            .find_by_username(&channel_key(&payload.username))
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let user = User::new(
            &payload.username,
            &payload.email,
            payload.role.unwrap_or(UserRole::User),
        );
        self.stores.users.create(&user).await
    }

    /// Change the caller's display name. Stored records addressed to the old
    /// name are re-keyed, and live connections on the old channel are told to
    /// re-join under the new one.
    pub async fn rename(&self, actor: &CurrentUser, new_username: &str) -> Result<User> {
        let new_username = new_username.trim();
        if !is_valid_username(new_username) {
            return Err(AppError::Validation(
                "Username may only contain letters, digits, '_', '-' and '.'".to_string(),
            ));
        }

        let old_key = actor.channel_key();
        let new_key = channel_key(new_username);

        if new_key != old_key {
            if let Some(existing) = self.stores.users.find_by_username(&new_key).await? {
                if existing.id != actor.id {
                    return Err(AppError::Conflict("Username already taken".to_string()));
                }
            }
        }

        let user = self
            .stores
            .users
            .update_username(actor.id, new_username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if new_key == old_key {
            return Ok(user);
        }

        self.stores.tasks.rename_assignee(&old_key, &new_key).await?;
        self.stores.meetings.rename_participant(&old_key, &new_key).await?;
        self.stores.reminders.rename_recipient(&old_key, &new_key).await?;
        self.notifications.rename_recipient(&old_key, &new_key).await?;

        self.channels.broadcast(
            &old_key,
            WsMessage::ChannelChanged(ChannelPayload {
                channel: new_key.clone(),
            }),
        );

        let admins: Vec<String> = self
            .stores
            .users
            .find_admins()
            .await?
            .iter()
            .map(User::channel_key)
            .collect();
        self.notifications
            .notify_or_log(
                NotificationEvent::new(
                    NotificationCategory::StatusChanged,
                    format!("User {} is now known as {}", actor.username, user.username),
                )
                .to(&admins)
                .excluding(&user.username),
            )
            .await;

        tracing::info!("User {} renamed {} -> {}", actor.id, old_key, new_key);
        Ok(user)
    }
}
