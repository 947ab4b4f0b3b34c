use std::sync::Arc;

use anyhow::Context;

use crate::{
    db::DbPool,
    mailer::Mailer,
    meeting::{meeting_repository::MeetingRepository, meeting_service::MeetingService, MeetingStore},
    memory::MemoryStore,
    notification::{
        notification_repository::NotificationRepository, notification_service::NotificationService,
        NotificationStore,
    },
    reminder::{reminder_repository::ReminderRepository, reminder_service::ReminderService, ReminderStore},
    task::{task_repository::TaskRepository, task_service::TaskService, TaskStore},
    user::{user_repository::UserRepository, user_service::UserService, UserStore},
    websocket::ChannelHub,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub channels: ChannelHub,
    pub users: Arc<dyn UserStore>,
    pub notification_service: NotificationService,
    pub reminder_service: ReminderService,
    pub task_service: TaskService,
    pub meeting_service: MeetingService,
    pub user_service: UserService,
}

impl AppState {
    pub fn new(config: Arc<Config>, stores: Stores, mailer: Arc<dyn Mailer>) -> Self {
        let channels = ChannelHub::new();

        let notification_service =
            NotificationService::new(stores.notifications.clone(), channels.clone(), mailer);
        let reminder_service = ReminderService::new(stores.reminders.clone());
        let task_service = TaskService::new(
            stores.tasks.clone(),
            stores.users.clone(),
            reminder_service.clone(),
            notification_service.clone(),
        );
        let meeting_service = MeetingService::new(
            stores.meetings.clone(),
            stores.users.clone(),
            notification_service.clone(),
        );
        let user_service = UserService::new(
            stores.clone(),
            channels.clone(),
            notification_service.clone(),
        );

        Self {
            config,
            channels,
            users: stores.users,
            notification_service,
            reminder_service,
            task_service,
            meeting_service,
            user_service,
        }
    }
}

/// Handles to every persisted collection, backed either by Postgres or by
/// the in-process [`MemoryStore`].
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub meetings: Arc<dyn MeetingStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub reminders: Arc<dyn ReminderStore>,
}

impl Stores {
    pub fn postgres(pool: DbPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            tasks: Arc::new(TaskRepository::new(pool.clone())),
            meetings: Arc::new(MeetingRepository::new(pool.clone())),
            notifications: Arc::new(NotificationRepository::new(pool.clone())),
            reminders: Arc::new(ReminderRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(MemoryStore::new())
    }

    pub fn from_memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            tasks: store.clone(),
            meetings: store.clone(),
            notifications: store.clone(),
            reminders: store,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub sweep_cron: String,
    pub due_soon_scan_enabled: bool,
    pub due_soon_cron: String,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a number")?,
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            sweep_cron: std::env::var("SWEEP_CRON").unwrap_or_else(|_| "0 0 0 * * *".to_string()),
            due_soon_scan_enabled: std::env::var("DUE_SOON_SCAN_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("DUE_SOON_SCAN_ENABLED must be true or false")?,
            due_soon_cron: std::env::var("DUE_SOON_CRON")
                .unwrap_or_else(|_| "0 0 * * * *".to_string()),
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "noreply@task-notify.local".to_string()),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: None,
            jwt_secret: "test-secret".to_string(),
            sweep_cron: "0 0 0 * * *".to_string(),
            due_soon_scan_enabled: false,
            due_soon_cron: "0 0 * * * *".to_string(),
            mail_from: "noreply@test.local".to_string(),
        }
    }
}
