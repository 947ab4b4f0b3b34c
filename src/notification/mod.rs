// Declare submodules
pub mod notification_models;
pub mod notification_dto;
pub mod notification_repository;
pub mod notification_handlers;
pub mod notification_service;
pub mod notification_jobs;

// Re-export public items
pub use notification_jobs::start_notification_jobs;
pub use notification_models::{Notification, NotificationCategory, NotificationEvent};
pub use notification_repository::NotificationStore;
