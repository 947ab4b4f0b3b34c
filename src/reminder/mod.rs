pub mod reminder_models;
pub mod reminder_repository;
pub mod reminder_handlers;
pub mod reminder_service;

pub use reminder_models::{Reminder, ReminderStatus};
pub use reminder_repository::ReminderStore;
