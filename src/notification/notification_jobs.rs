use chrono::{DateTime, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use super::{
    notification_models::{NotificationCategory, NotificationEvent},
    notification_service::NotificationService,
};
use crate::{error::Result, reminder::reminder_service::ReminderService, state::AppState};

/// Register the cron jobs and start the scheduler. The returned handle must
/// be kept alive for the jobs to keep firing.
pub async fn start_notification_jobs(state: AppState) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let notifications = state.notification_service.clone();
    let sweep = Job::new_async(state.config.sweep_cron.as_str(), move |_uuid, _l| {
        let notifications = notifications.clone();

        Box::pin(async move {
            if let Err(e) = notifications.sweep_expired(Utc::now()).await {
                error!("Notification retention sweep failed: {:?}", e);
            }
        })
    })?;
    scheduler.add(sweep).await?;

    if state.config.due_soon_scan_enabled {
        let notifications = state.notification_service.clone();
        let reminders = state.reminder_service.clone();
        let scan = Job::new_async(state.config.due_soon_cron.as_str(), move |_uuid, _l| {
            let notifications = notifications.clone();
            let reminders = reminders.clone();

            Box::pin(async move {
                if let Err(e) = scan_due_soon(&reminders, &notifications, Utc::now()).await {
                    error!("Due-soon scan failed: {:?}", e);
                }
            })
        })?;
        scheduler.add(scan).await?;
    } else {
        info!("Due-soon scanner disabled");
    }

    scheduler.start().await?;

    info!("Notification jobs started (sweep: {})", state.config.sweep_cron);
    Ok(scheduler)
}

/// Alert the recipient of every pending reminder whose reminder date has
/// arrived and that has not been alerted yet. Returns how many were raised.
pub async fn scan_due_soon(
    reminders: &ReminderService,
    notifications: &NotificationService,
    now: DateTime<Utc>,
) -> Result<usize> {
    let due = reminders.find_due_unnotified(now).await?;
    let mut raised = Vec::with_capacity(due.len());

    for reminder in &due {
        let event = NotificationEvent::new(NotificationCategory::Overdue, reminder.message.clone())
            .to([&reminder.recipient])
            .for_task(reminder.task_id);

        match notifications.notify(event).await {
            Ok(_) => raised.push(reminder.id),
            Err(e) => error!("Failed to raise reminder {}: {:?}", reminder.id, e),
        }
    }

    reminders.mark_notified(&raised).await?;
    if !raised.is_empty() {
        info!("Raised {} due-soon alert(s)", raised.len());
    }

    Ok(raised.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mailer::LogMailer, memory::MemoryStore, reminder::Reminder, reminder::ReminderStore,
        websocket::ChannelHub,
    };
    use chrono::Duration;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_scan_alerts_once_per_due_reminder() {
        let store = Arc::new(MemoryStore::new());
        let notifications = NotificationService::new(
            store.clone(),
            ChannelHub::new(),
            Arc::new(LogMailer::new("noreply@test.local")),
        );
        let reminders = ReminderService::new(store.clone());
        let now = Utc::now();

        let task_id = Uuid::new_v4();
        let due_now = Reminder::new(task_id, "Report", "bob", now + Duration::hours(12));
        let later = Reminder::new(task_id, "Report", "carol", now + Duration::days(4));
        store.replace_for_task(task_id, &[due_now, later]).await.unwrap();

        assert_eq!(scan_due_soon(&reminders, &notifications, now).await.unwrap(), 1);
        assert_eq!(scan_due_soon(&reminders, &notifications, now).await.unwrap(), 0);

        let inbox = notifications.list_for_user("bob", false).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].category, NotificationCategory::Overdue);
        assert_eq!(inbox[0].task_id, Some(task_id));
        assert!(notifications.list_for_user("carol", false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_skips_dismissed() {
        let store = Arc::new(MemoryStore::new());
        let notifications = NotificationService::new(
            store.clone(),
            ChannelHub::new(),
            Arc::new(LogMailer::new("noreply@test.local")),
        );
        let reminders = ReminderService::new(store.clone());
        let now = Utc::now();
        let reminder = Reminder::new(Uuid::new_v4(), "Report", "bob", now);
        store
            .replace_for_task(reminder.task_id, &[reminder.clone()])
            .await
            .unwrap();
        reminders.dismiss(reminder.id, "bob").await.unwrap();

        assert_eq!(scan_due_soon(&reminders, &notifications, now).await.unwrap(), 0);
    }
}
