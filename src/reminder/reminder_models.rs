use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::websocket::channel_key;

/// How far ahead of the due date a reminder becomes active.
pub const REMINDER_LEAD_DAYS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Dismissed,
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderStatus::Pending => write!(f, "pending"),
            ReminderStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reminder {
    pub id: Uuid,
    pub task_id: Uuid,
    pub recipient: String,
    pub due_date: DateTime<Utc>,
    pub reminder_date: DateTime<Utc>,
    pub status: ReminderStatus,
    pub message: String,
    /// Set once the due-soon scan has raised an alert for this reminder.
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

/// `due_date` minus the lead time, or `None` when that falls outside the
/// representable range.
pub fn reminder_date_for(due_date: DateTime<Utc>) -> Option<DateTime<Utc>> {
    due_date.checked_sub_signed(Duration::days(REMINDER_LEAD_DAYS))
}

impl Reminder {
    pub fn new(task_id: Uuid, task_title: &str, recipient: &str, due_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            recipient: channel_key(recipient),
            due_date,
            reminder_date: reminder_date_for(due_date).unwrap_or(due_date),
            status: ReminderStatus::Pending,
            message: format!(
                "Reminder: \"{}\" is due on {}",
                task_title,
                due_date.format("%Y-%m-%d %H:%M UTC")
            ),
            notified: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReminderStatus::Pending
    }
}

/// Midnight UTC at the start of the day after `now`.
pub fn start_of_next_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + chrono::Days::new(1);
    Utc.from_utc_datetime(&tomorrow.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reminder_date_is_one_day_before_due() {
        let due = Utc.with_ymd_and_hms(2026, 3, 10, 15, 30, 0).unwrap();
        let reminder = Reminder::new(Uuid::new_v4(), "Report", "Bob", due);

        assert_eq!(reminder.reminder_date, Utc.with_ymd_and_hms(2026, 3, 9, 15, 30, 0).unwrap());
        assert_eq!(reminder.recipient, "bob");
        assert!(reminder.is_pending());
        assert!(reminder.message.contains("Report"));
    }

    #[test]
    fn test_earliest_due_date_has_no_lead_time() {
        assert!(reminder_date_for(DateTime::<Utc>::MIN_UTC).is_none());

        let reminder = Reminder::new(Uuid::new_v4(), "Report", "bob", DateTime::<Utc>::MIN_UTC);
        assert_eq!(reminder.reminder_date, DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_start_of_next_day() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            start_of_next_day(now),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
