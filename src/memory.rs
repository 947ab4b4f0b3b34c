//! In-process implementation of every store trait. Used when no
//! `DATABASE_URL` is configured and by the test suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    meeting::{meeting_models::Meeting, MeetingStore},
    notification::{Notification, NotificationStore},
    reminder::{Reminder, ReminderStatus, ReminderStore},
    task::{Task, TaskStore},
    user::{User, UserRole, UserStore},
};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
    meetings: RwLock<HashMap<Uuid, Meeting>>,
    notifications: RwLock<Vec<Notification>>,
    reminders: RwLock<Vec<Reminder>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail as if the database were down.
    #[cfg(test)]
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn seed_user(&self, user: User) -> User {
        self.users.write().await.insert(user.id, user.clone());
        user
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn rename_in(list: &mut [String], from: &str, to: &str) -> bool {
    let mut changed = false;
    for entry in list.iter_mut().filter(|entry| entry.as_str() == from) {
        *entry = to.to_string();
        changed = true;
    }
    changed
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: &User) -> Result<User> {
        self.check_writable()?;
        self.users.write().await.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn find_by_username(&self, key: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.channel_key() == key)
            .cloned())
    }

    async fn find_by_usernames(&self, keys: &[String]) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| keys.contains(&u.channel_key()))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn find_admins(&self) -> Result<Vec<User>> {
        let mut admins: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.role == UserRole::Admin)
            .cloned()
            .collect();
        admins.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(admins)
    }

    async fn update_username(&self, user_id: Uuid, username: &str) -> Result<Option<User>> {
        self.check_writable()?;
        let mut users = self.users.write().await;
        Ok(users.get_mut(&user_id).map(|user| {
            user.username = username.to_string();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create(&self, task: &Task) -> Result<Task> {
        self.check_writable()?;
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn find_visible(&self, owner_id: Uuid, assignee: &str) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.owner_id == owner_id || t.assigned_users.iter().any(|u| u == assignee))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn update(&self, task: &Task) -> Result<Option<Task>> {
        self.check_writable()?;
        let mut tasks = self.tasks.write().await;
        Ok(tasks.get_mut(&task.id).map(|stored| {
            *stored = Task {
                updated_at: Utc::now(),
                ..task.clone()
            };
            stored.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        self.check_writable()?;
        Ok(self.tasks.write().await.remove(&id).map_or(0, |_| 1))
    }

    async fn rename_assignee(&self, from: &str, to: &str) -> Result<u64> {
        self.check_writable()?;
        let mut tasks = self.tasks.write().await;
        let changed = tasks
            .values_mut()
            .map(|t| rename_in(&mut t.assigned_users, from, to))
            .filter(|changed| *changed)
            .count();
        Ok(changed as u64)
    }
}

#[async_trait]
impl MeetingStore for MemoryStore {
    async fn create(&self, meeting: &Meeting) -> Result<Meeting> {
        self.check_writable()?;
        self.meetings.write().await.insert(meeting.id, meeting.clone());
        Ok(meeting.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Meeting>> {
        Ok(self.meetings.read().await.get(&id).cloned())
    }

    async fn find_for_user(&self, organizer_id: Uuid, participant: &str) -> Result<Vec<Meeting>> {
        let mut meetings: Vec<Meeting> = self
            .meetings
            .read()
            .await
            .values()
            .filter(|m| m.organizer_id == organizer_id || m.participants.iter().any(|p| p == participant))
            .cloned()
            .collect();
        meetings.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        Ok(meetings)
    }

    async fn update(&self, meeting: &Meeting) -> Result<Option<Meeting>> {
        self.check_writable()?;
        let mut meetings = self.meetings.write().await;
        Ok(meetings.get_mut(&meeting.id).map(|stored| {
            *stored = Meeting {
                updated_at: Utc::now(),
                ..meeting.clone()
            };
            stored.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        self.check_writable()?;
        Ok(self.meetings.write().await.remove(&id).map_or(0, |_| 1))
    }

    async fn rename_participant(&self, from: &str, to: &str) -> Result<u64> {
        self.check_writable()?;
        let mut meetings = self.meetings.write().await;
        let changed = meetings
            .values_mut()
            .map(|m| rename_in(&mut m.participants, from, to))
            .filter(|changed| *changed)
            .count();
        Ok(changed as u64)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_many(&self, notifications: &[Notification]) -> Result<()> {
        self.check_writable()?;
        self.notifications
            .write()
            .await
            .extend(notifications.iter().cloned());
        Ok(())
    }

    async fn find_by_recipient(
        &self,
        recipient: &str,
        include_read: bool,
    ) -> Result<Vec<Notification>> {
        let mut found: Vec<Notification> = self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| n.recipient == recipient && (include_read || !n.is_read))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn mark_as_read(&self, id: Uuid, recipient: &str) -> Result<Option<Notification>> {
        self.check_writable()?;
        let mut notifications = self.notifications.write().await;
        Ok(notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient == recipient)
            .map(|n| {
                n.is_read = true;
                n.clone()
            }))
    }

    async fn delete_read(&self, recipient: &str) -> Result<u64> {
        self.check_writable()?;
        let mut notifications = self.notifications.write().await;
        let before = notifications.len();
        notifications.retain(|n| !(n.recipient == recipient && n.is_read));
        Ok((before - notifications.len()) as u64)
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check_writable()?;
        let mut notifications = self.notifications.write().await;
        let before = notifications.len();
        notifications.retain(|n| n.created_at >= cutoff);
        Ok((before - notifications.len()) as u64)
    }

    async fn rename_recipient(&self, from: &str, to: &str) -> Result<u64> {
        self.check_writable()?;
        let mut notifications = self.notifications.write().await;
        let mut changed = 0;
        for n in notifications.iter_mut().filter(|n| n.recipient == from) {
            n.recipient = to.to_string();
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn replace_for_task(&self, task_id: Uuid, reminders: &[Reminder]) -> Result<()> {
        self.check_writable()?;
        let mut stored = self.reminders.write().await;
        stored.retain(|r| r.task_id != task_id);
        stored.extend(reminders.iter().cloned());
        Ok(())
    }

    async fn delete_for_task(&self, task_id: Uuid) -> Result<u64> {
        self.check_writable()?;
        let mut stored = self.reminders.write().await;
        let before = stored.len();
        stored.retain(|r| r.task_id != task_id);
        Ok((before - stored.len()) as u64)
    }

    async fn find_by_task(&self, task_id: Uuid) -> Result<Vec<Reminder>> {
        let mut found: Vec<Reminder> = self
            .reminders
            .read()
            .await
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.recipient.cmp(&b.recipient));
        Ok(found)
    }

    async fn find_by_recipient(&self, recipient: &str) -> Result<Vec<Reminder>> {
        let mut found: Vec<Reminder> = self
            .reminders
            .read()
            .await
            .iter()
            .filter(|r| r.recipient == recipient)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.reminder_date.cmp(&b.reminder_date));
        Ok(found)
    }

    async fn find_pending_before(
        &self,
        recipient: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<Reminder>> {
        let mut found: Vec<Reminder> = self
            .reminders
            .read()
            .await
            .iter()
            .filter(|r| r.recipient == recipient && r.is_pending() && r.reminder_date < before)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.reminder_date.cmp(&b.reminder_date));
        Ok(found)
    }

    async fn dismiss(&self, id: Uuid, recipient: &str) -> Result<Option<Reminder>> {
        self.check_writable()?;
        let mut stored = self.reminders.write().await;
        Ok(stored
            .iter_mut()
            .find(|r| r.id == id && r.recipient == recipient)
            .map(|r| {
                r.status = ReminderStatus::Dismissed;
                r.clone()
            }))
    }

    async fn find_due_unnotified(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let mut found: Vec<Reminder> = self
            .reminders
            .read()
            .await
            .iter()
            .filter(|r| r.is_pending() && !r.notified && r.reminder_date <= now)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.reminder_date.cmp(&b.reminder_date));
        Ok(found)
    }

    async fn mark_notified(&self, ids: &[Uuid]) -> Result<u64> {
        self.check_writable()?;
        let mut stored = self.reminders.write().await;
        let mut changed = 0;
        for r in stored.iter_mut().filter(|r| ids.contains(&r.id)) {
            r.notified = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn rename_recipient(&self, from: &str, to: &str) -> Result<u64> {
        self.check_writable()?;
        let mut stored = self.reminders.write().await;
        let mut changed = 0;
        for r in stored.iter_mut().filter(|r| r.recipient == from) {
            r.recipient = to.to_string();
            changed += 1;
        }
        Ok(changed)
    }
}
