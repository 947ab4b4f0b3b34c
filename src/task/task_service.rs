use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    task_dto::{CreateTaskRequest, UpdateTaskRequest, UpdateTaskStatusRequest},
    task_models::{Task, TaskStatus},
    task_repository::TaskStore,
};
use crate::{
    error::{AppError, Result},
    middleware::CurrentUser,
    notification::{notification_service::NotificationService, NotificationCategory, NotificationEvent},
    reminder::{reminder_models::reminder_date_for, reminder_service::ReminderService},
    user::{user_service::resolve_known_users, UserStore},
};

/// Service layer for task‑related business logic. Every mutation keeps the
/// task's reminders in step and emits notifications to the affected users.
#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
    reminders: ReminderService,
    notifications: NotificationService,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        reminders: ReminderService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            tasks,
            users,
            reminders,
            notifications,
        }
    }

    pub async fn list_tasks(&self, actor: &CurrentUser) -> Result<Vec<Task>> {
        self.tasks.find_visible(actor.id, &actor.channel_key()).await
    }

    pub async fn get_task(&self, actor: &CurrentUser, task_id: Uuid) -> Result<Task> {
        let task = self.load(task_id).await?;
        if !can_access(actor, &task) {
            return Err(AppError::NotFound("Task not found".into()));
        }
        Ok(task)
    }

    pub async fn create_task(&self, actor: &CurrentUser, payload: CreateTaskRequest) -> Result<Task> {
        if payload.title.trim().is_empty() {
            return Err(AppError::Validation("Task title is required".into()));
        }
        check_due_date(payload.due_date)?;
        let assignees = resolve_known_users(self.users.as_ref(), &payload.assigned_users).await?;

        let mut task = Task::new(actor.id, &payload.title, payload.description, payload.due_date);
        task.assigned_users = assignees;
        let task = self.tasks.create(&task).await?;

        if task.due_date.is_some() {
            self.reminders.regenerate_for_task(&task).await?;
        }

        self.notifications
            .notify_or_log(
                NotificationEvent::new(
                    NotificationCategory::NewTask,
                    format!("New task assigned: \"{}\"", task.title),
                )
                .to(&task.assigned_users)
                .for_task(task.id)
                .excluding(&actor.username),
            )
            .await;

        tracing::info!("Task {} created by {}", task.id, actor.username);
        Ok(task)
    }

    pub async fn update_task(
        &self,
        actor: &CurrentUser,
        task_id: Uuid,
        payload: UpdateTaskRequest,
    ) -> Result<Task> {
        let mut task = self.load(task_id).await?;
        if !can_access(actor, &task) {
            return Err(AppError::Forbidden("Not allowed to edit this task".into()));
        }

        let previous = task.clone();

        if let Some(title) = payload.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("Task title is required".into()));
            }
            task.title = title.trim().to_string();
        }
        if let Some(description) = payload.description {
            task.description = Some(description);
        }
        if payload.clear_due_date {
            task.due_date = None;
        } else if let Some(due_date) = payload.due_date {
            check_due_date(Some(due_date))?;
            task.due_date = Some(due_date);
        }
        if let Some(assigned) = payload.assigned_users {
            task.assigned_users = resolve_known_users(self.users.as_ref(), &assigned).await?;
        }

        let assignees_changed = !same_members(&task.assigned_users, &previous.assigned_users);
        let due_changed = task.due_date != previous.due_date;
        if !assignees_changed
            && !due_changed
            && task.title == previous.title
            && task.description == previous.description
        {
            return Ok(previous);
        }
        task.updated_at = Utc::now();

        let task = self
            .tasks
            .update(&task)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

        if due_changed || assignees_changed {
            self.reminders.regenerate_for_task(&task).await?;
        }

        let (added, kept): (Vec<String>, Vec<String>) = task
            .assigned_users
            .iter()
            .cloned()
            .partition(|user| !previous.assigned_users.contains(user));

        self.notifications
            .notify_or_log(
                NotificationEvent::new(
                    NotificationCategory::NewTask,
                    format!("New task assigned: \"{}\"", task.title),
                )
                .to(&added)
                .for_task(task.id)
                .excluding(&actor.username),
            )
            .await;
        self.notifications
            .notify_or_log(
                NotificationEvent::new(
                    NotificationCategory::StatusChanged,
                    format!("Task \"{}\" was updated by {}", task.title, actor.username),
                )
                .to(&kept)
                .for_task(task.id)
                .excluding(&actor.username),
            )
            .await;

        Ok(task)
    }

    pub async fn update_status(
        &self,
        actor: &CurrentUser,
        task_id: Uuid,
        payload: UpdateTaskStatusRequest,
    ) -> Result<Task> {
        let mut task = self.load(task_id).await?;
        if !can_access(actor, &task) {
            return Err(AppError::Forbidden("Not allowed to edit this task".into()));
        }
        if task.status == payload.status {
            return Ok(task);
        }

        let previous = task.status;
        task.status = payload.status;
        task.updated_at = Utc::now();
        let task = self
            .tasks
            .update(&task)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

        let admins = self.admin_keys().await?;
        let event = if task.status == TaskStatus::Completed {
            self.reminders.clear_for_task(task.id).await?;
            NotificationEvent::new(
                NotificationCategory::Completed,
                format!("Task \"{}\" was completed by {}", task.title, actor.username),
            )
        } else {
            if previous == TaskStatus::Completed {
                self.reminders.regenerate_for_task(&task).await?;
            }
            NotificationEvent::new(
                NotificationCategory::StatusChanged,
                format!("Task \"{}\" moved to {}", task.title, task.status),
            )
        };

        self.notifications
            .notify_or_log(
                event
                    .to(&task.assigned_users)
                    .to(&admins)
                    .for_task(task.id)
                    .excluding(&actor.username),
            )
            .await;

        Ok(task)
    }

    pub async fn delete_task(&self, actor: &CurrentUser, task_id: Uuid) -> Result<()> {
        let task = self.load(task_id).await?;
        if task.owner_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden("Only the owner can delete this task".into()));
        }

        self.reminders.clear_for_task(task.id).await?;
        if self.tasks.delete(task.id).await? == 0 {
            return Err(AppError::NotFound("Task not found".into()));
        }

        self.notifications
            .notify_or_log(
                NotificationEvent::new(
                    NotificationCategory::TaskDeleted,
                    format!("Task \"{}\" was deleted by {}", task.title, actor.username),
                )
                .to(&task.assigned_users)
                .for_task(task.id)
                .excluding(&actor.username),
            )
            .await;

        tracing::info!("Task {} deleted by {}", task.id, actor.username);
        Ok(())
    }

    async fn load(&self, task_id: Uuid) -> Result<Task> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".into()))
    }

    async fn admin_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .users
            .find_admins()
            .await?
            .iter()
            .map(|u| u.channel_key())
            .collect())
    }
}

/// Owners, assignees and admins may read and edit a task.
fn can_access(actor: &CurrentUser, task: &Task) -> bool {
    task.owner_id == actor.id || actor.is_admin() || task.is_assigned(&actor.username)
}

/// Assignee lists are sets; order carries no meaning.
fn same_members(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}

fn check_due_date(due_date: Option<DateTime<Utc>>) -> Result<()> {
    match due_date {
        Some(due) if reminder_date_for(due).is_none() => {
            Err(AppError::Validation("Due date is out of range".into()))
        }
        _ => Ok(()),
    }
}
