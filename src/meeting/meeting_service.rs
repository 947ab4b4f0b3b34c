use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::{
    meeting_dto::{CreateMeetingRequest, UpdateMeetingRequest},
    meeting_models::Meeting,
    meeting_repository::MeetingStore,
};
use crate::{
    error::{AppError, Result},
    middleware::CurrentUser,
    notification::{notification_service::NotificationService, NotificationCategory, NotificationEvent},
    user::{user_service::resolve_known_users, UserStore},
    websocket::channel_key,
};

#[derive(Clone)]
pub struct MeetingService {
    meetings: Arc<dyn MeetingStore>,
    users: Arc<dyn UserStore>,
    notifications: NotificationService,
}

impl MeetingService {
    pub fn new(
        meetings: Arc<dyn MeetingStore>,
        users: Arc<dyn UserStore>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            meetings,
            users,
            notifications,
        }
    }

    pub async fn list_meetings(&self, actor: &CurrentUser) -> Result<Vec<Meeting>> {
        self.meetings.find_for_user(actor.id, &actor.channel_key()).await
    }

    pub async fn create_meeting(
        &self,
        actor: &CurrentUser,
        payload: CreateMeetingRequest,
    ) -> Result<Meeting> {
        if payload.title.trim().is_empty() {
            return Err(AppError::Validation("Meeting title is required".into()));
        }
        let participants = resolve_known_users(self.users.as_ref(), &payload.participants).await?;

        let mut meeting = Meeting::new(actor.id, &payload.title, payload.starts_at);
        meeting.participants = participants;
        let meeting = self.meetings.create(&meeting).await?;

        let message = format!(
            "{} invited you to \"{}\" at {}",
            actor.username,
            meeting.title,
            meeting.when()
        );
        self.announce(
            actor,
            NotificationCategory::MeetingCreated,
            &message,
            &meeting.participants,
            &format!("Meeting invitation: {}", meeting.title),
        )
        .await;

        tracing::info!("Meeting {} created by {}", meeting.id, actor.username);
        Ok(meeting)
    }

    pub async fn update_meeting(
        &self,
        actor: &CurrentUser,
        meeting_id: Uuid,
        payload: UpdateMeetingRequest,
    ) -> Result<Meeting> {
        let mut meeting = self.load_owned(actor, meeting_id).await?;
        let previous = meeting.participants.clone();

        if let Some(title) = payload.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("Meeting title is required".into()));
            }
            meeting.title = title.trim().to_string();
        }
        if let Some(starts_at) = payload.starts_at {
            meeting.starts_at = starts_at;
        }
        if let Some(participants) = payload.participants {
            meeting.participants = resolve_known_users(self.users.as_ref(), &participants).await?;
        }
        meeting.updated_at = Utc::now();

        let meeting = self
            .meetings
            .update(&meeting)
            .await?
            .ok_or_else(|| AppError::NotFound("Meeting not found".into()))?;

        let mut audience = meeting.participants.clone();
        audience.extend(previous.into_iter().filter(|p| !meeting.participants.contains(p)));

        let message = format!(
            "Meeting \"{}\" was updated; it now starts at {}",
            meeting.title,
            meeting.when()
        );
        self.announce(
            actor,
            NotificationCategory::MeetingUpdated,
            &message,
            &audience,
            &format!("Meeting updated: {}", meeting.title),
        )
        .await;

        Ok(meeting)
    }

    pub async fn delete_meeting(&self, actor: &CurrentUser, meeting_id: Uuid) -> Result<()> {
        let meeting = self.load_owned(actor, meeting_id).await?;
        if self.meetings.delete(meeting.id).await? == 0 {
            return Err(AppError::NotFound("Meeting not found".into()));
        }

        let message = format!(
            "Meeting \"{}\" scheduled for {} was cancelled",
            meeting.title,
            meeting.when()
        );
        self.announce(
            actor,
            NotificationCategory::MeetingDeleted,
            &message,
            &meeting.participants,
            &format!("Meeting cancelled: {}", meeting.title),
        )
        .await;

        Ok(())
    }

    /// In-app notification first, then a best-effort email to each recipient.
    async fn announce(
        &self,
        actor: &CurrentUser,
        category: NotificationCategory,
        message: &str,
        recipients: &[String],
        subject: &str,
    ) {
        let event = NotificationEvent::new(category, message)
            .to(recipients)
            .excluding(&actor.username);
        if event.recipients.is_empty() {
            return;
        }

        let keys: Vec<String> = event.recipients.iter().map(|r| channel_key(r)).collect();
        self.notifications.notify_or_log(event).await;

        match self.users.find_by_usernames(&keys).await {
            Ok(users) => {
                let sent = self.notifications.email_users(&users, subject, message).await;
                tracing::debug!("Sent {}/{} meeting emails", sent, users.len());
            }
            Err(e) => tracing::warn!("Could not resolve meeting email recipients: {:?}", e),
        }
    }

    async fn load_owned(&self, actor: &CurrentUser, meeting_id: Uuid) -> Result<Meeting> {
        let meeting = self
            .meetings
            .find_by_id(meeting_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Meeting not found".into()))?;

        if meeting.organizer_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden("Only the organizer can change this meeting".into()));
        }
        Ok(meeting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mailer::testing::RecordingMailer,
        memory::MemoryStore,
        user::{User, UserRole},
        websocket::ChannelHub,
    };
    use chrono::{Duration, Utc};

    struct Fixture {
        service: MeetingService,
        notifications: NotificationService,
        mailer: Arc<RecordingMailer>,
        organizer: CurrentUser,
        bob: CurrentUser,
    }

    async fn fixture(failing: &[&str]) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let organizer = store.seed_user(User::new("alice", "alice@example.com", UserRole::User)).await;
        let bob = store.seed_user(User::new("bob", "bob@example.com", UserRole::User)).await;
        store.seed_user(User::new("carol", "carol@example.com", UserRole::User)).await;

        let mailer = Arc::new(RecordingMailer::failing_for(failing));
        let notifications = NotificationService::new(store.clone(), ChannelHub::new(), mailer.clone());
        let service = MeetingService::new(store.clone(), store.clone(), notifications.clone());

        Fixture {
            service,
            notifications,
            mailer,
            organizer: organizer.into(),
            bob: bob.into(),
        }
    }

    fn standup(participants: &[&str]) -> CreateMeetingRequest {
        CreateMeetingRequest {
            title: "Standup".into(),
            starts_at: Utc::now() + Duration::hours(2),
            participants: participants.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_notifies_and_emails_participants() {
        let f = fixture(&[]).await;
        f.service
            .create_meeting(&f.organizer, standup(&["bob", "carol", "alice"]))
            .await
            .unwrap();

        for user in ["bob", "carol"] {
            let inbox = f.notifications.list_for_user(user, false).await.unwrap();
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].category, NotificationCategory::MeetingCreated);
        }
        assert!(f.notifications.list_for_user("alice", false).await.unwrap().is_empty());
        assert_eq!(f.mailer.sent(), vec!["bob@example.com", "carol@example.com"]);
    }

    #[tokio::test]
    async fn test_email_failure_keeps_in_app_notifications() {
        let f = fixture(&["bob@example.com"]).await;
        f.service
            .create_meeting(&f.organizer, standup(&["bob", "carol"]))
            .await
            .unwrap();

        assert_eq!(f.notifications.list_for_user("bob", false).await.unwrap().len(), 1);
        assert_eq!(f.mailer.sent(), vec!["carol@example.com"]);
    }

    #[tokio::test]
    async fn test_update_reaches_removed_participants() {
        let f = fixture(&[]).await;
        let meeting = f
            .service
            .create_meeting(&f.organizer, standup(&["bob", "carol"]))
            .await
            .unwrap();

        f.service
            .update_meeting(
                &f.organizer,
                meeting.id,
                UpdateMeetingRequest {
                    participants: Some(vec!["carol".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let bob_inbox = f.notifications.list_for_user("bob", false).await.unwrap();
        assert!(bob_inbox
            .iter()
            .any(|n| n.category == NotificationCategory::MeetingUpdated));
    }

    #[tokio::test]
    async fn test_only_organizer_deletes() {
        let f = fixture(&[]).await;
        let meeting = f
            .service
            .create_meeting(&f.organizer, standup(&["bob"]))
            .await
            .unwrap();

        assert!(matches!(
            f.service.delete_meeting(&f.bob, meeting.id).await,
            Err(AppError::Forbidden(_))
        ));
        f.service.delete_meeting(&f.organizer, meeting.id).await.unwrap();

        let bob_inbox = f.notifications.list_for_user("bob", false).await.unwrap();
        assert!(bob_inbox
            .iter()
            .any(|n| n.category == NotificationCategory::MeetingDeleted));
        assert!(f.service.list_meetings(&f.bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_participant_rejected() {
        let f = fixture(&[]).await;
        let result = f
            .service
            .create_meeting(&f.organizer, standup(&["nobody"]))
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
