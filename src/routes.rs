use crate::{
    admin::admin_authorization,
    meeting::{
        meeting_dto::{CreateMeetingRequest, UpdateMeetingRequest},
        meeting_handlers, Meeting,
    },
    middleware::auth_middleware,
    notification::{
        notification_dto::DeletedResponse, notification_handlers, Notification,
        NotificationCategory,
    },
    reminder::{reminder_handlers, Reminder, ReminderStatus},
    state::AppState,
    task::{
        task_dto::{CreateTaskRequest, UpdateTaskRequest, UpdateTaskStatusRequest},
        task_handlers, Task, TaskStatus,
    },
    user::{
        user_dto::{CreateUserRequest, RenameRequest},
        user_handlers, User, UserRole,
    },
    websocket::{
        types::{ErrorPayload, RoomMessagePayload, RoomPayload},
        ws_handler, ChannelPayload, WsMessage,
    },
};
use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        task_handlers::get_tasks,
        task_handlers::get_task,
        task_handlers::create_task,
        task_handlers::update_task,
        task_handlers::delete_task,
        task_handlers::update_task_status,
        meeting_handlers::get_meetings,
        meeting_handlers::create_meeting,
        meeting_handlers::update_meeting,
        meeting_handlers::delete_meeting,
        notification_handlers::get_notifications,
        notification_handlers::notification_stream,
        notification_handlers::mark_notification_read,
        notification_handlers::clear_read_notifications,
        notification_handlers::sweep_notifications,
        reminder_handlers::list_reminders,
        reminder_handlers::reminders_due_today,
        reminder_handlers::dismiss_reminder,
        user_handlers::get_current_user,
        user_handlers::rename_current_user,
        user_handlers::create_user,
    ),
    components(
        schemas(
            CreateTaskRequest,
            UpdateTaskRequest,
            UpdateTaskStatusRequest,
            CreateMeetingRequest,
            UpdateMeetingRequest,
            RenameRequest,
            CreateUserRequest,
            DeletedResponse,
            User,
            UserRole,
            Task,
            TaskStatus,
            Meeting,
            Notification,
            NotificationCategory,
            Reminder,
            ReminderStatus,
            WsMessage,
            ChannelPayload,
            RoomPayload,
            RoomMessagePayload,
            ErrorPayload,
        )
    ),
    tags(
        (name = "tasks", description = "Task management endpoints"),
        (name = "meetings", description = "Meeting scheduling endpoints"),
        (name = "notifications", description = "Notification endpoints"),
        (name = "reminders", description = "Due-date reminder endpoints"),
        (name = "users", description = "Profile endpoints"),
        (name = "admin", description = "Administrative endpoints")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let task_routes = Router::new()
        .route("/", get(task_handlers::get_tasks).post(task_handlers::create_task))
        .route(
            "/:id",
            get(task_handlers::get_task)
                .put(task_handlers::update_task)
                .delete(task_handlers::delete_task),
        )
        .route("/:id/status", patch(task_handlers::update_task_status));

    let meeting_routes = Router::new()
        .route(
            "/",
            get(meeting_handlers::get_meetings).post(meeting_handlers::create_meeting),
        )
        .route(
            "/:id",
            put(meeting_handlers::update_meeting).delete(meeting_handlers::delete_meeting),
        );

    let notification_routes = Router::new()
        .route("/", get(notification_handlers::get_notifications))
        .route("/stream", get(notification_handlers::notification_stream))
        .route("/read", delete(notification_handlers::clear_read_notifications))
        .route("/:id/read", put(notification_handlers::mark_notification_read));

    let reminder_routes = Router::new()
        .route("/", get(reminder_handlers::list_reminders))
        .route("/today", get(reminder_handlers::reminders_due_today))
        .route("/:id/dismiss", put(reminder_handlers::dismiss_reminder));

    let user_routes = Router::new().route(
        "/me",
        get(user_handlers::get_current_user).put(user_handlers::rename_current_user),
    );

    // Runs inside auth_middleware, which supplies the CurrentUser.
    let admin_routes = Router::new()
        .route("/users", post(user_handlers::create_user))
        .route(
            "/notifications/sweep",
            post(notification_handlers::sweep_notifications),
        )
        .route_layer(middleware::from_fn(admin_authorization));

    // Everything under /api requires a valid bearer token
    let api_routes = Router::new()
        .nest("/tasks", task_routes)
        .nest("/meetings", meeting_routes)
        .nest("/notifications", notification_routes)
        .nest("/reminders", reminder_routes)
        .nest("/users", user_routes)
        .nest("/admin", admin_routes)
        .route("/ws", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::jwt::create_access_token,
        mailer::LogMailer,
        memory::MemoryStore,
        notification::NotificationEvent,
        state::{Config, Stores},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use futures::StreamExt;
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    struct TestApp {
        state: AppState,
        alice: User,
        admin: User,
    }

    impl TestApp {
        async fn new() -> Self {
            let store = MemoryStore::new();
            let alice = store
                .seed_user(User::new("alice", "alice@example.com", UserRole::User))
                .await;
            let admin = store
                .seed_user(User::new("root", "root@example.com", UserRole::Admin))
                .await;
            let state = AppState::new(
                Arc::new(Config::for_tests()),
                Stores::from_memory(store),
                Arc::new(LogMailer::new("noreply@test.local")),
            );
            Self {
                state,
                alice,
                admin,
            }
        }

        fn token(&self, user: &User) -> String {
            create_access_token(user.id, &user.role.to_string(), &self.state.config.jwt_secret)
        }

        fn request(&self, method: Method, uri: &str, user: Option<&User>) -> Request<Body> {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(user) = user {
                request = request.header("Authorization", format!("Bearer {}", self.token(user)));
            }
            request.body(Body::empty()).unwrap()
        }

        async fn send(&self, method: Method, uri: &str, user: Option<&User>) -> (StatusCode, Value) {
            let response = create_router(self.state.clone())
                .oneshot(self.request(method, uri, user))
                .await
                .unwrap();

            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = TestApp::new().await;
        let (status, body) = app.send(Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let app = TestApp::new().await;
        let (status, _) = app.send(Method::GET, "/api/notifications", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mark_read_flow() {
        let app = TestApp::new().await;
        let created = app
            .state
            .notification_service
            .notify(
                NotificationEvent::new(NotificationCategory::NewTask, "You were assigned")
                    .to(["alice"]),
            )
            .await
            .unwrap();
        let id = created[0].id;

        let (status, body) = app
            .send(Method::GET, "/api/notifications", Some(&app.alice))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let uri = format!("/api/notifications/{}/read", id);
        for _ in 0..2 {
            let (status, body) = app.send(Method::PUT, &uri, Some(&app.alice)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["is_read"], true);
        }

        let (_, body) = app
            .send(Method::GET, "/api/notifications", Some(&app.alice))
            .await;
        assert!(body.as_array().unwrap().is_empty());

        let (_, body) = app
            .send(Method::GET, "/api/notifications?all=true", Some(&app.alice))
            .await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = app
            .send(Method::DELETE, "/api/notifications/read", Some(&app.alice))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 1);
    }

    #[tokio::test]
    async fn test_mark_unknown_notification_is_not_found() {
        let app = TestApp::new().await;
        let uri = format!("/api/notifications/{}/read", uuid::Uuid::new_v4());
        let (status, _) = app.send(Method::PUT, &uri, Some(&app.alice)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin_role() {
        let app = TestApp::new().await;

        let (status, _) = app
            .send(Method::POST, "/api/admin/notifications/sweep", Some(&app.alice))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(Method::POST, "/api/admin/notifications/sweep", Some(&app.admin))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 0);
    }

    #[tokio::test]
    async fn test_reminders_today_is_empty_without_tasks() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(Method::GET, "/api/reminders/today", Some(&app.alice))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }
    #[tokio::test]
    async fn test_stream_delivers_new_notifications() {
        let app = TestApp::new().await;
        let response = create_router(app.state.clone())
            .oneshot(app.request(Method::GET, "/api/notifications/stream", Some(&app.alice)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        assert_eq!(app.state.channels.member_count("alice"), 1);

        let mut body = response.into_body().into_data_stream();
        app.state
            .notification_service
            .notify(
                NotificationEvent::new(NotificationCategory::NewTask, "You were assigned")
                    .to(["alice"]),
            )
            .await
            .unwrap();

        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame = String::from_utf8(chunk.to_vec()).unwrap();
        let data = frame.trim().strip_prefix("data:").unwrap().trim_start();
        let event: Value = serde_json::from_str(data).unwrap();
        assert_eq!(event["type"], "notification");
        assert_eq!(event["recipient"], "alice");
        assert_eq!(event["message"], "You were assigned");

        drop(body);
        assert_eq!(app.state.channels.member_count("alice"), 0);
    }
}
