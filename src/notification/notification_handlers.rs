use axum::{
    extract::{Path, Query, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    Json,
};
use chrono::Utc;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;
use uuid::Uuid;

use super::{
    notification_dto::{DeletedResponse, NotificationQuery},
    notification_models::Notification,
};
use crate::{error::Result, middleware::CurrentUser, state::AppState};

/// Get notifications for the authenticated user, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "List of notifications", body = Vec<Notification>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn get_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>> {
    let notifications = state
        .notification_service
        .list_for_user(&user.channel_key(), query.all)
        .await?;

    Ok(Json(notifications))
}

/// Subscribe to real-time notifications via Server-Sent Events
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "SSE stream of notifications"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn notification_stream(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = Uuid::new_v4();
    let subscription = state.channels.join(&user.username, connection_id, tx);
    debug!("SSE stream {} joined channel {}", connection_id, subscription.channel());

    // The subscription lives as long as the stream; dropping the stream on
    // disconnect leaves the channel.
    let stream = UnboundedReceiverStream::new(rx).filter_map(move |message| {
        let _subscription = &subscription;
        let event = Event::default().json_data(&message).ok().map(Ok);
        async move { event }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Mark notification as read. Repeating the call is harmless.
#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked as read", body = Notification),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let notification = state
        .notification_service
        .mark_read(notification_id, &user.channel_key())
        .await?;

    Ok(Json(notification))
}

/// Delete every read notification of the authenticated user
#[utoipa::path(
    delete,
    path = "/api/notifications/read",
    responses(
        (status = 200, description = "Read notifications deleted", body = DeletedResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn clear_read_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<DeletedResponse>> {
    let deleted = state
        .notification_service
        .clear_read(&user.channel_key())
        .await?;

    Ok(Json(DeletedResponse { deleted }))
}

/// Run the retention sweep immediately
#[utoipa::path(
    post,
    path = "/api/admin/notifications/sweep",
    responses(
        (status = 200, description = "Expired notifications deleted", body = DeletedResponse),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn sweep_notifications(State(state): State<AppState>) -> Result<Json<DeletedResponse>> {
    let deleted = state.notification_service.sweep_expired(Utc::now()).await?;

    Ok(Json(DeletedResponse { deleted }))
}
