use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware::CurrentUser,
    state::AppState,
    user::user_dto::is_valid_username,
    websocket::types::{
        ChannelPayload, ClientMessage, ErrorPayload, RoomMessagePayload, RoomPayload, WsMessage,
    },
};

use super::connection::{channel_key, ConnectionId, Subscription, WsSender};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, user, state))
}

/// Memberships held by one socket. Dropping it leaves every channel and room.
struct ConnectionState {
    id: ConnectionId,
    user_id: Uuid,
    sender: WsSender,
    notification: Option<Subscription>,
    rooms: HashMap<String, Subscription>,
}

impl ConnectionState {
    fn new(user_id: Uuid, sender: WsSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            sender,
            notification: None,
            rooms: HashMap::new(),
        }
    }

    fn reply(&self, message: WsMessage) {
        let _ = self.sender.send(message);
    }
}

fn room_key(room: &str) -> String {
    format!("room:{}", channel_key(room))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, user: CurrentUser, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let mut connection = ConnectionState::new(user.id, tx);
    tracing::info!("WebSocket {} opened for {}", connection.id, user.username);

    // Spawn task to send messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Spawn task to receive messages from WebSocket
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = process_client_message(&text, &mut connection, &state).await {
                        tracing::warn!("Rejected client frame: {:?}", e);
                        connection.reply(WsMessage::Error(ErrorPayload {
                            message: e.to_string(),
                        }));
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!("WebSocket connection closed for {}", user.username);
}

/// Process incoming client messages
async fn process_client_message(
    text: &str,
    connection: &mut ConnectionState,
    state: &AppState,
) -> Result<()> {
    let client_msg: ClientMessage = serde_json::from_str(text)
        .map_err(|e| AppError::BadRequest(format!("Invalid message format: {}", e)))?;

    match client_msg {
        ClientMessage::Join => {
            // The name may have changed since the handshake.
            let user = state
                .users
                .find_by_id(connection.user_id)
                .await?
                .ok_or(AppError::Unauthorized("Unknown user".to_string()))?;

            connection.notification = None;
            let subscription =
                state
                    .channels
                    .join(&user.username, connection.id, connection.sender.clone());
            let channel = subscription.channel().to_string();
            connection.notification = Some(subscription);

            connection.reply(WsMessage::ChannelJoined(ChannelPayload { channel }));
        }
        ClientMessage::Leave => {
            let subscription = connection
                .notification
                .take()
                .ok_or(AppError::BadRequest("Not in a channel".to_string()))?;
            let channel = subscription.channel().to_string();
            subscription.leave();

            connection.reply(WsMessage::ChannelLeft(ChannelPayload { channel }));
        }
        ClientMessage::JoinRoom { room } => {
            if !is_valid_username(&room) {
                return Err(AppError::Validation("Invalid room name".to_string()));
            }
            let key = room_key(&room);
            if !connection.rooms.contains_key(&key) {
                let subscription = state
                    .channels
                    .join(&key, connection.id, connection.sender.clone());
                connection.rooms.insert(key, subscription);
            }

            connection.reply(WsMessage::RoomJoined(RoomPayload {
                room: channel_key(&room),
            }));
        }
        ClientMessage::LeaveRoom { room } => {
            let subscription = connection
                .rooms
                .remove(&room_key(&room))
                .ok_or(AppError::BadRequest("Not a member of that room".to_string()))?;
            subscription.leave();

            connection.reply(WsMessage::RoomLeft(RoomPayload {
                room: channel_key(&room),
            }));
        }
        ClientMessage::RoomMessage { room, content } => {
            let key = room_key(&room);
            if !connection.rooms.contains_key(&key) {
                return Err(AppError::Forbidden("Not a member of that room".to_string()));
            }
            if content.trim().is_empty() {
                return Err(AppError::Validation("Message content is required".to_string()));
            }
            let sender = state
                .users
                .find_by_id(connection.user_id)
                .await?
                .map(|u| u.username)
                .unwrap_or_default();

            state.channels.broadcast(
                &key,
                WsMessage::RoomMessage(RoomMessagePayload {
                    room: channel_key(&room),
                    sender,
                    content,
                    sent_at: Utc::now(),
                }),
            );
        }
    }

    Ok(())
}
