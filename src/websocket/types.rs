use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::notification::Notification;

/// Server-to-client frames.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Notification(Notification),
    ChannelJoined(ChannelPayload),
    ChannelLeft(ChannelPayload),
    /// Sent to a user's old channel after a rename; clients should re-join.
    ChannelChanged(ChannelPayload),
    RoomJoined(RoomPayload),
    RoomLeft(RoomPayload),
    RoomMessage(RoomMessagePayload),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChannelPayload {
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomPayload {
    pub room: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomMessagePayload {
    pub room: String,
    pub sender: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorPayload {
    pub message: String,
}

// Client-to-server messages
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the caller's own notification channel.
    Join,
    Leave,
    JoinRoom { room: String },
    LeaveRoom { room: String },
    RoomMessage { room: String, content: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_parse() {
        let join: ClientMessage = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        assert!(matches!(join, ClientMessage::Join));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"room_message","room":"ops","content":"hi"}"#).unwrap();
        match msg {
            ClientMessage::RoomMessage { room, content } => {
                assert_eq!(room, "ops");
                assert_eq!(content, "hi");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_server_frames_are_tagged() {
        let frame = WsMessage::ChannelChanged(ChannelPayload {
            channel: "alice2".into(),
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "channel_changed");
        assert_eq!(json["channel"], "alice2");
    }
}
