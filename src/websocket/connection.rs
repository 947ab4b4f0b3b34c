use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::WsMessage;

pub type WsSender = mpsc::UnboundedSender<WsMessage>;
pub type ConnectionId = Uuid;

/// Folds a user name (or room name) into the key its channel is stored under.
pub fn channel_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Channel membership table: channel key to the live connections subscribed
/// to it. Each connection owns an unbounded FIFO queue, so frames broadcast
/// to one channel arrive in call order.
#[derive(Clone)]
pub struct ChannelHub {
    channels: Arc<DashMap<String, HashMap<ConnectionId, WsSender>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
        }
    }

    /// Subscribe a connection to a channel. The membership lasts until the
    /// returned guard is dropped or [`Subscription::leave`] is called.
    pub fn join(&self, channel: &str, connection: ConnectionId, sender: WsSender) -> Subscription {
        let key = channel_key(channel);
        self.channels
            .entry(key.clone())
            .or_default()
            .insert(connection, sender);
        tracing::debug!("Connection {} joined channel {}", connection, key);

        Subscription {
            hub: self.clone(),
            channel: key,
            connection,
            active: true,
        }
    }

    /// Returns whether the connection was a member.
    pub fn leave(&self, channel: &str, connection: ConnectionId) -> bool {
        let key = channel_key(channel);
        let removed = match self.channels.get_mut(&key) {
            Some(mut members) => members.remove(&connection).is_some(),
            None => false,
        };
        self.channels.remove_if(&key, |_, members| members.is_empty());

        if removed {
            tracing::debug!("Connection {} left channel {}", connection, key);
        }
        removed
    }

    /// Push a frame to every connection currently in the channel. Returns how
    /// many connections accepted it; nobody connected means nobody gets it.
    pub fn broadcast(&self, channel: &str, message: WsMessage) -> usize {
        let key = channel_key(channel);
        let Some(members) = self.channels.get(&key) else {
            return 0;
        };

        members
            .values()
            .filter(|sender| sender.send(message.clone()).is_ok())
            .count()
    }

    pub fn member_count(&self, channel: &str) -> usize {
        self.channels
            .get(&channel_key(channel))
            .map(|members| members.len())
            .unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Membership guard handed out by [`ChannelHub::join`].
pub struct Subscription {
    hub: ChannelHub,
    channel: String,
    connection: ConnectionId,
    active: bool,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn leave(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.active {
            self.hub.leave(&self.channel, self.connection);
            self.active = false;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::types::ErrorPayload;

    fn frame(text: &str) -> WsMessage {
        WsMessage::Error(ErrorPayload {
            message: text.to_string(),
        })
    }

    fn text_of(message: WsMessage) -> String {
        match message {
            WsMessage::Error(payload) => payload.message,
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_channel_key_folds_case_and_whitespace() {
        assert_eq!(channel_key("  Alice "), "alice");
        assert_eq!(channel_key("BOB"), "bob");
    }

    #[test]
    fn test_broadcast_reaches_only_its_channel() {
        let hub = ChannelHub::new();
        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        let _alice = hub.join("alice", Uuid::new_v4(), alice_tx);
        let _bob = hub.join("bob", Uuid::new_v4(), bob_tx);

        assert_eq!(hub.broadcast("alice", frame("for alice")), 1);

        assert_eq!(text_of(alice_rx.try_recv().unwrap()), "for alice");
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_key_is_case_insensitive() {
        let hub = ChannelHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = hub.join("alice", Uuid::new_v4(), tx);

        assert_eq!(hub.broadcast(" ALICE", frame("hello")), 1);
        assert_eq!(text_of(rx.try_recv().unwrap()), "hello");
    }

    #[test]
    fn test_every_connection_in_channel_receives_in_order() {
        let hub = ChannelHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let _a = hub.join("alice", Uuid::new_v4(), tx1);
        let _b = hub.join("alice", Uuid::new_v4(), tx2);

        hub.broadcast("alice", frame("1"));
        hub.broadcast("alice", frame("2"));

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(text_of(rx.try_recv().unwrap()), "1");
            assert_eq!(text_of(rx.try_recv().unwrap()), "2");
        }
    }

    #[test]
    fn test_dropping_subscription_leaves_channel() {
        let hub = ChannelHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let sub = hub.join("alice", Uuid::new_v4(), tx);
        assert_eq!(hub.member_count("alice"), 1);

        drop(sub);

        assert_eq!(hub.member_count("alice"), 0);
        assert_eq!(hub.channel_count(), 0);
        assert_eq!(hub.broadcast("alice", frame("lost")), 0);
    }

    #[test]
    fn test_rejoin_moves_deliveries_to_new_channel() {
        let hub = ChannelHub::new();
        let connection = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let old = hub.join("alice", connection, tx.clone());
        old.leave();
        let _new = hub.join("alicia", connection, tx);

        assert_eq!(hub.broadcast("alice", frame("old")), 0);
        assert_eq!(hub.broadcast("alicia", frame("new")), 1);
        assert_eq!(text_of(rx.try_recv().unwrap()), "new");
    }

    #[test]
    fn test_closed_receiver_is_not_counted() {
        let hub = ChannelHub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let _sub = hub.join("alice", Uuid::new_v4(), tx);
        drop(rx);

        assert_eq!(hub.broadcast("alice", frame("gone")), 0);
    }
}
