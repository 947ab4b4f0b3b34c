pub mod connection;
pub mod handler;
pub mod types;

pub use connection::{channel_key, ChannelHub, Subscription};
pub use handler::ws_handler;
pub use types::{ChannelPayload, WsMessage};
