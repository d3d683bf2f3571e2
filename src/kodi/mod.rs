//! Kodi backend - drives playback on a Kodi media center over JSON-RPC.
//!
//! Architecture:
//! - `transport.rs` - WebSocket JSON-RPC connection (calls + notification feed)
//! - `protocol.rs` - JSON-RPC frames and Kodi command builders
//! - `convert.rs` - Duration and volume conversions to Kodi's wire values
//! - `player.rs` - Active video player resolution
//! - `relay.rs` - Notification to playback state translation
//! - `session.rs` - Session lifecycle and the `Backend` implementation

mod convert;
#[cfg(test)]
mod mock;
mod player;
mod protocol;
mod relay;
mod session;
mod transport;

pub use convert::{volume_from_value, TimeFields};
pub use player::{video_player, PlayerId};
pub use protocol::{
  method, notification, plugin_url, KodiCommand, Notification, RpcErrorObject, RpcMessage,
  RpcRequest, RpcResponse,
};
pub use session::Kodi;
pub use transport::{
  Connector, RpcError, RpcTransport, TransportOptions, WsConnector, WsTransport,
};
