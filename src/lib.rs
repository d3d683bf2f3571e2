//! Playback control of a Kodi media center for a cast session.
//!
//! A [`Backend`] is driven through `initialize`, playback commands and a final `quit`.
//! [`Kodi`] implements it over Kodi's JSON-RPC WebSocket API and reports playback
//! state transitions on the channel returned by `initialize`.
//!
//! Logging goes through the `log` facade; the embedding process installs the logger.

mod backend;
mod config;
pub mod kodi;

pub use backend::{Backend, BackendError, PlaybackState};
pub use config::{ConfigError, KodiConfig};
pub use kodi::Kodi;
