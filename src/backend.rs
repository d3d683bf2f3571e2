//! Playback-control contract exposed to the cast session.

use std::future::Future;
use std::time::Duration;

use async_channel::Receiver;
use thiserror::Error;

use crate::kodi::RpcError;

/// Playback state transition reported by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
  Playing,
  Paused,
  Stopped,
}

#[derive(Error, Debug)]
pub enum BackendError {
  #[error("Backend already initialized")]
  AlreadyInitialized,
  #[error("Backend not running")]
  NotRunning,
  #[error("Transport error: {0}")]
  Transport(#[from] RpcError),
}

impl BackendError {
  /// Lifecycle misuse by the caller, as opposed to a remote failure.
  pub fn is_usage(&self) -> bool {
    matches!(self, BackendError::AlreadyInitialized | BackendError::NotRunning)
  }
}

/// Remote media player driven by a cast session.
///
/// A backend is single-use: `initialize` once, issue commands, `quit` once.
/// Commands without an error result log remote failures and otherwise do nothing.
pub trait Backend: Send + Sync {
  /// Connect, reset the remote to a stopped state and start relaying playback events.
  ///
  /// The returned channel closes when the session ends.
  fn initialize(
    &self,
  ) -> impl Future<Output = Result<Receiver<PlaybackState>, BackendError>> + Send;

  /// End the session and release the connection. Must be the last call.
  fn quit(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

  /// Open `source_id` on the remote. Start position and volume are applied by
  /// separate `set_position`/`set_volume` calls.
  fn play(
    &self,
    source_id: &str,
    start: Duration,
    volume: u8,
  ) -> impl Future<Output = ()> + Send;

  fn pause(&self) -> impl Future<Output = ()> + Send;

  fn resume(&self) -> impl Future<Output = ()> + Send;

  fn stop(&self) -> impl Future<Output = ()> + Send;

  /// Elapsed playback time; zero when nothing is playing.
  ///
  /// A failed time query returns `Err`. No active player, or a missing or malformed
  /// `time` field, returns `Ok(Duration::ZERO)`.
  fn get_position(&self) -> impl Future<Output = Result<Duration, BackendError>> + Send;

  fn set_position(&self, position: Duration) -> impl Future<Output = ()> + Send;

  /// Volume percentage (0-100).
  fn get_volume(&self) -> impl Future<Output = Result<u8, BackendError>> + Send;

  fn set_volume(&self, volume: u8) -> impl Future<Output = ()> + Send;

  fn is_running(&self) -> bool;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_usage_errors() {
    assert!(BackendError::AlreadyInitialized.is_usage());
    assert!(BackendError::NotRunning.is_usage());
    assert!(!BackendError::Transport(RpcError::Timeout).is_usage());
  }
}
