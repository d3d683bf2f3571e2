//! Turns Kodi player notifications into [`PlaybackState`] events.

use std::sync::Arc;

use async_channel::{Receiver, Sender};
use serde_json::Value;

use super::protocol::{notification, Notification};
use super::session::Shared;
use super::transport::RpcTransport;
use crate::backend::PlaybackState;

/// What a notification asks the relay to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelayAction {
  Emit(PlaybackState),
  /// Playback was stopped outside the current item ending; the session ends.
  Terminate,
}

/// Map a notification to a relay action. Unknown or malformed notifications map to `None`.
pub(crate) fn translate(incoming: &Notification) -> Option<RelayAction> {
  match incoming.method.as_str() {
    notification::PLAYER_ON_PAUSE => Some(RelayAction::Emit(PlaybackState::Paused)),
    notification::PLAYER_ON_PLAY => Some(RelayAction::Emit(PlaybackState::Playing)),
    notification::PLAYER_ON_STOP => {
      let ended = incoming
        .params
        .get("data")
        .and_then(|data| data.get("end"))
        .and_then(Value::as_bool)?;
      if ended {
        Some(RelayAction::Emit(PlaybackState::Stopped))
      } else {
        Some(RelayAction::Terminate)
      }
    }
    _ => None,
  }
}

/// Relay notifications until cancelled, the feed ends, or Kodi stops playback.
///
/// Owns the only sender of the event channel, so the channel closes when this returns.
pub(crate) async fn run<T: RpcTransport>(
  shared: Arc<Shared<T>>,
  notifications: Receiver<Notification>,
  events: Sender<PlaybackState>,
) {
  let target = shared.target.as_str();
  let cancel = shared.relay_cancel.clone();
  log::debug!(target: target, "Event relay started");

  loop {
    let incoming = tokio::select! {
      _ = cancel.cancelled() => break,
      received = notifications.recv() => match received {
        Ok(incoming) => incoming,
        Err(_) => {
          log::info!(target: target, "Kodi notification feed ended");
          break;
        }
      },
    };

    match translate(&incoming) {
      Some(RelayAction::Emit(state)) => {
        log::debug!(target: target, "{} -> {:?}", incoming.method, state);
        shared.clear_reset_stop();
        tokio::select! {
          _ = cancel.cancelled() => break,
          sent = events.send(state) => {
            if sent.is_err() {
              log::debug!(target: target, "Event receiver dropped");
            }
          }
        }
      }
      Some(RelayAction::Terminate) => {
        if shared.take_reset_stop() {
          log::debug!(target: target, "Ignoring stop issued during initialize");
          continue;
        }
        log::info!(target: target, "Playback stopped on Kodi, ending session");
        // Errors are logged by shutdown
        let _ = shared.shutdown().await;
        break;
      }
      None => {
        log::debug!(target: target, "Ignoring notification {}", incoming.method);
      }
    }
  }

  log::debug!(target: target, "Event relay stopped");
}
