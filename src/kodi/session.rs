//! Kodi session: lifecycle, command dispatch and the [`Backend`] implementation.

use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::convert::{volume_from_value, TimeFields};
use super::player::{video_player, PlayerId};
use super::protocol::{plugin_url, KodiCommand};
use super::relay;
use super::transport::{Connector, RpcTransport, WsConnector};
use crate::backend::{Backend, BackendError, PlaybackState};
use crate::config::KodiConfig;

/// Lifecycle of a session. Only `initialize` and `quit` (or a remote stop) move it forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
  Uninitialized,
  Starting,
  Running,
  Stopping,
  Stopped,
}

/// State shared between the session handle and its relay task.
pub(crate) struct Shared<T: RpcTransport> {
  state: Mutex<SessionState>,
  transport: Mutex<Option<Arc<T>>>,
  /// Commands hold the read side while in flight; closing takes the write side.
  inflight: tokio::sync::RwLock<()>,
  /// Deadline for the `Player.OnStop` caused by the reset stop; it must not end the session.
  reset_stop: Mutex<Option<Instant>>,
  pub(crate) relay_cancel: CancellationToken,
  pub(crate) target: String,
}

impl<T: RpcTransport> Shared<T> {
  fn new(target: String) -> Self {
    Self {
      state: Mutex::new(SessionState::Uninitialized),
      transport: Mutex::new(None),
      inflight: tokio::sync::RwLock::new(()),
      reset_stop: Mutex::new(None),
      relay_cancel: CancellationToken::new(),
      target,
    }
  }

  pub(crate) fn is_running(&self) -> bool {
    *self.state.lock() == SessionState::Running
  }

  /// Get the transport of a running session.
  fn transport(&self) -> Result<Arc<T>, BackendError> {
    if *self.state.lock() != SessionState::Running {
      return Err(BackendError::NotRunning);
    }
    self.transport.lock().clone().ok_or(BackendError::NotRunning)
  }

  /// Issue one command and wait for its result.
  async fn dispatch(&self, cmd: KodiCommand) -> Result<Value, BackendError> {
    let _inflight = self.inflight.read().await;
    let transport = self.transport()?;
    log::debug!(target: self.target.as_str(), "{} {}", cmd.method, cmd.params);
    Ok(transport.call(cmd.method, cmd.params).await?)
  }

  fn expect_reset_stop(&self, grace: Duration) {
    *self.reset_stop.lock() = Some(Instant::now() + grace);
  }

  /// Consume the pending reset stop. Expired deadlines do not count.
  pub(crate) fn take_reset_stop(&self) -> bool {
    match self.reset_stop.lock().take() {
      Some(deadline) => Instant::now() <= deadline,
      None => false,
    }
  }

  /// Forget the pending reset stop once playback moved on.
  pub(crate) fn clear_reset_stop(&self) {
    self.reset_stop.lock().take();
  }

  /// Stop relaying, wait for in-flight commands and close the transport.
  pub(crate) async fn shutdown(&self) -> Result<(), BackendError> {
    {
      let mut state = self.state.lock();
      if *state != SessionState::Running {
        log::error!(target: self.target.as_str(), "quit called on a session that is not running");
        return Err(BackendError::NotRunning);
      }
      *state = SessionState::Stopping;
    }

    self.relay_cancel.cancel();
    let _closing = self.inflight.write().await;

    let transport = self.transport.lock().take();
    let result = match transport {
      Some(transport) => transport.close().await.map_err(BackendError::from),
      None => Ok(()),
    };
    *self.state.lock() = SessionState::Stopped;

    match &result {
      Ok(()) => log::info!(target: self.target.as_str(), "Session closed"),
      Err(e) => log::error!(target: self.target.as_str(), "Failed to close Kodi connection: {}", e),
    }
    result
  }
}

/// Playback control of a Kodi media center.
pub struct Kodi<C: Connector = WsConnector> {
  connector: C,
  config: KodiConfig,
  shared: Arc<Shared<C::Transport>>,
}

impl Kodi<WsConnector> {
  /// Create a session that connects over WebSocket.
  pub fn new(config: KodiConfig) -> Self {
    let connector = WsConnector::new(&config);
    Self::with_connector(config, connector)
  }
}

impl<C: Connector> Kodi<C> {
  pub fn with_connector(config: KodiConfig, connector: C) -> Self {
    let shared = Arc::new(Shared::new(config.log_target.clone()));
    Self {
      connector,
      config,
      shared,
    }
  }

  fn target(&self) -> &str {
    &self.shared.target
  }

  /// Dispatch a command whose failure only gets logged.
  async fn command(&self, cmd: KodiCommand) {
    let method = cmd.method;
    if let Err(e) = self.shared.dispatch(cmd).await {
      log::warn!(target: self.target(), "{} failed: {}", method, e);
    }
  }

  /// Find the player that player-scoped commands should target.
  async fn active_player(&self) -> Option<PlayerId> {
    match self.shared.dispatch(KodiCommand::active_players()).await {
      Ok(result) => {
        let player = video_player(&result);
        if player.is_none() {
          log::debug!(target: self.target(), "No active video player");
        }
        player
      }
      Err(e) => {
        log::warn!(target: self.target(), "Failed to query active players: {}", e);
        None
      }
    }
  }

  /// Bring Kodi to a known state: nothing playing, source addon launched.
  async fn reset(&self) {
    if let Some(player) = self.active_player().await {
      // Armed before the call; the notification can beat the response
      self.shared.expect_reset_stop(Duration::from_millis(self.config.reset_stop_grace_ms));
      if let Err(e) = self.shared.dispatch(KodiCommand::stop(player)).await {
        self.shared.clear_reset_stop();
        log::warn!(target: self.target(), "Failed to stop player {}: {}", player.0, e);
      }
    }

    self
      .command(KodiCommand::execute_addon(&self.config.addon_id))
      .await;
  }
}

impl<C: Connector> Backend for Kodi<C> {
  async fn initialize(&self) -> Result<Receiver<PlaybackState>, BackendError> {
    {
      let mut state = self.shared.state.lock();
      if *state != SessionState::Uninitialized {
        log::error!(target: self.target(), "initialize called twice");
        return Err(BackendError::AlreadyInitialized);
      }
      *state = SessionState::Starting;
    }

    let transport = match self.connector.connect().await {
      Ok(transport) => Arc::new(transport),
      Err(e) => {
        log::error!(target: self.target(), "Failed to connect to Kodi: {}", e);
        *self.shared.state.lock() = SessionState::Stopped;
        return Err(e.into());
      }
    };

    // Subscribe before anything can make Kodi emit notifications
    let notifications = transport.notifications();
    *self.shared.transport.lock() = Some(transport);

    let (events_tx, events_rx) = async_channel::bounded(self.config.event_buffer.max(1));
    tokio::spawn(relay::run(self.shared.clone(), notifications, events_tx));

    *self.shared.state.lock() = SessionState::Running;
    log::info!(target: self.target(), "Connected to Kodi, resetting player state");

    self.reset().await;
    Ok(events_rx)
  }

  async fn quit(&self) -> Result<(), BackendError> {
    log::info!(target: self.target(), "Quitting");
    self.shared.shutdown().await
  }

  async fn play(&self, source_id: &str, start: Duration, volume: u8) {
    let url = plugin_url(&self.config.addon_id, source_id);
    log::info!(
      target: self.target(),
      "Playing {} (requested start {:?}, volume {})",
      source_id,
      start,
      volume
    );
    self.command(KodiCommand::open(&url)).await;
  }

  async fn pause(&self) {
    if let Some(player) = self.active_player().await {
      self.command(KodiCommand::play_pause(player)).await;
    }
  }

  async fn resume(&self) {
    if let Some(player) = self.active_player().await {
      self.command(KodiCommand::play_pause(player)).await;
    }
  }

  async fn stop(&self) {
    if let Some(player) = self.active_player().await {
      self.command(KodiCommand::stop(player)).await;
    }
  }

  async fn get_position(&self) -> Result<Duration, BackendError> {
    let Some(player) = self.active_player().await else {
      return Ok(Duration::ZERO);
    };

    let result = self.shared.dispatch(KodiCommand::time(player)).await?;
    let time = result.get("time").cloned().unwrap_or(Value::Null);
    match serde_json::from_value::<TimeFields>(time) {
      // Kodi sometimes reports a slightly negative time; to_duration clamps it
      Ok(time) => Ok(time.to_duration()),
      Err(e) => {
        log::warn!(target: self.target(), "Unexpected time property: {}", e);
        Ok(Duration::ZERO)
      }
    }
  }

  async fn set_position(&self, position: Duration) {
    if let Some(player) = self.active_player().await {
      let value = TimeFields::from_duration(position);
      self.command(KodiCommand::seek(player, value)).await;
    }
  }

  async fn get_volume(&self) -> Result<u8, BackendError> {
    let result = self.shared.dispatch(KodiCommand::volume()).await?;
    match result.get("volume").and_then(volume_from_value) {
      Some(volume) => Ok(volume),
      None => {
        log::warn!(target: self.target(), "Unexpected volume property: {}", result);
        Ok(0)
      }
    }
  }

  async fn set_volume(&self, volume: u8) {
    self.command(KodiCommand::set_volume(volume.min(100))).await;
  }

  fn is_running(&self) -> bool {
    self.shared.is_running()
  }
}
