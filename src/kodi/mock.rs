//! Scripted in-memory transport for session tests.

use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::protocol::{method, Notification};
use super::transport::{Connector, RpcError, RpcTransport};

pub(crate) struct MockState {
  pub calls: Vec<(String, Value)>,
  /// `Player.GetActivePlayers` result.
  pub players: Value,
  /// `time` property returned by `Player.GetProperties`.
  pub time: Value,
  pub volume: Value,
  pub failing: Vec<&'static str>,
  pub call_delay: Duration,
  pub closed: bool,
  pub fail_close: bool,
}

#[derive(Clone)]
pub(crate) struct MockTransport {
  pub state: Arc<Mutex<MockState>>,
  notification_tx: Sender<Notification>,
  notification_rx: Receiver<Notification>,
}

impl MockTransport {
  pub fn new() -> Self {
    let (notification_tx, notification_rx) = async_channel::unbounded();
    Self {
      state: Arc::new(Mutex::new(MockState {
        calls: Vec::new(),
        players: json!([]),
        time: json!({ "hours": 0, "minutes": 0, "seconds": 0, "milliseconds": 0 }),
        volume: json!(100),
        failing: Vec::new(),
        call_delay: Duration::ZERO,
        closed: false,
        fail_close: false,
      })),
      notification_tx,
      notification_rx,
    }
  }

  pub fn with_video_player(self, id: u32) -> Self {
    self.state.lock().players = json!([{ "playerid": id, "type": "video" }]);
    self
  }

  pub fn set_time(&self, time: Value) {
    self.state.lock().time = time;
  }

  /// Make every call to `method` time out.
  pub fn fail(&self, method: &'static str) {
    self.state.lock().failing.push(method);
  }

  pub fn notify(&self, method: &str, params: Value) {
    let notification = Notification {
      method: method.to_string(),
      params,
    };
    let _ = self.notification_tx.try_send(notification);
  }

  /// End the notification feed, as when Kodi drops the connection.
  pub fn close_feed(&self) {
    self.notification_tx.close();
  }

  pub fn methods(&self) -> Vec<String> {
    self.state.lock().calls.iter().map(|(m, _)| m.clone()).collect()
  }

  pub fn params_of(&self, method: &str) -> Vec<Value> {
    self
      .state
      .lock()
      .calls
      .iter()
      .filter(|(m, _)| m == method)
      .map(|(_, p)| p.clone())
      .collect()
  }

  pub fn clear_calls(&self) {
    self.state.lock().calls.clear();
  }

  pub fn is_closed(&self) -> bool {
    self.state.lock().closed
  }
}

impl RpcTransport for MockTransport {
  async fn call(&self, name: &str, params: Value) -> Result<Value, RpcError> {
    let delay = {
      let mut state = self.state.lock();
      state.calls.push((name.to_string(), params.clone()));
      state.call_delay
    };
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }

    let mut state = self.state.lock();
    if state.closed {
      return Err(RpcError::Disconnected);
    }
    if state.failing.iter().any(|m| *m == name) {
      return Err(RpcError::Timeout);
    }
    let result = match name {
      method::PLAYER_GET_ACTIVE_PLAYERS => state.players.clone(),
      method::PLAYER_GET_PROPERTIES => json!({ "time": state.time.clone() }),
      method::APPLICATION_GET_PROPERTIES => json!({ "volume": state.volume.clone() }),
      method::APPLICATION_SET_VOLUME => {
        state.volume = params["volume"].clone();
        state.volume.clone()
      }
      _ => json!("OK"),
    };
    Ok(result)
  }

  fn notifications(&self) -> Receiver<Notification> {
    self.notification_rx.clone()
  }

  async fn close(&self) -> Result<(), RpcError> {
    let mut state = self.state.lock();
    state.closed = true;
    if state.fail_close {
      return Err(RpcError::Disconnected);
    }
    Ok(())
  }
}

pub(crate) struct MockConnector {
  transport: Option<MockTransport>,
}

impl MockConnector {
  pub fn new(transport: MockTransport) -> Self {
    Self {
      transport: Some(transport),
    }
  }

  /// A connector whose connect always fails.
  pub fn failing() -> Self {
    Self { transport: None }
  }
}

impl Connector for MockConnector {
  type Transport = MockTransport;

  async fn connect(&self) -> Result<MockTransport, RpcError> {
    self
      .transport
      .clone()
      .ok_or_else(|| RpcError::ConnectionFailed("connection refused".to_string()))
  }
}
