//! JSON-RPC transport to Kodi.
//!
//! Kodi serves JSON-RPC over a WebSocket (`ws://host:9090/jsonrpc`). Every text frame is
//! one JSON object: either the response to a call or a notification.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use super::protocol::{Notification, RpcMessage, RpcRequest, RpcResponse};
use crate::config::KodiConfig;

#[derive(Error, Debug)]
pub enum RpcError {
  #[error("Connection failed: {0}")]
  ConnectionFailed(String),
  #[error("WebSocket error: {0}")]
  WebSocket(#[from] tungstenite::Error),
  #[error("JSON serialization error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("Call timeout")]
  Timeout,
  #[error("Kodi error {code}: {message}")]
  Remote { code: i64, message: String },
  #[error("Disconnected")]
  Disconnected,
}

/// Call/response exchange plus a notification feed.
pub trait RpcTransport: Send + Sync + 'static {
  /// Issue one call and wait for its result (bounded by the transport's timeout).
  fn call(
    &self,
    method: &str,
    params: Value,
  ) -> impl Future<Output = Result<Value, RpcError>> + Send;

  /// Notifications pushed by the remote, in arrival order.
  fn notifications(&self) -> Receiver<Notification>;

  /// Close the connection. Must be called at most once.
  fn close(&self) -> impl Future<Output = Result<(), RpcError>> + Send;
}

/// Opens transports for a session.
pub trait Connector: Send + Sync + 'static {
  type Transport: RpcTransport;

  fn connect(&self) -> impl Future<Output = Result<Self::Transport, RpcError>> + Send;
}

/// Transport tuning taken from the configuration.
#[derive(Debug, Clone)]
pub struct TransportOptions {
  pub request_timeout: Duration,
  pub connect_attempts: u32,
  pub notification_buffer: usize,
}

impl From<&KodiConfig> for TransportOptions {
  fn from(config: &KodiConfig) -> Self {
    Self {
      request_timeout: Duration::from_secs(config.request_timeout_secs),
      connect_attempts: config.connect_attempts,
      notification_buffer: config.notification_buffer,
    }
  }
}

/// Call waiting for its response.
type PendingCall = oneshot::Sender<Result<RpcResponse, RpcError>>;

/// State shared between callers and the reader task.
struct TransportState {
  connected: bool,
  pending: HashMap<i64, PendingCall>,
}

/// Writer channel message.
enum WriteMessage {
  Frame(String),
  Close(oneshot::Sender<Result<(), RpcError>>),
}

/// WebSocket JSON-RPC connection.
pub struct WsTransport {
  state: Arc<Mutex<TransportState>>,
  write_tx: Sender<WriteMessage>,
  notification_rx: Receiver<Notification>,
  request_timeout: Duration,
  cancel_token: CancellationToken,
  _reader_handle: JoinHandle<()>,
  _writer_handle: JoinHandle<()>,
}

impl WsTransport {
  /// Connect to Kodi's WebSocket endpoint.
  pub async fn connect(url: &str, options: &TransportOptions) -> Result<Self, RpcError> {
    let mut last_error = None;

    for attempt in 0..options.connect_attempts.max(1) {
      if attempt > 0 {
        tokio::time::sleep(Duration::from_millis(100 * (attempt as u64 + 1))).await;
      }

      match tokio_tungstenite::connect_async(url).await {
        Ok((ws_stream, _)) => {
          log::info!("Connected to Kodi at {}", url);
          let (write, read) = ws_stream.split();
          return Ok(Self::setup(write, read, options));
        }
        Err(e) => {
          log::debug!("Kodi connect attempt {} failed: {}", attempt + 1, e);
          last_error = Some(RpcError::ConnectionFailed(e.to_string()));
        }
      }
    }

    Err(last_error.unwrap_or_else(|| RpcError::ConnectionFailed("Unknown error".into())))
  }

  fn setup<W, R>(writer: W, reader: R, options: &TransportOptions) -> Self
  where
    W: Sink<Message, Error = tungstenite::Error> + Send + Unpin + 'static,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Send + Unpin + 'static,
  {
    let state = Arc::new(Mutex::new(TransportState {
      connected: true,
      pending: HashMap::new(),
    }));

    let (notification_tx, notification_rx) =
      async_channel::bounded(options.notification_buffer.max(1));
    let (write_tx, write_rx) = async_channel::unbounded::<WriteMessage>();
    let cancel_token = CancellationToken::new();

    let reader_state = state.clone();
    let reader_cancel = cancel_token.clone();
    let reader_handle = tokio::spawn(async move {
      Self::reader_loop(reader, reader_state, notification_tx, reader_cancel).await;
    });

    let writer_handle = tokio::spawn(async move {
      Self::writer_loop(writer, write_rx).await;
    });

    Self {
      state,
      write_tx,
      notification_rx,
      request_timeout: options.request_timeout,
      cancel_token,
      _reader_handle: reader_handle,
      _writer_handle: writer_handle,
    }
  }

  async fn reader_loop<R>(
    mut reader: R,
    state: Arc<Mutex<TransportState>>,
    notification_tx: Sender<Notification>,
    cancel_token: CancellationToken,
  ) where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
  {
    log::debug!("Kodi reader loop started");

    loop {
      tokio::select! {
        _ = cancel_token.cancelled() => {
          log::debug!("Kodi reader loop cancelled");
          break;
        }
        frame = reader.next() => {
          match frame {
            Some(Ok(Message::Text(text))) => {
              Self::handle_frame(&text, &state, &notification_tx);
            }
            Some(Ok(Message::Close(_))) => {
              log::info!("Kodi closed the connection");
              break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
              log::error!("Kodi read error: {}", e);
              break;
            }
            None => {
              log::info!("Kodi connection ended");
              break;
            }
          }
        }
      }
    }

    // Nobody will answer the outstanding calls now
    let pending: Vec<PendingCall> = {
      let mut state = state.lock();
      state.connected = false;
      state.pending.drain().map(|(_, tx)| tx).collect()
    };
    for tx in pending {
      let _ = tx.send(Err(RpcError::Disconnected));
    }
  }

  fn handle_frame(
    text: &str,
    state: &Mutex<TransportState>,
    notification_tx: &Sender<Notification>,
  ) {
    match RpcMessage::parse(text) {
      Ok(RpcMessage::Response(response)) => {
        log::debug!("Kodi response for id={}", response.id);
        if let Some(tx) = state.lock().pending.remove(&response.id) {
          let _ = tx.send(Ok(response));
        }
      }
      Ok(RpcMessage::Notification(notification)) => {
        log::debug!("Kodi notification {}", notification.method);
        match notification_tx.try_send(notification) {
          Ok(()) => {}
          Err(TrySendError::Full(notification)) => {
            log::warn!(
              "Notification buffer full, dropping {}",
              notification.method
            );
          }
          Err(TrySendError::Closed(_)) => {}
        }
      }
      Err(e) => {
        log::warn!("Failed to parse Kodi frame: {} - {}", e, text);
      }
    }
  }

  async fn writer_loop<W>(mut writer: W, write_rx: Receiver<WriteMessage>)
  where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
  {
    log::debug!("Kodi writer loop started");

    while let Ok(msg) = write_rx.recv().await {
      match msg {
        WriteMessage::Frame(text) => {
          if let Err(e) = writer.send(Message::Text(text.into())).await {
            log::error!("Kodi write error: {}", e);
            break;
          }
        }
        WriteMessage::Close(reply) => {
          let result = match writer.close().await {
            Ok(()) => Ok(()),
            // Already gone from the remote side
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(RpcError::WebSocket(e)),
          };
          let _ = reply.send(result);
          break;
        }
      }
    }
  }
}

impl RpcTransport for WsTransport {
  async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
    let request = RpcRequest::new(method, params);
    let id = request.id;
    let json = serde_json::to_string(&request)?;

    let (tx, rx) = oneshot::channel();
    {
      let mut state = self.state.lock();
      if !state.connected {
        return Err(RpcError::Disconnected);
      }
      state.pending.insert(id, tx);
    }

    log::debug!("Sending Kodi call: {}", json);
    if self.write_tx.send(WriteMessage::Frame(json)).await.is_err() {
      self.state.lock().pending.remove(&id);
      return Err(RpcError::Disconnected);
    }

    let response = match tokio::time::timeout(self.request_timeout, rx).await {
      Ok(Ok(result)) => result?,
      Ok(Err(_)) => return Err(RpcError::Disconnected),
      Err(_) => {
        log::error!(
          "{} timed out after {:?}, id={}",
          method,
          self.request_timeout,
          id
        );
        self.state.lock().pending.remove(&id);
        return Err(RpcError::Timeout);
      }
    };

    if let Some(error) = response.error {
      return Err(RpcError::Remote {
        code: error.code,
        message: error.message,
      });
    }
    Ok(response.result.unwrap_or(Value::Null))
  }

  fn notifications(&self) -> Receiver<Notification> {
    self.notification_rx.clone()
  }

  async fn close(&self) -> Result<(), RpcError> {
    let (tx, rx) = oneshot::channel();
    let sent = self.write_tx.send(WriteMessage::Close(tx)).await;
    self.write_tx.close();
    self.cancel_token.cancel();
    sent.map_err(|_| RpcError::Disconnected)?;

    match tokio::time::timeout(self.request_timeout, rx).await {
      Ok(Ok(result)) => result,
      Ok(Err(_)) => Err(RpcError::Disconnected),
      Err(_) => Err(RpcError::Timeout),
    }
  }
}

impl Drop for WsTransport {
  fn drop(&mut self) {
    self.cancel_token.cancel();
  }
}

/// Opens [`WsTransport`] connections to the configured endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
  url: String,
  options: TransportOptions,
}

impl WsConnector {
  pub fn new(config: &KodiConfig) -> Self {
    Self {
      url: config.url.clone(),
      options: TransportOptions::from(config),
    }
  }
}

impl Connector for WsConnector {
  type Transport = WsTransport;

  async fn connect(&self) -> Result<WsTransport, RpcError> {
    WsTransport::connect(&self.url, &self.options).await
  }
}
