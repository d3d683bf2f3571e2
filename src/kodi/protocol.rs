//! Kodi JSON-RPC 2.0 protocol types.
//!
//! Reference: https://kodi.wiki/view/JSON-RPC_API

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};

use super::convert::TimeFields;
use super::player::PlayerId;

/// Remote method names.
pub mod method {
  pub const PLAYER_OPEN: &str = "Player.Open";
  pub const PLAYER_PLAY_PAUSE: &str = "Player.PlayPause";
  pub const PLAYER_STOP: &str = "Player.Stop";
  pub const PLAYER_SEEK: &str = "Player.Seek";
  pub const PLAYER_GET_PROPERTIES: &str = "Player.GetProperties";
  pub const PLAYER_GET_ACTIVE_PLAYERS: &str = "Player.GetActivePlayers";
  pub const APPLICATION_GET_PROPERTIES: &str = "Application.GetProperties";
  pub const APPLICATION_SET_VOLUME: &str = "Application.SetVolume";
  pub const ADDONS_EXECUTE_ADDON: &str = "Addons.ExecuteAddon";
}

/// Notification names pushed by the remote.
pub mod notification {
  pub const PLAYER_ON_PAUSE: &str = "Player.OnPause";
  pub const PLAYER_ON_PLAY: &str = "Player.OnPlay";
  pub const PLAYER_ON_STOP: &str = "Player.OnStop";
}

/// Global request ID counter for unique call identification.
static REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Generate a unique request ID for JSON-RPC calls.
pub fn next_request_id() -> i64 {
  REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// Request frame sent to Kodi.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
  pub jsonrpc: &'static str,
  pub method: String,
  pub params: Value,
  pub id: i64,
}

impl RpcRequest {
  /// Create a new request with auto-generated ID.
  pub fn new(method: &str, params: Value) -> Self {
    Self {
      jsonrpc: "2.0",
      method: method.to_string(),
      params,
      id: next_request_id(),
    }
  }
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
  pub code: i64,
  pub message: String,
  #[serde(default)]
  pub data: Option<Value>,
}

/// Response from Kodi for a request.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
  /// Matching request ID.
  pub id: i64,
  #[serde(default)]
  pub result: Option<Value>,
  #[serde(default)]
  pub error: Option<RpcErrorObject>,
}

/// Notification pushed by Kodi without a request.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
  pub method: String,
  #[serde(default)]
  pub params: Value,
}

/// Frame received from Kodi (either response or notification).
#[derive(Debug, Clone)]
pub enum RpcMessage {
  Response(RpcResponse),
  Notification(Notification),
}

impl RpcMessage {
  /// Parse a text frame from Kodi.
  pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    // Notifications never carry an id; responses always do
    let has_id = value.get("id").is_some_and(|id| !id.is_null());
    if has_id {
      Ok(RpcMessage::Response(serde_json::from_value(value)?))
    } else {
      Ok(RpcMessage::Notification(serde_json::from_value(value)?))
    }
  }
}

/// A remote call, ready to be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct KodiCommand {
  pub method: &'static str,
  pub params: Value,
}

impl KodiCommand {
  fn new(method: &'static str, params: Value) -> Self {
    Self { method, params }
  }

  /// Open a file or plugin URL.
  pub fn open(file: &str) -> Self {
    Self::new(method::PLAYER_OPEN, json!({ "item": { "file": file } }))
  }

  /// Toggle between playing and paused.
  pub fn play_pause(player: PlayerId) -> Self {
    Self::new(method::PLAYER_PLAY_PAUSE, json!({ "playerid": player.0 }))
  }

  pub fn stop(player: PlayerId) -> Self {
    Self::new(method::PLAYER_STOP, json!({ "playerid": player.0 }))
  }

  /// Seek to an absolute wall-clock style position.
  pub fn seek(player: PlayerId, value: TimeFields) -> Self {
    Self::new(
      method::PLAYER_SEEK,
      json!({ "playerid": player.0, "value": value }),
    )
  }

  /// Query elapsed playback time.
  pub fn time(player: PlayerId) -> Self {
    Self::new(
      method::PLAYER_GET_PROPERTIES,
      json!({ "playerid": player.0, "properties": ["time"] }),
    )
  }

  pub fn active_players() -> Self {
    Self::new(method::PLAYER_GET_ACTIVE_PLAYERS, json!({}))
  }

  /// Query application volume.
  pub fn volume() -> Self {
    Self::new(
      method::APPLICATION_GET_PROPERTIES,
      json!({ "properties": ["volume"] }),
    )
  }

  /// Set application volume (0-100).
  pub fn set_volume(volume: u8) -> Self {
    Self::new(method::APPLICATION_SET_VOLUME, json!({ "volume": volume }))
  }

  /// Launch an addon by ID.
  pub fn execute_addon(addon_id: &str) -> Self {
    Self::new(method::ADDONS_EXECUTE_ADDON, json!({ "addonid": addon_id }))
  }
}

/// Build the plugin URL that makes the source addon play `source_id`.
pub fn plugin_url(addon_id: &str, source_id: &str) -> String {
  format!("plugin://{}/play/?video_id={}", addon_id, source_id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_request_serialization() {
    let cmd = KodiCommand::open("plugin://plugin.video.youtube/play/?video_id=abc");
    let request = RpcRequest::new(cmd.method, cmd.params);
    let json = serde_json::to_string(&request).unwrap();
    assert!(json.contains("\"jsonrpc\":\"2.0\""));
    assert!(json.contains("Player.Open"));
    assert!(json.contains("video_id=abc"));
  }

  #[test]
  fn test_request_ids_are_unique() {
    let a = RpcRequest::new(method::PLAYER_STOP, Value::Null);
    let b = RpcRequest::new(method::PLAYER_STOP, Value::Null);
    assert_ne!(a.id, b.id);
  }

  #[test]
  fn test_response_parsing() {
    let json = r#"{"id":7,"jsonrpc":"2.0","result":"OK"}"#;
    match RpcMessage::parse(json).unwrap() {
      RpcMessage::Response(r) => {
        assert_eq!(r.id, 7);
        assert_eq!(r.result, Some(Value::from("OK")));
        assert!(r.error.is_none());
      }
      _ => panic!("Expected response"),
    }
  }

  #[test]
  fn test_error_response_parsing() {
    let json = r#"{"id":3,"jsonrpc":"2.0","error":{"code":-32100,"message":"Failed to execute method."}}"#;
    match RpcMessage::parse(json).unwrap() {
      RpcMessage::Response(r) => {
        let error = r.error.unwrap();
        assert_eq!(error.code, -32100);
        assert_eq!(error.message, "Failed to execute method.");
      }
      _ => panic!("Expected response"),
    }
  }

  #[test]
  fn test_notification_parsing() {
    let json = r#"{"jsonrpc":"2.0","method":"Player.OnStop","params":{"data":{"end":true},"sender":"xbmc"}}"#;
    match RpcMessage::parse(json).unwrap() {
      RpcMessage::Notification(n) => {
        assert_eq!(n.method, notification::PLAYER_ON_STOP);
        assert_eq!(n.params["data"]["end"], Value::Bool(true));
      }
      _ => panic!("Expected notification"),
    }
  }

  #[test]
  fn test_seek_params_shape() {
    let cmd = KodiCommand::seek(
      PlayerId(1),
      TimeFields {
        hours: 1,
        minutes: 2,
        seconds: 3,
      },
    );
    assert_eq!(cmd.method, "Player.Seek");
    assert_eq!(
      cmd.params,
      json!({ "playerid": 1, "value": { "hours": 1, "minutes": 2, "seconds": 3 } })
    );
  }

  #[test]
  fn test_plugin_url() {
    assert_eq!(
      plugin_url("plugin.video.youtube", "dQw4w9WgXcQ"),
      "plugin://plugin.video.youtube/play/?video_id=dQw4w9WgXcQ"
    );
  }
}
