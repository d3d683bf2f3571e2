//! Connection and session configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config: {0}")]
  Io(#[from] std::io::Error),
  #[error("Failed to parse config: {0}")]
  Json(#[from] serde_json::Error),
  #[error("Invalid config: {0}")]
  Invalid(String),
}

/// Kodi session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KodiConfig {
  /// JSON-RPC WebSocket endpoint.
  #[serde(default = "default_url")]
  pub url: String,

  /// Read timeout for a single call, in seconds.
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,

  /// Connection attempts before initialize gives up.
  #[serde(default = "default_connect_attempts")]
  pub connect_attempts: u32,

  /// Capacity of the playback state channel handed to the caller.
  #[serde(default = "default_event_buffer")]
  pub event_buffer: usize,

  /// Capacity of the transport's notification buffer.
  #[serde(default = "default_notification_buffer")]
  pub notification_buffer: usize,

  /// Addon that resolves source IDs into playable streams.
  #[serde(default = "default_addon_id")]
  pub addon_id: String,

  /// How long after the reset stop its `Player.OnStop` is still ignored, in milliseconds.
  #[serde(default = "default_reset_stop_grace_ms")]
  pub reset_stop_grace_ms: u64,

  /// Log target for session output.
  #[serde(default = "default_log_target")]
  pub log_target: String,
}

fn default_url() -> String {
  "ws://localhost:9090/jsonrpc".to_string()
}

fn default_request_timeout_secs() -> u64 {
  5
}

fn default_connect_attempts() -> u32 {
  3
}

fn default_event_buffer() -> usize {
  16
}

fn default_notification_buffer() -> usize {
  64
}

fn default_addon_id() -> String {
  "plugin.video.youtube".to_string()
}

fn default_reset_stop_grace_ms() -> u64 {
  2000
}

fn default_log_target() -> String {
  "kodi".to_string()
}

impl Default for KodiConfig {
  fn default() -> Self {
    Self {
      url: default_url(),
      request_timeout_secs: default_request_timeout_secs(),
      connect_attempts: default_connect_attempts(),
      event_buffer: default_event_buffer(),
      notification_buffer: default_notification_buffer(),
      addon_id: default_addon_id(),
      reset_stop_grace_ms: default_reset_stop_grace_ms(),
      log_target: default_log_target(),
    }
  }
}

impl KodiConfig {
  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
      return Err(ConfigError::Invalid(format!(
        "url must be a ws:// or wss:// endpoint, got {}",
        self.url
      )));
    }
    if self.request_timeout_secs < 1 || self.request_timeout_secs > 60 {
      return Err(ConfigError::Invalid(
        "requestTimeoutSecs must be between 1 and 60".to_string(),
      ));
    }
    if self.connect_attempts < 1 {
      return Err(ConfigError::Invalid(
        "connectAttempts must be at least 1".to_string(),
      ));
    }
    if self.event_buffer < 1 || self.notification_buffer < 1 {
      return Err(ConfigError::Invalid(
        "channel buffers must hold at least one value".to_string(),
      ));
    }
    if self.addon_id.trim().is_empty() {
      return Err(ConfigError::Invalid("addonId cannot be empty".to_string()));
    }
    Ok(())
  }

  /// Default location: `<config dir>/kodicast/config.json`.
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kodicast").join("config.json"))
  }

  /// Load and validate a JSON config file. Missing fields take their defaults.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let config: KodiConfig = serde_json::from_str(&text)?;
    config.validate()?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
  }

  /// Load from [`KodiConfig::default_path`], falling back to defaults when no file exists.
  pub fn load_or_default() -> Result<Self, ConfigError> {
    match Self::default_path() {
      Some(path) if path.exists() => Self::load(&path),
      _ => Ok(Self::default()),
    }
  }
}
