//! Conversions between internal values and Kodi's wire representations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wall-clock style position used by `Player.Seek` and `Player.GetProperties`.
///
/// Kodi also reports `milliseconds`; it is ignored on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFields {
  pub hours: i64,
  pub minutes: i64,
  pub seconds: i64,
}

impl TimeFields {
  /// Break a duration into wrapped fields (hours mod 24, minutes and seconds mod 60).
  /// Sub-second precision is dropped.
  pub fn from_duration(duration: Duration) -> Self {
    let total = duration.as_secs();
    Self {
      hours: ((total / 3600) % 24) as i64,
      minutes: ((total / 60) % 60) as i64,
      seconds: (total % 60) as i64,
    }
  }

  /// Total elapsed time. Negative totals clamp to zero.
  pub fn to_duration(self) -> Duration {
    let total = self
      .hours
      .saturating_mul(3600)
      .saturating_add(self.minutes.saturating_mul(60))
      .saturating_add(self.seconds);
    Duration::from_secs(total.max(0) as u64)
  }
}

/// Read a volume percentage from a remote-reported number.
///
/// Fractional values round to the nearest integer; the result is clamped to 0-100.
pub fn volume_from_value(value: &Value) -> Option<u8> {
  let volume = if let Some(v) = value.as_i64() {
    v as f64
  } else if let Some(v) = value.as_u64() {
    v as f64
  } else {
    value.as_f64()?.round()
  };
  Some(volume.clamp(0.0, 100.0) as u8)
}
