//! Active player resolution.

use serde::Deserialize;
use serde_json::Value;

/// Remote handle of an active playback instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerId(pub u32);

/// Entry of a `Player.GetActivePlayers` result.
#[derive(Debug, Clone, Deserialize)]
struct ActivePlayer {
  playerid: i64,
  #[serde(rename = "type")]
  kind: String,
}

/// Pick the video player out of a `Player.GetActivePlayers` result.
///
/// Entries that don't parse, or carry an out-of-range id, are skipped.
pub fn video_player(result: &Value) -> Option<PlayerId> {
  result
    .as_array()?
    .iter()
    .filter_map(|entry| ActivePlayer::deserialize(entry).ok())
    .filter(|p| p.kind == "video")
    .find_map(|p| u32::try_from(p.playerid).ok())
    .map(PlayerId)
}
