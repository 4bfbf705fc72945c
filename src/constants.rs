//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so the timer lengths and
//! storage keys can never drift from the binary. Parsed once on first access.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Constants {
  pub app_name: String,

  // Persisted slots
  pub videos_key: String,
  pub groupings_key: String,
  pub theme_key: String,
  pub grouping_id_prefix: String,

  // Player overlay timers
  pub hide_delay_ms: u64,
  pub cover_delay_ms: u64,
  pub poll_interval_ms: u64,
  pub double_tap_window_ms: u64,
  pub tap_indicator_ms: u64,
  pub flash_ms: u64,

  // Transport
  pub skip_secs: f64,
  pub volume_step: u8,
  pub default_volume: u8,
  pub speeds: Vec<f64>,

  // UI
  pub message_ttl_secs: u64,
  pub title_max_chars: usize,
  pub frame_poll_ms: u64,

  // mpv
  pub ipc_connect_attempts: u32,
  pub ipc_connect_backoff_ms: u64,
  pub default_ytdl_format: String,
}

impl Constants {
  pub fn hide_delay(&self) -> Duration {
    Duration::from_millis(self.hide_delay_ms)
  }

  pub fn cover_delay(&self) -> Duration {
    Duration::from_millis(self.cover_delay_ms)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn double_tap_window(&self) -> Duration {
    Duration::from_millis(self.double_tap_window_ms)
  }

  pub fn tap_indicator(&self) -> Duration {
    Duration::from_millis(self.tap_indicator_ms)
  }

  pub fn flash(&self) -> Duration {
    Duration::from_millis(self.flash_ms)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed every test run fails.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
