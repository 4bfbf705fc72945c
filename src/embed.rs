//! The embedded player's control surface, as consumed by the overlay.
//!
//! Controls are synchronous and non-blocking; the implementation forwards
//! them to its own background plumbing. Callbacks arrive as [`EmbedEvent`]s
//! on a channel that the session drains on the UI loop.

use anyhow::{Result, anyhow, bail};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

pub trait Embed {
  fn play(&mut self) -> Result<()>;
  fn pause(&mut self) -> Result<()>;
  fn seek_to(&mut self, secs: f64) -> Result<()>;
  fn set_volume(&mut self, volume: u8) -> Result<()>;
  fn mute(&mut self) -> Result<()>;
  fn unmute(&mut self) -> Result<()>;
  fn set_playback_rate(&mut self, rate: f64) -> Result<()>;
  fn set_playback_quality(&mut self, level: &str) -> Result<()>;
  fn set_fullscreen(&mut self, on: bool) -> Result<()>;
  fn is_fullscreen(&self) -> Result<bool>;
  fn current_time(&self) -> Result<f64>;
  fn duration(&self) -> Result<f64>;
  /// Loaded fraction of the stream, `0.0..=1.0`.
  fn buffered_fraction(&self) -> Result<f64>;
  fn available_quality_levels(&self) -> Result<Vec<String>>;
  /// Release the underlying player. Further calls fail.
  fn destroy(&mut self) -> Result<()>;
}

/// Playback state as reported by the embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedState {
  Unstarted,
  Ended,
  Playing,
  Paused,
  Buffering,
  Cued,
}

impl EmbedState {
  /// Numeric state codes used by hosted-player APIs.
  pub fn from_code(code: i64) -> Self {
    match code {
      0 => EmbedState::Ended,
      1 => EmbedState::Playing,
      2 => EmbedState::Paused,
      3 => EmbedState::Buffering,
      5 => EmbedState::Cued,
      _ => EmbedState::Unstarted,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbedEvent {
  Ready,
  StateChange(EmbedState),
  FullscreenChange(bool),
}

/// Launch parameters for one embed instance.
#[derive(Debug, Clone)]
pub struct EmbedOptions {
  pub external_id: String,
  pub title: String,
  pub autoplay: bool,
  /// The player's own on-screen controls, key bindings and suggestions.
  pub native_ui: bool,
  pub ytdl_format: String,
  pub volume: u8,
}

impl EmbedOptions {
  pub fn new(external_id: &str, title: &str, ytdl_format: &str, volume: u8) -> Self {
    Self {
      external_id: external_id.to_string(),
      title: title.to_string(),
      autoplay: true,
      native_ui: false,
      ytdl_format: ytdl_format.to_string(),
      volume,
    }
  }
}

/// What the loader found on this machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeInfo {
  pub mpv: PathBuf,
  pub mpv_version: String,
  /// `yt-dlp` version, when it is on PATH. Quality levels need it.
  pub ytdl_version: Option<String>,
}

type LoaderFuture = Shared<BoxFuture<'static, Result<RuntimeInfo, String>>>;

/// Resolve-once initialisation of the external player. Clones share one
/// probe, so concurrent open requests never start a second one.
#[derive(Clone)]
pub struct EmbedLoader {
  inner: LoaderFuture,
}

impl EmbedLoader {
  pub fn new(mpv: PathBuf) -> Self {
    Self::from_future(async move { probe(&mpv).await })
  }

  pub fn from_future<F>(fut: F) -> Self
  where
    F: Future<Output = Result<RuntimeInfo>> + Send + 'static,
  {
    let inner = fut.map(|r| r.map_err(|e| format!("{:#}", e))).boxed().shared();
    Self { inner }
  }

  /// A handle that completes with the shared result.
  pub fn resolve(&self) -> LoaderFuture {
    self.inner.clone()
  }

  /// The result, if some earlier `resolve` already completed.
  pub fn peek(&self) -> Option<&Result<RuntimeInfo, String>> {
    self.inner.peek()
  }
}

async fn probe(mpv: &Path) -> Result<RuntimeInfo> {
  let output = Command::new(mpv)
    .arg("--version")
    .stdin(Stdio::null())
    .stderr(Stdio::null())
    .output()
    .await
    .map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to run mpv")
      }
    })?;
  if !output.status.success() {
    bail!("mpv --version exited with {}", output.status);
  }
  let mpv_version = String::from_utf8_lossy(&output.stdout).lines().next().unwrap_or_default().trim().to_string();

  let ytdl_version = match Command::new("yt-dlp").arg("--version").stdin(Stdio::null()).output().await {
    Ok(out) if out.status.success() => Some(String::from_utf8_lossy(&out.stdout).trim().to_string()),
    Ok(out) => {
      debug!(status = %out.status, "embed: yt-dlp --version failed");
      None
    }
    Err(e) => {
      debug!(err = %e, "embed: yt-dlp not available");
      None
    }
  };

  info!(mpv = %mpv_version, ytdl = ?ytdl_version, "embed: runtime ready");
  Ok(RuntimeInfo { mpv: mpv.to_path_buf(), mpv_version, ytdl_version })
}
