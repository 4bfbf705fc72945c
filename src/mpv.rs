//! [`Embed`] backed by an mpv window, remote-controlled over its JSON IPC socket.
//!
//! Controls are queued on a channel and written by a background task, which
//! also reads mpv's property-change stream into a shared [`Snapshot`]. Getters
//! read the snapshot, so nothing on the UI loop ever waits on mpv.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::embed::{Embed, EmbedEvent, EmbedOptions, EmbedState, RuntimeInfo};
use crate::extract::watch_url;

/// Properties observed for the lifetime of the connection. The observer id
/// is the index plus one.
const OBSERVED: [&str; 7] =
  ["pause", "eof-reached", "time-pos", "duration", "demuxer-cache-time", "fullscreen", "paused-for-cache"];

/// Quality level names by minimum frame height, highest first.
const LEVELS: [(u64, &str); 8] = [
  (2160, "hd2160"),
  (1440, "hd1440"),
  (1080, "hd1080"),
  (720, "hd720"),
  (480, "large"),
  (360, "medium"),
  (240, "small"),
  (144, "tiny"),
];

static NEXT_SOCKET: AtomicU32 = AtomicU32::new(0);

/// Last known player state, written by the IPC task.
#[derive(Debug)]
pub(crate) struct Snapshot {
  alive: bool,
  ready: bool,
  paused: bool,
  ended: bool,
  time: f64,
  duration: f64,
  cache_time: f64,
  fullscreen: bool,
  qualities: Vec<String>,
  /// Position to restore once a quality reload has loaded the new stream.
  resume_at: Option<f64>,
}

impl Snapshot {
  fn new() -> Self {
    Self {
      alive: true,
      ready: false,
      paused: false,
      ended: false,
      time: 0.0,
      duration: 0.0,
      cache_time: 0.0,
      fullscreen: false,
      qualities: Vec::new(),
      resume_at: None,
    }
  }

  fn buffered_fraction(&self) -> f64 {
    if self.duration > 0.0 { (self.cache_time / self.duration).clamp(0.0, 1.0) } else { 0.0 }
  }
}

/// What one IPC message changed.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Reaction {
  pub events: Vec<EmbedEvent>,
  pub resume_at: Option<f64>,
}

fn lock(snapshot: &StdMutex<Snapshot>) -> MutexGuard<'_, Snapshot> {
  snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fold one message from mpv into the snapshot.
pub(crate) fn interpret(msg: &Value, snap: &mut Snapshot) -> Reaction {
  let mut out = Reaction::default();

  let Some(event) = msg.get("event").and_then(Value::as_str) else {
    if let Some(err) = msg.get("error").and_then(Value::as_str)
      && err != "success"
    {
      debug!(err = %err, request = ?msg.get("request_id"), "mpv: command failed");
    }
    return out;
  };

  match event {
    "file-loaded" if !snap.ready => {
      snap.ready = true;
      out.events.push(EmbedEvent::Ready);
      if !snap.paused {
        out.events.push(EmbedEvent::StateChange(EmbedState::Playing));
      }
    }
    "file-loaded" => out.resume_at = snap.resume_at.take(),
    "shutdown" => snap.alive = false,
    "property-change" => {
      let data = msg.get("data");
      let flag = data.and_then(Value::as_bool);
      let number = data.and_then(Value::as_f64);
      match msg.get("name").and_then(Value::as_str).unwrap_or_default() {
        "pause" => {
          if let Some(paused) = flag
            && paused != snap.paused
          {
            snap.paused = paused;
            if snap.ready && !paused {
              snap.ended = false;
              out.events.push(EmbedEvent::StateChange(EmbedState::Playing));
            } else if snap.ready && !snap.ended {
              out.events.push(EmbedEvent::StateChange(EmbedState::Paused));
            }
          }
        }
        "eof-reached" => match flag {
          Some(true) if snap.ready && !snap.ended => {
            snap.ended = true;
            out.events.push(EmbedEvent::StateChange(EmbedState::Ended));
          }
          Some(false) => snap.ended = false,
          _ => {}
        },
        "time-pos" => {
          if let Some(t) = number {
            snap.time = t;
          }
        }
        "duration" => {
          if let Some(d) = number {
            snap.duration = d;
          }
        }
        "demuxer-cache-time" => {
          if let Some(t) = number {
            snap.cache_time = t;
          }
        }
        "fullscreen" => {
          if let Some(fs) = flag
            && fs != snap.fullscreen
          {
            snap.fullscreen = fs;
            out.events.push(EmbedEvent::FullscreenChange(fs));
          }
        }
        "paused-for-cache" => {
          if flag == Some(true) && snap.ready {
            out.events.push(EmbedEvent::StateChange(EmbedState::Buffering));
          }
        }
        _ => {}
      }
    }
    _ => {}
  }
  out
}

/// Distinct quality levels available for the given stream heights, highest
/// first, followed by `auto`.
pub fn quality_levels(heights: impl IntoIterator<Item = u64>) -> Vec<String> {
  let mut present = [false; LEVELS.len()];
  for h in heights {
    if let Some(i) = LEVELS.iter().position(|(min, _)| h >= *min) {
      present[i] = true;
    }
  }
  let mut levels: Vec<String> =
    LEVELS.iter().zip(present).filter(|(_, p)| *p).map(|((_, name), _)| name.to_string()).collect();
  if !levels.is_empty() {
    levels.push("auto".to_string());
  }
  levels
}

/// yt-dlp format selector for a quality level. `auto` and unknown names use
/// the configured default.
pub fn level_format(level: &str, default_format: &str) -> String {
  match LEVELS.iter().find(|(_, name)| *name == level) {
    Some((h, _)) => format!("bestvideo[height<=?{h}]+bestaudio/best[height<=?{h}]"),
    None => default_format.to_string(),
  }
}

fn launch_args(opts: &EmbedOptions, socket_path: &Path) -> Vec<String> {
  let mut args = Vec::new();
  if !opts.native_ui {
    args.extend(
      ["--osc=no", "--osd-level=0", "--no-input-default-bindings", "--input-vo-keyboard=no", "--input-cursor=no"]
        .map(String::from),
    );
  }
  if !opts.autoplay {
    args.push("--pause".to_string());
  }
  args.extend(["--no-terminal", "--keep-open=yes", "--force-window=yes", "--sid=no"].map(String::from));
  args.push(format!("--volume={}", opts.volume));
  args.push(format!("--ytdl-format={}", opts.ytdl_format));
  args.push(format!("--title={}", opts.title));
  args.push(format!("--input-ipc-server={}", socket_path.display()));
  args
}

pub struct MpvEmbed {
  child: Option<Child>,
  commands: mpsc::UnboundedSender<Value>,
  snapshot: Arc<StdMutex<Snapshot>>,
  tasks: Vec<JoinHandle<()>>,
  socket_path: PathBuf,
  url: String,
  ytdl_format: String,
}

impl MpvEmbed {
  /// Launch mpv for one video. Must be called from within the tokio runtime.
  pub fn spawn(opts: &EmbedOptions, runtime: &RuntimeInfo) -> Result<(Self, mpsc::UnboundedReceiver<EmbedEvent>)> {
    let socket_path = std::env::temp_dir().join(format!(
      "{}-mpv-{}-{}.sock",
      constants().app_name,
      std::process::id(),
      NEXT_SOCKET.fetch_add(1, Ordering::Relaxed)
    ));
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let url = watch_url(&opts.external_id);
    let mut cmd = Command::new(&runtime.mpv);
    cmd.args(launch_args(opts, &socket_path)).arg("--").arg(&url);
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).kill_on_drop(true);
    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let snapshot = Arc::new(StdMutex::new(Snapshot::new()));
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (evt_tx, evt_rx) = mpsc::unbounded_channel();

    let mut tasks = vec![tokio::spawn(run_ipc(socket_path.clone(), cmd_rx, evt_tx, snapshot.clone()))];
    if runtime.ytdl_version.is_some() {
      tasks.push(tokio::spawn(probe_qualities(url.clone(), snapshot.clone())));
    }

    info!(video = %opts.external_id, socket = %socket_path.display(), "mpv: spawned");
    let embed = Self {
      child: Some(child),
      commands: cmd_tx,
      snapshot,
      tasks,
      socket_path,
      url,
      ytdl_format: opts.ytdl_format.clone(),
    };
    Ok((embed, evt_rx))
  }

  fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Result<T> {
    let snap = lock(&self.snapshot);
    if !snap.alive {
      bail!("mpv player is gone");
    }
    Ok(f(&snap))
  }

  fn command(&self, args: Value) -> Result<()> {
    self.read(|_| ())?;
    self.commands.send(json!({ "command": args })).map_err(|_| anyhow!("mpv IPC task has stopped"))
  }

  fn set_property(&self, name: &str, value: Value) -> Result<()> {
    self.command(json!(["set_property", name, value]))
  }
}

impl Embed for MpvEmbed {
  fn play(&mut self) -> Result<()> {
    self.set_property("pause", json!(false))
  }

  fn pause(&mut self) -> Result<()> {
    self.set_property("pause", json!(true))
  }

  fn seek_to(&mut self, secs: f64) -> Result<()> {
    self.command(json!(["seek", secs, "absolute"]))
  }

  fn set_volume(&mut self, volume: u8) -> Result<()> {
    self.set_property("volume", json!(volume))
  }

  fn mute(&mut self) -> Result<()> {
    self.set_property("mute", json!(true))
  }

  fn unmute(&mut self) -> Result<()> {
    self.set_property("mute", json!(false))
  }

  fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
    self.set_property("speed", json!(rate))
  }

  /// Reload the stream with a height-capped format and resume where it was.
  fn set_playback_quality(&mut self, level: &str) -> Result<()> {
    let format = level_format(level, &self.ytdl_format);
    let resume = self.read(|s| s.time)?;
    self.set_property("ytdl-format", json!(format))?;
    lock(&self.snapshot).resume_at = Some(resume);
    debug!(level = %level, resume, "mpv: reloading for quality change");
    self.command(json!(["loadfile", self.url, "replace"]))
  }

  fn set_fullscreen(&mut self, on: bool) -> Result<()> {
    self.set_property("fullscreen", json!(on))
  }

  fn is_fullscreen(&self) -> Result<bool> {
    self.read(|s| s.fullscreen)
  }

  fn current_time(&self) -> Result<f64> {
    self.read(|s| s.time)
  }

  fn duration(&self) -> Result<f64> {
    self.read(|s| s.duration)
  }

  fn buffered_fraction(&self) -> Result<f64> {
    self.read(Snapshot::buffered_fraction)
  }

  fn available_quality_levels(&self) -> Result<Vec<String>> {
    self.read(|s| s.qualities.clone())
  }

  fn destroy(&mut self) -> Result<()> {
    for task in self.tasks.drain(..) {
      task.abort();
    }
    lock(&self.snapshot).alive = false;
    let _ = std::fs::remove_file(&self.socket_path);
    if let Some(mut child) = self.child.take() {
      child.start_kill().context("Failed to kill mpv process")?;
      info!(socket = %self.socket_path.display(), "mpv: stopped");
    }
    Ok(())
  }
}

impl Drop for MpvEmbed {
  fn drop(&mut self) {
    if self.child.is_some() || !self.tasks.is_empty() {
      let _ = self.destroy();
    }
  }
}

// --- IPC task ---

async fn connect(path: &Path) -> Result<UnixStream> {
  let c = constants();
  for _ in 0..c.ipc_connect_attempts {
    tokio::time::sleep(Duration::from_millis(c.ipc_connect_backoff_ms)).await;
    if let Ok(stream) = UnixStream::connect(path).await {
      return Ok(stream);
    }
  }
  bail!("Timed out connecting to mpv IPC socket at {}", path.display())
}

async fn send(writer: &mut OwnedWriteHalf, msg: &Value) -> Result<()> {
  let mut line = msg.to_string();
  line.push('\n');
  writer.write_all(line.as_bytes()).await.context("Failed to write to mpv IPC socket")
}

async fn run_ipc(
  socket_path: PathBuf,
  mut commands: mpsc::UnboundedReceiver<Value>,
  events: mpsc::UnboundedSender<EmbedEvent>,
  snapshot: Arc<StdMutex<Snapshot>>,
) {
  if let Err(e) = drive_ipc(&socket_path, &mut commands, &events, &snapshot).await {
    warn!(err = %format!("{:#}", e), "mpv: IPC ended");
  }
  lock(&snapshot).alive = false;
}

async fn drive_ipc(
  socket_path: &Path,
  commands: &mut mpsc::UnboundedReceiver<Value>,
  events: &mpsc::UnboundedSender<EmbedEvent>,
  snapshot: &StdMutex<Snapshot>,
) -> Result<()> {
  let stream = connect(socket_path).await?;
  debug!(socket = %socket_path.display(), "mpv: IPC connected");
  let (reader, mut writer) = stream.into_split();
  let mut lines = BufReader::new(reader).lines();

  for (i, name) in OBSERVED.iter().enumerate() {
    send(&mut writer, &json!({ "command": ["observe_property", i + 1, name] })).await?;
  }

  loop {
    tokio::select! {
      line = lines.next_line() => {
        let Some(line) = line.context("Failed to read from mpv IPC socket")? else {
          debug!("mpv: IPC closed");
          return Ok(());
        };
        if let Ok(msg) = serde_json::from_str::<Value>(&line) {
          let reaction = interpret(&msg, &mut lock(snapshot));
          if let Some(t) = reaction.resume_at {
            send(&mut writer, &json!({ "command": ["seek", t, "absolute"] })).await?;
          }
          for event in reaction.events {
            // The session may already be gone; keep draining until mpv closes.
            let _ = events.send(event);
          }
        }
      }
      cmd = commands.recv() => {
        let Some(cmd) = cmd else { return Ok(()) };
        send(&mut writer, &cmd).await?;
      }
    }
  }
}

async fn probe_qualities(url: String, snapshot: Arc<StdMutex<Snapshot>>) {
  let output = Command::new("yt-dlp")
    .args(["-J", "--no-playlist", "--no-warnings", "--", &url])
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::null())
    .kill_on_drop(true)
    .output()
    .await;

  let output = match output {
    Ok(out) if out.status.success() => out,
    Ok(out) => {
      debug!(status = %out.status, "mpv: quality probe failed");
      return;
    }
    Err(e) => {
      debug!(err = %e, "mpv: quality probe could not run");
      return;
    }
  };

  match serde_json::from_slice::<Value>(&output.stdout) {
    Ok(info) => {
      let heights = info
        .get("formats")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|f| f.get("vcodec").and_then(Value::as_str) != Some("none"))
        .filter_map(|f| f.get("height").and_then(Value::as_u64));
      let levels = quality_levels(heights);
      debug!(levels = ?levels, "mpv: quality levels");
      lock(&snapshot).qualities = levels;
    }
    Err(e) => debug!(err = %e, "mpv: quality probe returned invalid JSON"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::net::UnixListener;

  fn prop(name: &str, data: Value) -> Value {
    json!({ "event": "property-change", "id": 1, "name": name, "data": data })
  }

  fn feed(snap: &mut Snapshot, msgs: &[Value]) -> Vec<EmbedEvent> {
    msgs.iter().flat_map(|m| interpret(m, snap).events).collect()
  }

  #[test]
  fn ready_then_playing_on_first_load() {
    let mut snap = Snapshot::new();
    let events = feed(&mut snap, &[prop("pause", json!(false)), json!({"event": "file-loaded"})]);
    assert_eq!(events, vec![EmbedEvent::Ready, EmbedEvent::StateChange(EmbedState::Playing)]);
  }

  #[test]
  fn nothing_reported_before_ready() {
    let mut snap = Snapshot::new();
    let events = feed(&mut snap, &[prop("pause", json!(true)), prop("eof-reached", json!(true))]);
    assert!(events.is_empty());
  }

  #[test]
  fn pause_and_resume_report_state_changes() {
    let mut snap = Snapshot::new();
    feed(&mut snap, &[json!({"event": "file-loaded"})]);
    let events = feed(&mut snap, &[prop("pause", json!(true)), prop("pause", json!(true)), prop("pause", json!(false))]);
    assert_eq!(
      events,
      vec![EmbedEvent::StateChange(EmbedState::Paused), EmbedEvent::StateChange(EmbedState::Playing)]
    );
  }

  #[test]
  fn end_of_stream_is_not_masked_by_keep_open_pause() {
    let mut snap = Snapshot::new();
    feed(&mut snap, &[json!({"event": "file-loaded"})]);
    let events = feed(&mut snap, &[prop("eof-reached", json!(true)), prop("pause", json!(true))]);
    assert_eq!(events, vec![EmbedEvent::StateChange(EmbedState::Ended)]);
  }

  #[test]
  fn metrics_update_snapshot() {
    let mut snap = Snapshot::new();
    feed(&mut snap, &[prop("time-pos", json!(12.5)), prop("duration", json!(100.0)), prop("demuxer-cache-time", json!(40.0))]);
    assert_eq!(snap.time, 12.5);
    assert_eq!(snap.duration, 100.0);
    assert!((snap.buffered_fraction() - 0.4).abs() < 1e-9);
    // Unavailable properties arrive without data and are ignored.
    feed(&mut snap, &[json!({"event": "property-change", "name": "time-pos"})]);
    assert_eq!(snap.time, 12.5);
  }

  #[test]
  fn fullscreen_changes_are_deduplicated() {
    let mut snap = Snapshot::new();
    let events = feed(&mut snap, &[prop("fullscreen", json!(false)), prop("fullscreen", json!(true))]);
    assert_eq!(events, vec![EmbedEvent::FullscreenChange(true)]);
    assert!(snap.fullscreen);
  }

  #[test]
  fn reload_resumes_without_second_ready() {
    let mut snap = Snapshot::new();
    feed(&mut snap, &[json!({"event": "file-loaded"})]);
    snap.resume_at = Some(42.0);
    let reaction = interpret(&json!({"event": "file-loaded"}), &mut snap);
    assert!(reaction.events.is_empty());
    assert_eq!(reaction.resume_at, Some(42.0));
  }

  #[test]
  fn quality_levels_from_heights() {
    assert_eq!(quality_levels([360, 720, 1080, 720, 144, 90]), vec!["hd1080", "hd720", "medium", "tiny", "auto"]);
    assert_eq!(quality_levels([800]), vec!["hd720", "auto"]);
    assert!(quality_levels(Vec::new()).is_empty());
  }

  #[test]
  fn level_formats() {
    assert_eq!(level_format("hd720", "best"), "bestvideo[height<=?720]+bestaudio/best[height<=?720]");
    assert_eq!(level_format("auto", "best"), "best");
  }

  #[test]
  fn launch_args_disable_native_ui() {
    let opts = EmbedOptions::new("dQw4w9WgXcQ", "Never", "best", 80);
    let args = launch_args(&opts, Path::new("/tmp/x.sock"));
    for flag in ["--osc=no", "--no-input-default-bindings", "--input-vo-keyboard=no", "--volume=80"] {
      assert!(args.iter().any(|a| a == flag), "missing {flag}");
    }
    assert!(!args.iter().any(|a| a == "--pause"));
    assert!(args.iter().any(|a| a == "--input-ipc-server=/tmp/x.sock"));
  }

  #[tokio::test]
  async fn ipc_task_observes_and_forwards_events() {
    let path = std::env::temp_dir().join(format!("anaty-ipc-test-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).unwrap();

    let snapshot = Arc::new(StdMutex::new(Snapshot::new()));
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_ipc(path.clone(), cmd_rx, evt_tx, snapshot.clone()));

    let (stream, _) = listener.accept().await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    for name in OBSERVED {
      let line = lines.next_line().await.unwrap().unwrap();
      assert!(line.contains("observe_property") && line.contains(name), "{line}");
    }

    cmd_tx.send(json!({ "command": ["set_property", "pause", true] })).unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    assert!(line.contains("set_property"), "{line}");

    writer.write_all(b"{\"event\":\"file-loaded\"}\n").await.unwrap();
    assert_eq!(evt_rx.recv().await, Some(EmbedEvent::Ready));
    assert_eq!(evt_rx.recv().await, Some(EmbedEvent::StateChange(EmbedState::Playing)));

    drop(writer);
    drop(lines);
    task.await.unwrap();
    assert!(!lock(&snapshot).alive);
    let _ = std::fs::remove_file(&path);
  }
}
