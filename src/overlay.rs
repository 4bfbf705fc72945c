//! The player overlay session: one embed, its control chrome, and every timer
//! the session owns.
//!
//! Playback phase only changes on embed state callbacks (and replay); the
//! metrics poll updates continuous values and never touches the phase.
//! Closing cancels every timer and releases the embed, on every exit path.

use ratatui::crossterm::event::KeyCode;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::catalog::{VideoId, VideoRecord};
use crate::constants::constants;
use crate::embed::{Embed, EmbedEvent, EmbedState};
use crate::gesture::{Side, TapOutcome, TapTracker};
use crate::menu::{MenuChoice, SettingsMenu};
use crate::timers::{TimerId, Timers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// No playback reported yet.
  Unstarted,
  Playing,
  Paused,
  Ended,
}

/// Observable overlay state: the cover masks the phase until it is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
  LoadingCover,
  Playing,
  Paused,
  Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
  Play,
  Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
  Continue,
  Close,
}

pub struct PlayerSession<E: Embed> {
  video: VideoRecord,
  embed: Option<E>,
  events: Option<mpsc::UnboundedReceiver<EmbedEvent>>,
  ready: bool,
  phase: Phase,
  started: bool,
  cover: bool,
  chrome_visible: bool,
  menu: SettingsMenu,
  taps: TapTracker,
  timers: Timers,

  time: f64,
  duration: f64,
  buffered: f64,
  qualities: Vec<String>,
  quality: String,
  volume: u8,
  muted: bool,
  speed: f64,
  fullscreen: bool,

  /// Bar fraction while a progress drag is in flight.
  drag: Option<f64>,
  hover: Option<f64>,
  indicator: Option<Side>,
  flash: Option<Flash>,
  closed: bool,
}

impl<E: Embed> PlayerSession<E> {
  /// Start a session with the cover up. The embed is attached once created.
  pub fn open(video: &VideoRecord, now: Instant) -> Self {
    let c = constants();
    let mut timers = Timers::default();
    timers.arm(TimerId::Hide, now, c.hide_delay());
    info!(video = %video.id, external_id = %video.external_id, "player: opened");
    Self {
      video: video.clone(),
      embed: None,
      events: None,
      ready: false,
      phase: Phase::Unstarted,
      started: false,
      cover: true,
      chrome_visible: true,
      menu: SettingsMenu::default(),
      taps: TapTracker::new(c.double_tap_window()),
      timers,
      time: 0.0,
      duration: 0.0,
      buffered: 0.0,
      qualities: Vec::new(),
      quality: "auto".to_string(),
      volume: c.default_volume,
      muted: false,
      speed: 1.0,
      fullscreen: false,
      drag: None,
      hover: None,
      indicator: None,
      flash: None,
      closed: false,
    }
  }

  /// Hand the created embed to the session. A session that was closed in the
  /// meantime releases it straight away.
  pub fn attach(&mut self, mut embed: E, events: mpsc::UnboundedReceiver<EmbedEvent>) {
    if self.closed {
      if let Err(e) = embed.destroy() {
        debug!(err = %format!("{:#}", e), "player: late embed teardown failed");
      }
      return;
    }
    self.embed = Some(embed);
    self.events = Some(events);
  }

  // --- Accessors ---

  pub fn video(&self) -> &VideoRecord {
    &self.video
  }

  pub fn video_id(&self) -> &VideoId {
    &self.video.id
  }

  pub fn has_embed(&self) -> bool {
    self.embed.is_some()
  }

  pub fn is_ready(&self) -> bool {
    self.ready
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn state(&self) -> OverlayState {
    if self.cover {
      return OverlayState::LoadingCover;
    }
    match self.phase {
      Phase::Unstarted | Phase::Paused => OverlayState::Paused,
      Phase::Playing => OverlayState::Playing,
      Phase::Ended => OverlayState::Ended,
    }
  }

  pub fn cover_visible(&self) -> bool {
    self.cover
  }

  pub fn chrome_visible(&self) -> bool {
    self.chrome_visible
  }

  pub fn menu(&self) -> &SettingsMenu {
    &self.menu
  }

  /// Time shown on the clock and bar: the drag position while dragging.
  pub fn displayed_time(&self) -> f64 {
    match self.drag {
      Some(f) => f * self.duration,
      None => self.time,
    }
  }

  pub fn duration(&self) -> f64 {
    self.duration
  }

  pub fn buffered(&self) -> f64 {
    self.buffered
  }

  /// Played fraction of the bar, `0.0..=1.0`.
  pub fn progress(&self) -> f64 {
    if let Some(f) = self.drag {
      return f;
    }
    if self.duration > 0.0 { (self.time / self.duration).clamp(0.0, 1.0) } else { 0.0 }
  }

  pub fn qualities(&self) -> &[String] {
    &self.qualities
  }

  pub fn quality(&self) -> &str {
    &self.quality
  }

  pub fn volume(&self) -> u8 {
    self.volume
  }

  pub fn muted(&self) -> bool {
    self.muted
  }

  pub fn speed(&self) -> f64 {
    self.speed
  }

  pub fn is_dragging(&self) -> bool {
    self.drag.is_some()
  }

  pub fn hover(&self) -> Option<f64> {
    self.hover
  }

  pub fn indicator(&self) -> Option<Side> {
    self.indicator
  }

  pub fn flash(&self) -> Option<Flash> {
    self.flash
  }

  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// Earliest timer deadline, so the event loop can wake for it.
  pub fn next_deadline(&self) -> Option<Instant> {
    self.timers.next_deadline()
  }

  /// Fullscreen if the last change event or a direct query says so.
  pub fn is_fullscreen(&self) -> bool {
    let queried = self.embed.as_ref().and_then(|e| e.is_fullscreen().ok()).unwrap_or(false);
    self.fullscreen || queried
  }

  // --- Event loop hooks ---

  /// Drain embed callbacks.
  pub fn pump(&mut self, now: Instant) {
    let mut pending = Vec::new();
    if let Some(rx) = &mut self.events {
      while let Ok(event) = rx.try_recv() {
        pending.push(event);
      }
    }
    for event in pending {
      self.on_embed_event(event, now);
    }
  }

  pub fn on_embed_event(&mut self, event: EmbedEvent, now: Instant) {
    if self.closed {
      return;
    }
    match event {
      EmbedEvent::Ready => {
        let c = constants();
        self.ready = true;
        let volume = self.volume;
        self.with_embed("ready", |e| {
          e.set_volume(volume)?;
          e.play()
        });
        self.timers.every(TimerId::Poll, now, c.poll_interval());
        self.poll();
        debug!(video = %self.video.id, "player: embed ready");
      }
      EmbedEvent::StateChange(EmbedState::Playing) => {
        self.phase = Phase::Playing;
        if !self.started {
          self.started = true;
          self.timers.arm(TimerId::Cover, now, constants().cover_delay());
        }
      }
      EmbedEvent::StateChange(EmbedState::Paused) => self.phase = Phase::Paused,
      EmbedEvent::StateChange(EmbedState::Ended) => {
        self.phase = Phase::Ended;
        debug!(video = %self.video.id, "player: ended");
      }
      EmbedEvent::StateChange(_) => {}
      EmbedEvent::FullscreenChange(on) => self.fullscreen = on,
    }
  }

  /// Fire due timers.
  pub fn tick(&mut self, now: Instant) {
    for id in self.timers.due(now) {
      match id {
        TimerId::Hide => {
          // Suspended while the settings menu is open or a drag is in flight.
          if !self.menu.is_open() && self.drag.is_none() {
            self.chrome_visible = false;
            self.menu.reset();
          }
        }
        TimerId::Cover => self.cover = false,
        TimerId::Poll => self.poll(),
        TimerId::Tap => {
          if self.taps.take_pending() {
            self.toggle(now);
          }
        }
        TimerId::Indicator => self.indicator = None,
        TimerId::Flash => self.flash = None,
      }
    }
  }

  /// Read continuous metrics from the embed. Each read fails independently
  /// (the embed may be torn down mid-poll) and failures are ignored.
  fn poll(&mut self) {
    let Some(embed) = &self.embed else { return };
    if self.drag.is_none()
      && let Ok(t) = embed.current_time()
    {
      self.time = t;
    }
    if let Ok(d) = embed.duration()
      && d > 0.0
    {
      self.duration = d;
    }
    if let Ok(b) = embed.buffered_fraction() {
      self.buffered = b.clamp(0.0, 1.0);
    }
    if let Ok(levels) = embed.available_quality_levels()
      && !levels.is_empty()
    {
      self.qualities = levels;
    }
  }

  /// Pointer move, touch or key press: show the chrome and restart the hide timer.
  pub fn on_activity(&mut self, now: Instant) {
    self.chrome_visible = true;
    self.timers.arm(TimerId::Hide, now, constants().hide_delay());
  }

  // --- Input ---

  /// Tap on the video surface.
  pub fn tap(&mut self, side: Side, now: Instant) {
    let c = constants();
    self.on_activity(now);
    match self.taps.register(side, now) {
      TapOutcome::Pending => self.timers.arm(TimerId::Tap, now, c.double_tap_window()),
      TapOutcome::Double(side) => {
        self.timers.cancel(TimerId::Tap);
        self.skip(side.sign() * c.skip_secs);
        self.indicator = Some(side);
        self.timers.arm(TimerId::Indicator, now, c.tap_indicator());
      }
    }
  }

  pub fn on_key(&mut self, code: KeyCode, now: Instant) -> OverlayAction {
    let c = constants();
    self.on_activity(now);

    if self.menu.is_open() {
      match code {
        KeyCode::Up => {
          self.menu.up(&self.qualities);
          return OverlayAction::Continue;
        }
        KeyCode::Down => {
          self.menu.down(&self.qualities);
          return OverlayAction::Continue;
        }
        KeyCode::Enter => {
          self.menu_select();
          return OverlayAction::Continue;
        }
        KeyCode::Left | KeyCode::Backspace => {
          self.menu.back();
          return OverlayAction::Continue;
        }
        _ => {}
      }
    }

    match code {
      KeyCode::Char(' ') | KeyCode::Char('k') => self.toggle(now),
      KeyCode::Char('j') | KeyCode::Left => self.skip(-c.skip_secs),
      KeyCode::Char('l') | KeyCode::Right => self.skip(c.skip_secs),
      KeyCode::Up => self.set_volume(self.volume as i32 + c.volume_step as i32),
      KeyCode::Down => self.set_volume(self.volume as i32 - c.volume_step as i32),
      // Ignored until the duration is known.
      KeyCode::Char(d) if d.is_ascii_digit() && self.duration > 0.0 => {
        let decile = d.to_digit(10).unwrap_or(0) as f64;
        self.seek(self.duration * decile / 10.0);
      }
      KeyCode::Char('m') => self.toggle_mute(),
      KeyCode::Char('f') => self.toggle_fullscreen(),
      KeyCode::Char('s') => self.toggle_settings(now),
      KeyCode::Esc => {
        if self.is_fullscreen() {
          self.set_fullscreen(false);
        } else {
          return OverlayAction::Close;
        }
      }
      _ => {}
    }
    OverlayAction::Continue
  }

  // --- Progress bar ---

  pub fn begin_drag(&mut self, fraction: f64, now: Instant) {
    self.on_activity(now);
    self.drag = Some(fraction.clamp(0.0, 1.0));
  }

  /// Live update while dragging; the pointer may be outside the bar.
  pub fn drag_to(&mut self, fraction: f64) {
    if self.drag.is_some() {
      self.drag = Some(fraction.clamp(0.0, 1.0));
    }
  }

  /// Commit the drag as a seek to the release position, or to the last
  /// tracked position when the release has none.
  pub fn end_drag(&mut self, fraction: Option<f64>, now: Instant) {
    if let Some(last) = self.drag.take() {
      let f = fraction.map_or(last, |f| f.clamp(0.0, 1.0));
      self.on_activity(now);
      self.seek(f * self.duration);
    }
  }

  pub fn set_hover(&mut self, fraction: Option<f64>) {
    self.hover = fraction.map(|f| f.clamp(0.0, 1.0));
  }

  // --- Transport ---

  fn clamp_time(&self, secs: f64) -> f64 {
    let t = secs.max(0.0);
    if self.duration > 0.0 { t.min(self.duration) } else { t }
  }

  pub fn seek(&mut self, secs: f64) {
    let target = self.clamp_time(secs);
    self.time = target;
    self.with_embed("seek", |e| e.seek_to(target));
  }

  /// Skip from the embed's live position, falling back to the last poll.
  pub fn skip(&mut self, delta: f64) {
    let from = self.embed.as_ref().and_then(|e| e.current_time().ok()).unwrap_or(self.time);
    self.seek(from + delta);
  }

  /// Play/pause with a centre flash. Phase follows the embed's callback.
  pub fn toggle(&mut self, now: Instant) {
    if self.embed.is_none() {
      return;
    }
    match self.phase {
      Phase::Ended => {
        self.replay();
        return;
      }
      Phase::Playing => {
        self.with_embed("pause", |e| e.pause());
        self.flash = Some(Flash::Pause);
      }
      Phase::Unstarted | Phase::Paused => {
        self.with_embed("play", |e| e.play());
        self.flash = Some(Flash::Play);
      }
    }
    self.timers.arm(TimerId::Flash, now, constants().flash());
  }

  pub fn replay(&mut self) {
    if self.embed.is_none() {
      return;
    }
    self.with_embed("replay", |e| {
      e.seek_to(0.0)?;
      e.play()
    });
    self.time = 0.0;
    self.phase = Phase::Playing;
  }

  /// Clamp to 0..=100. Zero mutes; any positive level unmutes.
  pub fn set_volume(&mut self, volume: i32) {
    let v = volume.clamp(0, 100) as u8;
    self.volume = v;
    self.with_embed("volume", |e| e.set_volume(v));
    if v == 0 {
      self.muted = true;
      self.with_embed("mute", |e| e.mute());
    } else if self.muted {
      self.muted = false;
      self.with_embed("unmute", |e| e.unmute());
    }
  }

  /// Unmuting restores the previous level, or the default when it was zero.
  pub fn toggle_mute(&mut self) {
    if self.muted {
      let v = if self.volume == 0 { constants().default_volume } else { self.volume };
      self.with_embed("unmute", |e| {
        e.unmute()?;
        e.set_volume(v)
      });
      self.volume = v;
      self.muted = false;
    } else {
      self.with_embed("mute", |e| e.mute());
      self.muted = true;
    }
  }

  pub fn set_speed(&mut self, speed: f64) {
    self.speed = speed;
    self.with_embed("speed", |e| e.set_playback_rate(speed));
  }

  pub fn set_quality(&mut self, level: &str) {
    self.quality = level.to_string();
    self.with_embed("quality", |e| e.set_playback_quality(level));
  }

  pub fn toggle_fullscreen(&mut self) {
    let on = !self.is_fullscreen();
    self.set_fullscreen(on);
  }

  fn set_fullscreen(&mut self, on: bool) {
    if self.with_embed("fullscreen", |e| e.set_fullscreen(on)) {
      self.fullscreen = on;
    }
  }

  // --- Settings ---

  pub fn toggle_settings(&mut self, now: Instant) {
    self.menu.toggle();
    if !self.menu.is_open() {
      self.on_activity(now);
    }
  }

  fn menu_select(&mut self) {
    match self.menu.select(&self.qualities) {
      Some(MenuChoice::Speed(s)) => self.set_speed(s),
      Some(MenuChoice::Quality(q)) => self.set_quality(&q),
      None => {}
    }
  }

  /// Pick a row by index on the current menu page (pointer selection).
  pub fn menu_pick(&mut self, row: usize) {
    while self.menu.cursor() != row {
      let before = self.menu.cursor();
      self.menu.down(&self.qualities);
      if self.menu.cursor() == before || (self.menu.cursor() == 0 && row != 0) {
        return;
      }
    }
    self.menu_select();
  }

  pub fn menu_back(&mut self) {
    self.menu.back();
  }

  // --- Teardown ---

  /// Release everything the session owns. Safe to call more than once.
  pub fn close(&mut self) {
    if self.closed {
      return;
    }
    self.closed = true;
    self.timers.cancel_all();
    self.taps.reset();
    self.events = None;
    if let Some(mut embed) = self.embed.take()
      && let Err(e) = embed.destroy()
    {
      debug!(err = %format!("{:#}", e), "player: embed teardown failed");
    }
    info!(video = %self.video.id, "player: closed");
  }

  /// Run an embed control, logging and swallowing failure. Returns whether it ran.
  fn with_embed(&mut self, what: &str, f: impl FnOnce(&mut E) -> anyhow::Result<()>) -> bool {
    let Some(embed) = &mut self.embed else { return false };
    match f(embed) {
      Ok(()) => true,
      Err(e) => {
        debug!(op = what, err = %format!("{:#}", e), "player: embed call failed");
        false
      }
    }
  }
}

impl<E: Embed> Drop for PlayerSession<E> {
  fn drop(&mut self) {
    self.close();
  }
}

/// `m:ss`, or `h:mm:ss` past an hour.
pub fn format_clock(secs: f64) -> String {
  let total = if secs.is_finite() && secs > 0.0 { secs.floor() as u64 } else { 0 };
  let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
  if h > 0 { format!("{}:{:02}:{:02}", h, m, s) } else { format!("{}:{:02}", m, s) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::{Result, bail};
  use std::sync::{Arc, Mutex as StdMutex};
  use std::time::Duration;

  #[derive(Default)]
  struct FakeState {
    calls: Vec<String>,
    time: f64,
    duration: f64,
    buffered: f64,
    fullscreen: bool,
    qualities: Vec<String>,
    torn_down: bool,
    fail_destroy: bool,
  }

  #[derive(Clone, Default)]
  struct FakeEmbed(Arc<StdMutex<FakeState>>);

  impl FakeEmbed {
    fn record(&self, call: String) -> Result<()> {
      let mut s = self.0.lock().unwrap();
      if s.torn_down {
        bail!("torn down");
      }
      s.calls.push(call);
      Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> Result<T> {
      let s = self.0.lock().unwrap();
      if s.torn_down {
        bail!("torn down");
      }
      Ok(f(&s))
    }

    fn calls(&self) -> Vec<String> {
      self.0.lock().unwrap().calls.clone()
    }

    fn set(&self, f: impl FnOnce(&mut FakeState)) {
      f(&mut self.0.lock().unwrap());
    }
  }

  impl Embed for FakeEmbed {
    fn play(&mut self) -> Result<()> {
      self.record("play".into())
    }
    fn pause(&mut self) -> Result<()> {
      self.record("pause".into())
    }
    fn seek_to(&mut self, secs: f64) -> Result<()> {
      self.record(format!("seek {secs}"))?;
      self.set(|s| s.time = secs);
      Ok(())
    }
    fn set_volume(&mut self, volume: u8) -> Result<()> {
      self.record(format!("volume {volume}"))
    }
    fn mute(&mut self) -> Result<()> {
      self.record("mute".into())
    }
    fn unmute(&mut self) -> Result<()> {
      self.record("unmute".into())
    }
    fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
      self.record(format!("rate {rate}"))
    }
    fn set_playback_quality(&mut self, level: &str) -> Result<()> {
      self.record(format!("quality {level}"))
    }
    fn set_fullscreen(&mut self, on: bool) -> Result<()> {
      self.record(format!("fullscreen {on}"))?;
      self.set(|s| s.fullscreen = on);
      Ok(())
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
      self.read(|s| s.buffered)
    }
    fn available_quality_levels(&self) -> Result<Vec<String>> {
      self.read(|s| s.qualities.clone())
    }
    fn destroy(&mut self) -> Result<()> {
      let mut s = self.0.lock().unwrap();
      s.torn_down = true;
      s.calls.push("destroy".into());
      if s.fail_destroy {
        bail!("already gone");
      }
      Ok(())
    }
  }

  fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
  }

  fn video() -> VideoRecord {
    VideoRecord {
      id: VideoId::new("1700000000000"),
      external_id: "dQw4w9WgXcQ".to_string(),
      title: "Never".to_string(),
      grouping_id: None,
    }
  }

  /// Open, attach, signal ready and first playback; clear the call log.
  fn playing(t0: Instant) -> (PlayerSession<FakeEmbed>, FakeEmbed) {
    let fake = FakeEmbed::default();
    fake.set(|s| s.duration = 100.0);
    let (_tx, rx) = mpsc::unbounded_channel();
    let mut session = PlayerSession::open(&video(), t0);
    session.attach(fake.clone(), rx);
    session.on_embed_event(EmbedEvent::Ready, t0);
    session.on_embed_event(EmbedEvent::StateChange(EmbedState::Playing), t0);
    fake.set(|s| s.calls.clear());
    (session, fake)
  }

  #[test]
  fn opens_behind_cover_with_chrome() {
    let t0 = Instant::now();
    let session: PlayerSession<FakeEmbed> = PlayerSession::open(&video(), t0);
    assert_eq!(session.state(), OverlayState::LoadingCover);
    assert!(session.chrome_visible());
    assert!(!session.has_embed());
  }

  #[test]
  fn ready_sets_volume_plays_and_starts_poll() {
    let t0 = Instant::now();
    let fake = FakeEmbed::default();
    fake.set(|s| {
      s.duration = 212.0;
      s.time = 3.0;
    });
    let (_tx, rx) = mpsc::unbounded_channel();
    let mut session = PlayerSession::open(&video(), t0);
    session.attach(fake.clone(), rx);
    session.on_embed_event(EmbedEvent::Ready, t0);
    assert_eq!(fake.calls(), vec!["volume 80", "play"]);
    assert!(session.is_ready());
    assert_eq!(session.duration(), 212.0);

    fake.set(|s| s.time = 4.0);
    session.tick(t0 + ms(250));
    assert_eq!(session.displayed_time(), 4.0);
  }

  #[test]
  fn events_are_drained_from_channel() {
    let t0 = Instant::now();
    let fake = FakeEmbed::default();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut session = PlayerSession::open(&video(), t0);
    session.attach(fake, rx);
    tx.send(EmbedEvent::Ready).unwrap();
    tx.send(EmbedEvent::StateChange(EmbedState::Playing)).unwrap();
    session.pump(t0);
    assert!(session.is_ready());
    assert_eq!(session.phase(), Phase::Playing);
  }

  #[test]
  fn cover_lifts_two_seconds_after_first_playback() {
    let t0 = Instant::now();
    let (mut session, _fake) = playing(t0);
    session.tick(t0 + ms(1999));
    assert_eq!(session.state(), OverlayState::LoadingCover);
    // Buffering does not hold the cover.
    session.on_embed_event(EmbedEvent::StateChange(EmbedState::Buffering), t0 + ms(1000));
    session.tick(t0 + ms(2000));
    assert_eq!(session.state(), OverlayState::Playing);
  }

  #[test]
  fn cover_is_armed_only_once() {
    let t0 = Instant::now();
    let (mut session, _fake) = playing(t0);
    session.on_embed_event(EmbedEvent::StateChange(EmbedState::Paused), t0 + ms(500));
    session.on_embed_event(EmbedEvent::StateChange(EmbedState::Playing), t0 + ms(1500));
    session.tick(t0 + ms(2000));
    assert!(!session.cover_visible());
  }

  #[test]
  fn chrome_hides_after_inactivity_and_resets_on_activity() {
    let t0 = Instant::now();
    let (mut session, _fake) = playing(t0);
    session.on_activity(t0 + ms(1500));
    session.tick(t0 + ms(2500));
    assert!(session.chrome_visible());
    session.tick(t0 + ms(3500));
    assert!(!session.chrome_visible());
    session.on_activity(t0 + ms(3600));
    assert!(session.chrome_visible());
  }

  #[test]
  fn hide_is_suspended_while_settings_open() {
    let t0 = Instant::now();
    let (mut session, _fake) = playing(t0);
    session.toggle_settings(t0);
    session.tick(t0 + ms(5000));
    assert!(session.chrome_visible());
    assert!(session.menu().is_open());
  }

  #[test]
  fn single_tap_toggles_after_window() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.tap(Side::Left, t0);
    session.tick(t0 + ms(299));
    assert!(fake.calls().is_empty());
    session.tick(t0 + ms(300));
    assert_eq!(fake.calls(), vec!["pause"]);
    assert_eq!(session.flash(), Some(Flash::Pause));
    // Phase waits for the embed's callback.
    assert_eq!(session.phase(), Phase::Playing);
    session.tick(t0 + ms(900));
    assert_eq!(session.flash(), None);
  }

  #[test]
  fn double_tap_skips_and_suppresses_toggle() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.seek(50.0);
    fake.set(|s| s.calls.clear());

    session.tap(Side::Right, t0);
    session.tap(Side::Right, t0 + ms(200));
    assert_eq!(fake.calls(), vec!["seek 60"]);
    assert_eq!(session.indicator(), Some(Side::Right));

    session.tick(t0 + ms(1000));
    assert_eq!(fake.calls(), vec!["seek 60"], "no toggle after a double tap");
    assert_eq!(session.indicator(), None);
  }

  #[test]
  fn taps_on_opposite_halves_do_not_skip() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.tap(Side::Left, t0);
    session.tap(Side::Right, t0 + ms(100));
    session.tick(t0 + ms(1000));
    assert_eq!(fake.calls(), vec!["pause"]);
  }

  #[test]
  fn skip_is_clamped_to_duration() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.seek(5.0);
    session.skip(-10.0);
    assert_eq!(session.displayed_time(), 0.0);
    session.seek(95.0);
    session.skip(10.0);
    assert_eq!(session.displayed_time(), 100.0);
    assert_eq!(fake.calls(), vec!["seek 5", "seek 0", "seek 95", "seek 100"]);
  }

  #[test]
  fn keyboard_contract() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.on_key(KeyCode::Char('k'), t0);
    session.on_key(KeyCode::Char('5'), t0);
    session.on_key(KeyCode::Right, t0);
    session.on_key(KeyCode::Char('j'), t0);
    session.on_key(KeyCode::Up, t0);
    session.on_key(KeyCode::Char('f'), t0);
    assert_eq!(fake.calls(), vec!["pause", "seek 50", "seek 60", "seek 50", "volume 85", "fullscreen true"]);
  }

  #[test]
  fn escape_leaves_fullscreen_before_closing() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.on_embed_event(EmbedEvent::FullscreenChange(true), t0);
    assert_eq!(session.on_key(KeyCode::Esc, t0), OverlayAction::Continue);
    assert_eq!(fake.calls(), vec!["fullscreen false"]);
    assert!(!session.is_fullscreen());
    assert_eq!(session.on_key(KeyCode::Esc, t0), OverlayAction::Close);
  }

  #[test]
  fn fullscreen_from_direct_query() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    fake.set(|s| s.fullscreen = true);
    assert!(session.is_fullscreen());
    assert_eq!(session.on_key(KeyCode::Esc, t0), OverlayAction::Continue);
  }

  #[test]
  fn volume_zero_mutes_and_positive_unmutes() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.set_volume(-20);
    assert_eq!(session.volume(), 0);
    assert!(session.muted());
    session.set_volume(30);
    assert!(!session.muted());
    session.set_volume(250);
    assert_eq!(session.volume(), 100);
    assert_eq!(fake.calls(), vec!["volume 0", "mute", "volume 30", "unmute", "volume 100"]);
  }

  #[test]
  fn unmute_restores_default_when_level_was_zero() {
    let t0 = Instant::now();
    let (mut session, _fake) = playing(t0);
    session.toggle_mute();
    assert!(session.muted());
    assert_eq!(session.volume(), 80);
    session.toggle_mute();
    assert_eq!(session.volume(), 80);

    session.set_volume(0);
    session.toggle_mute();
    assert!(!session.muted());
    assert_eq!(session.volume(), 80);
  }

  #[test]
  fn drag_updates_display_and_commits_on_release() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    fake.set(|s| s.time = 10.0);
    session.begin_drag(0.25, t0);
    assert_eq!(session.displayed_time(), 25.0);
    session.drag_to(1.7);
    assert_eq!(session.displayed_time(), 100.0);
    session.drag_to(0.5);
    // Poll does not fight the drag.
    session.tick(t0 + ms(250));
    assert_eq!(session.displayed_time(), 50.0);
    assert!(fake.calls().is_empty());

    session.end_drag(None, t0 + ms(300));
    assert_eq!(fake.calls(), vec!["seek 50"]);
    assert!(!session.is_dragging());
  }

  #[test]
  fn release_position_wins_over_last_drag() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.begin_drag(0.2, t0);
    session.drag_to(0.4);
    session.end_drag(Some(0.9), t0 + ms(100));
    assert_eq!(fake.calls(), vec!["seek 90"]);
  }

  #[test]
  fn chrome_stays_up_during_a_long_drag() {
    let t0 = Instant::now();
    let (mut session, _fake) = playing(t0);
    session.begin_drag(0.1, t0);
    session.tick(t0 + ms(5000));
    assert!(session.chrome_visible());
    assert!(session.is_dragging());

    // Releasing re-arms the hide timer.
    session.end_drag(None, t0 + ms(5000));
    session.tick(t0 + ms(6999));
    assert!(session.chrome_visible());
    session.tick(t0 + ms(7000));
    assert!(!session.chrome_visible());
  }

  #[test]
  fn digits_wait_for_a_known_duration() {
    let t0 = Instant::now();
    let fake = FakeEmbed::default();
    fake.set(|s| s.time = 37.0);
    let (_tx, rx) = mpsc::unbounded_channel();
    let mut session = PlayerSession::open(&video(), t0);
    session.attach(fake.clone(), rx);
    session.on_embed_event(EmbedEvent::Ready, t0);
    fake.set(|s| s.calls.clear());

    session.on_key(KeyCode::Char('5'), t0);
    assert!(fake.calls().is_empty());

    fake.set(|s| s.duration = 200.0);
    session.tick(t0 + ms(250));
    session.on_key(KeyCode::Char('5'), t0 + ms(250));
    assert_eq!(fake.calls(), vec!["seek 100"]);
  }

  #[test]
  fn skip_reads_the_live_position() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    // Playback moved on since the last poll.
    fake.set(|s| s.time = 42.0);
    session.skip(10.0);
    assert_eq!(fake.calls(), vec!["seek 52"]);
  }

  #[test]
  fn poll_never_changes_phase() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.on_embed_event(EmbedEvent::StateChange(EmbedState::Paused), t0);
    fake.set(|s| s.time = 42.0);
    session.tick(t0 + ms(250));
    assert_eq!(session.phase(), Phase::Paused);
    assert_eq!(session.displayed_time(), 42.0);
  }

  #[test]
  fn poll_failures_are_ignored() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    fake.set(|s| s.torn_down = true);
    session.tick(t0 + ms(250));
    session.tick(t0 + ms(500));
    assert_eq!(session.duration(), 100.0);
  }

  #[test]
  fn ended_then_replay() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.tick(t0 + ms(2000));
    session.on_embed_event(EmbedEvent::StateChange(EmbedState::Ended), t0 + ms(3000));
    assert_eq!(session.state(), OverlayState::Ended);
    session.replay();
    assert_eq!(session.state(), OverlayState::Playing);
    assert_eq!(fake.calls(), vec!["seek 0", "play"]);
  }

  #[test]
  fn settings_choose_speed() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.on_key(KeyCode::Char('s'), t0);
    session.on_key(KeyCode::Enter, t0); // speed page
    session.on_key(KeyCode::Down, t0);
    session.on_key(KeyCode::Enter, t0);
    assert_eq!(session.speed(), 0.5);
    assert_eq!(fake.calls(), vec!["rate 0.5"]);
    assert!(session.menu().is_open());
  }

  #[test]
  fn settings_pick_quality_by_row() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    fake.set(|s| s.qualities = vec!["hd1080".into(), "hd720".into(), "auto".into()]);
    session.tick(t0 + ms(250));
    session.toggle_settings(t0);
    session.menu_pick(1);
    session.menu_pick(1);
    assert_eq!(session.quality(), "hd720");
    assert!(fake.calls().contains(&"quality hd720".to_string()));
  }

  #[test]
  fn hide_resets_settings_navigation() {
    let t0 = Instant::now();
    let (mut session, _fake) = playing(t0);
    session.toggle_settings(t0);
    session.toggle_settings(t0);
    session.tick(t0 + ms(2500));
    assert!(!session.chrome_visible());
    assert!(!session.menu().is_open());
  }

  #[test]
  fn close_clears_timers_and_destroys_embed_once() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    session.tap(Side::Left, t0);
    session.close();
    session.close();
    assert_eq!(session.next_deadline(), None);
    assert_eq!(fake.calls(), vec!["destroy"]);
    assert!(session.is_closed());
  }

  #[test]
  fn close_survives_failed_teardown_and_missing_embed() {
    let t0 = Instant::now();
    let (mut session, fake) = playing(t0);
    fake.set(|s| s.fail_destroy = true);
    session.close();
    assert_eq!(session.next_deadline(), None);

    let mut bare: PlayerSession<FakeEmbed> = PlayerSession::open(&video(), t0);
    bare.close();
    assert_eq!(bare.next_deadline(), None);
  }

  #[test]
  fn late_attach_after_close_releases_embed() {
    let t0 = Instant::now();
    let fake = FakeEmbed::default();
    let (_tx, rx) = mpsc::unbounded_channel();
    let mut session = PlayerSession::open(&video(), t0);
    session.close();
    session.attach(fake.clone(), rx);
    assert!(!session.has_embed());
    assert_eq!(fake.calls(), vec!["destroy"]);
  }

  #[test]
  fn drop_closes_session() {
    let t0 = Instant::now();
    let (session, fake) = playing(t0);
    drop(session);
    assert_eq!(fake.calls(), vec!["destroy"]);
  }

  #[test]
  fn clock_format() {
    assert_eq!(format_clock(0.0), "0:00");
    assert_eq!(format_clock(65.9), "1:05");
    assert_eq!(format_clock(3725.0), "1:02:05");
    assert_eq!(format_clock(f64::NAN), "0:00");
  }
}
