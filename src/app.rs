use ratatui::{layout::Rect, widgets::ListState};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, GroupingId, VideoId};
use crate::config::Config;
use crate::constants::constants;
use crate::display::DisplayMode;
use crate::embed::{EmbedLoader, EmbedOptions, RuntimeInfo};
use crate::form::{AddForm, Submission};
use crate::graphics::Fitted;
use crate::mpv::MpvEmbed;
use crate::overlay::PlayerSession;
use crate::overlay_ui::OverlayHits;
use crate::theme::Theme;
use crate::thumbnail::Thumbnails;
use crate::view::{ViewEffect, ViewState};

// --- Types ---

pub type LoaderResult = Result<RuntimeInfo, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  /// Home, or the open collection when the catalog has one active.
  Gallery,
  Manage,
}

/// One selectable line of the current list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
  Grouping(GroupingId),
  Video(VideoId),
}

/// Resized images, so nothing is resized every frame.
#[derive(Default)]
pub struct GraphicsCache {
  pub preview: Option<Fitted>,
  pub cover: Option<Fitted>,
}

impl GraphicsCache {
  pub fn clear(&mut self) {
    self.preview = None;
    self.cover = None;
  }
}

pub struct App {
  pub catalog: Catalog,
  pub view: ViewState,
  pub config: Config,
  pub screen: Screen,
  pub list_state: ListState,
  pub form: Option<AddForm>,
  pub session: Option<PlayerSession<MpvEmbed>>,
  /// Bumped on every open so a late loader result for an older session is dropped.
  session_gen: u64,
  loader: EmbedLoader,
  pending_embed: Option<(u64, oneshot::Receiver<LoaderResult>)>,
  pub thumbnails: Thumbnails,
  pub display_mode: DisplayMode,
  pub gfx: GraphicsCache,
  pub info_message: Option<String>,
  message_time: Option<Instant>,
  pub should_quit: bool,
  /// Hit map of the last drawn overlay.
  pub overlay_hits: OverlayHits,
  /// Inner area of the last drawn list, for mouse selection.
  pub list_area: Option<Rect>,
}

impl App {
  pub fn new(catalog: Catalog, config: Config, display_mode: DisplayMode, loader: EmbedLoader) -> Self {
    let theme = catalog.store().load_theme();
    let mut list_state = ListState::default();
    list_state.select(Some(0));
    Self {
      catalog,
      view: ViewState::new(theme),
      config,
      screen: Screen::Gallery,
      list_state,
      form: None,
      session: None,
      session_gen: 0,
      loader,
      pending_embed: None,
      thumbnails: Thumbnails::new(Client::new()),
      display_mode,
      gfx: GraphicsCache::default(),
      info_message: None,
      message_time: None,
      should_quit: false,
      overlay_hits: OverlayHits::default(),
      list_area: None,
    }
  }

  pub fn theme(&self) -> &'static Theme {
    self.view.theme()
  }

  // --- Messages ---

  pub fn set_info(&mut self, msg: String) {
    self.info_message = Some(msg);
    self.message_time = Some(Instant::now());
  }

  pub fn clear_message(&mut self) {
    self.info_message = None;
    self.message_time = None;
  }

  /// Clear the status message once its time is up.
  pub fn expire_message(&mut self) {
    if let Some(t) = self.message_time
      && t.elapsed() >= Duration::from_secs(constants().message_ttl_secs)
    {
      self.clear_message();
    }
  }

  /// "3 videos • 1 collection"
  pub fn shelf_summary(&self) -> String {
    let videos = self.catalog.videos().len();
    let groupings = self.catalog.groupings().len();
    format!(
      "{} video{} • {} collection{}",
      videos,
      if videos == 1 { "" } else { "s" },
      groupings,
      if groupings == 1 { "" } else { "s" }
    )
  }

  // --- Lists ---

  pub fn rows(&self) -> Vec<Row> {
    let mut rows = Vec::new();
    match self.screen {
      Screen::Manage => {
        for g in self.catalog.groupings() {
          rows.push(Row::Grouping(g.id.clone()));
          rows.extend(self.catalog.videos_in(&g.id).map(|v| Row::Video(v.id.clone())));
        }
        rows.extend(self.catalog.ungrouped().map(|v| Row::Video(v.id.clone())));
      }
      Screen::Gallery => match self.catalog.active() {
        Some(id) => rows.extend(self.catalog.videos_in(id).map(|v| Row::Video(v.id.clone()))),
        None => {
          // Empty collections stay off the home view; they are listed under manage.
          for g in self.catalog.groupings() {
            if self.catalog.member_count(&g.id) > 0 {
              rows.push(Row::Grouping(g.id.clone()));
            }
          }
          rows.extend(self.catalog.ungrouped().map(|v| Row::Video(v.id.clone())));
        }
      },
    }
    rows
  }

  pub fn selected_row(&self) -> Option<Row> {
    let rows = self.rows();
    self.list_state.selected().and_then(|i| rows.get(i).cloned())
  }

  pub fn select_next(&mut self) {
    let len = self.rows().len();
    if len == 0 {
      return;
    }
    let i = self.list_state.selected().map_or(0, |i| (i + 1).min(len - 1));
    self.list_state.select(Some(i));
  }

  pub fn select_prev(&mut self) {
    let i = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
    self.list_state.select(Some(i));
  }

  /// Keep the cursor inside the list after it shrank.
  fn clamp_selection(&mut self) {
    let len = self.rows().len();
    match self.list_state.selected() {
      _ if len == 0 => self.list_state.select(Some(0)),
      Some(i) if i >= len => self.list_state.select(Some(len - 1)),
      None => self.list_state.select(Some(0)),
      _ => {}
    }
  }

  fn select_row(&mut self, row: &Row) {
    let i = self.rows().iter().position(|r| r == row).unwrap_or(0);
    self.list_state.select(Some(i));
  }

  /// Enter on a row: open the collection, or play the video.
  pub fn activate(&mut self, now: Instant) {
    match self.selected_row() {
      Some(Row::Grouping(id)) => {
        if self.screen == Screen::Gallery {
          self.catalog.open_grouping(id);
          self.list_state.select(Some(0));
        }
      }
      Some(Row::Video(id)) => self.open_video(&id, now),
      None => {}
    }
  }

  pub fn back(&mut self) {
    if self.screen == Screen::Manage {
      self.screen = Screen::Gallery;
      self.list_state.select(Some(0));
      return;
    }
    if let Some(id) = self.catalog.active().cloned() {
      self.catalog.close_grouping();
      self.select_row(&Row::Grouping(id));
    }
  }

  pub fn toggle_manage(&mut self) {
    self.screen = match self.screen {
      Screen::Gallery => Screen::Manage,
      Screen::Manage => Screen::Gallery,
    };
    self.list_state.select(Some(0));
  }

  /// Delete the selected row on the manage screen. Collections take their videos with them.
  pub fn remove_selected(&mut self) {
    if self.screen != Screen::Manage {
      return;
    }
    match self.selected_row() {
      Some(Row::Grouping(id)) => {
        let name = self.catalog.grouping(&id).map(|g| g.name.clone()).unwrap_or_default();
        self.catalog.remove_grouping(&id);
        self.set_info(format!("Removed collection \"{}\"", name));
      }
      Some(Row::Video(id)) => {
        self.catalog.remove_video(&id);
        self.set_info("Video removed".to_string());
      }
      None => return,
    }
    self.clamp_selection();
  }

  // --- Player ---

  pub fn player_open(&self) -> bool {
    self.session.is_some()
  }

  /// Open the overlay right away with its loading cover. The embed is
  /// created once the shared loader resolves.
  pub fn open_video(&mut self, id: &VideoId, now: Instant) {
    let Some(video) = self.catalog.video(id).cloned() else {
      debug!(video = %id, "player: unknown video");
      return;
    };
    self.close_player();
    self.session_gen += 1;
    let generation = self.session_gen;

    self.thumbnails.request(&video.external_id);
    self.session = Some(PlayerSession::open(&video, now));
    self.view.apply(ViewEffect::LockScroll);

    let (tx, rx) = oneshot::channel();
    let loader = self.loader.clone();
    tokio::spawn(async move {
      let _ = tx.send(loader.resolve().await);
    });
    self.pending_embed = Some((generation, rx));
  }

  pub(crate) fn embed_resolved(&mut self, generation: u64, result: LoaderResult) {
    if generation != self.session_gen {
      debug!(generation, current = self.session_gen, "player: stale loader result dropped");
      return;
    }
    let Some(session) = self.session.as_mut() else { return };
    let runtime = match result {
      Ok(runtime) => runtime,
      Err(e) => {
        // The overlay stays on its cover; the user can still close it.
        warn!(err = %e, "player: embed unavailable");
        return;
      }
    };
    let video = session.video();
    let opts = EmbedOptions::new(&video.external_id, &video.title, &self.config.ytdl_format(), session.volume());
    match MpvEmbed::spawn(&opts, &runtime) {
      Ok((embed, events)) => session.attach(embed, events),
      Err(e) => warn!(err = %format!("{:#}", e), "player: embed creation failed"),
    }
  }

  /// Tear down the session and give the gallery its scrolling back.
  pub fn close_player(&mut self) {
    self.pending_embed = None;
    if let Some(mut session) = self.session.take() {
      session.close();
      self.view.apply(ViewEffect::UnlockScroll);
      self.gfx.cover = None;
    }
  }

  /// Drain session callbacks and fire its due timers.
  pub fn tick(&mut self, now: Instant) {
    if let Some(session) = &mut self.session {
      session.pump(now);
      session.tick(now);
    }
  }

  pub fn next_deadline(&self) -> Option<Instant> {
    self.session.as_ref().and_then(|s| s.next_deadline())
  }

  // --- Form ---

  pub fn open_form(&mut self) {
    if self.session.is_some() || self.form.is_some() {
      return;
    }
    self.form = Some(AddForm::new());
    self.view.apply(ViewEffect::LockScroll);
  }

  pub fn close_form(&mut self) {
    if self.form.take().is_some() {
      self.view.apply(ViewEffect::UnlockScroll);
    }
  }

  /// Validate and apply. Invalid input leaves the form open with its message.
  pub fn submit_form(&mut self) {
    let Some(form) = self.form.as_mut() else { return };
    let submission = match form.submit() {
      Ok(s) => s,
      Err(e) => {
        debug!(err = %e, "form: rejected");
        return;
      }
    };
    match submission {
      Submission::Video { external_id, title, grouping } => {
        self.catalog.add_video(external_id, title, grouping);
        self.set_info("Video added".to_string());
      }
      Submission::Grouping { name, videos } => {
        let count = videos.len();
        self.catalog.create_grouping(name.clone(), videos);
        self.set_info(format!("Collection \"{}\" created with {} video{}", name, count, if count == 1 { "" } else { "s" }));
      }
    }
    self.close_form();
    self.clamp_selection();
  }

  // --- Preferences ---

  pub fn toggle_theme(&mut self) {
    let pref = self.view.theme_preference().toggled();
    self.view.apply(ViewEffect::ApplyTheme(pref));
    self.catalog.store_mut().save_theme(pref);
  }

  pub fn cycle_display_mode(&mut self) {
    self.display_mode = self.display_mode.next();
    self.gfx.clear();
    self.config.display_mode = Some(self.display_mode.config_name().to_string());
    self.config.save();
    self.set_info(format!("Thumbnails: {}", self.display_mode.label()));
  }

  // --- Background work ---

  /// Collect finished background work. Called once per frame.
  pub fn check_pending(&mut self) {
    if self.thumbnails.drain() {
      self.gfx.clear();
    }

    if let Some((generation, mut rx)) = self.pending_embed.take() {
      match rx.try_recv() {
        Ok(result) => self.embed_resolved(generation, result),
        Err(oneshot::error::TryRecvError::Empty) => self.pending_embed = Some((generation, rx)),
        Err(oneshot::error::TryRecvError::Closed) => warn!("player: loader task dropped"),
      }
    }

    self.expire_message();
  }

  pub fn on_quit(&mut self) {
    info!("app: quitting");
    self.close_player();
    self.should_quit = true;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::NewVideo;
  use crate::form::FormMode;
  use crate::store::Store;
  use crate::theme::ThemePreference;
  use anyhow::anyhow;
  use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

  fn app() -> App {
    let loader = EmbedLoader::from_future(async { Err(anyhow!("mpv not found")) });
    App::new(Catalog::load(Store::in_memory()), Config::default(), DisplayMode::Ascii, loader)
  }

  fn nv(id: &str, title: &str) -> NewVideo {
    NewVideo { external_id: id.to_string(), title: title.to_string() }
  }

  fn type_str(form: &mut AddForm, s: &str) {
    for c in s.chars() {
      form.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE), &[]);
    }
  }

  #[test]
  fn home_lists_nonempty_collections_then_general_videos() {
    let mut app = app();
    let empty = app.catalog.create_grouping("Empty".into(), Vec::new());
    let full = app.catalog.create_grouping("Full".into(), vec![nv("aaaaaaaaaaa", "A")]);
    let loose = app.catalog.add_video("bbbbbbbbbbb".into(), "B".into(), None);

    let rows = app.rows();
    assert_eq!(rows, vec![Row::Grouping(full.clone()), Row::Video(loose)]);
    assert!(!rows.contains(&Row::Grouping(empty)));
  }

  #[test]
  fn opening_a_collection_and_going_back() {
    let mut app = app();
    app.catalog.add_video("ccccccccccc".into(), "C".into(), None);
    let g = app.catalog.create_grouping("Mix".into(), vec![nv("aaaaaaaaaaa", "A"), nv("bbbbbbbbbbb", "B")]);
    app.list_state.select(Some(0));
    app.activate(Instant::now());
    assert_eq!(app.catalog.active(), Some(&g));
    assert_eq!(app.rows().len(), 2);

    app.back();
    assert_eq!(app.catalog.active(), None);
    assert_eq!(app.selected_row(), Some(Row::Grouping(g)));
  }

  #[test]
  fn manage_lists_everything_and_removal_cascades() {
    let mut app = app();
    let empty = app.catalog.create_grouping("Empty".into(), Vec::new());
    let g = app.catalog.create_grouping("Mix".into(), vec![nv("aaaaaaaaaaa", "A")]);
    app.catalog.add_video("bbbbbbbbbbb".into(), "B".into(), None);
    app.toggle_manage();
    assert_eq!(app.rows().len(), 4);
    assert_eq!(app.rows()[0], Row::Grouping(empty));

    app.list_state.select(Some(1));
    assert_eq!(app.selected_row(), Some(Row::Grouping(g)));
    app.remove_selected();
    assert_eq!(app.catalog.videos().len(), 1);
    assert_eq!(app.rows().len(), 2);
    assert!(app.info_message.is_some());
  }

  #[test]
  fn remove_does_nothing_outside_manage() {
    let mut app = app();
    app.catalog.add_video("bbbbbbbbbbb".into(), "B".into(), None);
    app.remove_selected();
    assert_eq!(app.catalog.videos().len(), 1);
  }

  #[test]
  fn removing_last_row_moves_cursor_up() {
    let mut app = app();
    app.catalog.add_video("aaaaaaaaaaa".into(), "A".into(), None);
    app.catalog.add_video("bbbbbbbbbbb".into(), "B".into(), None);
    app.toggle_manage();
    app.list_state.select(Some(1));
    app.remove_selected();
    assert_eq!(app.list_state.selected(), Some(0));
  }

  #[test]
  fn form_locks_scroll_and_submits_a_video() {
    let mut app = app();
    app.open_form();
    assert!(app.view.scroll_locked());

    let form = app.form.as_mut().unwrap();
    type_str(form, "https://youtu.be/dQw4w9WgXcQ");
    form.focus_next(false);
    type_str(form, "Never");
    app.submit_form();

    assert!(app.form.is_none());
    assert!(!app.view.scroll_locked());
    assert_eq!(app.catalog.videos()[0].external_id, "dQw4w9WgXcQ");
    assert_eq!(app.info_message.as_deref(), Some("Video added"));
  }

  #[test]
  fn invalid_form_stays_open_with_message() {
    let mut app = app();
    app.open_form();
    app.submit_form();
    let form = app.form.as_ref().unwrap();
    assert_eq!(form.error(), Some("Please enter a YouTube URL"));
    assert!(app.view.scroll_locked());
    assert!(app.catalog.videos().is_empty());
  }

  #[test]
  fn collection_form_creates_grouping() {
    let mut app = app();
    app.open_form();
    let form = app.form.as_mut().unwrap();
    form.set_mode(FormMode::Collection);
    type_str(form, "Lectures");
    form.focus_next(false);
    type_str(form, "dQw4w9WgXcQ");
    form.focus_next(false);
    type_str(form, "One");
    app.submit_form();

    assert_eq!(app.catalog.groupings().len(), 1);
    assert_eq!(app.catalog.videos().len(), 1);
    assert!(app.info_message.as_deref().unwrap().contains("Lectures"));
  }

  #[test]
  fn theme_toggle_is_persisted() {
    let mut app = app();
    assert_eq!(app.view.theme_preference(), ThemePreference::Dark);
    app.toggle_theme();
    assert_eq!(app.view.theme_preference(), ThemePreference::Light);
    assert_eq!(app.catalog.store().load_theme(), ThemePreference::Light);
  }

  #[test]
  fn messages_expire() {
    let mut app = app();
    app.set_info("Video added".into());
    app.expire_message();
    assert!(app.info_message.is_some());
    app.message_time = Some(Instant::now() - Duration::from_secs(constants().message_ttl_secs + 1));
    app.expire_message();
    assert!(app.info_message.is_none());
  }

  #[test]
  fn summary_pluralises() {
    let mut app = app();
    assert_eq!(app.shelf_summary(), "0 videos • 0 collections");
    app.catalog.create_grouping("One".into(), vec![nv("aaaaaaaaaaa", "A")]);
    assert_eq!(app.shelf_summary(), "1 video • 1 collection");
  }

  #[tokio::test]
  async fn player_open_and_close_toggle_scroll_lock() {
    let mut app = app();
    let id = app.catalog.add_video("aaaaaaaaaaa".into(), "A".into(), None);
    app.open_video(&id, Instant::now());
    assert!(app.player_open());
    assert!(app.view.scroll_locked());
    assert!(app.session.as_ref().unwrap().cover_visible());

    // The form never opens over the player.
    app.open_form();
    assert!(app.form.is_none());

    app.close_player();
    assert!(!app.player_open());
    assert!(!app.view.scroll_locked());
  }

  #[tokio::test]
  async fn stale_loader_result_is_ignored() {
    let mut app = app();
    let a = app.catalog.add_video("aaaaaaaaaaa".into(), "A".into(), None);
    let b = app.catalog.add_video("bbbbbbbbbbb".into(), "B".into(), None);
    app.open_video(&a, Instant::now());
    let first = app.session_gen;
    app.open_video(&b, Instant::now());

    app.embed_resolved(first, Err("mpv not found".into()));
    assert_eq!(app.session.as_ref().unwrap().video_id(), &b);

    // A failed load is silent: the session stays on its cover.
    app.embed_resolved(app.session_gen, Err("mpv not found".into()));
    assert!(app.info_message.is_none());
    let session = app.session.as_ref().unwrap();
    assert!(session.cover_visible());
    assert!(!session.has_embed());
  }
}
