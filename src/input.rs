use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;
use std::time::Instant;

use crate::app::App;
use crate::constants::constants;
use crate::form::FormAction;
use crate::overlay::{OverlayAction, OverlayState};
use crate::overlay_ui::HitTarget;

// --- Keys ---

pub fn handle_key_event(app: &mut App, key: KeyEvent, now: Instant) {
  let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
  if ctrl && key.code == KeyCode::Char('c') {
    app.on_quit();
    return;
  }

  // A text field has focus: every other key belongs to the form.
  if let Some(form) = app.form.as_mut() {
    match form.handle_key(key, app.catalog.groupings()) {
      FormAction::Close => app.close_form(),
      FormAction::Submit => app.submit_form(),
      FormAction::None => {}
    }
    return;
  }

  if app.session.is_some() {
    handle_player_key(app, key, now);
    return;
  }

  if ctrl && key.code == KeyCode::Char('t') {
    app.toggle_theme();
    return;
  }
  if ctrl && key.code == KeyCode::Char('d') {
    app.cycle_display_mode();
    return;
  }

  match key.code {
    KeyCode::Char('q') => app.on_quit(),
    KeyCode::Char('j') | KeyCode::Down => app.select_next(),
    KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
    KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.activate(now),
    KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') | KeyCode::Left => app.back(),
    KeyCode::Char('a') => app.open_form(),
    KeyCode::Char('m') => app.toggle_manage(),
    KeyCode::Char('d') | KeyCode::Delete => app.remove_selected(),
    KeyCode::Char('t') => app.toggle_theme(),
    _ => {}
  }
}

fn handle_player_key(app: &mut App, key: KeyEvent, now: Instant) {
  let Some(session) = app.session.as_mut() else { return };
  if session.state() == OverlayState::Ended && matches!(key.code, KeyCode::Char('r') | KeyCode::Enter) {
    session.replay();
    return;
  }
  if session.on_key(key.code, now) == OverlayAction::Close {
    app.close_player();
  }
}

pub fn handle_paste(app: &mut App, text: &str) {
  if let Some(form) = app.form.as_mut() {
    form.paste(text);
  }
}

// --- Mouse ---

pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, now: Instant) {
  if app.form.is_some() {
    return;
  }
  if app.session.is_some() {
    handle_player_mouse(app, mouse, now);
  } else {
    handle_gallery_mouse(app, mouse, now);
  }
}

fn handle_player_mouse(app: &mut App, mouse: MouseEvent, now: Instant) {
  let hits = &app.overlay_hits;
  let Some(session) = app.session.as_mut() else { return };
  let (col, row) = (mouse.column, mouse.row);
  let c = constants();
  let mut close = false;

  match mouse.kind {
    MouseEventKind::Moved => {
      session.on_activity(now);
      let over_bar = hits.hit(col, row) == Some(HitTarget::ProgressBar);
      session.set_hover(if over_bar { hits.bar_fraction(col) } else { None });
    }
    MouseEventKind::Down(MouseButton::Left) => {
      let target = hits.hit(col, row);
      if target != Some(HitTarget::Surface) {
        session.on_activity(now);
      }
      match target {
        Some(HitTarget::Surface) => session.tap(hits.surface_side(col), now),
        Some(HitTarget::ProgressBar) => {
          if let Some(f) = hits.bar_fraction(col) {
            session.begin_drag(f, now);
          }
        }
        Some(HitTarget::PlayPause) => session.toggle(now),
        Some(HitTarget::SkipBack) => session.skip(-c.skip_secs),
        Some(HitTarget::SkipForward) => session.skip(c.skip_secs),
        Some(HitTarget::Mute) => session.toggle_mute(),
        Some(HitTarget::Settings) => session.toggle_settings(now),
        Some(HitTarget::Fullscreen) => session.toggle_fullscreen(),
        Some(HitTarget::Replay) => session.replay(),
        Some(HitTarget::MenuBack) => session.menu_back(),
        Some(HitTarget::MenuRow(i)) => session.menu_pick(i),
        Some(HitTarget::Close) => close = true,
        Some(HitTarget::Panel) | None => {}
      }
    }
    // The drag follows the pointer anywhere on screen, not just over the bar.
    MouseEventKind::Drag(MouseButton::Left) => {
      session.on_activity(now);
      if session.is_dragging()
        && let Some(f) = hits.bar_fraction(col)
      {
        session.drag_to(f);
      }
    }
    MouseEventKind::Up(MouseButton::Left) => session.end_drag(hits.bar_fraction(col), now),
    MouseEventKind::ScrollUp => {
      session.on_activity(now);
      session.set_volume(session.volume() as i32 + c.volume_step as i32);
    }
    MouseEventKind::ScrollDown => {
      session.on_activity(now);
      session.set_volume(session.volume() as i32 - c.volume_step as i32);
    }
    _ => {}
  }

  if close {
    app.close_player();
  }
}

fn handle_gallery_mouse(app: &mut App, mouse: MouseEvent, now: Instant) {
  match mouse.kind {
    MouseEventKind::ScrollUp if !app.view.scroll_locked() => app.select_prev(),
    MouseEventKind::ScrollDown if !app.view.scroll_locked() => app.select_next(),
    MouseEventKind::Down(MouseButton::Left) => {
      let Some(area) = app.list_area else { return };
      if !area.contains(Position::new(mouse.column, mouse.row)) {
        return;
      }
      let index = app.list_state.offset() + (mouse.row - area.y) as usize;
      if index >= app.rows().len() {
        return;
      }
      // First click selects, a click on the selected row opens it.
      if app.list_state.selected() == Some(index) {
        app.activate(now);
      } else {
        app.list_state.select(Some(index));
      }
    }
    _ => {}
  }
}
