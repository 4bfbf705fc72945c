//! Drawing the player overlay, and the hit map pointer input is resolved against.

use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Position, Rect},
  style::{Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::constants::constants;
use crate::gesture::Side;
use crate::graphics::{ThumbnailWidget, fitted, widescreen_rect};
use crate::menu::{MAIN_ROWS, MenuPage, quality_badge, quality_label, quality_rows, speed_label};
use crate::mpv::MpvEmbed;
use crate::overlay::{Flash, OverlayState, PlayerSession, format_clock};
use crate::theme::Theme;
use crate::thumbnail::cover_image;
use crate::ui::truncate_str;

// --- Hit map ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
  /// The video surface: taps toggle, double taps skip.
  Surface,
  ProgressBar,
  PlayPause,
  SkipBack,
  SkipForward,
  Mute,
  Settings,
  Fullscreen,
  Close,
  Replay,
  MenuBack,
  MenuRow(usize),
  /// Settings panel background; swallows clicks.
  Panel,
}

#[derive(Debug, Default, Clone)]
pub struct OverlayHits {
  targets: Vec<(Rect, HitTarget)>,
  bar: Option<Rect>,
  surface: Option<Rect>,
}

impl OverlayHits {
  pub fn push(&mut self, area: Rect, target: HitTarget) {
    match target {
      HitTarget::ProgressBar => self.bar = Some(area),
      HitTarget::Surface => self.surface = Some(area),
      _ => {}
    }
    self.targets.push((area, target));
  }

  /// Topmost target under the cell. Later pushes sit on top.
  pub fn hit(&self, col: u16, row: u16) -> Option<HitTarget> {
    let pos = Position::new(col, row);
    self.targets.iter().rev().find(|(r, _)| r.contains(pos)).map(|(_, t)| *t)
  }

  /// Column as a fraction of the bar. Columns outside clamp to the ends, so a
  /// drag keeps tracking after the pointer leaves the bar.
  pub fn bar_fraction(&self, col: u16) -> Option<f64> {
    let bar = self.bar?;
    if bar.width <= 1 {
      return Some(0.0);
    }
    let offset = col.saturating_sub(bar.x).min(bar.width - 1);
    Some(offset as f64 / (bar.width - 1) as f64)
  }

  pub fn surface_side(&self, col: u16) -> Side {
    match self.surface {
      Some(s) if s.width > 0 => Side::from_fraction(col.saturating_sub(s.x) as f64 / s.width as f64),
      _ => Side::Left,
    }
  }
}

/// Played and buffered cells of a `width`-wide bar. Buffered never trails played.
pub fn bar_cells(width: u16, played: f64, buffered: f64) -> (u16, u16) {
  let w = width as f64;
  let played = (played.clamp(0.0, 1.0) * w).round() as u16;
  let buffered = ((buffered.clamp(0.0, 1.0) * w).round() as u16).max(played);
  (played, buffered)
}

/// A row of inline buttons, laid out left to right.
#[derive(Default)]
struct Buttons<'a> {
  spans: Vec<Span<'a>>,
  hits: Vec<(u16, u16, HitTarget)>,
  width: u16,
}

impl<'a> Buttons<'a> {
  fn button(&mut self, label: String, style: Style, target: HitTarget) {
    let w = label.width() as u16;
    self.hits.push((self.width, w, target));
    self.text(label, style);
  }

  fn text(&mut self, label: String, style: Style) {
    self.width += label.width() as u16;
    self.spans.push(Span::styled(label, style));
  }

  fn render(self, frame: &mut Frame, x: u16, y: u16, hits: &mut OverlayHits) {
    let area = Rect::new(x, y, self.width, 1).intersection(frame.area());
    for (offset, w, target) in self.hits {
      hits.push(Rect::new(x + offset, y, w, 1), target);
    }
    frame.render_widget(Line::from(self.spans), area);
  }
}

const SPINNER: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

// --- Rendering ---

pub fn render_overlay(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let mut hits = OverlayHits::default();
  let Some(session) = app.session.as_ref() else { return };

  frame.render_widget(Clear, area);
  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), area);
  hits.push(area, HitTarget::Surface);

  let state = session.state();
  let chrome = session.chrome_visible()
    && session.is_ready()
    && !matches!(state, OverlayState::LoadingCover | OverlayState::Ended);

  let [top_area, surface_area, bottom_area, status_area] =
    Layout::vertical([Constraint::Length(1), Constraint::Min(3), Constraint::Length(3), Constraint::Length(1)])
      .areas(area);

  // Backdrop: the blurred cover while loading and at the end, the plain
  // thumbnail behind the controls otherwise.
  let external_id = session.video().external_id.clone();
  let blurred = matches!(state, OverlayState::LoadingCover | OverlayState::Ended);
  let image_area = widescreen_rect(surface_area);
  let key = if blurred { format!("{}:cover", external_id) } else { external_id.clone() };
  let source = app.thumbnails.get(&external_id);
  if let Some(image) = fitted(&mut app.gfx.cover, &key, image_area, app.display_mode, || {
    source.map(|img| if blurred { cover_image(img) } else { img.clone() })
  }) {
    frame.render_widget(ThumbnailWidget { image, display_mode: app.display_mode }, image_area);
  }

  match state {
    OverlayState::LoadingCover => render_loading(frame, theme, surface_area),
    OverlayState::Ended => render_end_screen(frame, theme, session, surface_area, &mut hits),
    _ => {}
  }

  if let Some(side) = session.indicator() {
    render_indicator(frame, theme, surface_area, side);
  }
  if let Some(flash) = session.flash() {
    let symbol = match flash {
      Flash::Play => "▶",
      Flash::Pause => "❚❚",
    };
    render_centre_badge(frame, theme, surface_area, symbol, None, &mut hits);
  } else if chrome && state == OverlayState::Paused && !session.menu().is_open() {
    render_centre_badge(frame, theme, surface_area, "▶", Some(HitTarget::PlayPause), &mut hits);
  }

  if chrome {
    render_top_bar(frame, theme, session, top_area, &mut hits);
    render_controls(frame, theme, session, bottom_area, &mut hits);
    if session.menu().is_open() {
      render_settings(frame, theme, session, bottom_area, &mut hits);
    }
  }

  if let Some(msg) = &app.info_message {
    frame.render_widget(Paragraph::new(format!(" ✓ {}", msg)).style(Style::default().fg(theme.info)), status_area);
  }

  app.overlay_hits = hits;
}

fn render_loading(frame: &mut Frame, theme: &Theme, area: Rect) {
  let tick = chrono::Local::now().timestamp_subsec_millis() as usize / 125;
  let lines = vec![
    Line::from(Span::styled(SPINNER[tick % SPINNER.len()], Style::default().fg(theme.progress))),
    Line::from(Span::styled("Loading", Style::default().fg(theme.muted))),
  ];
  let y = area.y + area.height.saturating_sub(2) / 2;
  let rect = Rect { y, height: 2.min(area.height), ..area };
  frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), rect);
}

fn render_end_screen(
  frame: &mut Frame,
  theme: &Theme,
  session: &PlayerSession<MpvEmbed>,
  area: Rect,
  hits: &mut OverlayHits,
) {
  let y = area.y + area.height.saturating_sub(5) / 2;
  let title = truncate_str(&session.video().title, area.width.saturating_sub(4) as usize);

  let replay = " ↻ Replay ";
  let close = " Close ";
  let centred = |w: u16| area.x + area.width.saturating_sub(w) / 2;

  let mut row = Buttons::default();
  row.button(
    replay.to_string(),
    Style::default().fg(theme.highlight_fg).bg(theme.progress).add_modifier(Modifier::BOLD),
    HitTarget::Replay,
  );
  row.render(frame, centred(replay.width() as u16), y, hits);

  let title_rect = Rect { y: y + 2, height: 1, ..area }.intersection(area);
  frame.render_widget(
    Paragraph::new(Span::styled(title, Style::default().fg(theme.fg))).alignment(Alignment::Center),
    title_rect,
  );

  let mut row = Buttons::default();
  row.button(close.to_string(), Style::default().fg(theme.fg).bg(theme.border), HitTarget::Close);
  row.render(frame, centred(close.width() as u16), y + 4, hits);
}

fn render_indicator(frame: &mut Frame, theme: &Theme, area: Rect, side: Side) {
  let label = match side {
    Side::Left => "« 10s",
    Side::Right => "10s »",
  };
  let w = label.width() as u16;
  let x = match side {
    Side::Left => area.x + area.width / 5,
    Side::Right => (area.x + area.width - area.width / 5).saturating_sub(w),
  };
  let y = area.y + area.height / 2;
  let rect = Rect::new(x, y, w, 1).intersection(area);
  frame.render_widget(Span::styled(label, Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)), rect);
}

fn render_centre_badge(
  frame: &mut Frame,
  theme: &Theme,
  area: Rect,
  symbol: &str,
  target: Option<HitTarget>,
  hits: &mut OverlayHits,
) {
  let label = format!("  {}  ", symbol);
  let w = label.width() as u16;
  let rect = Rect::new(area.x + area.width.saturating_sub(w) / 2, area.y + area.height / 2, w, 1).intersection(area);
  frame.render_widget(Span::styled(label, Style::default().fg(theme.fg).bg(theme.border)), rect);
  if let Some(target) = target {
    hits.push(rect, target);
  }
}

fn render_top_bar(
  frame: &mut Frame,
  theme: &Theme,
  session: &PlayerSession<MpvEmbed>,
  area: Rect,
  hits: &mut OverlayHits,
) {
  let close = " ✕ ";
  let close_w = close.width() as u16;
  let max = (area.width.saturating_sub(close_w + 2) as usize).min(constants().title_max_chars);
  let title = truncate_str(&session.video().title, max);
  frame.render_widget(
    Span::styled(format!(" {}", title), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)),
    area,
  );

  let mut row = Buttons::default();
  row.button(close.to_string(), Style::default().fg(theme.muted).bg(theme.border), HitTarget::Close);
  row.render(frame, area.x + area.width.saturating_sub(close_w + 1), area.y, hits);
}

fn render_controls(
  frame: &mut Frame,
  theme: &Theme,
  session: &PlayerSession<MpvEmbed>,
  area: Rect,
  hits: &mut OverlayHits,
) {
  let [hover_row, bar_row, button_row] =
    Layout::vertical([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)]).areas(area);
  let bar = Rect { x: bar_row.x + 1, width: bar_row.width.saturating_sub(2), ..bar_row };

  // Progress bar: played, then buffered, then the rest of the track.
  let (played, buffered) = bar_cells(bar.width, session.progress(), session.buffered());
  let mut spans = Vec::new();
  for i in 0..bar.width {
    let (symbol, color) = if i < played {
      ("━", theme.progress)
    } else if i == played && played < bar.width {
      ("●", theme.progress)
    } else if i < buffered {
      ("━", theme.buffered)
    } else {
      ("─", theme.track)
    };
    spans.push(Span::styled(symbol, Style::default().fg(color)));
  }
  frame.render_widget(Line::from(spans), bar);
  hits.push(bar, HitTarget::ProgressBar);

  if let Some(hover) = session.hover() {
    let label = format!(" {} ", format_clock(hover * session.duration()));
    let w = label.width() as u16;
    let at = bar.x + (hover * bar.width.saturating_sub(1) as f64).round() as u16;
    let x = at.saturating_sub(w / 2).clamp(bar.x, (bar.x + bar.width).saturating_sub(w));
    frame.render_widget(
      Span::styled(label, Style::default().fg(theme.fg).bg(theme.border)),
      Rect::new(x, hover_row.y, w, 1).intersection(hover_row),
    );
  }

  let button = Style::default().fg(theme.fg);
  let dim = Style::default().fg(theme.muted);

  let mut left = Buttons::default();
  left.text(" ".to_string(), dim);
  left.button(" ↺ ".to_string(), button, HitTarget::SkipBack);
  let play = if session.state() == OverlayState::Playing { " ❚❚ " } else { " ▶ " };
  left.button(play.to_string(), button.bg(theme.border), HitTarget::PlayPause);
  left.button(" ↻ ".to_string(), button, HitTarget::SkipForward);
  let volume = if session.muted() || session.volume() == 0 {
    " 🔇 muted ".to_string()
  } else {
    format!(" 🔊 {:>3}% ", session.volume())
  };
  left.button(volume, button, HitTarget::Mute);
  left.text(format!(" {} ", format_clock(session.displayed_time())), dim);
  left.text("/".to_string(), Style::default().fg(theme.border));
  left.text(format!(" {}", format_clock(session.duration())), dim);
  let left_end = button_row.x + left.width;
  left.render(frame, button_row.x, button_row.y, hits);

  let mut right = Buttons::default();
  if session.speed() != 1.0 {
    right.text(
      format!(" {}x ", session.speed()),
      Style::default().fg(theme.progress).add_modifier(Modifier::BOLD),
    );
  }
  right.button(" ⚙ ".to_string(), button, HitTarget::Settings);
  let fullscreen = if session.is_fullscreen() { " ⊡ " } else { " ⛶ " };
  right.button(fullscreen.to_string(), button, HitTarget::Fullscreen);
  right.text(" ".to_string(), dim);
  let x = (button_row.x + button_row.width).saturating_sub(right.width);
  // Narrow terminals drop the right-hand group rather than overlap.
  if x >= left_end {
    right.render(frame, x, button_row.y, hits);
  }
}

fn render_settings(
  frame: &mut Frame,
  theme: &Theme,
  session: &PlayerSession<MpvEmbed>,
  controls: Rect,
  hits: &mut OverlayHits,
) {
  let menu = session.menu();
  let (title, rows): (&str, Vec<(String, bool)>) = match menu.page() {
    MenuPage::Main => (
      " Settings ",
      MAIN_ROWS
        .iter()
        .map(|page| match page {
          MenuPage::Speed => (format!("Speed    {:>10}", speed_label(session.speed())), false),
          _ => (format!("Quality  {:>10}", quality_label(session.quality())), false),
        })
        .collect(),
    ),
    MenuPage::Speed => (
      " ‹ Speed ",
      constants().speeds.iter().map(|s| (speed_label(*s), *s == session.speed())).collect(),
    ),
    MenuPage::Quality => (
      " ‹ Quality ",
      quality_rows(session.qualities())
        .iter()
        .map(|q| {
          let label = match quality_badge(q) {
            Some(badge) => format!("{} {}", quality_label(q), badge),
            None => quality_label(q).to_string(),
          };
          (label, q == session.quality())
        })
        .collect(),
    ),
  };

  let width = 26u16.min(controls.width);
  let height = (rows.len() as u16 + 2).min(controls.y.saturating_sub(1));
  if height < 3 {
    return;
  }
  let panel = Rect::new(
    (controls.x + controls.width).saturating_sub(width + 1),
    controls.y.saturating_sub(height),
    width,
    height,
  );
  frame.render_widget(Clear, panel);
  let block = Block::bordered()
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .style(Style::default().bg(theme.bg));
  let inner = block.inner(panel);
  frame.render_widget(block, panel);
  hits.push(panel, HitTarget::Panel);
  if menu.page() != MenuPage::Main {
    hits.push(Rect { height: 1, ..panel }, HitTarget::MenuBack);
  }

  for (i, (label, current)) in rows.into_iter().enumerate() {
    let y = inner.y + i as u16;
    if y >= inner.y + inner.height {
      break;
    }
    let row = Rect { y, height: 1, ..inner };
    let mark = if current { "✓ " } else { "  " };
    let style = if i == menu.cursor() {
      Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg)
    } else if current {
      Style::default().fg(theme.progress)
    } else {
      Style::default().fg(theme.fg)
    };
    frame.render_widget(Paragraph::new(format!("{}{}", mark, label)).style(style), row);
    hits.push(row, HitTarget::MenuRow(i));
  }
}
