use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Flex, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, List, ListItem, Padding, Paragraph},
};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, Row, Screen};
use crate::catalog::{Grouping, VideoRecord};
use crate::extract::watch_url;
use crate::form::{AddForm, Focus, FormMode, TextField};
use crate::graphics::{ThumbnailWidget, fitted, widescreen_rect};
use crate::overlay_ui::render_overlay;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
pub fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

fn rounded(theme: &Theme) -> Block<'static> {
  Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  let area = frame.area();
  app.list_area = None;

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), area);

  if app.session.is_some() {
    render_overlay(frame, app, area);
    return;
  }

  let [header_area, main_area, status_area, footer_area] =
    Layout::vertical([Constraint::Length(1), Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)])
      .areas(area);

  render_header(frame, app, header_area);
  match app.screen {
    Screen::Manage => render_manage(frame, app, main_area),
    Screen::Gallery => render_gallery(frame, app, main_area),
  }
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);

  if let Some(form) = &app.form {
    render_form(frame, theme, form, app.catalog.groupings(), main_area);
  }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let left = Line::from(Span::styled(" ▶ anaty ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let right_text = format!("{}  v{} ", app.shelf_summary(), env!("CARGO_PKG_VERSION"));
  let width = right_text.chars().count() as u16;
  let right = Line::from(Span::styled(right_text, Style::default().fg(theme.muted)));
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width, ..area };
  frame.render_widget(right, right_area);
}

fn render_gallery(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let rows = app.rows();

  if rows.is_empty() {
    let text = match app.catalog.active() {
      Some(_) => vec![
        Line::from(""),
        Line::from(Span::styled("This collection is empty", Style::default().fg(theme.muted))),
        Line::from(""),
        Line::from(Span::styled("Press Esc to go back.", Style::default().fg(theme.muted))),
      ],
      None => vec![
        Line::from(""),
        Line::from(Span::styled("▶  Your shelf is empty", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled("Keep the videos you love in one place.", Style::default().fg(theme.fg))),
        Line::from(""),
        Line::from(Span::styled("Press a to add a video or a collection.", Style::default().fg(theme.muted))),
      ],
    };
    let block = rounded(theme).title(gallery_title(app));
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).block(block), area);
    return;
  }

  let [list_area, preview_area] =
    Layout::horizontal([Constraint::Percentage(58), Constraint::Percentage(42)]).areas(area);

  let inner_w = list_area.width.saturating_sub(4) as usize;
  let items: Vec<ListItem> = rows
    .iter()
    .enumerate()
    .map(|(i, row)| {
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };
      let line = match row {
        Row::Grouping(id) => {
          let name = app.catalog.grouping(id).map(|g| g.name.as_str()).unwrap_or_default();
          let count = app.catalog.member_count(id);
          let right = format!("{} video{}", count, if count == 1 { "" } else { "s" });
          spread(format!("▸ {}", name), right, inner_w, Style::default().fg(theme.collection), theme)
        }
        Row::Video(id) => {
          let title = app.catalog.video(id).map(|v| v.title.as_str()).unwrap_or_default();
          Line::from(Span::styled(truncate_str(title, inner_w), Style::default().fg(theme.fg)))
        }
      };
      ListItem::new(line).bg(bg)
    })
    .collect();

  let list = List::new(items)
    .block(
      rounded(theme)
        .title(gallery_title(app))
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  app.list_area = Some(Block::bordered().inner(list_area));
  frame.render_stateful_widget(list, list_area, &mut app.list_state);

  render_preview(frame, app, preview_area);
}

fn gallery_title(app: &App) -> String {
  match app.catalog.active().and_then(|id| app.catalog.grouping(id)) {
    Some(g) => format!(" ‹ {} ", g.name),
    None => " Shelf ".to_string(),
  }
}

/// Left text, then right text flush against the edge.
fn spread<'a>(left: String, right: String, width: usize, left_style: Style, theme: &Theme) -> Line<'a> {
  let right_w = right.chars().count();
  let left = truncate_str(&left, width.saturating_sub(right_w + 2));
  let gap = width.saturating_sub(left.chars().count() + right_w);
  Line::from(vec![
    Span::styled(left, left_style),
    Span::raw(" ".repeat(gap)),
    Span::styled(right, Style::default().fg(theme.muted)),
  ])
}

/// The video a row previews: itself, or a collection's newest member.
fn preview_video<'a>(app: &'a App, row: &'a Row) -> Option<&'a VideoRecord> {
  match row {
    Row::Video(id) => app.catalog.video(id),
    Row::Grouping(id) => app.catalog.videos_in(id).next(),
  }
}

fn render_preview(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let block = rounded(theme).padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let Some(row) = app.selected_row() else { return };
  let Some(video) = preview_video(app, &row).cloned() else { return };

  let [thumb_area, info_area] = Layout::vertical([Constraint::Percentage(60), Constraint::Min(4)]).areas(inner);
  let image_area = widescreen_rect(thumb_area);

  app.thumbnails.request(&video.external_id);
  let source = app.thumbnails.get(&video.external_id);
  if let Some(image) =
    fitted(&mut app.gfx.preview, &video.external_id, image_area, app.display_mode, || source.cloned())
  {
    frame.render_widget(ThumbnailWidget { image, display_mode: app.display_mode }, image_area);
  } else if app.thumbnails.is_loading(&video.external_id) {
    let y = image_area.y + image_area.height / 2;
    frame.render_widget(
      Paragraph::new(Span::styled("Loading thumbnail…", Style::default().fg(theme.muted))).alignment(Alignment::Center),
      Rect { y, height: 1, ..image_area },
    );
  }

  let inner_w = info_area.width as usize;
  let mut lines = vec![Line::from("")];
  if let Row::Grouping(id) = &row
    && let Some(g) = app.catalog.grouping(id)
  {
    lines.push(Line::from(Span::styled(
      truncate_str(&g.name, inner_w),
      Style::default().fg(theme.collection).add_modifier(Modifier::BOLD),
    )));
    let created = chrono::DateTime::from_timestamp_millis(g.created_at)
      .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d").to_string())
      .unwrap_or_default();
    lines.push(Line::from(vec![
      Span::styled("Created  ", Style::default().fg(theme.muted)),
      Span::styled(created, Style::default().fg(theme.fg)),
    ]));
    lines.push(Line::from(Span::styled("Press Enter to open", Style::default().fg(theme.muted))));
  } else {
    lines.push(Line::from(Span::styled(
      truncate_str(&video.title, inner_w),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )));
    let group = video
      .grouping_id
      .as_ref()
      .and_then(|id| app.catalog.grouping(id))
      .map_or("General".to_string(), |g| g.name.clone());
    lines.push(Line::from(vec![
      Span::styled("In       ", Style::default().fg(theme.muted)),
      Span::styled(group, Style::default().fg(theme.fg)),
    ]));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
      truncate_str(&watch_url(&video.external_id), inner_w),
      Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED),
    )));
  }
  frame.render_widget(Paragraph::new(lines), info_area);
}

fn render_manage(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let rows = app.rows();
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = rows
    .iter()
    .map(|row| match row {
      Row::Grouping(id) => {
        let name = app.catalog.grouping(id).map(|g| g.name.as_str()).unwrap_or_default();
        let count = app.catalog.member_count(id);
        let right = if count == 0 { "empty".to_string() } else { format!("{} video{}", count, if count == 1 { "" } else { "s" }) };
        ListItem::new(spread(
          format!("▸ {}", name),
          right,
          inner_w,
          Style::default().fg(theme.collection).add_modifier(Modifier::BOLD),
          theme,
        ))
      }
      Row::Video(id) => {
        let video = app.catalog.video(id);
        let title = video.map(|v| v.title.as_str()).unwrap_or_default();
        let nested = video.is_some_and(|v| v.grouping_id.is_some());
        let label = if nested { format!("  └ {}", title) } else { title.to_string() };
        let external = video.map(|v| v.external_id.clone()).unwrap_or_default();
        ListItem::new(spread(label, external, inner_w, Style::default().fg(theme.fg), theme))
      }
    })
    .collect();

  let block = rounded(theme)
    .title(" Manage ")
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD));

  if items.is_empty() {
    let text = Paragraph::new(Span::styled("Nothing to manage yet.", Style::default().fg(theme.muted)))
      .alignment(Alignment::Center)
      .block(block);
    frame.render_widget(text, area);
    return;
  }

  let list = List::new(items)
    .block(block)
    .highlight_symbol("✕ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg));
  app.list_area = Some(Block::bordered().inner(area));
  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.info_message {
    (format!(" ✓ {}", msg), Style::default().fg(theme.info))
  } else {
    (format!(" Thumbnails: {}", app.display_mode.label()), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn footer_keys(app: &App) -> Vec<(&'static str, &'static str)> {
  if let Some(form) = &app.form {
    let mut k = vec![("Tab", "Next"), ("Enter", "Save"), ("^s", "Mode")];
    if form.mode() == FormMode::Collection {
      k.push(("^n", "Add slot"));
      k.push(("^x", "Remove slot"));
    }
    k.push(("Esc", "Cancel"));
    return k;
  }
  match app.screen {
    Screen::Manage => vec![("d", "Delete"), ("j/k", "Navigate"), ("Enter", "Play"), ("Esc", "Back")],
    Screen::Gallery if app.catalog.active().is_some() => {
      vec![("Enter", "Play"), ("j/k", "Navigate"), ("a", "Add"), ("Esc", "Back"), ("t", "Theme")]
    }
    Screen::Gallery => vec![
      ("Enter", "Open"),
      ("j/k", "Navigate"),
      ("a", "Add"),
      ("m", "Manage"),
      ("t", "Theme"),
      ("^d", "Thumbs"),
      ("q", "Quit"),
    ],
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys = footer_keys(app);

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

// --- Add form ---

/// Visible part of a field and the cursor column inside it.
fn field_view(field: &TextField, width: usize) -> (String, usize) {
  let cursor_col = display_width(field.text(), field.cursor());
  let scroll = (cursor_col + 1).saturating_sub(width);
  let visible: String = field
    .text()
    .chars()
    .scan(0usize, |col, c| {
      let w = c.width().unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= scroll)
    .take_while(|(start, _, _)| *start < scroll + width)
    .map(|(_, _, c)| c)
    .collect();
  (visible, cursor_col - scroll)
}

fn render_form(frame: &mut Frame, theme: &Theme, form: &AddForm, groupings: &[Grouping], area: Rect) {
  let [popup] = Layout::horizontal([Constraint::Max(64)]).flex(Flex::Center).areas(area);
  let [popup] = Layout::vertical([Constraint::Max(18)]).flex(Flex::Center).areas(popup);
  frame.render_widget(Clear, popup);

  let title = match form.mode() {
    FormMode::Single => " Add Video ",
    FormMode::Collection => " New Collection ",
  };
  let block = rounded(theme)
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_style(Style::default().fg(theme.accent))
    .padding(Padding::horizontal(1))
    .style(Style::default().bg(theme.bg));
  let inner = block.inner(popup);
  frame.render_widget(block, popup);

  let [tabs_area, fields_area, error_area] =
    Layout::vertical([Constraint::Length(2), Constraint::Min(1), Constraint::Length(1)]).areas(inner);

  let tab = |label: &'static str, on: bool| {
    if on {
      Span::styled(format!(" {} ", label), Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg))
    } else {
      Span::styled(format!(" {} ", label), Style::default().fg(theme.muted))
    }
  };
  frame.render_widget(
    Line::from(vec![
      tab("Single video", form.mode() == FormMode::Single),
      Span::raw(" "),
      tab("Collection", form.mode() == FormMode::Collection),
    ]),
    Rect { height: 1, ..tabs_area },
  );

  enum Entry<'f> {
    Heading(String),
    Field(&'static str, &'f TextField, Focus),
    Choice(&'static str, String, Focus),
  }

  let mut entries = Vec::new();
  match form.mode() {
    FormMode::Single => {
      entries.push(Entry::Field("URL", form.url(), Focus::Url));
      entries.push(Entry::Field("Title", form.title(), Focus::Title));
      if !groupings.is_empty() {
        let name = form
          .grouping()
          .and_then(|id| groupings.iter().find(|g| &g.id == id))
          .map_or("General", |g| g.name.as_str());
        entries.push(Entry::Choice("Collection", format!("‹ {} ›", name), Focus::Grouping));
      }
    }
    FormMode::Collection => {
      entries.push(Entry::Field("Name", form.name(), Focus::Name));
      for (i, slot) in form.slots().iter().enumerate() {
        entries.push(Entry::Heading(format!("Video {}", i + 1)));
        entries.push(Entry::Field("  URL", &slot.url, Focus::SlotUrl(i)));
        entries.push(Entry::Field("  Title", &slot.title, Focus::SlotTitle(i)));
      }
    }
  }

  let label_w = 10usize;
  let value_w = (fields_area.width as usize).saturating_sub(label_w + 1).max(1);
  let label_style = |focused: bool| Style::default().fg(if focused { theme.accent } else { theme.muted });
  let mut lines: Vec<Line> = Vec::new();
  let mut cursor: Option<(usize, usize)> = None;
  let mut focus_line = 0usize;

  for entry in entries {
    match entry {
      Entry::Heading(text) => lines.push(Line::from(Span::styled(text, Style::default().fg(theme.muted)))),
      Entry::Field(label, field, focus) => {
        let focused = form.focus() == focus;
        let (visible, col) = field_view(field, value_w);
        if focused {
          cursor = Some((lines.len(), col));
          focus_line = lines.len();
        }
        lines.push(Line::from(vec![
          Span::styled(format!("{:<width$} ", label, width = label_w), label_style(focused)),
          Span::styled(visible, Style::default().fg(theme.fg).bg(theme.stripe_bg)),
        ]));
      }
      Entry::Choice(label, value, focus) => {
        let focused = form.focus() == focus;
        if focused {
          focus_line = lines.len();
        }
        lines.push(Line::from(vec![
          Span::styled(format!("{:<width$} ", label, width = label_w), label_style(focused)),
          Span::styled(value, Style::default().fg(theme.collection)),
        ]));
      }
    }
  }

  let height = fields_area.height as usize;
  let offset = (focus_line + 1).saturating_sub(height);
  frame.render_widget(Paragraph::new(lines).scroll((offset as u16, 0)), fields_area);

  if let Some((line, col)) = cursor
    && line >= offset
    && line < offset + height
  {
    let x = fields_area.x + (label_w + 1 + col) as u16;
    frame.set_cursor_position((x, fields_area.y + (line - offset) as u16));
  }

  if let Some(err) = form.error() {
    frame.render_widget(Span::styled(format!("⚠ {}", err), Style::default().fg(theme.error)), error_area);
  }
}
