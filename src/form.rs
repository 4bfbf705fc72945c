//! The add form: a single video, or a new collection with several videos.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::catalog::{Grouping, GroupingId, NewVideo};
use crate::extract::extract_video_id;

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Text field ---

#[derive(Debug, Default, Clone)]
pub struct TextField {
  text: String,
  /// Cursor position in chars.
  cursor: usize,
}

impl TextField {
  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn is_blank(&self) -> bool {
    self.text.trim().is_empty()
  }

  pub fn insert(&mut self, c: char) {
    let byte_idx = char_to_byte_index(&self.text, self.cursor);
    self.text.insert(byte_idx, c);
    self.cursor += 1;
  }

  pub fn insert_str(&mut self, s: &str) {
    for c in s.chars().filter(|c| !c.is_control()) {
      self.insert(c);
    }
  }

  pub fn backspace(&mut self) {
    if self.cursor > 0 {
      self.cursor -= 1;
      let byte_idx = char_to_byte_index(&self.text, self.cursor);
      self.text.remove(byte_idx);
    }
  }

  pub fn delete(&mut self) {
    if self.cursor < self.text.chars().count() {
      let byte_idx = char_to_byte_index(&self.text, self.cursor);
      self.text.remove(byte_idx);
    }
  }

  /// Line editing shared by every field. Returns whether the key was used.
  fn edit(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.text.clear();
        self.cursor = 0;
      }
      KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.insert(c),
      KeyCode::Backspace => self.backspace(),
      KeyCode::Delete => self.delete(),
      KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
      KeyCode::Right => self.cursor = (self.cursor + 1).min(self.text.chars().count()),
      KeyCode::Home => self.cursor = 0,
      KeyCode::End => self.cursor = self.text.chars().count(),
      _ => return false,
    }
    true
  }
}

// --- Form ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
  Single,
  Collection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
  Url,
  Title,
  Grouping,
  Name,
  SlotUrl(usize),
  SlotTitle(usize),
}

#[derive(Debug, Default, Clone)]
pub struct Slot {
  pub url: TextField,
  pub title: TextField,
}

/// What a valid form asks the catalog to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
  Video { external_id: String, title: String, grouping: Option<GroupingId> },
  Grouping { name: String, videos: Vec<NewVideo> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
  None,
  Close,
  Submit,
}

const INITIAL_SLOTS: usize = 2;

#[derive(Debug)]
pub struct AddForm {
  mode: FormMode,
  url: TextField,
  title: TextField,
  grouping: Option<GroupingId>,
  name: TextField,
  slots: Vec<Slot>,
  focus: Focus,
  error: Option<String>,
}

impl Default for AddForm {
  fn default() -> Self {
    Self::new()
  }
}

impl AddForm {
  pub fn new() -> Self {
    Self {
      mode: FormMode::Single,
      url: TextField::default(),
      title: TextField::default(),
      grouping: None,
      name: TextField::default(),
      slots: vec![Slot::default(); INITIAL_SLOTS],
      focus: Focus::Url,
      error: None,
    }
  }

  pub fn mode(&self) -> FormMode {
    self.mode
  }

  pub fn url(&self) -> &TextField {
    &self.url
  }

  pub fn title(&self) -> &TextField {
    &self.title
  }

  pub fn grouping(&self) -> Option<&GroupingId> {
    self.grouping.as_ref()
  }

  pub fn name(&self) -> &TextField {
    &self.name
  }

  pub fn slots(&self) -> &[Slot] {
    &self.slots
  }

  pub fn focus(&self) -> Focus {
    self.focus
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn set_mode(&mut self, mode: FormMode) {
    self.mode = mode;
    self.error = None;
    self.focus = match mode {
      FormMode::Single => Focus::Url,
      FormMode::Collection => Focus::Name,
    };
  }

  fn focus_order(&self, has_groupings: bool) -> Vec<Focus> {
    match self.mode {
      FormMode::Single => {
        let mut order = vec![Focus::Url, Focus::Title];
        if has_groupings {
          order.push(Focus::Grouping);
        }
        order
      }
      FormMode::Collection => std::iter::once(Focus::Name)
        .chain((0..self.slots.len()).flat_map(|i| [Focus::SlotUrl(i), Focus::SlotTitle(i)]))
        .collect(),
    }
  }

  fn move_focus(&mut self, step: isize, has_groupings: bool) {
    let order = self.focus_order(has_groupings);
    let pos = order.iter().position(|f| *f == self.focus).unwrap_or(0) as isize;
    let len = order.len() as isize;
    self.focus = order[((pos + step).rem_euclid(len)) as usize];
  }

  pub fn focus_next(&mut self, has_groupings: bool) {
    self.move_focus(1, has_groupings);
  }

  pub fn focus_prev(&mut self, has_groupings: bool) {
    self.move_focus(-1, has_groupings);
  }

  pub fn add_slot(&mut self) {
    self.slots.push(Slot::default());
    self.focus = Focus::SlotUrl(self.slots.len() - 1);
  }

  /// Remove a slot; the last remaining one stays.
  pub fn remove_slot(&mut self, index: usize) {
    if self.slots.len() <= 1 || index >= self.slots.len() {
      return;
    }
    self.slots.remove(index);
    let last = self.slots.len() - 1;
    self.focus = match self.focus {
      Focus::SlotUrl(i) | Focus::SlotTitle(i) if i > last => Focus::SlotUrl(last),
      other => other,
    };
  }

  /// Cycle the target collection: none ("General"), then each collection.
  pub fn cycle_grouping(&mut self, groupings: &[Grouping], step: isize) {
    let len = groupings.len() as isize + 1;
    let pos = match &self.grouping {
      Some(id) => groupings.iter().position(|g| &g.id == id).map_or(0, |i| i as isize + 1),
      None => 0,
    };
    let next = (pos + step).rem_euclid(len);
    self.grouping = if next == 0 { None } else { Some(groupings[next as usize - 1].id.clone()) };
  }

  fn focused_field(&mut self) -> Option<&mut TextField> {
    match self.focus {
      Focus::Url => Some(&mut self.url),
      Focus::Title => Some(&mut self.title),
      Focus::Name => Some(&mut self.name),
      Focus::SlotUrl(i) => self.slots.get_mut(i).map(|s| &mut s.url),
      Focus::SlotTitle(i) => self.slots.get_mut(i).map(|s| &mut s.title),
      Focus::Grouping => None,
    }
  }

  /// Pasted text goes to the focused field.
  pub fn paste(&mut self, text: &str) {
    if let Some(field) = self.focused_field() {
      field.insert_str(text);
      self.error = None;
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent, groupings: &[Grouping]) -> FormAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let has_groupings = !groupings.is_empty();
    match key.code {
      KeyCode::Esc => return FormAction::Close,
      KeyCode::Enter => return FormAction::Submit,
      KeyCode::Tab | KeyCode::Down => self.focus_next(has_groupings),
      KeyCode::BackTab | KeyCode::Up => self.focus_prev(has_groupings),
      KeyCode::Char('s') if ctrl => {
        let mode = match self.mode {
          FormMode::Single => FormMode::Collection,
          FormMode::Collection => FormMode::Single,
        };
        self.set_mode(mode);
      }
      KeyCode::Char('n') if ctrl && self.mode == FormMode::Collection => self.add_slot(),
      KeyCode::Char('x') if ctrl => {
        if let Focus::SlotUrl(i) | Focus::SlotTitle(i) = self.focus {
          self.remove_slot(i);
        }
      }
      KeyCode::Left if self.focus == Focus::Grouping => self.cycle_grouping(groupings, -1),
      KeyCode::Right | KeyCode::Char(' ') if self.focus == Focus::Grouping => self.cycle_grouping(groupings, 1),
      _ => {
        if let Some(field) = self.focused_field()
          && field.edit(key)
        {
          self.error = None;
        }
      }
    }
    FormAction::None
  }

  /// Validate. On failure the message is kept for display and returned.
  pub fn submit(&mut self) -> Result<Submission, String> {
    let result = match self.mode {
      FormMode::Single => self.validate_single(),
      FormMode::Collection => self.validate_collection(),
    };
    self.error = result.as_ref().err().cloned();
    result
  }

  fn validate_single(&self) -> Result<Submission, String> {
    if self.url.is_blank() {
      return Err("Please enter a YouTube URL".to_string());
    }
    if self.title.is_blank() {
      return Err("Please enter a title".to_string());
    }
    let external_id = extract_video_id(self.url.text().trim())
      .ok_or_else(|| "Invalid URL. Supports: youtube.com, youtu.be, shorts & live links".to_string())?;
    Ok(Submission::Video {
      external_id,
      title: self.title.text().trim().to_string(),
      grouping: self.grouping.clone(),
    })
  }

  fn validate_collection(&self) -> Result<Submission, String> {
    if self.name.is_blank() {
      return Err("Please enter a collection name".to_string());
    }
    let mut videos = Vec::new();
    for slot in &self.slots {
      if slot.url.is_blank() && slot.title.is_blank() {
        continue;
      }
      if slot.url.is_blank() {
        return Err("Please fill in all video URLs".to_string());
      }
      if slot.title.is_blank() {
        return Err("Please fill in all video titles".to_string());
      }
      let Some(external_id) = extract_video_id(slot.url.text().trim()) else {
        let shown: String = slot.url.text().chars().take(40).collect();
        return Err(format!("Invalid URL: {}...", shown));
      };
      videos.push(NewVideo { external_id, title: slot.title.text().trim().to_string() });
    }
    if videos.is_empty() {
      return Err("Add at least one video".to_string());
    }
    Ok(Submission::Grouping { name: self.name.text().trim().to_string(), videos })
  }
}
