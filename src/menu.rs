//! Settings menu: a main page leading to the speed and quality lists.

use crate::constants::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuPage {
  #[default]
  Main,
  Speed,
  Quality,
}

/// Rows of the main page.
pub const MAIN_ROWS: [MenuPage; 2] = [MenuPage::Speed, MenuPage::Quality];

/// What selecting a row asks the session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuChoice {
  Speed(f64),
  Quality(String),
}

#[derive(Debug, Default)]
pub struct SettingsMenu {
  open: bool,
  page: MenuPage,
  cursor: usize,
}

impl SettingsMenu {
  pub fn is_open(&self) -> bool {
    self.open
  }

  pub fn page(&self) -> MenuPage {
    self.page
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  /// Open or close; either way navigation restarts at the main page.
  pub fn toggle(&mut self) {
    self.open = !self.open;
    self.page = MenuPage::Main;
    self.cursor = 0;
  }

  /// Close and return to the main page (chrome auto-hide).
  pub fn reset(&mut self) {
    self.open = false;
    self.page = MenuPage::Main;
    self.cursor = 0;
  }

  fn rows(&self, qualities: &[String]) -> usize {
    match self.page {
      MenuPage::Main => MAIN_ROWS.len(),
      MenuPage::Speed => constants().speeds.len(),
      MenuPage::Quality => quality_rows(qualities).len(),
    }
  }

  pub fn up(&mut self, qualities: &[String]) {
    let rows = self.rows(qualities);
    if rows > 0 {
      self.cursor = if self.cursor == 0 { rows - 1 } else { self.cursor - 1 };
    }
  }

  pub fn down(&mut self, qualities: &[String]) {
    let rows = self.rows(qualities);
    if rows > 0 {
      self.cursor = (self.cursor + 1) % rows;
    }
  }

  /// Select the row under the cursor. Choosing a speed or quality returns to
  /// the main page.
  pub fn select(&mut self, qualities: &[String]) -> Option<MenuChoice> {
    match self.page {
      MenuPage::Main => {
        self.page = MAIN_ROWS.get(self.cursor).copied().unwrap_or(MenuPage::Main);
        self.cursor = 0;
        None
      }
      MenuPage::Speed => {
        let speed = constants().speeds.get(self.cursor).copied()?;
        self.back();
        Some(MenuChoice::Speed(speed))
      }
      MenuPage::Quality => {
        let level = quality_rows(qualities).get(self.cursor).cloned()?;
        self.back();
        Some(MenuChoice::Quality(level))
      }
    }
  }

  /// From a list page, back to main; from main, close.
  pub fn back(&mut self) {
    match self.page {
      MenuPage::Main => self.reset(),
      page => {
        self.cursor = MAIN_ROWS.iter().position(|p| *p == page).unwrap_or(0);
        self.page = MenuPage::Main;
      }
    }
  }
}

/// Quality rows to offer: the embed's levels, or just `auto` before any are known.
pub fn quality_rows(qualities: &[String]) -> Vec<String> {
  if qualities.is_empty() { vec!["auto".to_string()] } else { qualities.to_vec() }
}

pub fn quality_label(level: &str) -> &str {
  match level {
    "hd2160" => "2160p 4K",
    "hd1440" => "1440p",
    "hd1080" => "1080p",
    "hd720" => "720p",
    "large" => "480p",
    "medium" => "360p",
    "small" => "240p",
    "tiny" => "144p",
    "auto" => "Auto",
    other => other,
  }
}

/// Badge shown next to high-definition levels.
pub fn quality_badge(level: &str) -> Option<&'static str> {
  match level {
    "hd1080" | "hd720" => Some("HD"),
    "hd2160" => Some("4K"),
    _ => None,
  }
}

pub fn speed_label(speed: f64) -> String {
  if speed == 1.0 { "Normal".to_string() } else { format!("{}x", speed) }
}
