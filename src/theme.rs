use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// Persisted theme preference. Stored as the literal `"dark"` or `"light"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
  #[default]
  Dark,
  Light,
}

impl ThemePreference {
  pub fn as_str(self) -> &'static str {
    match self {
      ThemePreference::Dark => "dark",
      ThemePreference::Light => "light",
    }
  }

  /// Parse one of the two literals; anything else is rejected.
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "dark" => Some(ThemePreference::Dark),
      "light" => Some(ThemePreference::Light),
      _ => None,
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      ThemePreference::Dark => ThemePreference::Light,
      ThemePreference::Light => ThemePreference::Dark,
    }
  }

  pub fn palette(self) -> &'static Theme {
    match self {
      ThemePreference::Dark => &DARK,
      ThemePreference::Light => &LIGHT,
    }
  }
}

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub muted: Color,
  pub border: Color,
  pub accent: Color,
  /// Collections are tinted apart from plain videos.
  pub collection: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub info: Color,
  pub key_fg: Color,
  pub key_bg: Color,
  pub progress: Color,
  pub buffered: Color,
  pub track: Color,
}

pub static DARK: Theme = Theme {
  name: "dark",
  bg: Color::Rgb(17, 24, 39),
  fg: Color::Rgb(243, 244, 246),
  muted: Color::Rgb(107, 114, 128),
  border: Color::Rgb(55, 65, 81),
  accent: Color::Rgb(249, 115, 22),
  collection: Color::Rgb(168, 85, 247),
  highlight_fg: Color::Rgb(17, 24, 39),
  highlight_bg: Color::Rgb(249, 115, 22),
  stripe_bg: Color::Rgb(26, 32, 48),
  status: Color::Rgb(96, 165, 250),
  error: Color::Rgb(248, 113, 113),
  info: Color::Rgb(74, 222, 128),
  key_fg: Color::Rgb(17, 24, 39),
  key_bg: Color::Rgb(156, 163, 175),
  progress: Color::Rgb(239, 68, 68),
  buffered: Color::Rgb(120, 120, 120),
  track: Color::Rgb(60, 60, 60),
};

pub static LIGHT: Theme = Theme {
  name: "light",
  bg: Color::Rgb(245, 246, 250),
  fg: Color::Rgb(26, 26, 46),
  muted: Color::Rgb(115, 115, 130),
  border: Color::Rgb(209, 213, 219),
  accent: Color::Rgb(234, 88, 12),
  collection: Color::Rgb(147, 51, 234),
  highlight_fg: Color::Rgb(255, 255, 255),
  highlight_bg: Color::Rgb(234, 88, 12),
  stripe_bg: Color::Rgb(236, 238, 244),
  status: Color::Rgb(37, 99, 235),
  error: Color::Rgb(220, 38, 38),
  info: Color::Rgb(22, 163, 74),
  key_fg: Color::Rgb(255, 255, 255),
  key_bg: Color::Rgb(75, 85, 99),
  progress: Color::Rgb(239, 68, 68),
  buffered: Color::Rgb(170, 170, 170),
  track: Color::Rgb(210, 210, 210),
};
