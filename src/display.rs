use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Direct,
  Ascii,
}

/// How thumbnails are drawn into terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  Ascii,
  Direct,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ASCII",
      DisplayMode::Direct => "Half-block",
    }
  }

  /// Name stored in `prefs.toml`.
  pub fn config_name(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ascii",
      DisplayMode::Direct => "direct",
    }
  }

  pub fn from_config(s: &str) -> Option<Self> {
    match s.trim().to_lowercase().as_str() {
      "ascii" => Some(DisplayMode::Ascii),
      "direct" | "half-block" | "halfblock" => Some(DisplayMode::Direct),
      _ => None,
    }
  }

  pub fn next(self) -> Self {
    match self {
      DisplayMode::Ascii => DisplayMode::Direct,
      DisplayMode::Direct => DisplayMode::Ascii,
    }
  }

  /// Image pixel rows per terminal row.
  pub fn rows_per_cell(self) -> u32 {
    match self {
      DisplayMode::Direct => 2,
      DisplayMode::Ascii => 1,
    }
  }
}

/// Detect the best display mode the terminal supports.
///
/// - Direct: `COLORTERM` is `truecolor` or `24bit`, or a terminal known to
///   render 24-bit colour (kitty, WezTerm, ghostty, iTerm)
/// - Ascii: fallback
pub fn detect_display_mode() -> DisplayMode {
  let colorterm = std::env::var("COLORTERM").unwrap_or_default().to_lowercase();
  let term = std::env::var("TERM").unwrap_or_default();
  let term_program = std::env::var("TERM_PROGRAM").unwrap_or_default().to_lowercase();
  classify(&colorterm, &term, &term_program)
}

fn classify(colorterm: &str, term: &str, term_program: &str) -> DisplayMode {
  if colorterm == "truecolor" || colorterm == "24bit" {
    return DisplayMode::Direct;
  }
  if term == "xterm-kitty" || matches!(term_program, "kitty" | "wezterm" | "ghostty" | "iterm.app") {
    return DisplayMode::Direct;
  }
  DisplayMode::Ascii
}

/// CLI flag first, then the saved preference, then detection.
pub fn resolve_display_mode(cli: CliDisplayMode, saved: Option<&str>) -> DisplayMode {
  match cli {
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
    CliDisplayMode::Auto => saved.and_then(DisplayMode::from_config).unwrap_or_else(detect_display_mode),
  }
}
