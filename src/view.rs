//! View-level effects: the few root mutations (scroll lock, active theme)
//! that happen at well-defined lifecycle boundaries instead of ad hoc.

use tracing::debug;

use crate::theme::{Theme, ThemePreference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEffect {
  /// A modal (player overlay, add form) took over; the gallery must not scroll.
  LockScroll,
  /// The modal went away.
  UnlockScroll,
  ApplyTheme(ThemePreference),
}

#[derive(Debug, Default)]
pub struct ViewState {
  scroll_locked: bool,
  theme: ThemePreference,
}

impl ViewState {
  pub fn new(theme: ThemePreference) -> Self {
    Self { scroll_locked: false, theme }
  }

  pub fn apply(&mut self, effect: ViewEffect) {
    debug!(?effect, "view: effect");
    match effect {
      ViewEffect::LockScroll => self.scroll_locked = true,
      ViewEffect::UnlockScroll => self.scroll_locked = false,
      ViewEffect::ApplyTheme(pref) => self.theme = pref,
    }
  }

  pub fn scroll_locked(&self) -> bool {
    self.scroll_locked
  }

  pub fn theme_preference(&self) -> ThemePreference {
    self.theme
  }

  pub fn theme(&self) -> &'static Theme {
    self.theme.palette()
  }
}
