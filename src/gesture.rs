//! Tap / double-tap detection on the video surface.

use std::time::{Duration, Instant};

/// Half of the video surface a tap landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
  Left,
  Right,
}

impl Side {
  /// `x` is the tap position as a fraction of the surface width.
  pub fn from_fraction(x: f64) -> Self {
    if x < 0.5 { Side::Left } else { Side::Right }
  }

  /// Skip direction: back on the left, forward on the right.
  pub fn sign(self) -> f64 {
    match self {
      Side::Left => -1.0,
      Side::Right => 1.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
  /// First tap of a possible pair; toggle only if no partner arrives in time.
  Pending,
  /// Second tap on the same half within the window.
  Double(Side),
}

#[derive(Debug)]
pub struct TapTracker {
  window: Duration,
  last: Option<(Instant, Side)>,
}

impl TapTracker {
  pub fn new(window: Duration) -> Self {
    Self { window, last: None }
  }

  /// A tap on a different half, or after the window, starts a new pending
  /// tap and supersedes any previous one.
  pub fn register(&mut self, side: Side, now: Instant) -> TapOutcome {
    if let Some((at, last_side)) = self.last
      && last_side == side
      && now.saturating_duration_since(at) < self.window
    {
      self.last = None;
      return TapOutcome::Double(side);
    }
    self.last = Some((now, side));
    TapOutcome::Pending
  }

  /// Consume the pending tap when its window expires. `true` means the
  /// single-tap action should run.
  pub fn take_pending(&mut self) -> bool {
    self.last.take().is_some()
  }

  pub fn reset(&mut self) {
    self.last = None;
  }
}
