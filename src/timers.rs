//! Named timer handles owned by a player session.
//!
//! Each timer is a deadline (plus an optional period for intervals) stored
//! in a fixed slot, so re-arming replaces and cancelling is exhaustive: the
//! session can always clear every handle it owns in one call. Time is passed
//! in explicitly; the event loop feeds `Instant::now()`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
  /// Control-chrome inactivity hide.
  Hide,
  /// Removal of the loading cover after first playback.
  Cover,
  /// Recurring embed metrics poll.
  Poll,
  /// Pending single-tap toggle, waiting out the double-tap window.
  Tap,
  /// Double-tap skip indicator.
  Indicator,
  /// Centre play/pause flash.
  Flash,
}

impl TimerId {
  pub const ALL: [TimerId; 6] =
    [TimerId::Hide, TimerId::Cover, TimerId::Poll, TimerId::Tap, TimerId::Indicator, TimerId::Flash];

  fn slot(self) -> usize {
    self as usize
  }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
  deadline: Instant,
  period: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct Timers {
  slots: [Option<Slot>; TimerId::ALL.len()],
}

impl Timers {
  /// One-shot: fire once at `now + delay`. Replaces any pending deadline.
  pub fn arm(&mut self, id: TimerId, now: Instant, delay: Duration) {
    self.slots[id.slot()] = Some(Slot { deadline: now + delay, period: None });
  }

  /// Interval: fire every `period`, first at `now + period`.
  pub fn every(&mut self, id: TimerId, now: Instant, period: Duration) {
    self.slots[id.slot()] = Some(Slot { deadline: now + period, period: Some(period) });
  }

  pub fn cancel(&mut self, id: TimerId) {
    self.slots[id.slot()] = None;
  }

  pub fn cancel_all(&mut self) {
    for id in TimerId::ALL {
      self.cancel(id);
    }
  }

  pub fn is_armed(&self, id: TimerId) -> bool {
    self.slots[id.slot()].is_some()
  }

  pub fn any_armed(&self) -> bool {
    self.slots.iter().any(Option::is_some)
  }

  /// Earliest pending deadline, for sizing the event loop's wait.
  pub fn next_deadline(&self) -> Option<Instant> {
    self.slots.iter().flatten().map(|s| s.deadline).min()
  }

  /// Timers due at `now`, in deadline order. One-shots are disarmed;
  /// intervals are rescheduled (a late interval fires once, not in a burst).
  pub fn due(&mut self, now: Instant) -> Vec<TimerId> {
    let mut fired: Vec<(Instant, TimerId)> = Vec::new();
    for id in TimerId::ALL {
      let slot = &mut self.slots[id.slot()];
      let Some(s) = *slot else { continue };
      if s.deadline > now {
        continue;
      }
      fired.push((s.deadline, id));
      *slot = s.period.map(|period| {
        let next = s.deadline + period;
        Slot { deadline: if next > now { next } else { now + period }, period: Some(period) }
      });
    }
    fired.sort_by_key(|(deadline, _)| *deadline);
    fired.into_iter().map(|(_, id)| id).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
  }

  #[test]
  fn one_shot_fires_once() {
    let t0 = Instant::now();
    let mut timers = Timers::default();
    timers.arm(TimerId::Hide, t0, ms(2000));
    assert!(timers.due(t0 + ms(1999)).is_empty());
    assert_eq!(timers.due(t0 + ms(2000)), vec![TimerId::Hide]);
    assert!(timers.due(t0 + ms(5000)).is_empty());
    assert!(!timers.is_armed(TimerId::Hide));
  }

  #[test]
  fn rearming_replaces_deadline() {
    let t0 = Instant::now();
    let mut timers = Timers::default();
    timers.arm(TimerId::Hide, t0, ms(2000));
    timers.arm(TimerId::Hide, t0 + ms(1500), ms(2000));
    assert!(timers.due(t0 + ms(2500)).is_empty());
    assert_eq!(timers.due(t0 + ms(3500)), vec![TimerId::Hide]);
  }

  #[test]
  fn interval_reschedules_without_bursting() {
    let t0 = Instant::now();
    let mut timers = Timers::default();
    timers.every(TimerId::Poll, t0, ms(250));
    assert_eq!(timers.due(t0 + ms(250)), vec![TimerId::Poll]);
    assert!(timers.due(t0 + ms(400)).is_empty());
    assert_eq!(timers.due(t0 + ms(500)), vec![TimerId::Poll]);
    // A long stall yields a single tick.
    assert_eq!(timers.due(t0 + ms(5000)), vec![TimerId::Poll]);
    assert!(timers.due(t0 + ms(5100)).is_empty());
    assert!(timers.is_armed(TimerId::Poll));
  }

  #[test]
  fn fired_in_deadline_order() {
    let t0 = Instant::now();
    let mut timers = Timers::default();
    timers.arm(TimerId::Hide, t0, ms(300));
    timers.arm(TimerId::Tap, t0, ms(100));
    timers.arm(TimerId::Flash, t0, ms(200));
    assert_eq!(timers.due(t0 + ms(1000)), vec![TimerId::Tap, TimerId::Flash, TimerId::Hide]);
  }

  #[test]
  fn cancel_all_clears_every_handle() {
    let t0 = Instant::now();
    let mut timers = Timers::default();
    for id in TimerId::ALL {
      timers.arm(id, t0, ms(10));
    }
    timers.every(TimerId::Poll, t0, ms(250));
    assert!(timers.any_armed());
    timers.cancel_all();
    assert!(!timers.any_armed());
    assert_eq!(timers.next_deadline(), None);
    assert!(timers.due(t0 + ms(10_000)).is_empty());
  }

  #[test]
  fn next_deadline_is_earliest() {
    let t0 = Instant::now();
    let mut timers = Timers::default();
    timers.arm(TimerId::Cover, t0, ms(2000));
    timers.every(TimerId::Poll, t0, ms(250));
    assert_eq!(timers.next_deadline(), Some(t0 + ms(250)));
  }
}
