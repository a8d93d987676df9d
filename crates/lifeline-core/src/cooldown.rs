//! Minimum spacing between consecutive check-ins.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

/// Check-ins closer together than this are rejected.
pub const COOLDOWN: TimeDelta = TimeDelta::seconds(300);

/// A check-in attempt refused because the previous one was too recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownRejection {
  /// Time until the next check-in is accepted; always at least one second.
  pub remaining: TimeDelta,
}

impl CooldownRejection {
  /// `Xm Ys`, or `Ys` under a minute.
  pub fn remaining_text(&self) -> String {
    let secs = self.remaining.num_seconds().max(0);
    match (secs / 60, secs % 60) {
      (0, s) => format!("{s}s"),
      (m, s) => format!("{m}m {s}s"),
    }
  }
}

impl fmt::Display for CooldownRejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "next check-in allowed in {}", self.remaining_text())
  }
}

/// `Ok` when a check-in at `now` is allowed.
pub fn check(
  now: DateTime<Utc>,
  last_check_in: Option<DateTime<Utc>>,
) -> Result<(), CooldownRejection> {
  let Some(last) = last_check_in else {
    return Ok(());
  };
  let elapsed = now.signed_duration_since(last);
  if elapsed >= COOLDOWN {
    return Ok(());
  }

  // Round partial seconds up so the notice never reads "0s".
  let left = COOLDOWN - elapsed;
  let whole = TimeDelta::seconds(left.num_seconds());
  let remaining = if whole < left { whole + TimeDelta::seconds(1) } else { whole };
  Err(CooldownRejection { remaining })
}

pub fn can_check_in(now: DateTime<Utc>, last_check_in: Option<DateTime<Utc>>) -> bool {
  check(now, last_check_in).is_ok()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn t0() -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000, 0).unwrap() }

  #[test]
  fn first_check_in_is_always_allowed() {
    assert!(can_check_in(t0(), None));
  }

  #[test]
  fn one_second_short_is_rejected() {
    let err = check(t0() + TimeDelta::seconds(299), Some(t0())).unwrap_err();
    assert_eq!(err.remaining, TimeDelta::seconds(1));
    assert_eq!(err.remaining_text(), "1s");
  }

  #[test]
  fn exactly_at_window_is_accepted() {
    assert!(check(t0() + TimeDelta::seconds(300), Some(t0())).is_ok());
  }

  #[test]
  fn remaining_text_includes_minutes() {
    let err = check(t0() + TimeDelta::seconds(45), Some(t0())).unwrap_err();
    assert_eq!(err.remaining_text(), "4m 15s");
    let err = check(t0(), Some(t0())).unwrap_err();
    assert_eq!(err.remaining_text(), "5m 0s");
  }

  #[test]
  fn partial_seconds_round_up() {
    let now = t0() + TimeDelta::milliseconds(299_500);
    let err = check(now, Some(t0())).unwrap_err();
    assert_eq!(err.remaining_text(), "1s");
  }

  #[test]
  fn clock_skew_keeps_rejecting() {
    let err = check(t0() - TimeDelta::seconds(10), Some(t0())).unwrap_err();
    assert_eq!(err.remaining, TimeDelta::seconds(310));
  }
}
