//! Deadline tracking: from `(now, last check-in, interval)` to remaining
//! time, an urgency bucket, and display text.
//!
//! Everything here is a pure function and cheap enough to run every tick.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::profile::CheckInInterval;

/// Overdue spans longer than this collapse to a fixed "long ago" text.
pub const LONG_AGO: TimeDelta = TimeDelta::days(30);

pub const NO_CHECK_IN_TEXT: &str = "No check-in";

const EXPIRED_LONG_AGO_TEXT: &str = "Expired long ago";

// ─── Buckets ─────────────────────────────────────────────────────────────────

/// How close a deadline is, as a fraction of the interval.
///
/// Ordered from most to least urgent so buckets sort naturally.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Urgency {
  /// At or past the deadline.
  Overdue,
  /// Under 20% of the interval left.
  Low,
  /// Under 50% of the interval left.
  Moderate,
  /// More than half the interval left.
  Ample,
}

/// Output of [`status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineStatus {
  /// Signed time until the deadline; negative once overdue. `TimeDelta::MIN`
  /// when there has never been a check-in.
  #[serde(rename = "remaining_secs", with = "secs")]
  pub remaining: TimeDelta,
  pub urgency:   Urgency,
  pub text:      String,
}

impl DeadlineStatus {
  pub fn is_overdue(&self) -> bool { self.urgency == Urgency::Overdue }
}

// ─── Computation ─────────────────────────────────────────────────────────────

/// `interval - (now - last_check_in)`, or `TimeDelta::MIN` without a check-in.
pub fn remaining(
  now: DateTime<Utc>,
  last_check_in: Option<DateTime<Utc>>,
  interval: CheckInInterval,
) -> TimeDelta {
  let Some(last) = last_check_in else {
    return TimeDelta::MIN;
  };
  let elapsed = now.signed_duration_since(last);
  interval
    .as_delta()
    .checked_sub(&elapsed)
    .unwrap_or(if elapsed > TimeDelta::zero() { TimeDelta::MIN } else { TimeDelta::MAX })
}

/// Bucket `remaining` against `interval`. Boundaries belong to the more
/// urgent bucket.
pub fn urgency(remaining: TimeDelta, interval: CheckInInterval) -> Urgency {
  let left = i128::from(remaining.num_milliseconds());
  let whole = i128::from(interval.as_delta().num_milliseconds());

  if left <= 0 {
    Urgency::Overdue
  } else if left * 2 > whole {
    Urgency::Ample
  } else if left * 5 > whole {
    Urgency::Moderate
  } else {
    Urgency::Low
  }
}

/// Full deadline status for one liveness record.
pub fn status(
  now: DateTime<Utc>,
  last_check_in: Option<DateTime<Utc>>,
  interval: CheckInInterval,
) -> DeadlineStatus {
  let remaining = remaining(now, last_check_in, interval);
  let urgency = urgency(remaining, interval);
  let text = match last_check_in {
    None => NO_CHECK_IN_TEXT.to_owned(),
    Some(_) if urgency == Urgency::Overdue => overdue_text(remaining),
    Some(_) => format_span(remaining),
  };
  DeadlineStatus { remaining, urgency, text }
}

/// Serde adapter storing a [`TimeDelta`] as whole signed seconds.
pub mod secs {
  use chrono::TimeDelta;
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn serialize<S: Serializer>(delta: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(delta.num_seconds())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TimeDelta, D::Error> {
    let secs = i64::deserialize(d)?;
    TimeDelta::try_seconds(secs)
      .ok_or_else(|| D::Error::custom(format!("{secs}s is out of range")))
  }
}

// ─── Formatting ──────────────────────────────────────────────────────────────

/// The two largest units among days, hours and minutes, e.g. `2d 5h`,
/// `5h 23m`, `23m`. The smaller unit is dropped when it is zero.
pub fn format_span(span: TimeDelta) -> String {
  let total_minutes = span.num_minutes().max(0);
  let days = total_minutes / (24 * 60);
  let hours = (total_minutes / 60) % 24;
  let minutes = total_minutes % 60;

  match (days, hours, minutes) {
    (0, 0, 0) => "<1m".to_owned(),
    (0, 0, m) => format!("{m}m"),
    (0, h, 0) => format!("{h}h"),
    (0, h, m) => format!("{h}h {m}m"),
    (d, 0, _) => format!("{d}d"),
    (d, h, _) => format!("{d}d {h}h"),
  }
}

/// Time-ago phrase for an elapsed span, e.g. `5h 23m ago` or `just now`.
pub fn format_ago(elapsed: TimeDelta) -> String {
  if elapsed < TimeDelta::minutes(1) {
    "just now".to_owned()
  } else {
    format!("{} ago", format_span(elapsed))
  }
}

/// Text for a non-positive `remaining`.
pub fn overdue_text(remaining: TimeDelta) -> String {
  if remaining < -LONG_AGO {
    return EXPIRED_LONG_AGO_TEXT.to_owned();
  }
  format!("Expired {}", format_ago(-remaining))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  const DAY: i64 = 86_400;

  fn now() -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000, 0).unwrap() }

  fn interval(secs: i64) -> CheckInInterval { CheckInInterval::from_secs(secs).unwrap() }

  fn status_after(elapsed_secs: i64, interval_secs: i64) -> DeadlineStatus {
    let last = now() - TimeDelta::seconds(elapsed_secs);
    status(now(), Some(last), interval(interval_secs))
  }

  // ── Remaining ────────────────────────────────────────────────────────────

  #[test]
  fn remaining_is_interval_minus_elapsed() {
    let last = now() - TimeDelta::seconds(600);
    assert_eq!(remaining(now(), Some(last), interval(3600)), TimeDelta::seconds(3000));
    let last = now() - TimeDelta::seconds(4000);
    assert_eq!(remaining(now(), Some(last), interval(3600)), TimeDelta::seconds(-400));
  }

  #[test]
  fn missing_check_in_is_maximally_overdue() {
    let s = status(now(), None, interval(DAY));
    assert_eq!(s.remaining, TimeDelta::MIN);
    assert_eq!(s.urgency, Urgency::Overdue);
    assert_eq!(s.text, NO_CHECK_IN_TEXT);
  }

  #[test]
  fn future_check_in_stays_ample() {
    let last = now() + TimeDelta::seconds(60);
    let s = status(now(), Some(last), interval(3600));
    assert_eq!(s.urgency, Urgency::Ample);
  }

  // ── Buckets ──────────────────────────────────────────────────────────────

  #[test]
  fn exactly_half_left_is_moderate() {
    assert_eq!(status_after(43_200, DAY).urgency, Urgency::Moderate);
    assert_eq!(status_after(43_199, DAY).urgency, Urgency::Ample);
  }

  #[test]
  fn exactly_a_fifth_left_is_low() {
    // 20% of 1000s is 200s left, i.e. 800s elapsed.
    assert_eq!(status_after(800, 1000).urgency, Urgency::Low);
    assert_eq!(status_after(799, 1000).urgency, Urgency::Moderate);
  }

  #[test]
  fn zero_left_is_overdue() {
    assert_eq!(status_after(1000, 1000).urgency, Urgency::Overdue);
    assert_eq!(status_after(999, 1000).urgency, Urgency::Low);
  }

  #[test]
  fn buckets_order_by_urgency() {
    assert!(Urgency::Overdue < Urgency::Low);
    assert!(Urgency::Low < Urgency::Moderate);
    assert!(Urgency::Moderate < Urgency::Ample);
  }

  // ── Formatting ───────────────────────────────────────────────────────────

  #[test]
  fn span_uses_two_largest_units() {
    assert_eq!(format_span(TimeDelta::seconds(90_000)), "1d 1h");
    assert_eq!(format_span(TimeDelta::seconds(2 * DAY + 5 * 3600 + 120)), "2d 5h");
    assert_eq!(format_span(TimeDelta::seconds(5 * 3600 + 23 * 60 + 59)), "5h 23m");
    assert_eq!(format_span(TimeDelta::seconds(23 * 60)), "23m");
  }

  #[test]
  fn span_drops_zero_smaller_unit() {
    assert_eq!(format_span(TimeDelta::seconds(2 * DAY + 5 * 60)), "2d");
    assert_eq!(format_span(TimeDelta::seconds(3 * 3600)), "3h");
    assert_eq!(format_span(TimeDelta::seconds(30)), "<1m");
  }

  #[test]
  fn active_text_is_the_span() {
    assert_eq!(status_after(DAY - 90_000 + DAY, 2 * DAY).text, "1d 1h");
  }

  #[test]
  fn overdue_text_counts_back() {
    let s = status_after(DAY + 2 * 3600 + 5 * 60, DAY);
    assert_eq!(s.text, "Expired 2h 5m ago");
    assert_eq!(status_after(DAY, DAY).text, "Expired just now");
  }

  #[test]
  fn overdue_past_thirty_days_collapses() {
    let s = status_after(DAY + 31 * DAY, DAY);
    assert_eq!(s.text, "Expired long ago");
    let s = status_after(DAY + 30 * DAY, DAY);
    assert_eq!(s.text, "Expired 30d ago");
  }
}
