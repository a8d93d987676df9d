//! The acting user's own profile and the check-in interval type.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Interval ────────────────────────────────────────────────────────────────

/// The maximum allowed gap between liveness confirmations.
///
/// Always strictly positive. Serialised as whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct CheckInInterval(TimeDelta);

impl CheckInInterval {
  pub fn new(delta: TimeDelta) -> Result<Self> {
    if delta <= TimeDelta::zero() {
      return Err(Error::Validation(
        "check-in interval must be longer than zero".to_owned(),
      ));
    }
    Ok(Self(delta))
  }

  pub fn from_secs(secs: i64) -> Result<Self> {
    let delta = TimeDelta::try_seconds(secs).ok_or_else(|| {
      Error::Validation(format!("check-in interval of {secs}s is out of range"))
    })?;
    Self::new(delta)
  }

  pub fn as_delta(self) -> TimeDelta { self.0 }

  pub fn as_secs(self) -> i64 { self.0.num_seconds() }
}

impl TryFrom<i64> for CheckInInterval {
  type Error = Error;

  fn try_from(secs: i64) -> Result<Self> { Self::from_secs(secs) }
}

impl From<CheckInInterval> for i64 {
  fn from(interval: CheckInInterval) -> i64 { interval.as_secs() }
}

// ─── Self-profile ────────────────────────────────────────────────────────────

/// The signed-in user's own liveness record.
///
/// Mutated only by the owner's check-in and alert actions; peer sync never
/// writes here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfProfile {
  pub user_id:              Uuid,
  pub name:                 String,
  pub check_in_interval:    CheckInInterval,
  pub last_check_in:        Option<DateTime<Utc>>,
  pub alert_active:         bool,
  pub alert_activated_at:   Option<DateTime<Utc>>,
  /// When the most recent alert was disarmed.
  pub alert_deactivated_at: Option<DateTime<Utc>>,
  pub biometric_required:   bool,
}

impl SelfProfile {
  /// A fresh profile that has never checked in.
  pub fn new(user_id: Uuid, name: impl Into<String>, interval: CheckInInterval) -> Self {
    Self {
      user_id,
      name: name.into(),
      check_in_interval: interval,
      last_check_in: None,
      alert_active: false,
      alert_activated_at: None,
      alert_deactivated_at: None,
      biometric_required: false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_and_negative_intervals_are_rejected() {
    assert!(matches!(
      CheckInInterval::from_secs(0),
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      CheckInInterval::new(TimeDelta::seconds(-5)),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn interval_serialises_as_seconds() {
    let interval = CheckInInterval::from_secs(86_400).unwrap();
    assert_eq!(serde_json::to_string(&interval).unwrap(), "86400");

    let back: CheckInInterval = serde_json::from_str("3600").unwrap();
    assert_eq!(back.as_secs(), 3600);
  }

  #[test]
  fn deserialising_a_zero_interval_fails() {
    assert!(serde_json::from_str::<CheckInInterval>("0").is_err());
  }
}
