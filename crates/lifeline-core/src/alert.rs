//! Emergency-alert gesture state machine.
//!
//! The machine is pure: every method takes the current monotonic instant and
//! nothing here sleeps or spawns. Ramps are functions of elapsed time, so any
//! driver (a frame timer, a test, a resumed view) can sample them.
//!
//! ## State transitions
//!
//! ```text
//!          tap                 5th quick tap            ramp done + persisted
//!  Idle ─────────► Accumulating ─────────────► Arming ─────────────────────► Active
//!   ▲                  │ 2s without a tap                                      │  ▲
//!   └──────────────────┘                                           hold start │  │ release
//!   ▲                                                                          ▼  │
//!   └──────────────────────── hold done + authenticated + persisted ──── Disarming
//! ```
//!
//! Side effects (persisting, notifying) belong to the caller. The machine
//! reports when a ramp has finished, the caller claims the transition with
//! [`AlertMachine::claim_activation`] or [`AlertMachine::claim_disarm`], does
//! the work, and settles it. A claim succeeds at most once per ramp.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Maximum gap between taps that still counts toward arming.
pub const TAP_WINDOW: Duration = Duration::from_secs(1);
/// Accumulated taps are forgotten after this long without another tap.
pub const TAP_RESET: Duration = Duration::from_secs(2);
pub const TAPS_TO_ARM: u8 = 5;
pub const TAP_PROGRESS_STEP: f64 = 0.15;

pub const ARMING_START: f64 = 0.60;
pub const ARMING_DURATION: Duration = Duration::from_millis(600);

pub const HOLD_DURATION: Duration = Duration::from_secs(3);
pub const DISARM_START: f64 = 0.80;

/// Taps are ignored for this long after a successful disarm.
pub const LOCKOUT: Duration = Duration::from_millis(500);

// ─── Ramps ───────────────────────────────────────────────────────────────────

fn ramp(start: f64, elapsed: Duration, total: Duration) -> f64 {
  if elapsed >= total {
    return 1.0;
  }
  let fraction = elapsed.as_secs_f64() / total.as_secs_f64();
  start + (1.0 - start) * fraction
}

/// Arming progress: 0.60 → 1.00 over [`ARMING_DURATION`].
pub fn arming_progress(elapsed: Duration) -> f64 {
  ramp(ARMING_START, elapsed, ARMING_DURATION)
}

/// Disarm progress: jumps to 0.80 at hold start, then 0.80 → 1.00 over
/// [`HOLD_DURATION`].
pub fn disarm_progress(elapsed: Duration) -> f64 {
  ramp(DISARM_START, elapsed, HOLD_DURATION)
}

// ─── Phases and outcomes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AlertPhase {
  Idle,
  Accumulating { taps: u8, progress: f64 },
  Arming { progress: f64 },
  Active,
  Disarming { progress: f64 },
}

impl AlertPhase {
  pub fn progress(&self) -> f64 {
    match *self {
      AlertPhase::Idle | AlertPhase::Active => 0.0,
      AlertPhase::Accumulating { progress, .. }
      | AlertPhase::Arming { progress }
      | AlertPhase::Disarming { progress } => progress,
    }
  }

  /// Idle and Active are the resting phases; the rest are mid-gesture.
  pub fn is_resting(&self) -> bool {
    matches!(self, AlertPhase::Idle | AlertPhase::Active)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
  /// The tap had no effect (locked out, arming, or already active).
  Ignored,
  Counted { taps: u8, progress: f64 },
  /// The fifth quick tap; the arming ramp has begun.
  ArmingStarted,
}

/// Reported by [`AlertMachine::tick`], each at most once per episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSignal {
  TapsExpired,
  ArmingComplete,
  HoldComplete,
}

// ─── Machine ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AlertMachine {
  phase:         AlertPhase,
  last_tap:      Option<Instant>,
  ramp_started:  Option<Instant>,
  /// The current ramp's completion has been reported.
  signalled:     bool,
  /// A caller has claimed the transition and is doing the side effect.
  settling:      bool,
  lockout_until: Option<Instant>,
}

impl Default for AlertMachine {
  fn default() -> Self { Self::new() }
}

impl AlertMachine {
  pub fn new() -> Self {
    Self {
      phase:         AlertPhase::Idle,
      last_tap:      None,
      ramp_started:  None,
      signalled:     false,
      settling:      false,
      lockout_until: None,
    }
  }

  pub fn phase(&self) -> AlertPhase { self.phase }

  pub fn progress(&self) -> f64 { self.phase.progress() }

  pub fn is_locked_out(&self, now: Instant) -> bool {
    self.lockout_until.is_some_and(|until| now < until)
  }

  /// Align a resting machine with the persisted `alert_active` flag.
  /// Mid-gesture phases are left alone.
  pub fn sync_active(&mut self, alert_active: bool) {
    match self.phase {
      AlertPhase::Idle | AlertPhase::Accumulating { .. } if alert_active => {
        self.enter(AlertPhase::Active);
      }
      AlertPhase::Active if !alert_active => self.enter(AlertPhase::Idle),
      _ => {}
    }
  }

  /// Drop all gesture state, e.g. when the session ends.
  pub fn reset(&mut self) { *self = Self::new(); }

  // ── Arming ────────────────────────────────────────────────────────────────

  pub fn tap(&mut self, now: Instant) -> TapOutcome {
    if self.is_locked_out(now) {
      return TapOutcome::Ignored;
    }

    let taps = match self.phase {
      AlertPhase::Idle => 1,
      AlertPhase::Accumulating { taps, .. } => {
        let quick = self
          .last_tap
          .is_some_and(|last| now.saturating_duration_since(last) <= TAP_WINDOW);
        if quick { taps + 1 } else { 1 }
      }
      AlertPhase::Arming { .. } | AlertPhase::Active | AlertPhase::Disarming { .. } => {
        return TapOutcome::Ignored;
      }
    };

    if taps >= TAPS_TO_ARM {
      self.enter(AlertPhase::Arming { progress: ARMING_START });
      self.ramp_started = Some(now);
      return TapOutcome::ArmingStarted;
    }

    let progress = f64::from(taps) * TAP_PROGRESS_STEP;
    self.phase = AlertPhase::Accumulating { taps, progress };
    self.last_tap = Some(now);
    TapOutcome::Counted { taps, progress }
  }

  /// Claim the finished arming ramp. Returns `true` exactly once per ramp.
  pub fn claim_activation(&mut self) -> bool {
    match self.phase {
      AlertPhase::Arming { progress } if progress >= 1.0 && !self.settling => {
        self.settling = true;
        true
      }
      _ => false,
    }
  }

  /// Finish a claimed activation. On failure the machine falls back to Idle.
  pub fn settle_activation(&mut self, persisted: bool) {
    if !self.settling || !matches!(self.phase, AlertPhase::Arming { .. }) {
      return;
    }
    self.enter(if persisted { AlertPhase::Active } else { AlertPhase::Idle });
  }

  // ── Disarming ─────────────────────────────────────────────────────────────

  /// Start a hold-to-disarm. Only valid while Active.
  pub fn hold_start(&mut self, now: Instant) -> bool {
    if self.phase != AlertPhase::Active {
      return false;
    }
    self.enter(AlertPhase::Disarming { progress: DISARM_START });
    self.ramp_started = Some(now);
    true
  }

  /// Abort a hold that was released early or interrupted.
  pub fn hold_release(&mut self) -> bool {
    if !matches!(self.phase, AlertPhase::Disarming { .. }) || self.settling {
      return false;
    }
    self.enter(AlertPhase::Active);
    true
  }

  /// Claim the finished hold. Returns `true` exactly once per hold.
  pub fn claim_disarm(&mut self) -> bool {
    match self.phase {
      AlertPhase::Disarming { progress } if progress >= 1.0 && !self.settling => {
        self.settling = true;
        true
      }
      _ => false,
    }
  }

  /// Finish a claimed disarm. Success starts the tap lockout; failure
  /// returns to Active with nothing changed.
  pub fn settle_disarm(&mut self, now: Instant, disarmed: bool) {
    if !self.settling || !matches!(self.phase, AlertPhase::Disarming { .. }) {
      return;
    }
    if disarmed {
      self.enter(AlertPhase::Idle);
      self.lockout_until = Some(now + LOCKOUT);
    } else {
      self.enter(AlertPhase::Active);
    }
  }

  // ── Time ──────────────────────────────────────────────────────────────────

  /// Advance time-driven state: tap expiry and ramp progress.
  pub fn tick(&mut self, now: Instant) -> Option<AlertSignal> {
    if !self.is_locked_out(now) {
      self.lockout_until = None;
    }

    let elapsed = self
      .ramp_started
      .map(|started| now.saturating_duration_since(started))
      .unwrap_or_default();

    match self.phase {
      AlertPhase::Accumulating { .. } => {
        let idle_for = self
          .last_tap
          .map(|last| now.saturating_duration_since(last))
          .unwrap_or(TAP_RESET);
        if idle_for >= TAP_RESET {
          self.enter(AlertPhase::Idle);
          return Some(AlertSignal::TapsExpired);
        }
        None
      }
      AlertPhase::Arming { .. } if !self.settling => {
        let progress = arming_progress(elapsed);
        self.phase = AlertPhase::Arming { progress };
        self.signal_once(progress, AlertSignal::ArmingComplete)
      }
      AlertPhase::Disarming { .. } if !self.settling => {
        let progress = disarm_progress(elapsed);
        self.phase = AlertPhase::Disarming { progress };
        self.signal_once(progress, AlertSignal::HoldComplete)
      }
      _ => None,
    }
  }

  fn signal_once(&mut self, progress: f64, signal: AlertSignal) -> Option<AlertSignal> {
    if progress >= 1.0 && !self.signalled {
      self.signalled = true;
      Some(signal)
    } else {
      None
    }
  }

  fn enter(&mut self, phase: AlertPhase) {
    self.phase = phase;
    self.last_tap = None;
    self.ramp_started = None;
    self.signalled = false;
    self.settling = false;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn approx(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

  fn ms(n: u64) -> Duration { Duration::from_millis(n) }

  /// Five taps 200ms apart, starting at `t0`. Returns the time of the last tap.
  fn arm(machine: &mut AlertMachine, t0: Instant) -> Instant {
    for i in 0..5 {
      machine.tap(t0 + ms(200 * i));
    }
    t0 + ms(800)
  }

  fn activate(machine: &mut AlertMachine, t0: Instant) -> Instant {
    let t = arm(machine, t0) + ARMING_DURATION;
    assert_eq!(machine.tick(t), Some(AlertSignal::ArmingComplete));
    assert!(machine.claim_activation());
    machine.settle_activation(true);
    t
  }

  // ── Ramps ────────────────────────────────────────────────────────────────

  #[test]
  fn arming_ramp_is_monotonic_and_ends_at_one() {
    assert!(approx(arming_progress(Duration::ZERO), 0.60));
    assert!(approx(arming_progress(ms(300)), 0.80));
    assert_eq!(arming_progress(ARMING_DURATION), 1.0);
    assert_eq!(arming_progress(ms(5_000)), 1.0);

    let samples: Vec<f64> = (0..=36).map(|frame| arming_progress(ms(frame * 17))).collect();
    assert!(samples.windows(2).all(|w| w[0] <= w[1]));
  }

  #[test]
  fn disarm_ramp_starts_at_eighty_percent() {
    assert!(approx(disarm_progress(Duration::ZERO), 0.80));
    assert!(approx(disarm_progress(ms(1_500)), 0.90));
    assert_eq!(disarm_progress(HOLD_DURATION), 1.0);
  }

  // ── Tapping ──────────────────────────────────────────────────────────────

  #[test]
  fn four_quick_taps_accumulate_progress() {
    let mut m = AlertMachine::new();
    let t0 = Instant::now();
    let expected = [0.15, 0.30, 0.45, 0.60];
    for (i, want) in expected.iter().enumerate() {
      let TapOutcome::Counted { taps, progress } = m.tap(t0 + ms(300 * i as u64)) else {
        panic!("tap {i} should count");
      };
      assert_eq!(taps as usize, i + 1);
      assert!(approx(progress, *want), "tap {i}: {progress}");
    }
  }

  #[test]
  fn fifth_quick_tap_starts_arming() {
    let mut m = AlertMachine::new();
    let t0 = Instant::now();
    for i in 0..4 {
      m.tap(t0 + ms(100 * i));
    }
    assert_eq!(m.tap(t0 + ms(400)), TapOutcome::ArmingStarted);
    assert_eq!(m.phase(), AlertPhase::Arming { progress: ARMING_START });
  }

  #[test]
  fn slow_tap_restarts_the_count() {
    let mut m = AlertMachine::new();
    let t0 = Instant::now();
    m.tap(t0);
    m.tap(t0 + ms(500));
    let outcome = m.tap(t0 + ms(1_800));
    assert!(matches!(outcome, TapOutcome::Counted { taps: 1, .. }));
  }

  #[test]
  fn taps_expire_after_two_seconds() {
    let mut m = AlertMachine::new();
    let t0 = Instant::now();
    m.tap(t0);
    m.tap(t0 + ms(200));
    assert_eq!(m.tick(t0 + ms(2_100)), None);
    assert_eq!(m.tick(t0 + ms(2_200)), Some(AlertSignal::TapsExpired));
    assert_eq!(m.phase(), AlertPhase::Idle);
    assert_eq!(m.progress(), 0.0);
  }

  // ── Arming ───────────────────────────────────────────────────────────────

  #[test]
  fn arming_completes_once() {
    let mut m = AlertMachine::new();
    let t0 = Instant::now();
    let last = arm(&mut m, t0);

    assert_eq!(m.tick(last + ms(300)), None);
    assert!(!m.claim_activation());
    assert_eq!(m.tick(last + ARMING_DURATION), Some(AlertSignal::ArmingComplete));
    assert_eq!(m.progress(), 1.0);
    assert_eq!(m.tick(last + ms(900)), None);

    assert!(m.claim_activation());
    assert!(!m.claim_activation());
    m.settle_activation(true);
    assert_eq!(m.phase(), AlertPhase::Active);
  }

  #[test]
  fn failed_activation_returns_to_idle() {
    let mut m = AlertMachine::new();
    let last = arm(&mut m, Instant::now());
    m.tick(last + ARMING_DURATION);
    assert!(m.claim_activation());
    m.settle_activation(false);
    assert_eq!(m.phase(), AlertPhase::Idle);
  }

  #[test]
  fn taps_while_active_are_ignored() {
    let mut m = AlertMachine::new();
    let t = activate(&mut m, Instant::now());
    assert_eq!(m.tap(t + ms(100)), TapOutcome::Ignored);
    assert!(!m.claim_activation());
    assert_eq!(m.phase(), AlertPhase::Active);
  }

  // ── Disarming ────────────────────────────────────────────────────────────

  #[test]
  fn hold_needs_an_active_alert() {
    let mut m = AlertMachine::new();
    assert!(!m.hold_start(Instant::now()));
    assert!(!m.claim_disarm());
    assert_eq!(m.phase(), AlertPhase::Idle);
  }

  #[test]
  fn hold_jumps_to_eighty_percent_then_completes() {
    let mut m = AlertMachine::new();
    let t = activate(&mut m, Instant::now());

    assert!(m.hold_start(t));
    assert!(approx(m.progress(), DISARM_START));
    m.tick(t + ms(1_500));
    assert!(approx(m.progress(), 0.90));
    assert_eq!(m.tick(t + HOLD_DURATION), Some(AlertSignal::HoldComplete));

    assert!(m.claim_disarm());
    m.settle_disarm(t + HOLD_DURATION, true);
    assert_eq!(m.phase(), AlertPhase::Idle);
  }

  #[test]
  fn early_release_aborts_with_progress_reset() {
    let mut m = AlertMachine::new();
    let t = activate(&mut m, Instant::now());
    m.hold_start(t);
    m.tick(t + ms(1_000));
    assert!(m.hold_release());
    assert_eq!(m.phase(), AlertPhase::Active);
    assert_eq!(m.progress(), 0.0);
    assert!(!m.claim_disarm());
  }

  #[test]
  fn failed_disarm_stays_active() {
    let mut m = AlertMachine::new();
    let t = activate(&mut m, Instant::now());
    m.hold_start(t);
    m.tick(t + HOLD_DURATION);
    assert!(m.claim_disarm());
    assert!(!m.hold_release(), "claimed hold cannot be released");
    m.settle_disarm(t + HOLD_DURATION, false);
    assert_eq!(m.phase(), AlertPhase::Active);
  }

  #[test]
  fn lockout_swallows_taps_after_disarm() {
    let mut m = AlertMachine::new();
    let t = activate(&mut m, Instant::now());
    m.hold_start(t);
    let done = t + HOLD_DURATION;
    m.tick(done);
    m.claim_disarm();
    m.settle_disarm(done, true);

    assert_eq!(m.tap(done + ms(100)), TapOutcome::Ignored);
    assert_eq!(m.tap(done + ms(499)), TapOutcome::Ignored);
    assert!(matches!(m.tap(done + LOCKOUT), TapOutcome::Counted { taps: 1, .. }));
  }

  // ── Sync ─────────────────────────────────────────────────────────────────

  #[test]
  fn sync_follows_persisted_flag_only_at_rest() {
    let mut m = AlertMachine::new();
    m.sync_active(true);
    assert_eq!(m.phase(), AlertPhase::Active);
    m.sync_active(false);
    assert_eq!(m.phase(), AlertPhase::Idle);

    let last = arm(&mut m, Instant::now());
    m.sync_active(false);
    m.tick(last + ms(100));
    assert!(matches!(m.phase(), AlertPhase::Arming { .. }));
  }
}
