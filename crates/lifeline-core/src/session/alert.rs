//! Alert entry points and the timers that drive the gesture ramps.

use std::sync::Arc;

use tokio::{sync::watch, time::Instant};

use super::{Session, lock};
use crate::{
  Error, Result,
  alert::{self, AlertPhase, AlertSignal, TapOutcome},
  capability::{Authenticator, NotificationKind, Notifier, reason},
  store::ProfileStore,
  tasks::TaskPurpose,
};

impl<S, A, N> Session<S, A, N>
where
  S: ProfileStore + 'static,
  A: Authenticator + 'static,
  N: Notifier + 'static,
{
  pub fn alert_phase(&self) -> AlertPhase { lock(&self.alert).phase() }

  /// Watch the alert phase and ramp progress as it changes.
  pub fn subscribe_alert(&self) -> watch::Receiver<AlertPhase> { self.alert_tx.subscribe() }

  pub(super) fn publish_alert(&self) {
    let phase = self.alert_phase();
    self.alert_tx.send_if_modified(|current| {
      let changed = *current != phase;
      *current = phase;
      changed
    });
  }

  /// Sample the machine at the current instant: expire stale taps and move
  /// any running ramp forward.
  pub fn advance_alert(&self) -> Option<AlertSignal> {
    let signal = lock(&self.alert).tick(Instant::now());
    self.publish_alert();
    if signal == Some(AlertSignal::TapsExpired) {
      tracing::debug!("alert taps expired");
    }
    signal
  }

  // ── Arming ────────────────────────────────────────────────────────────────

  /// One tap on the alert button. Arming is allowed only with a profile
  /// whose alert is not already active.
  pub async fn arm_alert_tap(self: &Arc<Self>) -> Result<TapOutcome> {
    let profile = self.profile().await?;
    if profile.alert_active {
      return Ok(TapOutcome::Ignored);
    }

    let outcome = lock(&self.alert).tap(Instant::now());
    self.publish_alert();

    match outcome {
      TapOutcome::Counted { taps, .. } => {
        tracing::debug!(taps, "alert tap counted");
        self.spawn_tap_reset();
      }
      TapOutcome::ArmingStarted => {
        tracing::info!("alert arming started");
        self.tasks.cancel(TaskPurpose::TapReset);
        self.spawn_arming_ramp();
      }
      TapOutcome::Ignored => {}
    }
    Ok(outcome)
  }

  /// Activate the alert once the arming ramp has reached 100%.
  ///
  /// Returns `Ok(true)` only for the call that performed the activation;
  /// every other call, including re-entrant ones while already active, is
  /// a no-op. Activation is never gated on biometrics.
  pub async fn arm_alert_hold_complete(&self) -> Result<bool> {
    let claimed = {
      let mut machine = lock(&self.alert);
      machine.tick(Instant::now());
      machine.claim_activation()
    };
    if !claimed {
      return Ok(false);
    }

    let result = self.activate().await;
    lock(&self.alert).settle_activation(matches!(result, Ok(true)));
    self.publish_alert();
    result
  }

  async fn activate(&self) -> Result<bool> {
    let write = self.writes.lock().await;
    let mut profile = self.profile().await?;
    if profile.alert_active {
      return Ok(false);
    }

    let now = self.now();
    profile.alert_active = true;
    profile.alert_activated_at = Some(now);
    let name = profile.name.clone();
    self.save_profile(profile).await?;
    drop(write);
    tracing::info!(at = %now, "alert activated");

    self
      .notify_responders(
        NotificationKind::AlertActivated,
        &format!("{name} sent out an alert"),
        "They may need help. Try to reach them now.",
      )
      .await;
    Ok(true)
  }

  // ── Disarming ─────────────────────────────────────────────────────────────

  /// Press and hold on an active alert. A no-op unless the persisted alert
  /// is active.
  pub async fn begin_disarm_hold(self: &Arc<Self>) -> Result<bool> {
    let profile = self.profile().await?;
    if !profile.alert_active {
      return Ok(false);
    }

    let started = lock(&self.alert).hold_start(Instant::now());
    self.publish_alert();
    if started {
      self.spawn_disarm_ramp();
    }
    Ok(started)
  }

  /// The hold was released early or interrupted by a drag. Progress resets
  /// and nothing is persisted.
  pub fn release_disarm_hold(&self) -> bool {
    self.tasks.cancel(TaskPurpose::DisarmAnimation);
    let released = lock(&self.alert).hold_release();
    self.publish_alert();
    if released {
      tracing::debug!("disarm hold released");
    }
    released
  }

  /// Deactivate the alert once the hold has completed, after biometric
  /// confirmation when the profile requires it.
  ///
  /// Returns `Ok(true)` only for the call that performed the disarm. On a
  /// biometric or store failure the alert stays active.
  pub async fn disarm_alert_hold_complete(&self) -> Result<bool> {
    let claimed = {
      let mut machine = lock(&self.alert);
      machine.tick(Instant::now());
      machine.claim_disarm()
    };
    if !claimed {
      return Ok(false);
    }

    let result = self.deactivate().await;
    lock(&self.alert).settle_disarm(Instant::now(), matches!(result, Ok(true)));
    self.publish_alert();
    result
  }

  async fn deactivate(&self) -> Result<bool> {
    let profile = self.profile().await?;
    if !profile.alert_active {
      return Ok(false);
    }

    // Authenticate outside the write guard; the profile is read again under it.
    if profile.biometric_required {
      self.auth.authenticate(reason::DEACTIVATE_ALERT).await.map_err(|failure| {
        tracing::info!(%failure, "alert deactivation not authenticated");
        Error::Biometric(failure)
      })?;
    }

    let write = self.writes.lock().await;
    let mut profile = self.profile().await?;
    if !profile.alert_active {
      return Ok(false);
    }

    let now = self.now();
    profile.alert_active = false;
    profile.alert_deactivated_at = Some(now);
    let name = profile.name.clone();
    self.save_profile(profile).await?;
    drop(write);
    tracing::info!(at = %now, "alert deactivated");

    self
      .notify_responders(
        NotificationKind::AlertDeactivated,
        &format!("{name} is safe"),
        "They cancelled their alert.",
      )
      .await;
    Ok(true)
  }

  /// Best effort: a responder that cannot be reached is logged and skipped.
  async fn notify_responders(&self, kind: NotificationKind, title: &str, body: &str) {
    let peers = match self.peers().await {
      Ok(peers) => peers,
      Err(err) => {
        tracing::warn!(error = %err, %kind, "could not list responders to notify");
        return;
      }
    };

    for peer in peers.iter().filter(|p| p.is_responder()) {
      if let Err(err) = self.notifier.notify_peer(peer.peer_id, kind, title, body).await {
        tracing::warn!(peer_id = %peer.peer_id, error = %err, %kind, "peer notification failed");
      }
    }
  }

  // ── Drivers ───────────────────────────────────────────────────────────────

  fn spawn_tap_reset(self: &Arc<Self>) {
    if !self.drivers {
      return;
    }
    let this = Arc::clone(self);
    self.tasks.start(TaskPurpose::TapReset, async move {
      tokio::time::sleep(alert::TAP_RESET).await;
      this.advance_alert();
    });
  }

  fn spawn_arming_ramp(self: &Arc<Self>) {
    if !self.drivers {
      return;
    }
    let this = Arc::clone(self);
    let frame = self.frame_interval;
    self.tasks.start(TaskPurpose::ArmAnimation, async move {
      let mut ticker = tokio::time::interval(frame);
      loop {
        ticker.tick().await;
        this.advance_alert();
        match this.alert_phase() {
          AlertPhase::Arming { progress } if progress >= 1.0 => break,
          AlertPhase::Arming { .. } => {}
          _ => return,
        }
      }

      // Detached, so cancelling the ramp never interrupts the side effect.
      tokio::spawn(async move {
        if let Err(err) = this.arm_alert_hold_complete().await {
          tracing::warn!(error = %err, "alert activation failed");
          this.notifier.notify("Alert not sent", &err.notice()).await;
        }
      });
    });
  }

  fn spawn_disarm_ramp(self: &Arc<Self>) {
    if !self.drivers {
      return;
    }
    let this = Arc::clone(self);
    let frame = self.frame_interval;
    self.tasks.start(TaskPurpose::DisarmAnimation, async move {
      let mut ticker = tokio::time::interval(frame);
      loop {
        ticker.tick().await;
        this.advance_alert();
        match this.alert_phase() {
          AlertPhase::Disarming { progress } if progress >= 1.0 => break,
          AlertPhase::Disarming { .. } => {}
          _ => return,
        }
      }

      tokio::spawn(async move {
        if let Err(err) = this.disarm_alert_hold_complete().await {
          tracing::warn!(error = %err, "alert deactivation failed");
          this.notifier.notify("Alert still active", &err.notice()).await;
        }
      });
    });
  }
}
