//! [`Session`]: the per-user service every entry point goes through.
//!
//! One session owns the store handle, the device capabilities, the alert
//! machine and the task registry for a signed-in user. Nothing is global;
//! front ends hold the session in an `Arc` and call into it.
//!
//! State changes are confirm-then-apply: a check-in, an alert activation or
//! a disarm becomes visible only after the store has accepted the write.
//! Every read-modify-write of a stored record runs under the session's write
//! guard, so two mutators never write back each other's stale copy.

mod alert;
mod ping;


pub use ping::{CheckInAttempt, RespondFailure, RespondReport, RespondStage};

use std::{
  sync::{
    Arc, Mutex, MutexGuard, PoisonError, Weak,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
  Error, Result,
  alert::{AlertMachine, AlertPhase},
  capability::{Authenticator, Notifier},
  clock::{Clock, SystemClock},
  cooldown,
  deadline::{self, DeadlineStatus},
  peer::{Peer, Role},
  profile::{CheckInInterval, SelfProfile},
  status::{self, PeerStatus, SortMode},
  store::{ProfileStore, StoreError},
  tasks::{TaskPurpose, TaskRegistry},
};

/// Sampling cadence for the arming and disarming ramps.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

pub const DISPLAY_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// The user's own status, as shown on the main screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfStatus {
  pub deadline:      DeadlineStatus,
  pub alert_active:  bool,
  pub alert:         AlertPhase,
  /// Present while a check-in would be rejected, e.g. `4m 12s`.
  pub cooldown:      Option<String>,
  pub checking_in:   bool,
  /// Responders waiting for the user to answer a ping.
  pub pending_pings: usize,
}

/// Result of a successful check-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInReceipt {
  pub at:       DateTime<Utc>,
  pub deadline: DeadlineStatus,
}

// ─── In-flight flags ─────────────────────────────────────────────────────────

/// Raises an in-flight counter for its lifetime, so every exit path resets it.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
  fn enter(counter: &'a AtomicUsize) -> Self {
    counter.fetch_add(1, Ordering::SeqCst);
    Self(counter)
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) { self.0.fetch_sub(1, Ordering::SeqCst); }
}

// ─── Session ─────────────────────────────────────────────────────────────────

pub struct Session<S, A, N> {
  store:          S,
  auth:           A,
  notifier:       N,
  clock:          Arc<dyn Clock>,
  user_id:        Mutex<Option<Uuid>>,
  alert:          Mutex<AlertMachine>,
  alert_tx:       watch::Sender<AlertPhase>,
  /// Held from the read through the write of any self-profile or peer
  /// mutation.
  writes:         tokio::sync::Mutex<()>,
  tasks:          TaskRegistry,
  sort_mode:      Mutex<SortMode>,
  checking_in:    AtomicUsize,
  responding:     AtomicUsize,
  frame_interval: Duration,
  /// Whether gesture timers are spawned automatically. When off, the
  /// caller samples the machine through [`Session::advance_alert`].
  drivers:        bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A store failure while touching `peer_id`: a missing record means the peer
/// was unpaired, anything else is a network failure.
fn peer_error<E: StoreError>(peer_id: Uuid) -> impl FnOnce(E) -> Error {
  move |err| {
    if err.is_not_found() {
      Error::PeerNotFound(peer_id)
    } else {
      Error::network(err)
    }
  }
}

impl<S, A, N> Session<S, A, N>
where
  S: ProfileStore + 'static,
  A: Authenticator + 'static,
  N: Notifier + 'static,
{
  pub fn new(store: S, auth: A, notifier: N) -> Self {
    let (alert_tx, _) = watch::channel(AlertPhase::Idle);
    Self {
      store,
      auth,
      notifier,
      clock: Arc::new(SystemClock),
      user_id: Mutex::new(None),
      alert: Mutex::new(AlertMachine::new()),
      alert_tx,
      writes: tokio::sync::Mutex::new(()),
      tasks: TaskRegistry::new(),
      sort_mode: Mutex::new(SortMode::default()),
      checking_in: AtomicUsize::new(0),
      responding: AtomicUsize::new(0),
      frame_interval: DEFAULT_FRAME_INTERVAL,
      drivers: true,
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
    self.frame_interval = frame_interval;
    self
  }

  /// Leave gesture timing to the caller instead of spawning timers.
  pub fn without_drivers(mut self) -> Self {
    self.drivers = false;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub(crate) fn now(&self) -> DateTime<Utc> { self.clock.now() }

  // ── Identity ──────────────────────────────────────────────────────────────

  /// Bind the session to the user the identity layer signed in.
  pub fn sign_in(&self, user_id: Uuid) {
    let previous = lock(&self.user_id).replace(user_id);
    if previous.is_some_and(|p| p != user_id) {
      self.reset_gestures();
    }
    tracing::info!(%user_id, "signed in");
  }

  /// Forget the user and tear down every running timer.
  pub fn sign_out(&self) {
    if let Some(user_id) = lock(&self.user_id).take() {
      tracing::info!(%user_id, "signed out");
    }
    self.reset_gestures();
  }

  fn reset_gestures(&self) {
    self.tasks.cancel_all();
    lock(&self.alert).reset();
    self.publish_alert();
  }

  pub(crate) fn user_id(&self) -> Result<Uuid> {
    (*lock(&self.user_id)).ok_or(Error::AuthRequired)
  }

  /// The signed-in user's profile. Also aligns a resting alert machine with
  /// the persisted alert flag.
  pub async fn profile(&self) -> Result<SelfProfile> {
    let user_id = self.user_id()?;
    let profile = self
      .store
      .current_self_profile()
      .await
      .map_err(Error::network)?
      .filter(|p| p.user_id == user_id)
      .ok_or(Error::ProfileNotFound)?;

    lock(&self.alert).sync_active(profile.alert_active);
    self.publish_alert();
    Ok(profile)
  }

  pub(crate) async fn save_profile(&self, profile: SelfProfile) -> Result<()> {
    self.store.update_self_profile(profile).await.map_err(Error::network)
  }

  pub(crate) async fn peer(&self, peer_id: Uuid) -> Result<Peer> {
    self.user_id()?;
    self
      .store
      .get_peer(peer_id)
      .await
      .map_err(peer_error::<S::Error>(peer_id))?
      .ok_or(Error::PeerNotFound(peer_id))
  }

  pub(crate) async fn save_peer(&self, peer: Peer) -> Result<()> {
    let peer_id = peer.peer_id;
    self.store.update_peer(peer).await.map_err(peer_error::<S::Error>(peer_id))
  }

  pub(crate) async fn peers(&self) -> Result<Vec<Peer>> {
    self.user_id()?;
    self.store.list_peers().await.map_err(Error::network)
  }

  // ── Check-in ──────────────────────────────────────────────────────────────

  /// Confirm liveness now, subject to the cooldown.
  pub async fn check_in(&self) -> Result<CheckInReceipt> {
    let _flag = InFlight::enter(&self.checking_in);
    let _write = self.writes.lock().await;
    let mut profile = self.profile().await?;
    let now = self.now();

    cooldown::check(now, profile.last_check_in).map_err(|rejection| {
      tracing::info!(remaining = %rejection.remaining_text(), "check-in rejected by cooldown");
      Error::Cooldown(rejection)
    })?;

    profile.last_check_in = Some(now);
    let interval = profile.check_in_interval;
    self.save_profile(profile).await?;

    tracing::info!(at = %now, "checked in");
    Ok(CheckInReceipt { at: now, deadline: deadline::status(now, Some(now), interval) })
  }

  pub fn is_checking_in(&self) -> bool { self.checking_in.load(Ordering::SeqCst) > 0 }

  pub fn is_responding(&self) -> bool { self.responding.load(Ordering::SeqCst) > 0 }

  // ── Settings ──────────────────────────────────────────────────────────────

  pub async fn set_check_in_interval(&self, interval: TimeDelta) -> Result<SelfProfile> {
    let interval = CheckInInterval::new(interval)?;
    let _write = self.writes.lock().await;
    let mut profile = self.profile().await?;
    profile.check_in_interval = interval;
    self.save_profile(profile.clone()).await?;
    tracing::info!(secs = interval.as_secs(), "check-in interval changed");
    Ok(profile)
  }

  pub async fn set_biometric_required(&self, required: bool) -> Result<SelfProfile> {
    let _write = self.writes.lock().await;
    let mut profile = self.profile().await?;
    profile.biometric_required = required;
    self.save_profile(profile.clone()).await?;
    Ok(profile)
  }

  pub fn set_sort_mode(&self, mode: SortMode) { *lock(&self.sort_mode) = mode; }

  pub fn sort_mode(&self) -> SortMode { *lock(&self.sort_mode) }

  // ── Queries ───────────────────────────────────────────────────────────────

  pub async fn status(&self) -> Result<SelfStatus> {
    let profile = self.profile().await?;
    let peers = self.peers().await?;
    let now = self.now();

    Ok(SelfStatus {
      deadline:      deadline::status(now, profile.last_check_in, profile.check_in_interval),
      alert_active:  profile.alert_active,
      alert:         self.alert_phase(),
      cooldown:      cooldown::check(now, profile.last_check_in)
        .err()
        .map(|r| r.remaining_text()),
      checking_in:   self.is_checking_in(),
      pending_pings: peers.iter().filter(|p| p.awaits_response()).count(),
    })
  }

  /// Every peer, sorted by tier and the current sort mode.
  pub async fn peer_statuses(&self) -> Result<Vec<PeerStatus>> {
    let peers = self.peers().await?;
    Ok(status::peer_statuses(&peers, self.now(), self.sort_mode()))
  }

  pub async fn peer_statuses_for(&self, role: Role) -> Result<Vec<PeerStatus>> {
    let peers = self.peers().await?;
    Ok(status::peer_statuses_for(&peers, role, self.now(), self.sort_mode()))
  }

  // ── Unpairing ─────────────────────────────────────────────────────────────

  /// Drop `role` from a peer, deleting the record once no role is left.
  /// With no role named the record is deleted outright. Returns the
  /// surviving record, if any.
  pub async fn unpair(&self, peer_id: Uuid, role: Option<Role>) -> Result<Option<Peer>> {
    let _write = self.writes.lock().await;
    let mut peer = self.peer(peer_id).await?;
    if let Some(role) = role {
      peer.roles.set(role, false);
    }

    if role.is_none() || peer.roles.is_empty() {
      self.store.remove_peer(peer_id).await.map_err(peer_error::<S::Error>(peer_id))?;
      tracing::info!(%peer_id, "peer removed");
      return Ok(None);
    }

    self.save_peer(peer.clone()).await?;
    tracing::info!(%peer_id, ?role, "peer role cleared");
    Ok(Some(peer))
  }

  // ── Display refresh ───────────────────────────────────────────────────────

  /// Publish a fresh [`SelfStatus`] every second until the receiver is
  /// dropped or the session goes away. Restarting replaces the old ticker.
  pub fn spawn_display_refresh(self: &Arc<Self>) -> watch::Receiver<Option<SelfStatus>> {
    let (tx, rx) = watch::channel(None);
    let weak: Weak<Self> = Arc::downgrade(self);

    self.tasks.start(TaskPurpose::DisplayRefresh, async move {
      let mut ticker = tokio::time::interval(DISPLAY_REFRESH_INTERVAL);
      loop {
        tokio::select! {
          _ = ticker.tick() => {}
          _ = tx.closed() => return,
        }
        let Some(session) = weak.upgrade() else { return };
        match session.status().await {
          Ok(snapshot) => {
            tx.send_replace(Some(snapshot));
          }
          Err(err) => tracing::warn!(error = %err, "display refresh failed"),
        }
      }
    });
    rx
  }

  pub fn stop_display_refresh(&self) -> bool { self.tasks.cancel(TaskPurpose::DisplayRefresh) }
}
