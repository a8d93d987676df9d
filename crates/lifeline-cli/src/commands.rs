//! Command handlers. Each one runs against a signed-in [`Session`].

use std::{sync::Arc, time::Duration};

use anyhow::{Context as _, anyhow, bail};
use chrono::{TimeDelta, Utc};
use lifeline_core::{
  Session,
  alert::{self, AlertPhase, TapOutcome},
  peer::{Flag, Peer, Roles},
  profile::{CheckInInterval, SelfProfile},
  status::PeerStatus,
  store::ProfileStore,
};
use lifeline_store_sqlite::SqliteStore;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
  AlertCommand, Command, PeerAdd, PeerCommand,
  config::CliConfig,
  console::{LogNotifier, PromptAuthenticator},
  output::{self, Output},
};

type App = Session<SqliteStore, PromptAuthenticator, LogNotifier>;

/// Spacing of the simulated taps in `alert arm`; well inside the tap window.
const TAP_SPACING: Duration = Duration::from_millis(200);

/// Upper bound on how long a gesture may take to come to rest.
const GESTURE_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn run(
  command: Command,
  cfg: &CliConfig,
  store: SqliteStore,
  out: Output,
) -> anyhow::Result<()> {
  let session = Arc::new(
    Session::new(store, PromptAuthenticator, LogNotifier).with_frame_interval(cfg.frame_interval()),
  );
  session.set_sort_mode(cfg.sort);
  if !matches!(command, Command::Init { .. }) {
    sign_in(&session).await?;
  }

  match command {
    Command::Init { name, interval } => init(&session, name, interval, out).await,
    Command::Status => {
      let status = session.status().await?;
      out.show(&status, output::self_status)
    }
    Command::CheckIn => {
      let receipt = session.check_in().await?;
      out.show(&receipt, output::receipt)
    }
    Command::Peers { sort, role } => {
      if let Some(sort) = sort {
        session.set_sort_mode(sort);
      }
      let rows = match role {
        Some(role) => session.peer_statuses_for(role).await?,
        None => session.peer_statuses().await?,
      };
      out.show(&rows, |rows| output::peer_table(rows))
    }
    Command::Peer(PeerCommand::Add(args)) => add_peer(&session, args, out).await,
    Command::Peer(PeerCommand::Remove { peer, role }) => {
      let peer_id = resolve_peer(&session, &peer).await?;
      let survivor = session.unpair(peer_id, role).await?;
      out.show(&survivor, |survivor| match survivor {
        Some(peer) => format!("{} is now a {}.", peer.name, output::roles(peer.roles)),
        None => "Peer removed.".to_owned(),
      })
    }
    Command::Ping { peer } => {
      let peer_id = resolve_peer(&session, &peer).await?;
      let peer = session.send_ping(peer_id).await?;
      out.show(&peer, |peer| format!("Pinged {}.", peer.name))
    }
    Command::Respond { peer } => {
      let report = match peer {
        Some(peer) => {
          let peer_id = resolve_peer(&session, &peer).await?;
          session.respond_to_ping(peer_id).await?
        }
        None => session.respond_to_all_pings().await?,
      };
      out.show(&report, output::respond_report)
    }
    Command::Alert(AlertCommand::Arm) => arm(&session, out).await,
    Command::Alert(AlertCommand::Disarm) => disarm(&session, out).await,
    Command::Watch => watch(&session, out).await,
    Command::Settings { interval, biometric } => {
      let mut profile = session.profile().await?;
      if let Some(interval) = interval {
        profile = session.set_check_in_interval(interval).await?;
      }
      if let Some(required) = biometric {
        profile = session.set_biometric_required(required).await?;
      }
      out.show(&profile, output::profile)
    }
  }
}

// ─── Setup stand-ins ─────────────────────────────────────────────────────────

/// The local profile's owner plays the identity layer's signed-in user.
async fn sign_in(session: &App) -> anyhow::Result<()> {
  let profile = session
    .store()
    .current_self_profile()
    .await?
    .ok_or_else(|| anyhow!("no profile yet; run `lifeline init <NAME>` first"))?;
  session.sign_in(profile.user_id);
  Ok(())
}

async fn init(session: &App, name: String, interval: TimeDelta, out: Output) -> anyhow::Result<()> {
  let store = session.store();
  if let Some(existing) = store.current_self_profile().await? {
    bail!("a profile for {} already exists", existing.name);
  }

  let profile = SelfProfile::new(Uuid::new_v4(), name, CheckInInterval::new(interval)?);
  store.update_self_profile(profile.clone()).await?;
  tracing::info!(user_id = %profile.user_id, "profile created");
  out.show(&profile, output::profile)
}

async fn add_peer(session: &App, args: PeerAdd, out: Output) -> anyhow::Result<()> {
  if !args.responder && !args.dependent {
    bail!("a peer needs --responder, --dependent, or both");
  }

  let now = Utc::now();
  let roles = Roles { responder: args.responder, dependent: args.dependent };
  let mut peer = Peer::new(args.name, roles, CheckInInterval::new(args.interval)?, now);
  if let Some(ago) = args.checked_in_ago {
    peer.last_check_in = Some(now - TimeDelta::from_std(ago).context("check-in is too far back")?);
  }
  if args.pinged_you {
    peer.incoming_ping = Flag::raised(now);
  }

  session.store().add_peer(&peer).await?;
  out.show(&peer, |peer| format!("Added {} ({}).", peer.name, peer.peer_id))
}

/// Accept a peer id or a case-insensitive name.
async fn resolve_peer(session: &App, query: &str) -> anyhow::Result<Uuid> {
  if let Ok(id) = Uuid::parse_str(query) {
    return Ok(id);
  }

  let rows = session.peer_statuses().await?;
  let matches: Vec<&PeerStatus> =
    rows.iter().filter(|row| row.name.eq_ignore_ascii_case(query)).collect();
  match matches.as_slice() {
    [row] => Ok(row.peer_id),
    [] => bail!("no peer named {query:?}"),
    _ => bail!("{} peers are named {query:?}; use the id", matches.len()),
  }
}

// ─── Alert gestures ──────────────────────────────────────────────────────────

/// Print ramp progress until the machine comes to rest.
async fn follow(rx: &mut watch::Receiver<AlertPhase>, out: Output) -> AlertPhase {
  loop {
    let phase = *rx.borrow_and_update();
    match phase {
      AlertPhase::Accumulating { taps, progress } => {
        out.progress(&format!("tap {taps}   {}", output::bar(progress)));
      }
      AlertPhase::Arming { progress } => out.progress(&format!("arming  {}", output::bar(progress))),
      AlertPhase::Disarming { progress } => {
        out.progress(&format!("holding {}", output::bar(progress)));
      }
      AlertPhase::Idle | AlertPhase::Active => return phase,
    }
    if rx.changed().await.is_err() {
      return phase;
    }
  }
}

async fn arm(session: &Arc<App>, out: Output) -> anyhow::Result<()> {
  let mut rx = session.subscribe_alert();

  for tap in 1..=alert::TAPS_TO_ARM {
    match session.arm_alert_tap().await? {
      TapOutcome::Ignored => bail!("the alert is already active"),
      TapOutcome::Counted { taps, progress } => {
        out.progress(&format!("tap {taps}   {}", output::bar(progress)));
      }
      TapOutcome::ArmingStarted => break,
    }
    if tap < alert::TAPS_TO_ARM {
      tokio::time::sleep(TAP_SPACING).await;
    }
  }

  let phase = tokio::time::timeout(GESTURE_TIMEOUT, follow(&mut rx, out))
    .await
    .context("arming did not finish")?;
  out.end_progress();

  let active = phase == AlertPhase::Active;
  out.show(&phase, |_| {
    (if active { "Alert sent to your responders." } else { "Alert not sent." }).to_owned()
  })?;
  if !active {
    bail!("alert activation failed");
  }
  Ok(())
}

async fn disarm(session: &Arc<App>, out: Output) -> anyhow::Result<()> {
  let mut rx = session.subscribe_alert();
  if !session.begin_disarm_hold().await? {
    bail!("there is no active alert to cancel");
  }

  let phase = tokio::select! {
    phase = tokio::time::timeout(GESTURE_TIMEOUT, follow(&mut rx, out)) => {
      phase.context("disarming did not finish")?
    }
    _ = tokio::signal::ctrl_c() => {
      session.release_disarm_hold();
      session.alert_phase()
    }
  };
  out.end_progress();

  let cancelled = phase == AlertPhase::Idle;
  out.show(&phase, |_| {
    (if cancelled { "Alert cancelled." } else { "Alert still active." }).to_owned()
  })?;
  if !cancelled {
    bail!("alert is still active");
  }
  Ok(())
}

// ─── Watch ───────────────────────────────────────────────────────────────────

async fn watch(session: &Arc<App>, out: Output) -> anyhow::Result<()> {
  let mut rx = session.spawn_display_refresh();

  loop {
    tokio::select! {
      changed = rx.changed() => {
        if changed.is_err() {
          break;
        }
        let snapshot = rx.borrow_and_update().clone();
        if let Some(status) = snapshot {
          out.stream(&status, |status| {
            format!("{}\n{}\n", Utc::now().format("%H:%M:%S"), output::self_status(status))
          })?;
        }
      }
      _ = tokio::signal::ctrl_c() => break,
    }
  }

  session.stop_display_refresh();
  Ok(())
}
