//! `lifeline`: check-in deadlines, alerts and pings from the terminal.
//!
//! Reads `lifeline.toml` (or the path given with `--config`), opens the SQLite
//! store and runs one command against the signed-in profile.
//!
//! # Usage
//!
//! ```text
//! lifeline init Ada --interval 24h
//! lifeline peer add Grace --responder
//! lifeline check-in
//! lifeline peers --sort name --json
//! lifeline alert arm
//! ```

mod commands;
mod config;
mod console;
mod output;

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context as _;
use chrono::TimeDelta;
use clap::{Args, Parser, Subcommand};
use lifeline_core::{peer::Role, status::SortMode};
use lifeline_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{config::CliConfig, output::Output};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "lifeline", version, about = "Check-in deadlines and alerts for you and your peers")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "lifeline.toml")]
  config: PathBuf,

  /// Print machine-readable JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Create your profile.
  Init {
    name:     String,
    /// How often you promise to check in, e.g. `24h` or `3d`.
    #[arg(long, default_value = "24h", value_parser = parse_interval)]
    interval: TimeDelta,
  },

  /// Show your deadline, alert and pending pings.
  Status,

  /// Confirm you are okay.
  CheckIn,

  /// List peers by priority.
  Peers {
    /// time-left | name | date-added
    #[arg(long)]
    sort: Option<SortMode>,
    /// responder | dependent
    #[arg(long)]
    role: Option<Role>,
  },

  /// Pair or unpair a peer.
  #[command(subcommand)]
  Peer(PeerCommand),

  /// Ask a dependent whether they are okay.
  Ping { peer: String },

  /// Answer pings: one peer's, or everyone's.
  Respond { peer: Option<String> },

  /// Send or cancel your emergency alert.
  #[command(subcommand)]
  Alert(AlertCommand),

  /// Refresh your status every second until interrupted.
  Watch,

  /// Change profile settings.
  Settings {
    #[arg(long, value_parser = parse_interval)]
    interval:  Option<TimeDelta>,
    /// Require confirmation before disarming or answering pings.
    #[arg(long)]
    biometric: Option<bool>,
  },
}

#[derive(Subcommand, Debug)]
pub enum PeerCommand {
  /// Record a paired contact.
  Add(PeerAdd),

  /// Drop a role, or the whole peer when no role is given.
  Remove {
    peer: String,
    #[arg(long)]
    role: Option<Role>,
  },
}

#[derive(Args, Debug)]
pub struct PeerAdd {
  pub name:           String,
  /// The peer watches over you.
  #[arg(long)]
  pub responder:      bool,
  /// You watch over the peer.
  #[arg(long)]
  pub dependent:      bool,
  /// The peer's own check-in interval.
  #[arg(long, default_value = "24h", value_parser = parse_interval)]
  pub interval:       TimeDelta,
  /// When the peer last checked in, e.g. `5h` for five hours ago.
  #[arg(long, value_parser = humantime::parse_duration)]
  pub checked_in_ago: Option<Duration>,
  /// The peer has pinged you.
  #[arg(long)]
  pub pinged_you:     bool,
}

#[derive(Subcommand, Debug)]
pub enum AlertCommand {
  /// Tap five times and let the arming ramp finish.
  Arm,
  /// Hold to disarm. Ctrl-C releases the hold.
  Disarm,
}

fn parse_interval(s: &str) -> Result<TimeDelta, String> {
  let duration = humantime::parse_duration(s).map_err(|e| e.to_string())?;
  TimeDelta::from_std(duration).map_err(|e| e.to_string())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = CliConfig::load(&cli.config)?;

  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let out = Output { json: cli.json };
  match commands::run(cli.command, &cfg, store, out).await {
    Ok(()) => Ok(ExitCode::SUCCESS),
    Err(err) => {
      match err.downcast_ref::<lifeline_core::Error>() {
        Some(core) => eprintln!("{}", core.notice()),
        None => eprintln!("error: {err:#}"),
      }
      Ok(ExitCode::FAILURE)
    }
  }
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory as _;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn intervals_parse_with_humantime() {
    assert_eq!(parse_interval("24h").unwrap(), TimeDelta::hours(24));
    assert_eq!(parse_interval("1d 12h").unwrap(), TimeDelta::hours(36));
    assert!(parse_interval("soon").is_err());
  }

  #[test]
  fn peer_remove_takes_an_optional_role() {
    let cli = Cli::parse_from(["lifeline", "peer", "remove", "Grace", "--role", "responder"]);
    match cli.command {
      Command::Peer(PeerCommand::Remove { peer, role }) => {
        assert_eq!(peer, "Grace");
        assert_eq!(role, Some(Role::Responder));
      }
      other => panic!("unexpected command: {other:?}"),
    }
  }
}
