//! Binary configuration: `lifeline.toml` layered with `LIFELINE_*` variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context as _, ensure};
use lifeline_core::status::SortMode;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
  /// SQLite file holding the profile and peers. A leading `~` is expanded.
  pub store_path: PathBuf,
  /// Default peer ordering for `peers` and `watch`.
  pub sort:       SortMode,
  /// Gesture ramps are sampled this many times per second.
  pub frame_rate: u32,
}

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from("~/.local/share/lifeline/lifeline.db"),
      sort:       SortMode::default(),
      frame_rate: 60,
    }
  }
}

impl CliConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("LIFELINE"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: CliConfig = settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")?;
    ensure!(cfg.frame_rate > 0, "frame_rate must be at least 1");

    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }

  pub fn frame_interval(&self) -> Duration { Duration::from_secs(1) / self.frame_rate }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
