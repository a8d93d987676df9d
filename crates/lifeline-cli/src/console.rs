//! Terminal stand-ins for the device capabilities: a y/N prompt plays the
//! biometric check, and notifications go to the log.

use std::{
  convert::Infallible,
  io::{self, BufRead as _, Write as _},
};

use lifeline_core::{
  BiometricFailure,
  capability::{Authenticator, NotificationKind, Notifier},
};
use uuid::Uuid;

/// Asks the person at the terminal to confirm.
pub struct PromptAuthenticator;

impl Authenticator for PromptAuthenticator {
  async fn authenticate<'a>(&'a self, reason: &'a str) -> Result<(), BiometricFailure> {
    let prompt = format!("Confirm to {reason} [y/N]: ");
    let answer = tokio::task::spawn_blocking(move || read_answer(&prompt))
      .await
      .map_err(|e| BiometricFailure::Other(e.to_string()))?;

    match answer {
      Ok(Some(line)) if is_yes(&line) => Ok(()),
      Ok(Some(_)) => Err(BiometricFailure::Cancelled),
      Ok(None) => Err(BiometricFailure::Unavailable),
      Err(e) => Err(BiometricFailure::Other(e.to_string())),
    }
  }
}

/// `None` when stdin is closed.
fn read_answer(prompt: &str) -> io::Result<Option<String>> {
  let mut stderr = io::stderr();
  write!(stderr, "{prompt}")?;
  stderr.flush()?;

  let mut line = String::new();
  let n = io::stdin().lock().read_line(&mut line)?;
  Ok((n > 0).then_some(line))
}

fn is_yes(line: &str) -> bool {
  matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Writes every notification to the log instead of delivering it.
pub struct LogNotifier;

impl Notifier for LogNotifier {
  type Error = Infallible;

  async fn notify<'a>(&'a self, title: &'a str, body: &'a str) {
    tracing::warn!(%title, %body, "notice");
  }

  async fn notify_peer<'a>(
    &'a self,
    peer_id: Uuid,
    kind: NotificationKind,
    title: &'a str,
    body: &'a str,
  ) -> Result<(), Infallible> {
    tracing::info!(%peer_id, %kind, %title, %body, "peer notification");
    Ok(())
  }
}
