//! Human and JSON rendering of command results.

use std::{
  io::{self, Write as _},
  time::Duration,
};

use lifeline_core::{
  alert::AlertPhase,
  peer::Roles,
  profile::{CheckInInterval, SelfProfile},
  session::{CheckInAttempt, CheckInReceipt, RespondReport, RespondStage, SelfStatus},
  status::{PeerStatus, PingBadge},
};
use serde::Serialize;

/// Where results go: pretty JSON when `--json` is given, text otherwise.
#[derive(Debug, Clone, Copy)]
pub struct Output {
  pub json: bool,
}

impl Output {
  pub fn show<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
    let rendered = if self.json { serde_json::to_string_pretty(value)? } else { text(value) };
    println!("{rendered}");
    Ok(())
  }

  /// One compact JSON object per line, for streaming commands.
  pub fn stream<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
    let rendered = if self.json { serde_json::to_string(value)? } else { text(value) };
    println!("{rendered}");
    Ok(())
  }

  /// Transient progress line on stderr; suppressed in JSON mode.
  pub fn progress(&self, line: &str) {
    if self.json {
      return;
    }
    if let Err(err) = write_progress(&mut io::stderr(), line) {
      tracing::debug!(error = %err, "progress line not written");
    }
  }

  pub fn end_progress(&self) {
    if !self.json {
      eprintln!();
    }
  }
}

/// Overwrite the current terminal line with `line`.
fn write_progress(w: &mut impl io::Write, line: &str) -> io::Result<()> {
  write!(w, "\r{line:<40}")?;
  w.flush()
}

// ─── Self ────────────────────────────────────────────────────────────────────

pub fn interval(interval: CheckInInterval) -> String {
  let secs = u64::try_from(interval.as_secs()).unwrap_or_default();
  humantime::format_duration(Duration::from_secs(secs)).to_string()
}

fn deadline_text(text: &str, overdue: bool) -> String {
  if overdue { text.to_owned() } else { format!("{text} left") }
}

fn alert_text(alert_active: bool, phase: AlertPhase) -> String {
  match phase {
    AlertPhase::Accumulating { taps, .. } => format!("{taps} tap(s)"),
    AlertPhase::Arming { progress } => format!("arming {:.0}%", progress * 100.0),
    AlertPhase::Disarming { progress } => format!("disarming {:.0}%", progress * 100.0),
    AlertPhase::Idle | AlertPhase::Active if alert_active => "ACTIVE".to_owned(),
    AlertPhase::Idle | AlertPhase::Active => "inactive".to_owned(),
  }
}

pub fn self_status(status: &SelfStatus) -> String {
  let mut lines = vec![
    format!(
      "Check-in   {}",
      deadline_text(&status.deadline.text, status.deadline.is_overdue())
    ),
    format!("Alert      {}", alert_text(status.alert_active, status.alert)),
  ];
  if let Some(cooldown) = &status.cooldown {
    lines.push(format!("Cooldown   {cooldown}"));
  }
  if status.pending_pings > 0 {
    lines.push(format!("Pings      {} waiting for your answer", status.pending_pings));
  }
  lines.join("\n")
}

pub fn profile(profile: &SelfProfile) -> String {
  let mut lines = vec![
    format!("Name       {}", profile.name),
    format!("Interval   {}", interval(profile.check_in_interval)),
    format!("Biometric  {}", if profile.biometric_required { "required" } else { "off" }),
  ];
  if let Some(at) = profile.last_check_in {
    lines.push(format!("Last       {}", at.format("%Y-%m-%d %H:%M UTC")));
  }
  lines.join("\n")
}

pub fn receipt(receipt: &CheckInReceipt) -> String {
  format!("Checked in. Next deadline in {}.", receipt.deadline.text)
}

// ─── Peers ───────────────────────────────────────────────────────────────────

pub fn roles(roles: Roles) -> &'static str {
  match (roles.responder, roles.dependent) {
    (true, true) => "responder, dependent",
    (true, false) => "responder",
    (false, true) => "dependent",
    (false, false) => "-",
  }
}

fn badge(ping: Option<PingBadge>) -> &'static str {
  match ping {
    Some(PingBadge::Incoming) => "pinged you",
    Some(PingBadge::Outgoing) => "pinged",
    None => "",
  }
}

pub fn peer_table(rows: &[PeerStatus]) -> String {
  if rows.is_empty() {
    return "No peers.".to_owned();
  }
  rows
    .iter()
    .map(|row| {
      format!(
        "{:<20} {:<22} {:<8} {:<24} {}",
        row.name,
        roles(row.roles),
        row.color.to_string(),
        row.text,
        badge(row.ping),
      )
      .trim_end()
      .to_owned()
    })
    .collect::<Vec<_>>()
    .join("\n")
}

// ─── Pings ───────────────────────────────────────────────────────────────────

pub fn respond_report(report: &RespondReport) -> String {
  let mut lines = vec![format!(
    "Answered {} ping(s), {} acknowledged.",
    report.cleared.len(),
    report.acknowledged.len()
  )];
  for failure in &report.failures {
    let step = match failure.stage {
      RespondStage::Clear => "could not clear ping from",
      RespondStage::Acknowledge => "could not notify",
    };
    lines.push(format!("  {step} {}: {}", failure.peer_id, failure.reason));
  }
  lines.push(match &report.check_in {
    CheckInAttempt::Succeeded { .. } => "Checked in.".to_owned(),
    CheckInAttempt::Failed { notice } => format!("Not checked in: {notice}"),
  });
  lines.join("\n")
}

// ─── Progress ────────────────────────────────────────────────────────────────

/// A 20-cell bar for a 0.0..=1.0 ramp.
pub fn bar(progress: f64) -> String {
  const CELLS: usize = 20;
  let filled = ((progress.clamp(0.0, 1.0) * CELLS as f64).round()) as usize;
  format!("[{}{}] {:>3.0}%", "#".repeat(filled), "-".repeat(CELLS - filled), progress * 100.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn progress_overwrites_the_current_line() {
    let mut buf = Vec::new();
    write_progress(&mut buf, "arming").unwrap();
    let written = String::from_utf8(buf).unwrap();
    assert!(written.starts_with("\rarming"));
    assert_eq!(written.len(), 41);
  }

  #[test]
  fn bar_fills_proportionally() {
    assert_eq!(bar(0.0), "[--------------------]   0%");
    assert_eq!(bar(0.6), "[############--------]  60%");
    assert_eq!(bar(1.0), "[####################] 100%");
  }

  #[test]
  fn intervals_render_as_humantime() {
    assert_eq!(interval(CheckInInterval::from_secs(86_400).unwrap()), "1day");
    assert_eq!(interval(CheckInInterval::from_secs(5_400).unwrap()), "1h 30m");
  }

  #[test]
  fn alert_text_prefers_the_gesture_in_progress() {
    assert_eq!(alert_text(false, AlertPhase::Idle), "inactive");
    assert_eq!(alert_text(true, AlertPhase::Active), "ACTIVE");
    assert_eq!(alert_text(true, AlertPhase::Disarming { progress: 0.9 }), "disarming 90%");
  }
}
