//! Peer status aggregation: priority tier, display text and colour, and
//! sort order for a list of peers.

use std::cmp::Ordering;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{
  deadline::{self, Urgency},
  peer::{Peer, Role, Roles},
};

// ─── Types ───────────────────────────────────────────────────────────────────

/// Priority tier; lower sorts first.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
  ManualAlert,
  NonResponsive,
  Pinged,
  Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatusColor {
  Green,
  Yellow,
  Orange,
  Red,
  Gray,
}

/// Secondary ordering applied within a priority tier.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SortMode {
  /// Least time left first; peers who never checked in lead.
  #[default]
  TimeLeft,
  Name,
  /// Most recently added first.
  DateAdded,
}

/// Which ping to badge a peer with when both directions are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PingBadge {
  /// The peer pinged the user and is waiting on a response.
  Incoming,
  /// The user pinged the peer.
  Outgoing,
}

/// Display row for one peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerStatus {
  pub peer_id:    Uuid,
  pub name:       String,
  pub roles:      Roles,
  pub priority:   Priority,
  #[serde(rename = "remaining_secs", with = "deadline::secs")]
  pub remaining:  TimeDelta,
  pub urgency:    Urgency,
  pub text:       String,
  pub color:      StatusColor,
  pub ping:       Option<PingBadge>,
  pub date_added: DateTime<Utc>,
}

// ─── Per-peer rules ──────────────────────────────────────────────────────────

/// A peer is non-responsive when the deadline has passed since a real
/// check-in, or when an external signal says so.
pub fn is_non_responsive(peer: &Peer, now: DateTime<Utc>) -> bool {
  if peer.non_responsive.active {
    return true;
  }
  peer.last_check_in.is_some()
    && deadline::status(now, peer.last_check_in, peer.check_in_interval).is_overdue()
}

pub fn priority(peer: &Peer, now: DateTime<Utc>) -> Priority {
  if peer.manual_alert.active {
    Priority::ManualAlert
  } else if is_non_responsive(peer, now) {
    Priority::NonResponsive
  } else if peer.outgoing_ping.active || peer.incoming_ping.active {
    Priority::Pinged
  } else {
    Priority::Default
  }
}

/// Incoming wins because it asks something of the user.
pub fn ping_badge(peer: &Peer) -> Option<PingBadge> {
  if peer.incoming_ping.active {
    Some(PingBadge::Incoming)
  } else if peer.outgoing_ping.active {
    Some(PingBadge::Outgoing)
  } else {
    None
  }
}

fn since_phrase(prefix: &str, since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
  match since {
    Some(at) => format!("{prefix} {}", deadline::format_ago(now.signed_duration_since(at))),
    None => prefix.to_owned(),
  }
}

/// Orange, escalating to red once a full extra interval has passed.
fn overdue_color(remaining: TimeDelta, peer: &Peer) -> StatusColor {
  if remaining < -peer.check_in_interval.as_delta() {
    StatusColor::Red
  } else {
    StatusColor::Orange
  }
}

pub fn status_line(peer: &Peer, now: DateTime<Utc>) -> (String, StatusColor) {
  let deadline = deadline::status(now, peer.last_check_in, peer.check_in_interval);

  if peer.manual_alert.active {
    let text = since_phrase("Sent out an alert", peer.manual_alert.since, now);
    return (text, StatusColor::Red);
  }
  if peer.non_responsive.active {
    let text = since_phrase("Non-responsive", peer.non_responsive.since, now);
    return (text, overdue_color(deadline.remaining, peer));
  }
  if peer.last_check_in.is_none() {
    return (deadline::NO_CHECK_IN_TEXT.to_owned(), StatusColor::Gray);
  }

  let color = match deadline.urgency {
    Urgency::Ample => StatusColor::Green,
    Urgency::Moderate => StatusColor::Yellow,
    Urgency::Low => StatusColor::Orange,
    Urgency::Overdue => overdue_color(deadline.remaining, peer),
  };
  (deadline.text, color)
}

pub fn peer_status(peer: &Peer, now: DateTime<Utc>) -> PeerStatus {
  let deadline = deadline::status(now, peer.last_check_in, peer.check_in_interval);
  let (text, color) = status_line(peer, now);
  PeerStatus {
    peer_id: peer.peer_id,
    name: peer.name.clone(),
    roles: peer.roles,
    priority: priority(peer, now),
    remaining: deadline.remaining,
    urgency: deadline.urgency,
    text,
    color,
    ping: ping_badge(peer),
    date_added: peer.date_added,
  }
}

// ─── Ordering ────────────────────────────────────────────────────────────────

/// Tier first, then `mode`, then peer id so equal keys never reorder.
pub fn compare(a: &PeerStatus, b: &PeerStatus, mode: SortMode) -> Ordering {
  let secondary = match mode {
    SortMode::TimeLeft => a.remaining.cmp(&b.remaining),
    SortMode::Name => a
      .name
      .to_lowercase()
      .cmp(&b.name.to_lowercase())
      .then_with(|| a.name.cmp(&b.name)),
    SortMode::DateAdded => b.date_added.cmp(&a.date_added),
  };
  a.priority
    .cmp(&b.priority)
    .then(secondary)
    .then_with(|| a.peer_id.cmp(&b.peer_id))
}

/// Status rows for `peers`, sorted for display.
pub fn peer_statuses<'a>(
  peers: impl IntoIterator<Item = &'a Peer>,
  now: DateTime<Utc>,
  mode: SortMode,
) -> Vec<PeerStatus> {
  let mut rows: Vec<PeerStatus> = peers.into_iter().map(|p| peer_status(p, now)).collect();
  rows.sort_by(|a, b| compare(a, b, mode));
  rows
}

/// As [`peer_statuses`], restricted to peers holding `role`.
pub fn peer_statuses_for<'a>(
  peers: impl IntoIterator<Item = &'a Peer>,
  role: Role,
  now: DateTime<Utc>,
  mode: SortMode,
) -> Vec<PeerStatus> {
  peer_statuses(peers.into_iter().filter(|p| p.roles.has(role)), now, mode)
}
