//! Peer relationship records.
//!
//! One record per paired contact. The contact's own liveness fields are
//! mirrored here read-only; the signal flags are what this side mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::profile::CheckInInterval;

// ─── Roles ───────────────────────────────────────────────────────────────────

/// One of the two capabilities a peer can hold.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  /// Watches over the user.
  Responder,
  /// Watched over by the user.
  Dependent,
}

/// Independent role flags; a peer may hold both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
  pub responder: bool,
  pub dependent: bool,
}

impl Roles {
  pub const RESPONDER: Self = Self { responder: true, dependent: false };
  pub const DEPENDENT: Self = Self { responder: false, dependent: true };
  pub const BOTH: Self = Self { responder: true, dependent: true };

  pub fn has(self, role: Role) -> bool {
    match role {
      Role::Responder => self.responder,
      Role::Dependent => self.dependent,
    }
  }

  pub fn set(&mut self, role: Role, on: bool) {
    match role {
      Role::Responder => self.responder = on,
      Role::Dependent => self.dependent = on,
    }
  }

  pub fn is_empty(self) -> bool { !self.responder && !self.dependent }
}

// ─── Signals ─────────────────────────────────────────────────────────────────

/// A boolean signal paired with the moment it was raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
  pub active: bool,
  pub since:  Option<DateTime<Utc>>,
}

impl Flag {
  pub fn raised(at: DateTime<Utc>) -> Self { Self { active: true, since: Some(at) } }

  pub fn raise(&mut self, at: DateTime<Utc>) { *self = Self::raised(at); }

  pub fn clear(&mut self) { *self = Self::default(); }
}

// ─── Peer ────────────────────────────────────────────────────────────────────

/// A bidirectional relationship with one contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
  pub peer_id:           Uuid,
  pub name:              String,
  pub roles:             Roles,
  pub last_check_in:     Option<DateTime<Utc>>,
  pub check_in_interval: CheckInInterval,
  pub manual_alert:      Flag,
  /// Externally pushed non-responsive signal. The derived form lives in
  /// [`crate::status::is_non_responsive`].
  pub non_responsive:    Flag,
  pub outgoing_ping:     Flag,
  pub incoming_ping:     Flag,
  pub date_added:        DateTime<Utc>,
}

impl Peer {
  /// A freshly paired peer with no signals raised.
  pub fn new(
    name: impl Into<String>,
    roles: Roles,
    check_in_interval: CheckInInterval,
    date_added: DateTime<Utc>,
  ) -> Self {
    Self {
      peer_id: Uuid::new_v4(),
      name: name.into(),
      roles,
      last_check_in: None,
      check_in_interval,
      manual_alert: Flag::default(),
      non_responsive: Flag::default(),
      outgoing_ping: Flag::default(),
      incoming_ping: Flag::default(),
      date_added,
    }
  }

  pub fn is_responder(&self) -> bool { self.roles.responder }

  pub fn is_dependent(&self) -> bool { self.roles.dependent }

  /// Whether this peer is waiting on a response from the user.
  pub fn awaits_response(&self) -> bool {
    self.is_responder() && self.incoming_ping.active
  }
}
