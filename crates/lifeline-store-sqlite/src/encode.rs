//! Encoding and decoding helpers between the domain types and the plain
//! column values stored in SQLite.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings and
//! intervals whole seconds. A signal flag takes two columns: an integer
//! boolean and an optional timestamp.

use chrono::{DateTime, Utc};
use lifeline_core::{
  peer::{Flag, Peer, Roles},
  profile::{CheckInInterval, SelfProfile},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> { dt.map(encode_dt) }

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Flag ────────────────────────────────────────────────────────────────────

fn decode_flag(active: bool, since: Option<&str>) -> Result<Flag> {
  Ok(Flag { active, since: decode_opt_dt(since)? })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of the single `self_profile` row.
pub struct RawSelfProfile {
  pub user_id:              String,
  pub name:                 String,
  pub interval_secs:        i64,
  pub last_check_in:        Option<String>,
  pub alert_active:         bool,
  pub alert_activated_at:   Option<String>,
  pub alert_deactivated_at: Option<String>,
  pub biometric_required:   bool,
}

impl RawSelfProfile {
  pub fn from_profile(p: &SelfProfile) -> Self {
    Self {
      user_id:              encode_uuid(p.user_id),
      name:                 p.name.clone(),
      interval_secs:        p.check_in_interval.as_secs(),
      last_check_in:        encode_opt_dt(p.last_check_in),
      alert_active:         p.alert_active,
      alert_activated_at:   encode_opt_dt(p.alert_activated_at),
      alert_deactivated_at: encode_opt_dt(p.alert_deactivated_at),
      biometric_required:   p.biometric_required,
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:              row.get(0)?,
      name:                 row.get(1)?,
      interval_secs:        row.get(2)?,
      last_check_in:        row.get(3)?,
      alert_active:         row.get(4)?,
      alert_activated_at:   row.get(5)?,
      alert_deactivated_at: row.get(6)?,
      biometric_required:   row.get(7)?,
    })
  }

  pub fn into_profile(self) -> Result<SelfProfile> {
    Ok(SelfProfile {
      user_id:              decode_uuid(&self.user_id)?,
      name:                 self.name,
      check_in_interval:    CheckInInterval::from_secs(self.interval_secs)?,
      last_check_in:        decode_opt_dt(self.last_check_in.as_deref())?,
      alert_active:         self.alert_active,
      alert_activated_at:   decode_opt_dt(self.alert_activated_at.as_deref())?,
      alert_deactivated_at: decode_opt_dt(self.alert_deactivated_at.as_deref())?,
      biometric_required:   self.biometric_required,
    })
  }
}

/// Column values of a `peers` row, in
/// [`PEER_COLUMNS`](crate::schema::PEER_COLUMNS) order.
pub struct RawPeer {
  pub peer_id:               String,
  pub name:                  String,
  pub is_responder:          bool,
  pub is_dependent:          bool,
  pub last_check_in:         Option<String>,
  pub interval_secs:         i64,
  pub manual_alert_active:   bool,
  pub manual_alert_at:       Option<String>,
  pub non_responsive_active: bool,
  pub non_responsive_at:     Option<String>,
  pub outgoing_ping_active:  bool,
  pub outgoing_ping_at:      Option<String>,
  pub incoming_ping_active:  bool,
  pub incoming_ping_at:      Option<String>,
  pub date_added:            String,
}

impl RawPeer {
  pub fn from_peer(p: &Peer) -> Self {
    Self {
      peer_id:               encode_uuid(p.peer_id),
      name:                  p.name.clone(),
      is_responder:          p.roles.responder,
      is_dependent:          p.roles.dependent,
      last_check_in:         encode_opt_dt(p.last_check_in),
      interval_secs:         p.check_in_interval.as_secs(),
      manual_alert_active:   p.manual_alert.active,
      manual_alert_at:       encode_opt_dt(p.manual_alert.since),
      non_responsive_active: p.non_responsive.active,
      non_responsive_at:     encode_opt_dt(p.non_responsive.since),
      outgoing_ping_active:  p.outgoing_ping.active,
      outgoing_ping_at:      encode_opt_dt(p.outgoing_ping.since),
      incoming_ping_active:  p.incoming_ping.active,
      incoming_ping_at:      encode_opt_dt(p.incoming_ping.since),
      date_added:            encode_dt(p.date_added),
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      peer_id:               row.get(0)?,
      name:                  row.get(1)?,
      is_responder:          row.get(2)?,
      is_dependent:          row.get(3)?,
      last_check_in:         row.get(4)?,
      interval_secs:         row.get(5)?,
      manual_alert_active:   row.get(6)?,
      manual_alert_at:       row.get(7)?,
      non_responsive_active: row.get(8)?,
      non_responsive_at:     row.get(9)?,
      outgoing_ping_active:  row.get(10)?,
      outgoing_ping_at:      row.get(11)?,
      incoming_ping_active:  row.get(12)?,
      incoming_ping_at:      row.get(13)?,
      date_added:            row.get(14)?,
    })
  }

  pub fn into_peer(self) -> Result<Peer> {
    Ok(Peer {
      peer_id:           decode_uuid(&self.peer_id)?,
      name:              self.name,
      roles:             Roles { responder: self.is_responder, dependent: self.is_dependent },
      last_check_in:     decode_opt_dt(self.last_check_in.as_deref())?,
      check_in_interval: CheckInInterval::from_secs(self.interval_secs)?,
      manual_alert:      decode_flag(self.manual_alert_active, self.manual_alert_at.as_deref())?,
      non_responsive:    decode_flag(
        self.non_responsive_active,
        self.non_responsive_at.as_deref(),
      )?,
      outgoing_ping:     decode_flag(self.outgoing_ping_active, self.outgoing_ping_at.as_deref())?,
      incoming_ping:     decode_flag(self.incoming_ping_active, self.incoming_ping_at.as_deref())?,
      date_added:        decode_dt(&self.date_added)?,
    })
  }
}
