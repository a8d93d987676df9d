//! SQL schema for the Lifeline SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- The signed-in user's own record. Exactly one row.
CREATE TABLE IF NOT EXISTS self_profile (
    id                   INTEGER PRIMARY KEY CHECK (id = 1),
    user_id              TEXT    NOT NULL,
    name                 TEXT    NOT NULL,
    interval_secs        INTEGER NOT NULL CHECK (interval_secs > 0),
    last_check_in        TEXT,             -- ISO 8601 UTC or NULL
    alert_active         INTEGER NOT NULL DEFAULT 0,
    alert_activated_at   TEXT,
    alert_deactivated_at TEXT,
    biometric_required   INTEGER NOT NULL DEFAULT 0
);

-- One row per paired contact. Signal flags are stored as (active, since).
CREATE TABLE IF NOT EXISTS peers (
    peer_id               TEXT    PRIMARY KEY,
    name                  TEXT    NOT NULL,
    is_responder          INTEGER NOT NULL,
    is_dependent          INTEGER NOT NULL,
    last_check_in         TEXT,
    interval_secs         INTEGER NOT NULL CHECK (interval_secs > 0),
    manual_alert_active   INTEGER NOT NULL DEFAULT 0,
    manual_alert_at       TEXT,
    non_responsive_active INTEGER NOT NULL DEFAULT 0,
    non_responsive_at     TEXT,
    outgoing_ping_active  INTEGER NOT NULL DEFAULT 0,
    outgoing_ping_at      TEXT,
    incoming_ping_active  INTEGER NOT NULL DEFAULT 0,
    incoming_ping_at      TEXT,
    date_added            TEXT    NOT NULL,
    CHECK (is_responder OR is_dependent)
);

CREATE INDEX IF NOT EXISTS peers_name_idx ON peers(name);

PRAGMA user_version = 1;
";

/// Column list shared by every `SELECT` from `peers`, in [`RawPeer`] order.
///
/// [`RawPeer`]: crate::encode::RawPeer
pub const PEER_COLUMNS: &str = "peer_id, name, is_responder, is_dependent, last_check_in,
  interval_secs, manual_alert_active, manual_alert_at, non_responsive_active,
  non_responsive_at, outgoing_ping_active, outgoing_ping_at, incoming_ping_active,
  incoming_ping_at, date_added";
