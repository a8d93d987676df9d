//! [`SqliteStore`]: the SQLite implementation of [`ProfileStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use lifeline_core::{peer::Peer, profile::SelfProfile, store::ProfileStore};

use crate::{
  Error, Result,
  encode::{RawPeer, RawSelfProfile, encode_uuid},
  schema::{PEER_COLUMNS, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Lifeline profile store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All writes
/// go through the connection's single worker thread, so they are serialised.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened profile store");
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a newly paired peer. Fails if the id is taken.
  pub async fn add_peer(&self, peer: &Peer) -> Result<()> {
    if peer.roles.is_empty() {
      return Err(Error::NoRole(peer.peer_id));
    }
    let peer_id = peer.peer_id;
    let raw = RawPeer::from_peer(peer);

    let inserted = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "INSERT OR IGNORE INTO peers ({PEER_COLUMNS})
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        );
        let n = conn.execute(
          &sql,
          rusqlite::params![
            raw.peer_id,
            raw.name,
            raw.is_responder,
            raw.is_dependent,
            raw.last_check_in,
            raw.interval_secs,
            raw.manual_alert_active,
            raw.manual_alert_at,
            raw.non_responsive_active,
            raw.non_responsive_at,
            raw.outgoing_ping_active,
            raw.outgoing_ping_at,
            raw.incoming_ping_active,
            raw.incoming_ping_at,
            raw.date_added,
          ],
        )?;
        Ok(n)
      })
      .await?;

    if inserted == 0 {
      return Err(Error::DuplicatePeer(peer_id));
    }
    tracing::debug!(%peer_id, "peer inserted");
    Ok(())
  }
}

// ─── ProfileStore impl ───────────────────────────────────────────────────────

impl ProfileStore for SqliteStore {
  type Error = Error;

  // ── Self-profile ──────────────────────────────────────────────────────────

  async fn current_self_profile(&self) -> Result<Option<SelfProfile>> {
    let raw: Option<RawSelfProfile> = self
      .conn
      .call(|conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, name, interval_secs, last_check_in, alert_active,
                    alert_activated_at, alert_deactivated_at, biometric_required
             FROM self_profile WHERE id = 1",
            [],
            RawSelfProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSelfProfile::into_profile).transpose()
  }

  async fn update_self_profile(&self, profile: SelfProfile) -> Result<()> {
    let raw = RawSelfProfile::from_profile(&profile);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO self_profile (
             id, user_id, name, interval_secs, last_check_in, alert_active,
             alert_activated_at, alert_deactivated_at, biometric_required
           ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT (id) DO UPDATE SET
             user_id              = excluded.user_id,
             name                 = excluded.name,
             interval_secs        = excluded.interval_secs,
             last_check_in        = excluded.last_check_in,
             alert_active         = excluded.alert_active,
             alert_activated_at   = excluded.alert_activated_at,
             alert_deactivated_at = excluded.alert_deactivated_at,
             biometric_required   = excluded.biometric_required",
          rusqlite::params![
            raw.user_id,
            raw.name,
            raw.interval_secs,
            raw.last_check_in,
            raw.alert_active,
            raw.alert_activated_at,
            raw.alert_deactivated_at,
            raw.biometric_required,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Peers ─────────────────────────────────────────────────────────────────

  async fn list_peers(&self) -> Result<Vec<Peer>> {
    let raws: Vec<RawPeer> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {PEER_COLUMNS} FROM peers ORDER BY date_added, peer_id"))?;
        let rows = stmt
          .query_map([], RawPeer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPeer::into_peer).collect()
  }

  async fn get_peer(&self, peer_id: Uuid) -> Result<Option<Peer>> {
    let id_str = encode_uuid(peer_id);

    let raw: Option<RawPeer> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PEER_COLUMNS} FROM peers WHERE peer_id = ?1"),
            rusqlite::params![id_str],
            RawPeer::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPeer::into_peer).transpose()
  }

  async fn update_peer(&self, peer: Peer) -> Result<()> {
    if peer.roles.is_empty() {
      return Err(Error::NoRole(peer.peer_id));
    }
    let peer_id = peer.peer_id;
    let raw = RawPeer::from_peer(&peer);

    let changed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE peers SET
             name                  = ?2,
             is_responder          = ?3,
             is_dependent          = ?4,
             last_check_in         = ?5,
             interval_secs         = ?6,
             manual_alert_active   = ?7,
             manual_alert_at       = ?8,
             non_responsive_active = ?9,
             non_responsive_at     = ?10,
             outgoing_ping_active  = ?11,
             outgoing_ping_at      = ?12,
             incoming_ping_active  = ?13,
             incoming_ping_at      = ?14,
             date_added            = ?15
           WHERE peer_id = ?1",
          rusqlite::params![
            raw.peer_id,
            raw.name,
            raw.is_responder,
            raw.is_dependent,
            raw.last_check_in,
            raw.interval_secs,
            raw.manual_alert_active,
            raw.manual_alert_at,
            raw.non_responsive_active,
            raw.non_responsive_at,
            raw.outgoing_ping_active,
            raw.outgoing_ping_at,
            raw.incoming_ping_active,
            raw.incoming_ping_at,
            raw.date_added,
          ],
        )?;
        Ok(n)
      })
      .await?;

    if changed == 0 {
      return Err(Error::PeerNotFound(peer_id));
    }
    Ok(())
  }

  async fn remove_peer(&self, peer_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(peer_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM peers WHERE peer_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if removed == 0 {
      return Err(Error::PeerNotFound(peer_id));
    }
    Ok(())
  }
}
