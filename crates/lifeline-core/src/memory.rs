//! [`MemoryStore`]: an in-process [`ProfileStore`].
//!
//! Used by tests and as a scratch backend. A `tokio` read/write lock gives
//! the single-writer discipline the session expects.

use std::{
  collections::BTreeMap,
  sync::atomic::{AtomicBool, AtomicU64, Ordering},
  time::Duration,
};

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
  peer::Peer,
  profile::SelfProfile,
  store::{ProfileStore, StoreError},
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("peer not found: {0}")]
  PeerNotFound(Uuid),

  #[error("peer {0} already exists")]
  DuplicatePeer(Uuid),

  /// Simulated outage, see [`MemoryStore::set_offline`].
  #[error("store is offline")]
  Offline,
}

impl StoreError for MemoryError {
  fn is_not_found(&self) -> bool { matches!(self, Self::PeerNotFound(_)) }
}

#[derive(Debug, Default)]
struct Inner {
  profile: Option<SelfProfile>,
  peers:   BTreeMap<Uuid, Peer>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
  inner:         RwLock<Inner>,
  offline:       AtomicBool,
  read_delay_ms: AtomicU64,
}

impl MemoryStore {
  pub fn with_profile(profile: SelfProfile) -> Self {
    Self {
      inner: RwLock::new(Inner { profile: Some(profile), peers: BTreeMap::new() }),
      ..Self::default()
    }
  }

  /// Insert a newly paired peer.
  pub async fn add_peer(&self, peer: Peer) -> Result<(), MemoryError> {
    self.reachable()?;
    let mut inner = self.inner.write().await;
    if inner.peers.contains_key(&peer.peer_id) {
      return Err(MemoryError::DuplicatePeer(peer.peer_id));
    }
    inner.peers.insert(peer.peer_id, peer);
    Ok(())
  }

  /// While offline every operation fails with [`MemoryError::Offline`].
  pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst); }

  /// Simulated round trip before every read.
  pub fn set_read_delay(&self, delay: Duration) {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    self.read_delay_ms.store(millis, Ordering::SeqCst);
  }

  async fn round_trip(&self) -> Result<(), MemoryError> {
    let millis = self.read_delay_ms.load(Ordering::SeqCst);
    if millis > 0 {
      tokio::time::sleep(Duration::from_millis(millis)).await;
    }
    self.reachable()
  }

  fn reachable(&self) -> Result<(), MemoryError> {
    if self.offline.load(Ordering::SeqCst) {
      Err(MemoryError::Offline)
    } else {
      Ok(())
    }
  }
}

impl ProfileStore for MemoryStore {
  type Error = MemoryError;

  async fn current_self_profile(&self) -> Result<Option<SelfProfile>, MemoryError> {
    self.round_trip().await?;
    Ok(self.inner.read().await.profile.clone())
  }

  async fn update_self_profile(&self, profile: SelfProfile) -> Result<(), MemoryError> {
    self.reachable()?;
    self.inner.write().await.profile = Some(profile);
    Ok(())
  }

  async fn list_peers(&self) -> Result<Vec<Peer>, MemoryError> {
    self.round_trip().await?;
    Ok(self.inner.read().await.peers.values().cloned().collect())
  }

  async fn get_peer(&self, peer_id: Uuid) -> Result<Option<Peer>, MemoryError> {
    self.round_trip().await?;
    Ok(self.inner.read().await.peers.get(&peer_id).cloned())
  }

  async fn update_peer(&self, peer: Peer) -> Result<(), MemoryError> {
    self.reachable()?;
    let mut inner = self.inner.write().await;
    match inner.peers.get_mut(&peer.peer_id) {
      Some(slot) => {
        *slot = peer;
        Ok(())
      }
      None => Err(MemoryError::PeerNotFound(peer.peer_id)),
    }
  }

  async fn remove_peer(&self, peer_id: Uuid) -> Result<(), MemoryError> {
    self.reachable()?;
    self
      .inner
      .write()
      .await
      .peers
      .remove(&peer_id)
      .map(|_| ())
      .ok_or(MemoryError::PeerNotFound(peer_id))
  }
}
