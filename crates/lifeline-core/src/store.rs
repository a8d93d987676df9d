//! The `ProfileStore` trait.
//!
//! The trait is implemented by persistence backends (e.g.
//! `lifeline-store-sqlite`, or [`crate::memory::MemoryStore`]). The session
//! depends on this abstraction, not on any concrete backend, and relies on it
//! for durability and propagation to peers.

use std::future::Future;

use uuid::Uuid;

use crate::{peer::Peer, profile::SelfProfile};

/// Failure reported by a [`ProfileStore`].
///
/// Backends flag a missing record so the session can tell an unpaired peer
/// apart from an outage.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn is_not_found(&self) -> bool { false }
}

/// Abstraction over the per-session profile and peer store.
///
/// Implementations serialise writes: reads may run concurrently, but each
/// write is exclusive and atomic from the caller's point of view.
///
/// All methods return `Send` futures so the trait can be used from tasks
/// spawned on a multi-threaded tokio runtime.
pub trait ProfileStore: Send + Sync {
  type Error: StoreError;

  // ── Self-profile ──────────────────────────────────────────────────────

  /// The signed-in user's profile, if one exists.
  fn current_self_profile(
    &self,
  ) -> impl Future<Output = Result<Option<SelfProfile>, Self::Error>> + Send + '_;

  /// Replace the stored self-profile.
  fn update_self_profile(
    &self,
    profile: SelfProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Peers ─────────────────────────────────────────────────────────────

  fn list_peers(&self) -> impl Future<Output = Result<Vec<Peer>, Self::Error>> + Send + '_;

  /// Retrieve a peer by id. Returns `None` if not found.
  fn get_peer(
    &self,
    peer_id: Uuid,
  ) -> impl Future<Output = Result<Option<Peer>, Self::Error>> + Send + '_;

  /// Replace an existing peer record. Fails if the peer does not exist.
  fn update_peer(&self, peer: Peer) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a peer record (unpairing).
  fn remove_peer(
    &self,
    peer_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
