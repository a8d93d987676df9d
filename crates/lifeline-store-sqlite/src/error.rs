//! Error type for `lifeline-store-sqlite`.

use lifeline_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] lifeline_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("peer not found: {0}")]
  PeerNotFound(uuid::Uuid),

  #[error("peer {0} already exists")]
  DuplicatePeer(uuid::Uuid),

  /// A peer row must carry at least one role.
  #[error("peer {0} has no role")]
  NoRole(uuid::Uuid),
}

impl StoreError for Error {
  fn is_not_found(&self) -> bool {
    matches!(self, Self::PeerNotFound(_) | Self::Core(lifeline_core::Error::PeerNotFound(_)))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
