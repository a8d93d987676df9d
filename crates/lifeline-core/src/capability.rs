//! Device capabilities the engine consumes but does not implement:
//! biometric authentication and notification delivery.

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::BiometricFailure;

/// Reason strings passed to [`Authenticator::authenticate`].
pub mod reason {
  pub const DEACTIVATE_ALERT: &str = "deactivate alert";
  pub const RESPOND_TO_PINGS: &str = "respond to pings";
}

/// Biometric (or passcode) confirmation of the device owner.
pub trait Authenticator: Send + Sync {
  /// `Ok(())` when the owner confirmed; the failure says why not.
  fn authenticate<'a>(
    &'a self,
    reason: &'a str,
  ) -> impl Future<Output = Result<(), BiometricFailure>> + Send + 'a;
}

/// What a peer notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
  Ping,
  PingResponse,
  AlertActivated,
  AlertDeactivated,
}

/// Local and peer-directed notification delivery.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Show a local notification on this device. Best effort.
  fn notify<'a>(
    &'a self,
    title: &'a str,
    body: &'a str,
  ) -> impl Future<Output = ()> + Send + 'a;

  /// Deliver a notification to a paired peer.
  fn notify_peer<'a>(
    &'a self,
    peer_id: Uuid,
    kind: NotificationKind,
    title: &'a str,
    body: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
