//! Error types for `lifeline-core`.
//!
//! Nothing here is fatal. Every variant maps to a retryable notice through
//! [`Error::notice`]; callers reset their in-flight flags and show it.

use thiserror::Error;
use uuid::Uuid;

use crate::cooldown::CooldownRejection;

/// Why the biometric capability refused to vouch for the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BiometricFailure {
  #[error("authentication was cancelled")]
  Cancelled,

  #[error("biometric authentication is unavailable on this device")]
  Unavailable,

  #[error("no biometrics are enrolled on this device")]
  NotEnrolled,

  #[error("authentication failed: {0}")]
  Other(String),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("no signed-in user")]
  AuthRequired,

  #[error("self-profile not found")]
  ProfileNotFound,

  #[error("peer not found: {0}")]
  PeerNotFound(Uuid),

  #[error("biometric check failed: {0}")]
  Biometric(#[from] BiometricFailure),

  #[error("check-in rejected: {0}")]
  Cooldown(CooldownRejection),

  #[error("validation failed: {0}")]
  Validation(String),

  /// Persistence or notification delivery failed.
  #[error("network failure: {0}")]
  Network(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a collaborator error (store, notifier) as a network failure.
  pub fn network(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Network(Box::new(err))
  }

  /// Human-readable text for the retryable notice shown to the user.
  pub fn notice(&self) -> String {
    match self {
      Error::AuthRequired => "Please sign in again.".to_owned(),
      Error::ProfileNotFound => {
        "Your profile could not be loaded. Try again in a moment.".to_owned()
      }
      Error::PeerNotFound(_) => "That contact is no longer available.".to_owned(),
      Error::Biometric(BiometricFailure::Cancelled) => {
        "Authentication was cancelled.".to_owned()
      }
      Error::Biometric(BiometricFailure::Unavailable) => {
        "Biometric authentication is not available on this device.".to_owned()
      }
      Error::Biometric(BiometricFailure::NotEnrolled) => {
        "Set up Face ID, Touch ID, or a passcode to continue.".to_owned()
      }
      Error::Biometric(BiometricFailure::Other(reason)) => {
        format!("Authentication failed: {reason}")
      }
      Error::Cooldown(rejection) => format!(
        "You just checked in. Try again in {}.",
        rejection.remaining_text()
      ),
      Error::Validation(reason) => reason.clone(),
      Error::Network(_) => {
        "Could not reach the server. Check your connection and try again."
          .to_owned()
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
