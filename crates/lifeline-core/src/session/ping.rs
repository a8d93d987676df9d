//! Ping and response: the "are you okay / I'm okay" exchange between peers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use uuid::Uuid;

use super::{InFlight, Session};
use crate::{
  Error, Result,
  capability::{Authenticator, NotificationKind, Notifier, reason},
  peer::Peer,
  store::ProfileStore,
};

/// Which step of answering a ping failed for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RespondStage {
  /// Clearing the incoming flag was not persisted.
  Clear,
  /// The acknowledgment did not reach the peer.
  Acknowledge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RespondFailure {
  pub peer_id: Uuid,
  pub stage:   RespondStage,
  pub reason:  String,
}

/// The check-in attempted as a side effect of responding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckInAttempt {
  Succeeded { at: DateTime<Utc> },
  /// The responses still count; this is surfaced as a separate warning.
  Failed { notice: String },
}

/// Outcome of answering pending pings. Per-peer failures do not fail the
/// batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RespondReport {
  pub cleared:      Vec<Uuid>,
  pub acknowledged: Vec<Uuid>,
  pub failures:     Vec<RespondFailure>,
  pub check_in:     CheckInAttempt,
}

impl RespondReport {
  pub fn is_clean(&self) -> bool {
    self.failures.is_empty() && matches!(self.check_in, CheckInAttempt::Succeeded { .. })
  }
}

impl<S, A, N> Session<S, A, N>
where
  S: ProfileStore + 'static,
  A: Authenticator + 'static,
  N: Notifier + 'static,
{
  /// Ask a dependent whether they are okay.
  ///
  /// Idempotent: sending again refreshes the timestamp. The flag is kept
  /// even when delivery fails, so a retry only has to resend.
  pub async fn send_ping(&self, peer_id: Uuid) -> Result<Peer> {
    let profile = self.profile().await?;

    let write = self.writes.lock().await;
    let mut peer = self.peer(peer_id).await?;
    if !peer.is_dependent() {
      return Err(Error::Validation(format!("{} is not one of your dependents", peer.name)));
    }

    let now = self.now();
    peer.outgoing_ping.raise(now);
    self.save_peer(peer.clone()).await?;
    drop(write);

    self
      .notifier
      .notify_peer(
        peer_id,
        NotificationKind::Ping,
        &format!("{} is checking on you", profile.name),
        "Open Lifeline and let them know you are okay.",
      )
      .await
      .map_err(|err| {
        tracing::warn!(%peer_id, error = %err, "ping delivery failed");
        Error::network(err)
      })?;

    tracing::info!(%peer_id, at = %now, "ping sent");
    Ok(peer)
  }

  /// Answer every responder that pinged the user, then check in once.
  pub async fn respond_to_all_pings(&self) -> Result<RespondReport> {
    self.respond(None).await
  }

  /// Answer a single responder's ping, then check in once.
  pub async fn respond_to_ping(&self, peer_id: Uuid) -> Result<RespondReport> {
    self.respond(Some(peer_id)).await
  }

  async fn respond(&self, only: Option<Uuid>) -> Result<RespondReport> {
    let _flag = InFlight::enter(&self.responding);
    let profile = self.profile().await?;

    let pending: Vec<Uuid> = match only {
      Some(peer_id) => {
        let peer = self.peer(peer_id).await?;
        if !peer.awaits_response() {
          return Err(Error::Validation(format!("{} has not pinged you", peer.name)));
        }
        vec![peer_id]
      }
      None => self
        .peers()
        .await?
        .into_iter()
        .filter(Peer::awaits_response)
        .map(|peer| peer.peer_id)
        .collect(),
    };

    // All or nothing: no flag is touched unless the owner confirms.
    if profile.biometric_required {
      self.auth.authenticate(reason::RESPOND_TO_PINGS).await.map_err(|failure| {
        tracing::info!(%failure, "ping response not authenticated");
        Error::Biometric(failure)
      })?;
    }

    let mut cleared = Vec::with_capacity(pending.len());
    let mut acknowledged = Vec::with_capacity(pending.len());
    let mut failures = Vec::new();

    let title = format!("{} is okay", profile.name);
    for peer_id in pending {
      match self.clear_incoming_ping(peer_id).await {
        Ok(()) => cleared.push(peer_id),
        Err(err) => {
          tracing::warn!(%peer_id, error = %err, "could not clear incoming ping");
          let unpaired = matches!(err, Error::PeerNotFound(_));
          failures.push(RespondFailure {
            peer_id,
            stage: RespondStage::Clear,
            reason: err.notice(),
          });
          if unpaired {
            continue;
          }
        }
      }

      match self
        .notifier
        .notify_peer(peer_id, NotificationKind::PingResponse, &title, "They answered your ping.")
        .await
      {
        Ok(()) => acknowledged.push(peer_id),
        Err(err) => {
          tracing::warn!(%peer_id, error = %err, "ping acknowledgment failed");
          failures.push(RespondFailure {
            peer_id,
            stage: RespondStage::Acknowledge,
            reason: err.to_string(),
          });
        }
      }
    }

    let check_in = match self.check_in().await {
      Ok(receipt) => CheckInAttempt::Succeeded { at: receipt.at },
      Err(err) => {
        tracing::warn!(error = %err, "check-in after responding failed");
        CheckInAttempt::Failed { notice: err.notice() }
      }
    };

    tracing::info!(
      cleared = cleared.len(),
      acknowledged = acknowledged.len(),
      failures = failures.len(),
      "responded to pings"
    );
    Ok(RespondReport { cleared, acknowledged, failures, check_in })
  }

  /// Lower the incoming ping on the current record, leaving whatever else
  /// was synced since the batch was listed.
  async fn clear_incoming_ping(&self, peer_id: Uuid) -> Result<()> {
    let _write = self.writes.lock().await;
    let mut peer = self.peer(peer_id).await?;
    peer.incoming_ping.clear();
    self.save_peer(peer).await
  }
}
