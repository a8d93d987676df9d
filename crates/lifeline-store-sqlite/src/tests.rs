//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeDelta, Utc};
use lifeline_core::{
  peer::{Flag, Peer, Roles},
  profile::{CheckInInterval, SelfProfile},
  store::ProfileStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(s: &str) -> DateTime<Utc> { s.parse().unwrap() }

fn day() -> CheckInInterval { CheckInInterval::from_secs(86_400).unwrap() }

// ─── Self-profile ────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_store_has_no_profile() {
  let s = store().await;
  assert!(s.current_self_profile().await.unwrap().is_none());
}

#[tokio::test]
async fn self_profile_upsert_round_trips_every_field() {
  let s = store().await;
  let mut profile = SelfProfile::new(Uuid::new_v4(), "Ada", day());
  s.update_self_profile(profile.clone()).await.unwrap();
  assert_eq!(s.current_self_profile().await.unwrap(), Some(profile.clone()));

  profile.last_check_in = Some(at("2024-05-01T12:00:00Z"));
  profile.alert_active = true;
  profile.alert_activated_at = Some(at("2024-05-01T12:30:00Z"));
  profile.biometric_required = true;
  profile.check_in_interval = CheckInInterval::new(TimeDelta::hours(6)).unwrap();
  s.update_self_profile(profile.clone()).await.unwrap();

  assert_eq!(s.current_self_profile().await.unwrap(), Some(profile));
}

// ─── Peers ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_peer() {
  let s = store().await;
  let mut peer = Peer::new("Grace", Roles::BOTH, day(), at("2024-04-01T09:00:00Z"));
  peer.last_check_in = Some(at("2024-05-01T08:00:00Z"));
  peer.incoming_ping = Flag::raised(at("2024-05-01T10:00:00Z"));
  s.add_peer(&peer).await.unwrap();

  let fetched = s.get_peer(peer.peer_id).await.unwrap();
  assert_eq!(fetched, Some(peer));
}

#[tokio::test]
async fn get_missing_peer_returns_none() {
  let s = store().await;
  assert!(s.get_peer(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_peer_is_rejected() {
  let s = store().await;
  let peer = Peer::new("Grace", Roles::RESPONDER, day(), at("2024-04-01T09:00:00Z"));
  s.add_peer(&peer).await.unwrap();

  let err = s.add_peer(&peer).await.unwrap_err();
  assert!(matches!(err, Error::DuplicatePeer(id) if id == peer.peer_id));
}

#[tokio::test]
async fn peer_without_roles_is_rejected() {
  let s = store().await;
  let peer = Peer::new("Nobody", Roles::default(), day(), at("2024-04-01T09:00:00Z"));
  assert!(matches!(s.add_peer(&peer).await, Err(Error::NoRole(_))));
}

#[tokio::test]
async fn list_peers_in_pairing_order() {
  let s = store().await;
  let later = Peer::new("Linus", Roles::DEPENDENT, day(), at("2024-04-02T09:00:00Z"));
  let earlier = Peer::new("Grace", Roles::RESPONDER, day(), at("2024-04-01T09:00:00Z"));
  s.add_peer(&later).await.unwrap();
  s.add_peer(&earlier).await.unwrap();

  let names: Vec<String> = s.list_peers().await.unwrap().into_iter().map(|p| p.name).collect();
  assert_eq!(names, ["Grace", "Linus"]);
}

#[tokio::test]
async fn update_peer_replaces_flags() {
  let s = store().await;
  let mut peer = Peer::new("Linus", Roles::DEPENDENT, day(), at("2024-04-01T09:00:00Z"));
  s.add_peer(&peer).await.unwrap();

  peer.outgoing_ping.raise(at("2024-05-01T10:00:00Z"));
  peer.manual_alert = Flag::raised(at("2024-05-01T11:00:00Z"));
  peer.roles = Roles::BOTH;
  s.update_peer(peer.clone()).await.unwrap();
  assert_eq!(s.get_peer(peer.peer_id).await.unwrap().as_ref(), Some(&peer));

  peer.outgoing_ping.clear();
  s.update_peer(peer.clone()).await.unwrap();
  let stored = s.get_peer(peer.peer_id).await.unwrap().unwrap();
  assert_eq!(stored.outgoing_ping, Flag::default());
}

#[tokio::test]
async fn update_missing_peer_fails() {
  let s = store().await;
  let peer = Peer::new("Ghost", Roles::RESPONDER, day(), at("2024-04-01T09:00:00Z"));
  let err = s.update_peer(peer.clone()).await.unwrap_err();
  assert!(matches!(err, Error::PeerNotFound(id) if id == peer.peer_id));
}

#[tokio::test]
async fn remove_peer_deletes_once() {
  let s = store().await;
  let peer = Peer::new("Grace", Roles::RESPONDER, day(), at("2024-04-01T09:00:00Z"));
  s.add_peer(&peer).await.unwrap();

  s.remove_peer(peer.peer_id).await.unwrap();
  assert!(s.get_peer(peer.peer_id).await.unwrap().is_none());
  assert!(matches!(s.remove_peer(peer.peer_id).await, Err(Error::PeerNotFound(_))));
}

#[tokio::test]
async fn missing_peers_are_reported_as_not_found() {
  use lifeline_core::store::StoreError as _;

  let s = store().await;
  let peer = Peer::new("Ghost", Roles::RESPONDER, day(), at("2024-04-01T09:00:00Z"));

  assert!(s.update_peer(peer.clone()).await.unwrap_err().is_not_found());
  assert!(s.remove_peer(peer.peer_id).await.unwrap_err().is_not_found());
  assert!(!Error::NoRole(peer.peer_id).is_not_found());
}

// ─── Behind a session ────────────────────────────────────────────────────────

#[tokio::test]
async fn check_in_persists_through_the_session() {
  use lifeline_core::{
    BiometricFailure, Session,
    capability::{Authenticator, NotificationKind, Notifier},
  };

  struct Allow;

  impl Authenticator for Allow {
    async fn authenticate<'a>(&'a self, _reason: &'a str) -> Result<(), BiometricFailure> {
      Ok(())
    }
  }

  struct Silent;

  impl Notifier for Silent {
    type Error = std::io::Error;

    async fn notify<'a>(&'a self, _title: &'a str, _body: &'a str) {}

    async fn notify_peer<'a>(
      &'a self,
      _peer_id: Uuid,
      _kind: NotificationKind,
      _title: &'a str,
      _body: &'a str,
    ) -> Result<(), std::io::Error> {
      Ok(())
    }
  }

  let s = store().await;
  let user_id = Uuid::new_v4();
  s.update_self_profile(SelfProfile::new(user_id, "Ada", day())).await.unwrap();

  let session = Session::new(s.clone(), Allow, Silent);
  session.sign_in(user_id);
  let receipt = session.check_in().await.unwrap();

  let stored = s.current_self_profile().await.unwrap().unwrap();
  assert_eq!(stored.last_check_in, Some(receipt.at));
}
