//! Deadline tracking and alert/ping state engine for Lifeline.
//!
//! A user declares a check-in interval; if they fail to confirm liveness
//! before the deadline, their responders are expected to notice and escalate.
//! This crate holds the state machines and timing rules. Identity, biometrics,
//! persistence, and notification delivery are collaborators reached through
//! the traits in [`store`] and [`capability`].
//!
//! This crate is deliberately free of database and terminal dependencies.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod alert;
pub mod capability;
pub mod clock;
pub mod cooldown;
pub mod deadline;
pub mod error;
pub mod memory;
pub mod peer;
pub mod profile;
pub mod session;
pub mod status;
pub mod store;
pub mod tasks;

pub use error::{BiometricFailure, Error, Result};
pub use session::Session;
