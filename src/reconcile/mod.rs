//! Reconcile module - Fetch, edit, diff, scrub and submit index settings.
//!
//! [`Session`] is the state machine; [`Workflow`] runs it against a
//! [`ConfigSource`] and a [`ConfigSink`].

mod collaborators;
mod error;
mod locate;
mod outcome;
mod session;
mod workflow;

#[cfg(test)]
mod session_test;

pub use collaborators::*;
pub use error::*;
pub use locate::*;
pub use outcome::*;
pub use session::*;
pub use workflow::*;
