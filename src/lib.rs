//! # Settings Reconciler
//!
//! Computes the minimal settings patch between the settings document a
//! search cluster reports for an index and an operator-edited copy of it.
//!
//! The cluster's document carries identifiers, timestamps, version counters
//! and structural sections that must never be sent back. Sending the whole
//! document could also revert unrelated settings. Only the keys the
//! operator actually changed, minus anything protected, are submitted.
//!
//! ## Modules
//!
//! - [`value`] - In-memory representation of JSON/YAML settings documents
//! - [`fieldpath`] - Dotted paths used to summarise a patch
//! - [`policy`] - Which keys are protected, and loading that list from a file
//! - [`diff`] - Baseline-relative structural diff and protected-field scrubbing
//! - [`reconcile`] - The fetch, edit, apply state machine and its collaborators
//!
//! ## Known limitation
//!
//! A patch can only add or change keys. Deleting a key from the edited text
//! has no effect on what is submitted.

pub mod diff;
pub mod fieldpath;
pub mod policy;
pub mod reconcile;
pub mod value;

pub use diff::{diff, scrub, ScrubResult};
pub use fieldpath::{Path, PathElement};
pub use policy::{FieldPolicy, PolicyConfig};
pub use reconcile::{
    ConfigSink, ConfigSource, Outcome, ReconcileError, Session, SessionState, SourceError,
    Workflow,
};
pub use value::Value;
