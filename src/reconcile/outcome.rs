//! Results handed back to the operator.

use crate::fieldpath::{leaf_paths, Path};
use crate::value::Value;

/// Outcome of an apply attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing mutable changed. `stripped` lists protected keys whose edits
    /// were ignored.
    NoChange { stripped: Vec<String> },
    /// The patch was accepted by the cluster.
    Applied { patch: Value, stripped: Vec<String> },
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }

    pub fn stripped(&self) -> &[String] {
        match self {
            Outcome::NoChange { stripped } | Outcome::Applied { stripped, .. } => stripped,
        }
    }

    /// Dotted paths of the submitted leaves. Empty for [`Outcome::NoChange`].
    pub fn changed_paths(&self) -> Vec<Path> {
        match self {
            Outcome::NoChange { .. } => Vec::new(),
            Outcome::Applied { patch, .. } => leaf_paths(patch),
        }
    }

    /// Operator notice for this outcome.
    pub fn message(&self) -> String {
        let headline = match self {
            Outcome::NoChange { .. } => "No changed settings to apply.",
            Outcome::Applied { .. } => "Index settings updated.",
        };
        match stripped_notice(self.stripped()) {
            Some(notice) => format!("{}\n{}", headline, notice),
            None => headline.to_string(),
        }
    }
}

/// Warning shown when protected keys were dropped from a patch.
pub fn stripped_notice(stripped: &[String]) -> Option<String> {
    if stripped.is_empty() {
        return None;
    }
    Some(format!(
        "Changes to protected fields ({}) will not be applied.",
        stripped.join(", ")
    ))
}

/// Completion reports whether a collaborator result was taken into the
/// session.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    Accepted(T),
    /// A newer fetch, apply, or reset started after this request. The
    /// result was ignored.
    Discarded,
}

impl<T> Completion<T> {
    pub fn is_discarded(&self) -> bool {
        matches!(self, Completion::Discarded)
    }

    pub fn accepted(self) -> Option<T> {
        match self {
            Completion::Accepted(v) => Some(v),
            Completion::Discarded => None,
        }
    }
}

/// FetchTicket identifies an in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub(crate) epoch: u64,
    pub target: String,
}

/// ApplyTicket identifies an in-flight apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyTicket {
    pub(crate) epoch: u64,
    pub target: String,
}

/// ApplyPlan is what [`Session::begin_apply`] decided.
///
/// [`Session::begin_apply`]: super::Session::begin_apply
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyPlan {
    /// Nothing to submit; the attempt is finished.
    NoChange(Outcome),
    /// Submit `patch` to the sink, then report back with the ticket.
    Submit {
        ticket: ApplyTicket,
        patch: Value,
        stripped: Vec<String>,
    },
}
