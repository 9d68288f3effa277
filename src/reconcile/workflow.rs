//! Driving a session against blocking collaborators.

use super::{ApplyPlan, Completion, ConfigSink, ConfigSource, Outcome, ReconcileError, Session};
use crate::policy::FieldPolicy;

/// Workflow runs a [`Session`] against a source and a sink.
///
/// Each call performs the collaborator request inline, so a completion can
/// never be stale here. Callers that issue requests concurrently should use
/// the session's ticket API directly.
pub struct Workflow<S, K> {
    session: Session,
    source: S,
    sink: K,
}

impl<S: ConfigSource, K: ConfigSink> Workflow<S, K> {
    pub fn new(policy: FieldPolicy, source: S, sink: K) -> Self {
        Self::with_session(Session::new(policy), source, sink)
    }

    pub fn with_session(session: Session, source: S, sink: K) -> Self {
        Workflow {
            session,
            source,
            sink,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Fetches `target` and caches it as the baseline.
    pub fn fetch(&mut self, target: &str) -> Result<(), ReconcileError> {
        let ticket = self.session.begin_fetch(target)?;
        let result = self.source.fetch_settings(&ticket.target);
        match self.session.complete_fetch(ticket, result)? {
            Completion::Accepted(()) => Ok(()),
            Completion::Discarded => Err(ReconcileError::Superseded),
        }
    }

    /// Replaces the candidate text.
    pub fn edit(&mut self, text: impl Into<String>) -> Result<(), ReconcileError> {
        self.session.edit(text)
    }

    /// Computes the patch and submits it if anything changed.
    pub fn apply(&mut self) -> Result<Outcome, ReconcileError> {
        let (ticket, patch) = match self.session.begin_apply()? {
            ApplyPlan::NoChange(outcome) => return Ok(outcome),
            ApplyPlan::Submit { ticket, patch, .. } => (ticket, patch),
        };
        let result = self.sink.apply_settings(&ticket.target, &patch);
        match self.session.complete_apply(ticket, result)? {
            Completion::Accepted(outcome) => Ok(outcome),
            Completion::Discarded => Err(ReconcileError::Superseded),
        }
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }
}
