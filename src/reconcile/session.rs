//! The reconciliation state machine.

use super::{
    locate_settings, stripped_notice, ApplyPlan, ApplyTicket, Completion, FetchTicket, Outcome,
    ReconcileError, SourceError,
};
use crate::diff::{diff, protected_fields_in, scrub, ScrubResult};
use crate::policy::FieldPolicy;
use crate::value::{from_json, to_json_pretty, Value};
use std::fmt;
use tracing::{debug, info, warn};

/// SessionState is where a [`Session`] is in the fetch/edit/apply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Fetching,
    Ready,
    Editing,
    Validating,
    Applying,
    NoChange,
    Applied,
}

impl SessionState {
    /// True while a collaborator call is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, SessionState::Fetching | SessionState::Applying)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Fetching => "fetching",
            SessionState::Ready => "ready",
            SessionState::Editing => "editing",
            SessionState::Validating => "validating",
            SessionState::Applying => "applying",
            SessionState::NoChange => "no change",
            SessionState::Applied => "applied",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
enum InFlight {
    Fetch { epoch: u64 },
    Apply { epoch: u64, patch: Value, stripped: Vec<String> },
}

impl InFlight {
    fn epoch(&self) -> u64 {
        match self {
            InFlight::Fetch { epoch } | InFlight::Apply { epoch, .. } => *epoch,
        }
    }
}

/// Session holds one operator's reconciliation of one index.
///
/// The session does no I/O. A fetch is [`begin_fetch`] followed by
/// [`complete_fetch`] with whatever the source returned; an apply is
/// [`begin_apply`] followed by [`complete_apply`]. Every begin hands out a
/// ticket stamped with a fresh epoch, and a completion whose epoch is no
/// longer current is discarded, so a slow response can never overwrite
/// state produced by a later fetch or a reset.
///
/// [`begin_fetch`]: Session::begin_fetch
/// [`complete_fetch`]: Session::complete_fetch
/// [`begin_apply`]: Session::begin_apply
/// [`complete_apply`]: Session::complete_apply
#[derive(Debug, Clone)]
pub struct Session {
    policy: FieldPolicy,
    target: Option<String>,
    baseline: Option<Value>,
    candidate: String,
    state: SessionState,
    epoch: u64,
    in_flight: Option<InFlight>,
    last_error: Option<ReconcileError>,
    last_outcome: Option<Outcome>,
}

impl Session {
    /// Creates an idle session.
    pub fn new(policy: FieldPolicy) -> Self {
        Session {
            policy,
            target: None,
            baseline: None,
            candidate: String::new(),
            state: SessionState::Idle,
            epoch: 0,
            in_flight: None,
            last_error: None,
            last_outcome: None,
        }
    }

    /// Restores a session from a saved target and candidate text.
    ///
    /// There is no baseline, so an apply submits the whole candidate
    /// settings section, minus protected keys.
    pub fn with_draft(
        policy: FieldPolicy,
        target: impl Into<String>,
        candidate: impl Into<String>,
    ) -> Self {
        let mut session = Session::new(policy);
        session.target = Some(target.into());
        session.candidate = candidate.into();
        session.state = SessionState::Editing;
        session
    }

    pub fn policy(&self) -> &FieldPolicy {
        &self.policy
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// The document from the last successful fetch of the current target.
    pub fn baseline(&self) -> Option<&Value> {
        self.baseline.as_ref()
    }

    pub fn candidate_text(&self) -> &str {
        &self.candidate
    }

    pub fn last_error(&self) -> Option<&ReconcileError> {
        self.last_error.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    /// Starts fetching the settings of `target`.
    ///
    /// Surrounding whitespace is trimmed from `target`; a blank target is
    /// [`ReconcileError::MissingTarget`].
    ///
    /// Switching to a different target drops the cached baseline and the
    /// candidate text immediately. Any fetch or apply still in flight is
    /// superseded.
    pub fn begin_fetch(&mut self, target: &str) -> Result<FetchTicket, ReconcileError> {
        let target = target.trim();
        if target.is_empty() {
            if self.state.is_in_flight() {
                return Err(ReconcileError::MissingTarget);
            }
            return Err(self.fail(ReconcileError::MissingTarget));
        }

        if self.target.as_deref() != Some(target) {
            if self.baseline.is_some() || !self.candidate.is_empty() {
                debug!(
                    from = self.target.as_deref().unwrap_or(""),
                    to = target,
                    "switching target, dropping baseline"
                );
            }
            self.baseline = None;
            self.candidate.clear();
            self.target = Some(target.to_string());
        }

        let epoch = self.next_epoch();
        self.in_flight = Some(InFlight::Fetch { epoch });
        self.state = SessionState::Fetching;
        self.last_error = None;
        info!(target_index = target, epoch, "fetching index settings");

        Ok(FetchTicket {
            epoch,
            target: target.to_string(),
        })
    }

    /// Records the result of the fetch identified by `ticket`.
    ///
    /// On success the document becomes the baseline and the candidate text
    /// is reset to its pretty-printed form. On failure the previous baseline
    /// of the same target, if any, is kept.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Value, SourceError>,
    ) -> Result<Completion<()>, ReconcileError> {
        if !self.is_current(ticket.epoch, false) {
            warn!(target_index = %ticket.target, epoch = ticket.epoch, "discarding stale fetch result");
            return Ok(Completion::Discarded);
        }
        self.in_flight = None;

        let document = match result {
            Ok(document) => document,
            Err(source) => {
                return Err(self.fail(ReconcileError::Fetch {
                    target: ticket.target,
                    source,
                }));
            }
        };

        let text = match to_json_pretty(&document) {
            Ok(text) => text,
            Err(e) => {
                return Err(self.fail(ReconcileError::Fetch {
                    target: ticket.target,
                    source: SourceError::other(e.to_string()),
                }));
            }
        };

        info!(target_index = %ticket.target, "fetched index settings");
        self.candidate = text;
        self.baseline = Some(document);
        self.state = SessionState::Ready;
        Ok(Completion::Accepted(()))
    }

    /// Replaces the candidate text.
    pub fn edit(&mut self, text: impl Into<String>) -> Result<(), ReconcileError> {
        self.ensure_not_in_flight()?;
        self.candidate = text.into();
        self.state = SessionState::Editing;
        Ok(())
    }

    /// Validates the candidate text and works out the patch.
    ///
    /// Returns [`ApplyPlan::NoChange`] when nothing mutable changed, which
    /// finishes the attempt. Otherwise the session moves to `Applying` and
    /// the caller submits the returned patch, then calls
    /// [`complete_apply`](Session::complete_apply).
    pub fn begin_apply(&mut self) -> Result<ApplyPlan, ReconcileError> {
        self.ensure_not_in_flight()?;

        let target = match self.target.clone().filter(|t| !t.trim().is_empty()) {
            Some(target) => target,
            None => return Err(self.fail(ReconcileError::MissingTarget)),
        };

        self.state = SessionState::Validating;
        let candidate = match parse_candidate(&self.candidate) {
            Ok(candidate) => candidate,
            Err(e) => return Err(self.fail(e)),
        };

        let result =
            match compute_patch(&candidate, self.baseline.as_ref(), &target, &self.policy) {
                Ok(result) => result,
                Err(e) => return Err(self.fail(e)),
            };

        if let Some(notice) = stripped_notice(&result.removed) {
            warn!(target_index = %target, stripped = ?result.removed, "{}", notice);
        }

        if result.is_empty() {
            info!(target_index = %target, "no changed settings to apply");
            let outcome = Outcome::NoChange {
                stripped: result.removed,
            };
            self.state = SessionState::NoChange;
            self.last_error = None;
            self.last_outcome = Some(outcome.clone());
            return Ok(ApplyPlan::NoChange(outcome));
        }

        let epoch = self.next_epoch();
        self.in_flight = Some(InFlight::Apply {
            epoch,
            patch: result.filtered.clone(),
            stripped: result.removed.clone(),
        });
        self.state = SessionState::Applying;
        self.last_error = None;
        info!(target_index = %target, epoch, "submitting settings patch");

        Ok(ApplyPlan::Submit {
            ticket: ApplyTicket { epoch, target },
            patch: result.filtered,
            stripped: result.removed,
        })
    }

    /// Records the result of the apply identified by `ticket`.
    pub fn complete_apply(
        &mut self,
        ticket: ApplyTicket,
        result: Result<(), SourceError>,
    ) -> Result<Completion<Outcome>, ReconcileError> {
        if !self.is_current(ticket.epoch, true) {
            warn!(target_index = %ticket.target, epoch = ticket.epoch, "discarding stale apply result");
            return Ok(Completion::Discarded);
        }
        let (patch, stripped) = match self.in_flight.take() {
            Some(InFlight::Apply { patch, stripped, .. }) => (patch, stripped),
            _ => return Ok(Completion::Discarded),
        };

        if let Err(source) = result {
            return Err(self.fail(ReconcileError::Apply {
                target: ticket.target,
                source,
            }));
        }

        info!(target_index = %ticket.target, "index settings updated");
        let outcome = Outcome::Applied { patch, stripped };
        self.state = SessionState::Applied;
        self.last_outcome = Some(outcome.clone());
        Ok(Completion::Accepted(outcome))
    }

    /// Protected keys present anywhere in the candidate text.
    pub fn protected_fields_in_candidate(&self) -> Result<Vec<String>, ReconcileError> {
        let candidate = parse_candidate(&self.candidate)?;
        Ok(protected_fields_in(&candidate, &self.policy))
    }

    /// Returns to `Idle`, forgetting the target, baseline and candidate.
    /// Results of requests still in flight will be discarded.
    pub fn reset(&mut self) {
        self.next_epoch();
        self.in_flight = None;
        self.target = None;
        self.baseline = None;
        self.candidate.clear();
        self.state = SessionState::Idle;
        self.last_error = None;
        self.last_outcome = None;
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn is_current(&self, epoch: u64, apply: bool) -> bool {
        match &self.in_flight {
            Some(flight @ InFlight::Apply { .. }) if apply => flight.epoch() == epoch,
            Some(flight @ InFlight::Fetch { .. }) if !apply => flight.epoch() == epoch,
            _ => false,
        }
    }

    fn ensure_not_in_flight(&self) -> Result<(), ReconcileError> {
        if self.state.is_in_flight() {
            return Err(ReconcileError::Busy { state: self.state });
        }
        Ok(())
    }

    /// Records `err` and falls back to `Ready` while there is still a target
    /// and something to edit, otherwise to `Idle`.
    fn fail(&mut self, err: ReconcileError) -> ReconcileError {
        let has_work = self.baseline.is_some() || !self.candidate.is_empty();
        self.state = if self.target.is_some() && has_work {
            SessionState::Ready
        } else {
            SessionState::Idle
        };
        warn!(error = %err, state = %self.state, "reconciliation failed");
        self.last_error = Some(err.clone());
        err
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(FieldPolicy::default())
    }
}

/// Parses candidate text. Partial documents are never accepted.
pub fn parse_candidate(text: &str) -> Result<Value, ReconcileError> {
    from_json(text).map_err(|e| ReconcileError::malformed(e.to_string()))
}

/// Computes the scrubbed patch for a parsed candidate.
///
/// Candidate and baseline are unwrapped with [`locate_settings`] before
/// they are compared. Without a baseline the whole candidate section is
/// scrubbed and returned. The candidate section must be a map.
pub fn compute_patch(
    candidate: &Value,
    baseline: Option<&Value>,
    target: &str,
    policy: &FieldPolicy,
) -> Result<ScrubResult, ReconcileError> {
    let current = locate_settings(candidate, target);
    if !current.is_map() {
        return Err(ReconcileError::malformed(format!(
            "expected a settings object, found {}",
            current.kind()
        )));
    }

    let result = match baseline {
        Some(baseline) => {
            let original = locate_settings(baseline, target);
            let changes = diff(current, original, policy);
            scrub(&changes, policy)
        }
        None => scrub(current, policy),
    };
    debug!(
        target_index = target,
        has_baseline = baseline.is_some(),
        changed = result.filtered.as_map().map_or(0, |m| m.len()),
        stripped = result.removed.len(),
        "computed settings patch"
    );
    Ok(result)
}
