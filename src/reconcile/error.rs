//! Error types for reconciliation.

use super::SessionState;
use std::fmt;
use thiserror::Error;

/// SourceErrorKind classifies a failure reported by a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The cluster could not be reached.
    Network,
    /// Credentials were missing or refused.
    Unauthorized,
    /// The target index does not exist.
    NotFound,
    /// The cluster refused the submitted settings.
    Rejected,
    Other,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceErrorKind::Network => "network error",
            SourceErrorKind::Unauthorized => "unauthorized",
            SourceErrorKind::NotFound => "not found",
            SourceErrorKind::Rejected => "rejected",
            SourceErrorKind::Other => "error",
        };
        f.write_str(s)
    }
}

/// SourceError is returned by a [`ConfigSource`] or [`ConfigSink`].
///
/// `message` is whatever the cluster or transport reported, kept verbatim.
///
/// [`ConfigSource`]: super::ConfigSource
/// [`ConfigSink`]: super::ConfigSink
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        SourceError {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Network, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotFound, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Rejected, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Other, message)
    }
}

/// ReconcileError is every way a fetch or apply can fail.
///
/// None of these leave the session half-updated: the cached baseline and
/// the candidate text survive every failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("an index name is required")]
    MissingTarget,

    #[error("failed to fetch settings for {target}: {source}")]
    Fetch { target: String, source: SourceError },

    #[error("invalid settings document: {message}")]
    MalformedInput { message: String },

    #[error("failed to update settings for {target}: {source}")]
    Apply { target: String, source: SourceError },

    #[error("a request is already in flight ({state})")]
    Busy { state: SessionState },

    #[error("request was superseded by a newer one")]
    Superseded,
}

impl ReconcileError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ReconcileError::MalformedInput {
            message: message.into(),
        }
    }

    /// The collaborator error behind a fetch or apply failure.
    pub fn source_error(&self) -> Option<&SourceError> {
        match self {
            ReconcileError::Fetch { source, .. } | ReconcileError::Apply { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}
