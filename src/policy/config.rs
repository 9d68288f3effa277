//! Loading a field policy from a configuration file.

use super::{FieldPolicy, DEFAULT_PROTECTED_FIELDS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// PolicyError is returned when a policy file cannot be read or parsed.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// PolicyConfig is the on-disk description of a field policy.
///
/// ```yaml
/// inherit_defaults: true
/// protected: [number_of_shards]
/// allow: [hidden]
/// ```
///
/// YAML is a superset of JSON, so the same file may be written as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Start from the built-in protected list.
    pub inherit_defaults: bool,
    /// Additional keys to protect.
    pub protected: Vec<String>,
    /// Keys to remove from the protected set. Applied last.
    pub allow: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            inherit_defaults: true,
            protected: Vec::new(),
            allow: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Parses a policy document.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Reads and parses a policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|source| PolicyError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!(
            path = %path.display(),
            inherit_defaults = config.inherit_defaults,
            protected = config.protected.len(),
            allow = config.allow.len(),
            "loaded field policy"
        );
        Ok(config)
    }

    /// Builds the policy this configuration describes.
    pub fn into_policy(self) -> FieldPolicy {
        let base: Vec<String> = if self.inherit_defaults {
            DEFAULT_PROTECTED_FIELDS.iter().map(|k| k.to_string()).collect()
        } else {
            Vec::new()
        };
        let policy = self
            .protected
            .into_iter()
            .fold(FieldPolicy::new(base), |policy, key| policy.protect(key));
        self.allow
            .iter()
            .fold(policy, |policy, key| policy.allow(key))
    }
}
