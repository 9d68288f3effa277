//! Protected field classification.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Keys the cluster assigns or manages itself. Resubmitting any of them in a
/// settings update is either rejected or silently reverts cluster state.
pub const DEFAULT_PROTECTED_FIELDS: &[&str] = &[
    "uuid",
    "creation_date",
    "provided_name",
    "version",
    "creation_date_string",
    "upgrade",
    "routing_partition_size",
    "verified_before_close",
    "format",
    "settings_version",
    "frozen",
    "hidden",
    "shrink",
    "rollover",
    "lifecycle",
    "aliases",
    "mappings",
];

static DEFAULT_POLICY: Lazy<FieldPolicy> =
    Lazy::new(|| FieldPolicy::new(DEFAULT_PROTECTED_FIELDS.iter().copied()));

/// FieldPolicy decides whether a key may appear in a submitted patch.
///
/// Matching is by exact, case-sensitive key name and ignores depth: a key
/// that is protected at the top level is protected inside any nested map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPolicy {
    protected: HashSet<String>,
}

impl FieldPolicy {
    /// Creates a policy protecting exactly `keys`.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPolicy {
            protected: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a policy that protects nothing.
    pub fn empty() -> Self {
        FieldPolicy {
            protected: HashSet::new(),
        }
    }

    /// Returns a shared reference to the built-in policy.
    pub fn builtin() -> &'static FieldPolicy {
        &DEFAULT_POLICY
    }

    /// Adds `key` to the protected set.
    pub fn protect(mut self, key: impl Into<String>) -> Self {
        self.protected.insert(key.into());
        self
    }

    /// Removes `key` from the protected set.
    pub fn allow(mut self, key: &str) -> Self {
        self.protected.remove(key);
        self
    }

    pub fn is_protected(&self, key: &str) -> bool {
        self.protected.contains(key)
    }

    pub fn len(&self) -> usize {
        self.protected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protected.is_empty()
    }

    /// Returns the protected keys sorted by name.
    pub fn protected_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.protected.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for FieldPolicy {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}
