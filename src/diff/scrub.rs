//! Removal of protected keys from arbitrary trees.

use crate::policy::FieldPolicy;
use crate::value::{Map, Value};

/// ScrubResult is a tree with protected keys removed, plus the names of the
/// keys that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrubResult {
    pub filtered: Value,
    /// Dropped key names in traversal order. A key removed at several depths
    /// appears once per occurrence.
    pub removed: Vec<String>,
}

impl ScrubResult {
    /// True when nothing is left to submit.
    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty_map()
    }

    /// True when at least one protected key was dropped.
    pub fn stripped_any(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Strips every protected key from `tree`, at any depth.
///
/// A map value that is empty after scrubbing is dropped along with its key.
/// Lists are always kept: maps inside them are scrubbed in place, and an
/// element is never removed from its list even when it ends up empty.
pub fn scrub(tree: &Value, policy: &FieldPolicy) -> ScrubResult {
    let mut removed = Vec::new();
    let filtered = scrub_value(tree, policy, &mut removed);
    ScrubResult { filtered, removed }
}

fn scrub_value(value: &Value, policy: &FieldPolicy, removed: &mut Vec<String>) -> Value {
    match value {
        Value::Map(m) => Value::Map(scrub_map(m, policy, removed)),
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| scrub_value(item, policy, removed))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn scrub_map(map: &Map, policy: &FieldPolicy, removed: &mut Vec<String>) -> Map {
    let mut out = Map::new();
    for (key, value) in map {
        if policy.is_protected(key) {
            removed.push(key.clone());
            continue;
        }
        match value {
            Value::Map(nested) => {
                let nested = scrub_map(nested, policy, removed);
                if !nested.is_empty() {
                    out.set(key.as_str(), Value::Map(nested));
                }
            }
            _ => out.set(key.as_str(), scrub_value(value, policy, removed)),
        }
    }
    out
}

/// Lists every protected key appearing in `tree`, depth first.
///
/// Unlike [`scrub`], the walk continues below protected keys, so a protected
/// key nested inside another one is reported as well.
pub fn protected_fields_in(tree: &Value, policy: &FieldPolicy) -> Vec<String> {
    let mut found = Vec::new();
    collect_protected(tree, policy, &mut found);
    found
}

fn collect_protected(value: &Value, policy: &FieldPolicy, found: &mut Vec<String>) {
    match value {
        Value::Map(m) => {
            for (key, child) in m {
                if policy.is_protected(key) {
                    found.push(key.clone());
                }
                collect_protected(child, policy, found);
            }
        }
        Value::List(items) => {
            for item in items {
                collect_protected(item, policy, found);
            }
        }
        _ => {}
    }
}
