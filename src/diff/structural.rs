//! Baseline-relative structural diff.

use crate::policy::FieldPolicy;
use crate::value::{Map, Value};

/// Computes the fields of `candidate` that differ from `baseline`.
///
/// The result holds only keys that are new in `candidate` or whose value
/// changed, with every value taken from `candidate`. Maps are compared key
/// by key; lists and scalars are compared as whole values. Nested maps with
/// no changes are pruned, so the result never contains an empty branch.
///
/// Protected keys are skipped wherever they are compared. A map that is
/// entirely new is copied verbatim, protected keys included; run [`scrub`]
/// on the result before submitting it.
///
/// Keys present only in `baseline` are not represented: there is no way to
/// express a deletion, and removing a key from the candidate has no effect
/// on the patch.
///
/// When either side is not a map, the result is `candidate` itself.
///
/// [`scrub`]: super::scrub
pub fn diff(candidate: &Value, baseline: &Value, policy: &FieldPolicy) -> Value {
    match (candidate, baseline) {
        (Value::Map(c), Value::Map(b)) => Value::Map(diff_maps(c, b, policy)),
        _ => candidate.clone(),
    }
}

fn diff_maps(candidate: &Map, baseline: &Map, policy: &FieldPolicy) -> Map {
    let mut out = Map::new();
    for (key, value) in candidate {
        if policy.is_protected(key) {
            continue;
        }
        match (value, baseline.get(key)) {
            (_, None) => out.set(key.as_str(), value.clone()),
            (Value::Map(c), Some(Value::Map(b))) => {
                let nested = diff_maps(c, b, policy);
                if !nested.is_empty() {
                    out.set(key.as_str(), Value::Map(nested));
                }
            }
            (_, Some(base)) => {
                if value != base {
                    out.set(key.as_str(), value.clone());
                }
            }
        }
    }
    out
}
