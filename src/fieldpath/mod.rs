//! Field path module - Addresses individual settings inside a document.
//!
//! Paths are how a patch is summarised to an operator: one dotted path per
//! changed leaf.

mod path;

pub use path::*;

use crate::value::Value;

/// Returns the path of every leaf in `tree`, in document order.
///
/// Lists are treated as leaves because patches replace them whole. An empty
/// map nested inside `tree` is reported as a leaf as well. A non-map root
/// yields a single empty path.
pub fn leaf_paths(tree: &Value) -> Vec<Path> {
    let mut out = Vec::new();
    collect_leaves(tree, &mut Path::new(), &mut out);
    out
}

fn collect_leaves(value: &Value, prefix: &mut Path, out: &mut Vec<Path>) {
    match value {
        Value::Map(m) if !m.is_empty() => {
            for (key, child) in m {
                prefix.push(PathElement::field_name(key.as_str()));
                collect_leaves(child, prefix, out);
                prefix.pop();
            }
        }
        Value::Map(_) if prefix.is_empty() => {}
        _ => out.push(prefix.clone()),
    }
}
