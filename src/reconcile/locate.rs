//! Finding the settings section inside a wrapped document.

use crate::value::Value;

/// Returns the settings sub-tree of `document` for index `target`.
///
/// The cluster reports settings as `{target: {settings: {index: {...}}}}`,
/// and operators may paste any level of that wrapping back. The first of
/// these that exists is returned:
///
/// 1. `document[target].settings.index`
/// 2. `document[target].settings`
/// 3. `document[target]`
/// 4. `document`
///
/// A `null` at any level counts as missing.
pub fn locate_settings<'a>(document: &'a Value, target: &str) -> &'a Value {
    let present = |v: &&Value| !v.is_null();
    let wrapped = document.get(target).filter(present);
    let settings = wrapped.and_then(|w| w.get("settings")).filter(present);
    let index = settings.and_then(|s| s.get("index")).filter(present);
    index.or(settings).or(wrapped).unwrap_or(document)
}
