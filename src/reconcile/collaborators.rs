//! Seams to the cluster: where baselines come from and where patches go.

use super::SourceError;
use crate::value::{Map, Value};

/// ConfigSource retrieves the settings document of an index.
pub trait ConfigSource {
    /// Returns the document exactly as the cluster reported it, typically
    /// shaped `{"<index>": {"settings": {"index": {...}}}}`.
    fn fetch_settings(&self, target: &str) -> Result<Value, SourceError>;
}

/// ConfigSink submits a settings patch for an index.
pub trait ConfigSink {
    /// Submits `patch` as one request. `patch` is the bare settings map;
    /// use [`SettingsUpdate`] to build the request body.
    fn apply_settings(&self, target: &str, patch: &Value) -> Result<(), SourceError>;
}

impl<T: ConfigSource + ?Sized> ConfigSource for &T {
    fn fetch_settings(&self, target: &str) -> Result<Value, SourceError> {
        (**self).fetch_settings(target)
    }
}

impl<T: ConfigSink + ?Sized> ConfigSink for &T {
    fn apply_settings(&self, target: &str, patch: &Value) -> Result<(), SourceError> {
        (**self).apply_settings(target, patch)
    }
}

/// SettingsUpdate is the request body of an update-settings call.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsUpdate {
    patch: Value,
}

impl SettingsUpdate {
    pub fn new(patch: Value) -> Self {
        SettingsUpdate { patch }
    }

    pub fn patch(&self) -> &Value {
        &self.patch
    }

    /// Wraps the patch under `index`, the section the endpoint expects.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.set("index", self.patch.clone());
        Value::Map(body)
    }
}
