//! View selection and the per-request attribute bag handed to the renderer.

use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::Value;

/// Insertion-ordered attribute bag for a single view render.
///
/// Holds at most one entry per key. Writing an existing key replaces its
/// value and keeps the entry where it was first inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    entries: Vec<(String, Value)>,
}

impl ViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Applies every entry of `other` in order, overwriting shared keys.
    pub fn merge(&mut self, other: ViewModel) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

impl Serialize for ViewModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewTarget {
    /// Template identifier, e.g. `personnel/main`.
    Template(String),
    /// Location to send the client to instead of rendering.
    Redirect(String),
}

/// Result of a request handler: what to show and with which attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSelection {
    pub target: ViewTarget,
    pub attributes: ViewModel,
}

impl ViewSelection {
    pub fn template(name: impl Into<String>) -> Self {
        Self {
            target: ViewTarget::Template(name.into()),
            attributes: ViewModel::new(),
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            target: ViewTarget::Redirect(location.into()),
            attributes: ViewModel::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: ViewModel) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn view_name(&self) -> &str {
        match &self.target {
            ViewTarget::Template(name) | ViewTarget::Redirect(name) => name,
        }
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
