#![forbid(unsafe_code)]

//! Per-call context passed alongside binding operations.
//!
//! Most calls pass `None`. Hosts use metadata to carry small flags through
//! parsers, holders, and lifecycle listeners without widening every
//! signature.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::value::Value;

/// String-keyed bag of values.
#[derive(Clone, Default, PartialEq)]
pub struct Metadata {
    entries: AHashMap<Rc<str>, Value>,
}

impl Metadata {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace `key`, returning the previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(Rc::from(key), value.into())
    }

    /// Value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Boolean flag for `key`; missing or non-boolean reads as `false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Remove `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read `key` from optional metadata.
    #[must_use]
    pub fn lookup<'a>(metadata: Option<&'a Metadata>, key: &str) -> Option<&'a Value> {
        metadata.and_then(|m| m.get(key))
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.entries.keys().map(|k| &**k).collect();
        keys.sort_unstable();
        f.debug_struct("Metadata").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut meta = Metadata::new().with("mode", "two-way");
        assert_eq!(meta.get("mode"), Some(&Value::from("two-way")));
        assert_eq!(meta.set("mode", "one-way"), Some(Value::from("two-way")));
        assert_eq!(meta.len(), 1);
        assert!(meta.remove("mode").is_some());
        assert!(meta.is_empty());
    }

    #[test]
    fn flags_default_to_false() {
        let meta = Metadata::new().with("on", true).with("text", "yes");
        assert!(meta.flag("on"));
        assert!(!meta.flag("text"));
        assert!(!meta.flag("missing"));
    }

    #[test]
    fn lookup_handles_none() {
        let meta = Metadata::new().with("k", 1);
        assert_eq!(Metadata::lookup(Some(&meta), "k"), Some(&Value::Int(1)));
        assert_eq!(Metadata::lookup(None, "k"), None);
    }
}
