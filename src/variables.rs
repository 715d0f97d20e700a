// src/variables.rs

//! Ordered key/value container shared between tasks, contexts and stages.
//!
//! All operations are safe for concurrent readers and writers. `merge` and
//! `with` return fresh instances so callers can layer environments without
//! aliasing surprises; `merge_in_place` exists for the few spots that build
//! a container up cumulatively (runner exports, denormalization).

use indexmap::IndexMap;
use parking_lot::RwLock;

/// Concurrency-safe, insertion-ordered map of string variables.
#[derive(Debug, Default)]
pub struct Variables {
    m: RwLock<IndexMap<String, String>>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a container from any iterator of key/value pairs.
    pub fn from_map<K, V, I>(values: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let m = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { m: RwLock::new(m) }
    }

    /// Snapshot of the current process environment.
    pub fn from_os_env() -> Self {
        Self::from_map(std::env::vars())
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.m.write().insert(key.into(), value.into());
    }

    /// Value for `key`, or the empty string when absent.
    pub fn get(&self, key: &str) -> String {
        self.m.read().get(key).cloned().unwrap_or_default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.m.read().contains_key(key)
    }

    /// Independent snapshot of the contents.
    pub fn map(&self) -> IndexMap<String, String> {
        self.m.read().clone()
    }

    pub fn len(&self) -> usize {
        self.m.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.read().is_empty()
    }

    /// Union of `self` and `src` as a new container.
    ///
    /// On key collision the value from `src` wins.
    pub fn merge(&self, src: &Variables) -> Variables {
        let mut dst = self.map();
        for (k, v) in src.map() {
            dst.insert(k, v);
        }
        Variables {
            m: RwLock::new(dst),
        }
    }

    /// Mutating merge: overwrite keys in `self` with values from `src`.
    pub fn merge_in_place(&self, src: &Variables) {
        let mut guard = self.m.write();
        for (k, v) in src.map() {
            guard.insert(k, v);
        }
    }

    /// New container equal to `self` plus one extra binding.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Variables {
        let dst = self.clone();
        dst.set(key, value);
        dst
    }
}

impl Clone for Variables {
    fn clone(&self) -> Self {
        Self {
            m: RwLock::new(self.map()),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_empty_string_for_missing_key() {
        let vars = Variables::new();
        assert_eq!(vars.get("missing"), "");
        assert!(!vars.has("missing"));
    }

    #[test]
    fn merge_is_right_biased_and_leaves_operands_unchanged() {
        let left = Variables::from_map([("A", "1"), ("B", "2")]);
        let right = Variables::from_map([("B", "3"), ("C", "4")]);

        let merged = left.merge(&right);

        assert_eq!(merged.get("A"), "1");
        assert_eq!(merged.get("B"), "3");
        assert_eq!(merged.get("C"), "4");
        assert_eq!(left.get("B"), "2");
        assert!(!right.has("A"));
    }

    #[test]
    fn with_returns_fresh_instance() {
        let vars = Variables::from_map([("A", "1")]);
        let extended = vars.with("B", "2");

        assert!(extended.has("B"));
        assert!(!vars.has("B"));
        assert_eq!(extended.get("A"), "1");
    }

    #[test]
    fn merge_in_place_overwrites_existing_keys() {
        let vars = Variables::from_map([("A", "1")]);
        vars.merge_in_place(&Variables::from_map([("A", "2"), ("B", "3")]));

        assert_eq!(vars.get("A"), "2");
        assert_eq!(vars.get("B"), "3");
    }

    #[test]
    fn map_is_an_independent_snapshot() {
        let vars = Variables::from_map([("A", "1")]);
        let snapshot = vars.map();
        vars.set("A", "2");

        assert_eq!(snapshot.get("A").unwrap(), "1");
        assert_eq!(vars.get("A"), "2");
    }
}
