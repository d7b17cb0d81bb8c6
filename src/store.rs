//! Shared state for workflow runs.
//!
//! Two kinds of state move through a run:
//!
//! - [`SharedStore`]: one mutable string-keyed map of [`serde_json::Value`],
//!   created and owned by the caller and threaded by handle through an
//!   entire run. It is the *only* channel for cross-node and cross-iteration
//!   data exchange. Cloning a `SharedStore` clones the handle, never the
//!   data.
//! - [`Params`]: a per-visit immutable map used for configuration (which
//!   item a batch iteration is processing, a tuning knob for a node), never
//!   for returning computed results.
//!
//! The store carries an interior `RwLock` purely for memory safety. There is
//! no engine-level coordination beyond that: concurrent writers must use
//! disjoint keys or accept last-write-wins, by caller discipline.
//!
//! # Examples
//!
//! ```rust
//! use weft::store::SharedStore;
//! use serde_json::json;
//!
//! let shared = SharedStore::new();
//! shared.insert("question", json!("What is a weft?"));
//!
//! // Handles share the same map.
//! let handle = shared.clone();
//! handle.insert("answer", json!("the thread carried across the warp"));
//! assert_eq!(shared.len(), 2);
//!
//! // Read-modify-write under one lock acquisition.
//! shared.with_mut(|map| {
//!     map.insert("visits".into(), json!(1));
//! });
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::StepError;

/// Per-visit configuration attached to a node before it executes.
pub type Params = FxHashMap<String, Value>;

/// The single mutable cross-node state map for one run.
///
/// Cheap to clone (handle semantics); the underlying map lives for as long
/// as any handle does. Callers create one per top-level run invocation.
#[derive(Clone, Debug, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<FxHashMap<String, Value>>>,
}

impl SharedStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    /// Returns the value under `key` deserialized into `T`.
    ///
    /// `Ok(None)` when the key is absent; a [`StepError::Serde`] when the
    /// stored value does not match the requested shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StepError> {
        match self.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Inserts `value` under `key`, returning the previous value if any.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.write().insert(key.into(), value)
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().remove(key)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Number of keys in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Runs `f` with mutable access to the whole map under one lock
    /// acquisition. Use this for read-modify-write sequences (appending to
    /// a list, bumping a counter) that must not interleave with other
    /// writers.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut FxHashMap<String, Value>) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Clones the current contents out of the store.
    #[must_use]
    pub fn snapshot(&self) -> FxHashMap<String, Value> {
        self.inner.read().clone()
    }
}

/// Overlays `overlay` on `base`; keys present in both take the overlay's
/// value. Used for the node-params ⊕ run-params ⊕ batch-override merge at
/// every traversal visit.
#[must_use]
pub fn merge_params(base: &Params, overlay: &Params) -> Params {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handles_share_one_map() {
        let shared = SharedStore::new();
        let handle = shared.clone();
        handle.insert("k", json!(42));
        assert_eq!(shared.get("k"), Some(json!(42)));
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn snapshot_is_independent() {
        let shared = SharedStore::new();
        shared.insert("k", json!("before"));
        let snap = shared.snapshot();
        shared.insert("k", json!("after"));
        assert_eq!(snap.get("k"), Some(&json!("before")));
        assert_eq!(shared.get("k"), Some(json!("after")));
    }

    #[test]
    fn get_as_deserializes() {
        let shared = SharedStore::new();
        shared.insert("n", json!(7));
        let n: Option<u32> = shared.get_as("n").unwrap();
        assert_eq!(n, Some(7));
        let missing: Option<u32> = shared.get_as("absent").unwrap();
        assert_eq!(missing, None);
        let err: Result<Option<String>, _> = shared.get_as("n");
        assert!(err.is_err());
    }

    #[test]
    fn with_mut_appends_atomically() {
        let shared = SharedStore::new();
        shared.insert("xs", json!([]));
        for i in 0..3 {
            shared.with_mut(|map| {
                if let Some(Value::Array(xs)) = map.get_mut("xs") {
                    xs.push(json!(i));
                }
            });
        }
        assert_eq!(shared.get("xs"), Some(json!([0, 1, 2])));
    }

    #[test]
    fn merge_overlay_wins() {
        let mut base = Params::default();
        base.insert("a".into(), json!(1));
        base.insert("b".into(), json!(2));
        let mut overlay = Params::default();
        overlay.insert("b".into(), json!(20));
        overlay.insert("c".into(), json!(3));

        let merged = merge_params(&base, &overlay);
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(20)));
        assert_eq!(merged.get("c"), Some(&json!(3)));
    }
}
