//! Path-addressed mutable data store.
//!
//! A [`PathStore`] owns one nested object/array graph and exposes
//! change-detecting reads and writes addressed by path strings. Intermediate
//! containers along a written path are created on demand: a key segment
//! materializes an object, an index or append segment materializes an array.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::path::{self, Segment};

/// Structural conflicts between a path and the data already in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot write key {key:?} into non-object at {path:?}")]
    KeyIntoNonObject { key: String, path: String },

    #[error("cannot write an index into non-array at {path:?}")]
    IndexIntoNonArray { path: String },
}

/// Mutable nested data graph addressed by path strings.
///
/// The external contract is purely path-string-based; node identities are
/// never exposed, so callers cannot hold dangling references across array
/// element removal.
#[derive(Debug, Clone, Default)]
pub struct PathStore {
    root: Value,
    queue: Vec<(String, Value)>,
}

impl PathStore {
    /// Create an empty store (object root).
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
            queue: Vec::new(),
        }
    }

    /// Create a store over an existing nested value.
    pub fn from_value(root: Value) -> Self {
        let root = match root {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Self {
            root,
            queue: Vec::new(),
        }
    }

    /// Hydrate from a flat multi-valued pair list (e.g. a decoded form
    /// submission). A key that occurs more than once merges into an array at
    /// that path, preserving encounter order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when two keys imply conflicting shapes for the
    /// same path (e.g. `a` as a scalar and `a.b` as a member).
    pub fn from_flat_pairs<I, K>(pairs: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut store = Self::new();
        let mut seen: Vec<String> = Vec::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            if seen.iter().any(|s| s == key) {
                // repeated key: promote the existing value to an array
                let existing = store.get(key).cloned().unwrap_or(Value::Null);
                match existing {
                    Value::Array(mut arr) => {
                        arr.push(value);
                        store.try_set(key, Value::Array(arr))?;
                    }
                    other => {
                        store.try_set(key, Value::Array(vec![other, value]))?;
                    }
                }
            } else {
                seen.push(key.to_string());
                store.try_set(key, value)?;
            }
        }
        Ok(store)
    }

    /// Read the value at `path`, if every segment resolves.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut cur = &self.root;
        for seg in path::parse(path) {
            match seg {
                Segment::Key(k) => cur = cur.as_object()?.get(&k)?,
                Segment::Index(i) => cur = cur.as_array()?.get(i)?,
                Segment::Append => return None,
            }
        }
        Some(cur)
    }

    /// True when `path` resolves to a non-null value.
    pub fn has_value(&self, path: &str) -> bool {
        self.get(path).map(|v| !v.is_null()).unwrap_or(false)
    }

    /// True when the final segment of `path` exists as a key/element, even
    /// if the stored value is null. Distinguishes "key absent" from "value
    /// is null".
    pub fn has_property(&self, path: &str) -> bool {
        let segments = path::parse(path);
        let Some((last, parents)) = segments.split_last() else {
            return true; // the root itself
        };
        let mut cur = &self.root;
        for seg in parents {
            let next = match seg {
                Segment::Key(k) => cur.as_object().and_then(|m| m.get(k)),
                Segment::Index(i) => cur.as_array().and_then(|a| a.get(*i)),
                Segment::Append => None,
            };
            match next {
                Some(v) => cur = v,
                None => return false,
            }
        }
        match last {
            Segment::Key(k) => cur.as_object().map(|m| m.contains_key(k)).unwrap_or(false),
            Segment::Index(i) => cur.as_array().map(|a| *i < a.len()).unwrap_or(false),
            Segment::Append => false,
        }
    }

    /// Write `value` at `path`, creating intermediate containers on demand.
    /// Returns whether the stored value actually changed.
    ///
    /// # Panics
    ///
    /// Panics when the path conflicts with the existing shape (an index
    /// segment over a non-array, a key segment over a non-object). Paths
    /// come from schema authoring; a conflict is a programmer error, not a
    /// recoverable validation failure.
    pub fn set(&mut self, path: &str, value: Value) -> bool {
        match self.try_set(path, value) {
            Ok(changed) => changed,
            Err(e) => panic!("{}", e),
        }
    }

    /// Fallible variant of [`set`](Self::set), used by hydration.
    pub fn try_set(&mut self, path: &str, value: Value) -> Result<bool, StoreError> {
        let segments = path::parse(path);
        let slot = Self::slot_mut(&mut self.root, &segments, path)?;
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        Ok(true)
    }

    /// Write many paths at once. Returns whether any value changed; callers
    /// dispatch at most one change notification for the whole batch.
    pub fn bulk_set<I, K>(&mut self, items: I) -> bool
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut changed = false;
        for (path, value) in items {
            changed |= self.set(path.as_ref(), value);
        }
        changed
    }

    /// Queue a write for a later [`bulk_exec`](Self::bulk_exec).
    pub fn bulk_push(&mut self, path: impl Into<String>, value: Value) {
        self.queue.push((path.into(), value));
    }

    /// Flush all queued writes as one batch. Returns whether any value
    /// changed.
    pub fn bulk_exec(&mut self) -> bool {
        let queued = std::mem::take(&mut self.queue);
        self.bulk_set(queued)
    }

    /// The live nested data graph.
    pub fn data(&self) -> &Value {
        &self.root
    }

    /// Consume the store, yielding its data graph.
    pub fn into_value(self) -> Value {
        self.root
    }

    fn slot_mut<'a>(
        root: &'a mut Value,
        segments: &[Segment],
        full_path: &str,
    ) -> Result<&'a mut Value, StoreError> {
        let mut cur = root;
        for seg in segments {
            match seg {
                Segment::Key(k) => {
                    if cur.is_null() {
                        *cur = Value::Object(Map::new());
                    }
                    let map = cur
                        .as_object_mut()
                        .ok_or_else(|| StoreError::KeyIntoNonObject {
                            key: k.clone(),
                            path: full_path.to_string(),
                        })?;
                    cur = map.entry(k.clone()).or_insert(Value::Null);
                }
                Segment::Index(i) => {
                    if cur.is_null() {
                        *cur = Value::Array(Vec::new());
                    }
                    let arr = cur
                        .as_array_mut()
                        .ok_or_else(|| StoreError::IndexIntoNonArray {
                            path: full_path.to_string(),
                        })?;
                    while arr.len() <= *i {
                        arr.push(Value::Null);
                    }
                    cur = &mut arr[*i];
                }
                Segment::Append => {
                    if cur.is_null() {
                        *cur = Value::Array(Vec::new());
                    }
                    let arr = cur
                        .as_array_mut()
                        .ok_or_else(|| StoreError::IndexIntoNonArray {
                            path: full_path.to_string(),
                        })?;
                    arr.push(Value::Null);
                    let last = arr.len() - 1;
                    cur = &mut arr[last];
                }
            }
        }
        Ok(cur)
    }
}
