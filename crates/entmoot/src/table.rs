//! Concurrent registry of live value references

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ExecutorError, Result};

/// Opaque identifier bound to exactly one value for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueRef {
    id: String,
}

impl ValueRef {
    /// Mint a fresh, never-reused reference.
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Wrap an id received from a caller.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The id string
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl From<&str> for ValueRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Mapping from [`ValueRef`] to executor values.
///
/// Every operation is atomic per key. Insertion never overwrites, so a
/// reference is never rebound.
pub struct ValueTable<V> {
    entries: Arc<DashMap<ValueRef, V>>,
}

impl<V> Clone for ValueTable<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V> Default for ValueTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for ValueTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueTable")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<V> ValueTable<V> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Register `value` under `value_ref`.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the reference is already registered.
    pub fn insert(&self, value_ref: ValueRef, value: V) -> Result<()> {
        match self.entries.entry(value_ref) {
            Entry::Occupied(entry) => Err(ExecutorError::Internal(format!(
                "value reference {} registered twice",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    /// Remove a reference, returning whether it was present.
    pub fn remove(&self, value_ref: &ValueRef) -> bool {
        self.entries.remove(value_ref).is_some()
    }

    /// Check whether a reference is live.
    pub fn contains(&self, value_ref: &ValueRef) -> bool {
        self.entries.contains_key(value_ref)
    }

    /// Number of live references
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<V: Clone> ValueTable<V> {
    /// Look up a reference.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the reference was never issued or has been
    /// disposed.
    pub fn get(&self, value_ref: &ValueRef) -> Result<V> {
        self.entries
            .get(value_ref)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ExecutorError::not_found(value_ref.id()))
    }
}
