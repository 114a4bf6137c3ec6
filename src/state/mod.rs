//! Durable per-deployment state.
//!
//! State the operator must remember across reconciliations (currently only
//! the generated root credential) goes through the [`StateStore`] trait.
//! The reconciler works against an in-memory [`StoredState`] that is loaded
//! from, and written back to, a Secret owned by the MysqlDeployment.

pub mod kube_store;
pub mod secret_store;

use std::collections::BTreeMap;

pub use secret_store::{PASSWORD_SECRET_KEY, PASSWORD_SECRET_LENGTH, SecretStore};

/// Key-value persistence scoped to a single deployment.
pub trait StateStore {
    /// Load the value stored under `key`.
    fn load(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&mut self, key: &str, value: String);
}

/// In-memory snapshot of a deployment's stored state.
///
/// Tracks whether anything was saved since it was loaded so the caller
/// only writes back when needed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredState {
    values: BTreeMap<String, String>,
    dirty: bool,
}

impl StoredState {
    /// Create a snapshot from previously persisted values.
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        Self {
            values,
            dirty: false,
        }
    }

    /// Whether any value changed since the snapshot was taken.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All stored values.
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Mark the snapshot as persisted.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl StateStore for StoredState {
    fn load(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn save(&mut self, key: &str, value: String) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }
}

impl<S: StateStore + ?Sized> StateStore for &mut S {
    fn load(&self, key: &str) -> Option<String> {
        (**self).load(key)
    }

    fn save(&mut self, key: &str, value: String) {
        (**self).save(key, value)
    }
}
