//! In-memory policy store.
//!
//! This module provides an in-memory implementation of the policy store.

use parking_lot::RwLock;
use std::sync::Arc;

use veil_core::error::Result;
use veil_core::log_event;
use veil_core::utils::LogLevel;

use super::PolicyStore;
use crate::model::PolicyEntry;

/// An in-memory policy store.
///
/// Clones share the same underlying registry, so a session holding a clone
/// sees entries registered after it was opened.
#[derive(Clone, Default)]
pub struct InMemoryPolicyStore {
    /// The entries, in registration order.
    entries: Arc<RwLock<Vec<PolicyEntry>>>,
}

impl InMemoryPolicyStore {
    /// Create a new in-memory policy store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn add_policy(&self, entry: PolicyEntry) -> Result<()> {
        self.entries.write().push(entry);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn entries_from(&self, cursor: usize) -> Result<Vec<PolicyEntry>> {
        let entries = self.entries.read();
        Ok(entries.get(cursor..).map(<[_]>::to_vec).unwrap_or_default())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write();
        log_event!(LogLevel::Debug, "Clearing policy store", entries => entries.len());
        entries.clear();
        Ok(())
    }
}
