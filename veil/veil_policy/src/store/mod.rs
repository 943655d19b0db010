//! Policy storage.
//!
//! This module provides storage for policy entries. Entries are kept in
//! registration order so that solver sessions can replay them from a cursor.

mod in_memory;

pub use in_memory::InMemoryPolicyStore;

use crate::model::PolicyEntry;
use veil_core::error::Result;

/// Trait for policy storage.
///
/// A policy store is an append-only, ordered registry of policy entries.
pub trait PolicyStore: Send + Sync {
    /// Append a policy entry to the store.
    ///
    /// # Arguments
    ///
    /// * `entry` - The entry to add.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the entry was successfully added.
    /// * `Err` - If the entry could not be added.
    fn add_policy(&self, entry: PolicyEntry) -> Result<()>;

    /// Number of registered entries.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries registered at or after position `cursor`, in order.
    ///
    /// # Arguments
    ///
    /// * `cursor` - The number of entries the caller has already seen.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<PolicyEntry>)` - The new entries (possibly empty).
    /// * `Err` - If the entries could not be listed.
    fn entries_from(&self, cursor: usize) -> Result<Vec<PolicyEntry>>;

    /// Remove every entry.
    fn clear(&self) -> Result<()>;
}
