//! Strongly-typed identifiers for Veil.
//!
//! Each identifier type is a thin wrapper around a UUID with a phantom type
//! parameter, so identifiers for different entity types cannot be mixed up.
//!
//! Fresh identifiers are random (UUID v4). Identifiers derived from a stable
//! key are name-based (UUID v5 under a fixed namespace), so the same key maps
//! to the same identifier in every process.
//!
//! # Examples
//!
//! ```
//! use veil_core::id::LabelId;
//!
//! let fresh = LabelId::new();
//! let stable = LabelId::from_stable_key("patient.address#17");
//!
//! assert_ne!(fresh, LabelId::new());
//! assert_eq!(stable, LabelId::from_stable_key("patient.address#17"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Namespace for identifiers derived from stable keys.
const STABLE_KEY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_2b7e_9c4a_4e35_8d0f_51a3_c2e8_7b90);

/// A type-safe identifier based on UUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Id<T> {
    uuid: Uuid,
    #[serde(skip)]
    _marker: std::marker::PhantomData<T>,
}

impl<T> Id<T> {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Create the identifier deterministically associated with `key`.
    ///
    /// The same key always yields the same identifier, across runtimes and
    /// process restarts.
    pub fn from_stable_key(key: &str) -> Self {
        Self::from_uuid(Uuid::new_v5(&STABLE_KEY_NAMESPACE, key.as_bytes()))
    }

    /// Create an identifier from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Short, human-oriented rendering used in diagnostics.
    pub fn short(&self) -> String {
        let simple = self.uuid.simple().to_string();
        simple[..8].to_string()
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_uuid(Uuid::parse_str(s)?))
    }
}

/// Marker type for labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelMarker;
/// Identifier for a label (decision atom).
pub type LabelId = Id<LabelMarker>;

/// Marker type for faceted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordMarker;
/// Identifier for a faceted record.
pub type RecordId = Id<RecordMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_new() {
        let id1 = LabelId::new();
        let id2 = LabelId::new();
        assert_ne!(id1, id2, "Generated IDs should be unique");
    }

    #[test]
    fn test_stable_key_is_deterministic() {
        let a = LabelId::from_stable_key("user.email#3");
        let b = LabelId::from_stable_key("user.email#3");
        let c = LabelId::from_stable_key("user.email#4");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_id_from_str() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = LabelId::from_str(uuid_str).unwrap();
        assert_eq!(id.to_string(), uuid_str);
        assert_eq!(id.short(), "550e8400");
    }

    #[test]
    fn test_type_safety() {
        let same_uuid = Uuid::new_v4();
        let label_id = LabelId::from_uuid(same_uuid);
        let record_id = RecordId::from_uuid(same_uuid);

        // Same UUID, different identifier types.
        assert_eq!(label_id.uuid(), record_id.uuid());
    }

    #[test]
    fn test_id_serde() {
        let id = LabelId::new();
        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: LabelId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);
    }
}
