//! # Veil Runtime
//!
//! `veil_runtime` is the surface programs compute against.
//!
//! Key concepts:
//!
//! 1. **Runtime**: an explicit handle owning the label registry, the policy
//!    registry and the path environment. Separate runtimes share nothing.
//!
//! 2. **Faceted control flow**: `branch` explores both sides of a condition
//!    that depends on an unresolved label and merges the results into a facet.
//!
//! 3. **Protected references**: mutable cells whose writes are checked by an
//!    input-write policy and whose changes are only visible to viewers allowed
//!    by an output-write policy.
//!
//! 4. **Containers, records and rows**: faceted sequence combinators, a
//!    field-policy table for records, and a sparse row form for persistence.

pub mod containers;
pub mod context;
pub mod control;
pub mod fields;
pub mod protected;
pub mod scoped;
pub mod sparse;

// Re-export key types for convenience
pub use context::{Runtime, Session};
pub use fields::{FacetedRecord, FieldPolicy, FieldPolicyTable};
pub use protected::{InputPolicy, OutputPolicy, ProtectedRef, UpdateResult};
pub use sparse::{FacetedRows, Row};

pub use veil_core::{Error, Result, RuntimeConfig};
pub use veil_facet::{Expr, Label, Value};
