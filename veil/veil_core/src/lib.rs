//! # Veil Core
//!
//! `veil_core` provides the fundamental building blocks shared by every Veil
//! crate: the error hierarchy, strongly-typed identifiers, runtime
//! configuration and logging helpers.
//!
//! ## Core Principles
//!
//! Veil is a runtime for *faceted values*: values whose observable content
//! depends on who is looking. The crates are layered as follows:
//!
//! 1. **Labels and facets** (`veil_facet`): identity-compared boolean decision
//!    atoms and the conditional value trees keyed on them.
//!
//! 2. **Policies and resolution** (`veil_policy`): the path environment, the
//!    ordered policy registry and the solver session that resolves labels for
//!    one concrete viewer.
//!
//! 3. **Runtime** (`veil_runtime`): the explicit runtime handle, faceted
//!    control flow, protected references and faceted containers.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all Veil components
//! - **id**: Strongly-typed identifier types
//! - **utils**: Configuration and logging helpers
//! - **macros**: Convenience macros for logging

pub mod error;
pub mod id;
pub mod macros;
pub mod utils;

pub use error::{Error, Result};
pub use id::{LabelId, RecordId};
pub use utils::{LogLevel, RuntimeConfig, SolverConfig};
