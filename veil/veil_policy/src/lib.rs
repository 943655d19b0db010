//! # Veil Policy
//!
//! `veil_policy` decides which facet of a value a given viewer may see.
//!
//! Key concepts:
//!
//! 1. **Policy Entry**: a label, a function from a viewer context to a boolean
//!    expression, and the path assumptions active when it was registered.
//!
//! 2. **Path Environment**: the stack of label assumptions describing the
//!    branch currently being explored.
//!
//! 3. **Formula**: the propositional form of a policy, handed to the solver.
//!
//! 4. **Concretizer**: a short-lived solver session that resolves labels for
//!    one context, preferring to disclose (label true) whenever the registered
//!    policies allow it.

pub mod engine;
pub mod env;
pub mod model;
pub mod store;

// Re-export key types and traits for convenience
pub use engine::{Concretizer, DpllSolver, SatBackend, SatResult};
pub use env::PathEnv;
pub use model::{Formula, PolicyEntry, PolicyFn};
pub use store::{InMemoryPolicyStore, PolicyStore};
