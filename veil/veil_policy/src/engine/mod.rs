//! Policy resolution engine.
//!
//! This module provides the solver backend contract, the bundled DPLL
//! backend, and the concretizer built on top of them.

mod concretizer;
mod solver;

pub use concretizer::Concretizer;
pub use solver::{DpllSolver, SatBackend, SatResult};
