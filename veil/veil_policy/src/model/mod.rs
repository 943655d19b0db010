//! Policy models.
//!
//! This module defines policy entries and the propositional formulas they
//! compile to.

pub mod entry;
pub mod formula;

pub use entry::{PolicyEntry, PolicyFn};
pub use formula::Formula;
