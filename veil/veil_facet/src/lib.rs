//! # Veil Facet
//!
//! `veil_facet` provides the value representation of the Veil runtime.
//!
//! Key concepts:
//!
//! 1. **Label**: an opaque boolean decision atom, compared by identity.
//!
//! 2. **Value**: a resolved leaf (unit, boolean, integer, string, list or an
//!    opaque object).
//!
//! 3. **Expr**: a persistent expression tree whose `Facet` nodes select
//!    between a high and a low branch depending on a single label.
//!
//! Operators distribute over facets: applying `a + b` where `a` is faceted on
//! `x` yields a new facet on `x` with the addition pushed into both branches.
//! All operations build new trees; existing trees are never mutated.

pub mod expr;
pub mod label;
pub mod ops;
pub mod partial;
pub mod value;

pub use expr::{Assignment, Expr, Node};
pub use label::Label;
pub use ops::{BinaryOp, UnaryOp};
pub use value::{Object, Value, ValueType};
