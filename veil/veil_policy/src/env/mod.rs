//! Symbolic execution environments.

pub mod path;

pub use path::PathEnv;
