//! Error types for the Veil runtime.
//!
//! Errors are organized by subsystem, with each subsystem having its own
//! error type. The root error type, `Error`, wraps any of the
//! subsystem-specific errors so callers can handle them uniformly.
//!
//! A write rejected by an input-write policy is *not* an error; it is reported
//! through the update result of the protected reference.

use thiserror::Error;

/// Root error type for the Veil system.
#[derive(Debug, Error)]
pub enum Error {
    /// Facet tree construction and evaluation errors
    #[error("Facet error: {0}")]
    Facet(#[from] FacetError),

    /// Policy registration and resolution errors
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Solver backend errors
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// Runtime handle errors
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// A deferred unassigned-value marker was forced into a concrete computation
    #[error("Value '{name}' was never assigned along the branch taken")]
    Unassigned {
        /// Name of the variable or field that was never set
        name: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors related to building and evaluating facet trees.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FacetError {
    /// A facet condition was not a single atomic label
    #[error("Facet condition must be an atomic label, got {0}")]
    NonAtomicCondition(String),

    /// An operator was applied to operands of the wrong type
    #[error("Type mismatch: cannot apply '{op}' to {lhs} and {rhs}")]
    TypeMismatch {
        /// The operator symbol
        op: String,

        /// Type of the left operand
        lhs: String,

        /// Type of the right operand (or "-" for unary operators)
        rhs: String,
    },

    /// Integer division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Evaluation reached a label missing from the assignment
    #[error("Label {0} has no value in the assignment")]
    UnresolvedLabel(String),

    /// A boolean was required but another value was found
    #[error("Expected a boolean, got {0}")]
    NotBoolean(String),
}

/// Errors related to policies.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The registered policy implications contradict each other
    #[error("Policy set is unsatisfiable for context {context}")]
    Unsatisfiable {
        /// Rendering of the viewer context the session was opened for
        context: String,
    },

    /// A policy did not produce a boolean where one was required
    #[error("Malformed policy: {0}")]
    Malformed(String),

    /// A field policy was registered twice for the same type and field
    #[error("Field policy already registered for {type_name}.{field}")]
    DuplicateFieldPolicy {
        /// Record type name
        type_name: String,

        /// Field name
        field: String,
    },
}

/// Errors raised by a solver backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolverError {
    /// `pop` was called without a matching `push`
    #[error("Solver scope underflow")]
    ScopeUnderflow,

    /// The decision budget for a single check was exhausted
    #[error("Solver decision budget of {limit} exhausted")]
    BudgetExhausted {
        /// The configured decision limit
        limit: u64,
    },

    /// An atom was queried that was never declared
    #[error("Unknown atom: {0}")]
    UnknownAtom(String),
}

/// Errors related to the runtime handle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// `pop` was called on an empty path environment
    #[error("Path environment underflow")]
    PathUnderflow,

    /// The thread-scoped runtime was borrowed while already in use
    #[error("Thread runtime is already borrowed")]
    Reentrant,

    /// Sparse rows matched one assignment with several distinct values
    #[error("Ambiguous rows: {0}")]
    AmbiguousRows(String),
}

/// Result type used throughout the Veil system.
pub type Result<T> = std::result::Result<T, Error>;
