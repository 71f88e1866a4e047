//! Error types for infoflow-ir
//!
//! Provides unified error handling across the crate.
//!
//! Policy: operational misuse of the public surface (locked or reserved
//! constraint kinds, solving unknown kinds, empty joins) is reported through
//! `Result`; degradations (empty points-to sets, values absent from a
//! solution) are logged at debug level and the analysis continues with the
//! weaker answer.

use thiserror::Error;

/// Main error type for information flow analysis operations
#[derive(Debug, Error)]
pub enum InfoflowError {
    /// A constraint was added to a kind that has already been solved
    #[error("constraint kind '{kind}' is locked: it has already been solved")]
    LockedKind { kind: String },

    /// A solution was requested for a kind that was never created
    #[error("constraint kind '{kind}' was never created")]
    UnknownKind { kind: String },

    /// A join element appeared on the right-hand side of a constraint
    #[error("join elements may not appear on the right-hand side of a constraint")]
    JoinOnRhs,

    /// The upper bound of the empty set was requested
    #[error("cannot take the upper bound of an empty element set")]
    EmptyJoin,

    /// A solution was requested over an empty set of kinds
    #[error("no constraint kinds given")]
    NoKinds,

    /// User constraints may not target the analysis-internal kinds
    #[error("kind '{kind}' is reserved for the analysis itself")]
    ReservedKind { kind: String },

    /// No registered signature accepted a call site
    #[error("no signature accepted call to '{callee}'")]
    NoMatchingSignature { callee: String },

    /// An instruction outside the supported opcode set was encountered
    #[error("unsupported instruction: {opcode}")]
    UnsupportedInstruction { opcode: String },

    /// Solver infrastructure failure (thread pool construction etc.)
    #[error("solver error: {0}")]
    Solver(String),
}

impl InfoflowError {
    /// Create a locked-kind error
    pub fn locked(kind: impl Into<String>) -> Self {
        InfoflowError::LockedKind { kind: kind.into() }
    }

    /// Create an unknown-kind error
    pub fn unknown(kind: impl Into<String>) -> Self {
        InfoflowError::UnknownKind { kind: kind.into() }
    }

    /// Create a reserved-kind error
    pub fn reserved(kind: impl Into<String>) -> Self {
        InfoflowError::ReservedKind { kind: kind.into() }
    }
}

/// Result type alias for information flow operations
pub type Result<T> = std::result::Result<T, InfoflowError>;
