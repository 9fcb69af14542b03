//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure is local and synchronous. A failed operation leaves ledger
/// state untouched; the transport layer decides how each kind is surfaced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing or malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation collides with existing state (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Credentials did not check out.
    ///
    /// Carries no detail: unknown email and wrong password must look the same.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A referenced resource does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The credential hashing primitive failed.
    #[error("credential error: {0}")]
    Credential(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound(what)
    }
}
