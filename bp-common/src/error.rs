//! Error types for BeatPlanner services

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Shared error type for the connection workflow.
///
/// Authorization failures (`Unauthenticated`, `Forbidden`) and input
/// validation failures are raised before any store access. `Conflict` marks
/// an attempted crossing of terminal request states; duplicate-creation
/// conditions are absorbed as idempotent no-ops by the services and never
/// surface through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document encode/decode error (wraps serde_json::Error)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation attempted without a signed-in caller
    #[error("Not signed in: {0}")]
    Unauthenticated(String),

    /// Authenticated caller is not the record's receiver
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Requested document not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attempted crossing of terminal request states
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid operation input, rejected before any store call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backing store transiently unreachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures the caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Io(_) | Error::Unavailable(_)
        )
    }
}
