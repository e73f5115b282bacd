//! Error types for the migration core.

use thiserror::Error;

/// Errors raised by durable store implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors that can occur in migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Durable store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The persisted state record has an impossible shape or phase.
    #[error("corrupt migration state: {0}")]
    CorruptState(String),

    /// A strategy with this slug is already registered.
    #[error("strategy already registered: {0}")]
    StrategyExists(String),

    /// No strategy registered under this slug.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// The strategy cannot reverse a migration.
    #[error("strategy '{0}' does not support undo")]
    UndoUnsupported(String),
}
