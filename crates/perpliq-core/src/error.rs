//! Error types for perpliq-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Seeds cannot be turned into a program address. Indicates a naming bug
    /// at the call site, never a runtime condition.
    #[error("Invalid seeds for '{label}': {reason}")]
    InvalidSeed { label: String, reason: String },

    /// Account bytes do not match the expected ledger layout.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
