//! Error types for perpliq-admin.

use perpliq_core::CoreError;
use perpliq_ledger::GatewayError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::quorum::AdminAction;

/// Administrative failures. Never retried automatically.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Fewer local admin keys than the threshold. Raised before any submission.
    #[error("Insufficient signers for {action}: {required} required, {available} available")]
    InsufficientSigners {
        action: AdminAction,
        required: usize,
        available: usize,
    },

    /// One submission in the quorum sequence was rejected; the rest were not sent.
    #[error("{action} submission {index} signed by {signer} failed: {source}")]
    Submission {
        action: AdminAction,
        index: usize,
        signer: Pubkey,
        #[source]
        source: GatewayError,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(Pubkey),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias for admin operations.
pub type AdminResult<T> = Result<T, AdminError>;
