//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key error: {0}")]
    Key(#[from] perpliq_ledger::KeyError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] perpliq_ledger::GatewayError),

    #[error("Admin error: {0}")]
    Admin(#[from] perpliq_admin::AdminError),

    #[error("Liquidator error: {0}")]
    Liquidator(#[from] perpliq_liquidator::LiquidatorError),

    #[error("Core error: {0}")]
    Core(#[from] perpliq_core::CoreError),

    #[error("Account not found: {0}")]
    AccountNotFound(solana_sdk::pubkey::Pubkey),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A simulated view returned nothing, or bytes of the wrong shape.
    #[error("View {view} failed: {reason}")]
    View { view: &'static str, reason: String },
}

pub type AppResult<T> = Result<T, AppError>;
