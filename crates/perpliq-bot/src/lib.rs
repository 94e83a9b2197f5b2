//! perpliq keeper and admin CLI.
//!
//! Wires the ledger gateway, address deriver, liquidation daemon and
//! quorum admin flows together from one TOML configuration.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
