//! Core types for perpliq.
//!
//! Address derivation, ledger account layouts, typed parameter sets, ratio
//! rebalancing and instruction builders for the perpetuals program. Nothing
//! in this crate performs I/O.

pub mod accounts;
pub mod error;
pub mod instructions;
pub mod params;
pub mod pda;
pub mod programs;
pub mod ratios;
pub mod side;

pub use accounts::{Custody, LedgerAccount, Multisig, Perpetuals, Pool, Position};
pub use error::{CoreError, CoreResult};
pub use instructions::PositionAccounts;
pub use params::{
    BorrowRateParams, CustodyConfig, Fees, FeesMode, OracleParams, OracleType, Permissions,
    PricingParams, TokenRatios,
};
pub use pda::{associated_token_address, derive, ProgramAddresses, Seed};
pub use ratios::{rebalance, BPS_TOTAL};
pub use side::Side;
