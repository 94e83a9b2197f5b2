//! Liquidation daemon for the perpetuals program.
//!
//! [`PositionScanner`] finds positions, [`DecisionEvaluator`] asks the ledger
//! whether each one is liquidatable, [`LiquidationExecutor`] closes the ones
//! that are, and [`LiquidationDaemon`] runs that pipeline on a fixed cadence.

pub mod daemon;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod scanner;

pub use daemon::{CycleOutcome, CycleStats, DaemonConfig, DaemonState, LiquidationDaemon};
pub use error::{LiquidatorError, LiquidatorResult};
pub use evaluator::{CustodyCache, DecisionEvaluator, HealthState, ResolvedPosition};
pub use executor::{LiquidationExecutor, LiquidationOutcome};
pub use scanner::{PositionScanner, ScannedPosition, ScannerConfig};
