//! Quorum-gated administration for the perpetuals program.
//!
//! Admin actions need `m` of the registered admins to each submit the same
//! instruction. [`QuorumExecutor`] drives those submissions; [`PoolAdmin`]
//! builds the pool, custody, authority and permission flows on top of it.

pub mod error;
pub mod flows;
pub mod quorum;

pub use error::{AdminError, AdminResult};
pub use flows::{ratios_after_add, ratios_after_remove, PoolAdmin};
pub use quorum::{AdminAction, QuorumExecutor, QuorumOutcome};
