//! Position discovery.
//!
//! Scans are server-side filtered program account queries. The result is a
//! best-effort snapshot: positions may open or close while it is taken.

use perpliq_core::{LedgerAccount, Position, ProgramAddresses};
use perpliq_ledger::{AccountFilter, DynGateway};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::error::LiquidatorResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Exact size of a position account, used as a server-side filter.
    #[serde(default = "default_position_data_size")]
    pub position_data_size: u64,
}

fn default_position_data_size() -> u64 {
    Position::LEN as u64
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            position_data_size: default_position_data_size(),
        }
    }
}

/// A decoded position and the address it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPosition {
    pub address: Pubkey,
    pub position: Position,
}

pub struct PositionScanner {
    gateway: DynGateway,
    addrs: ProgramAddresses,
    config: ScannerConfig,
}

impl PositionScanner {
    pub fn new(gateway: DynGateway, addrs: ProgramAddresses, config: ScannerConfig) -> Self {
        Self {
            gateway,
            addrs,
            config,
        }
    }

    fn base_filters(&self) -> Vec<AccountFilter> {
        vec![
            AccountFilter::DataSize(self.config.position_data_size),
            AccountFilter::memcmp(0, Position::discriminator().to_vec()),
        ]
    }

    /// Filters selecting positions in (`pool`, `custody`).
    #[must_use]
    pub fn custody_filters(&self, pool: &Pubkey, custody: &Pubkey) -> Vec<AccountFilter> {
        let mut pattern = Vec::with_capacity(64);
        pattern.extend_from_slice(pool.as_ref());
        pattern.extend_from_slice(custody.as_ref());

        let mut filters = self.base_filters();
        filters.push(AccountFilter::memcmp(Position::POOL_OFFSET, pattern));
        filters
    }

    /// All positions in the named pool whose exposure custody holds `mint`.
    pub async fn scan(
        &self,
        pool_name: &str,
        mint: &Pubkey,
    ) -> LiquidatorResult<Vec<ScannedPosition>> {
        let pool = self.addrs.pool(pool_name)?;
        let custody = self.addrs.custody(&pool, mint)?;
        self.scan_custody(&pool, &custody).await
    }

    /// All positions in (`pool`, `custody`).
    pub async fn scan_custody(
        &self,
        pool: &Pubkey,
        custody: &Pubkey,
    ) -> LiquidatorResult<Vec<ScannedPosition>> {
        self.run(self.custody_filters(pool, custody)).await
    }

    /// All positions in `pool`, across custodies.
    pub async fn scan_pool(&self, pool: &Pubkey) -> LiquidatorResult<Vec<ScannedPosition>> {
        let mut filters = self.base_filters();
        filters.push(AccountFilter::memcmp(
            Position::POOL_OFFSET,
            pool.to_bytes().to_vec(),
        ));
        self.run(filters).await
    }

    /// All positions owned by `owner`, across pools.
    pub async fn scan_owner(&self, owner: &Pubkey) -> LiquidatorResult<Vec<ScannedPosition>> {
        let mut filters = self.base_filters();
        filters.push(AccountFilter::memcmp(
            Position::OWNER_OFFSET,
            owner.to_bytes().to_vec(),
        ));
        self.run(filters).await
    }

    async fn run(&self, filters: Vec<AccountFilter>) -> LiquidatorResult<Vec<ScannedPosition>> {
        let accounts = self
            .gateway
            .get_program_accounts(self.addrs.program_id(), filters)
            .await?;
        let total = accounts.len();

        let positions: Vec<ScannedPosition> = accounts
            .into_iter()
            .filter_map(|keyed| match Position::decode(&keyed.data) {
                Ok(position) => Some(ScannedPosition {
                    address: keyed.address,
                    position,
                }),
                Err(e) => {
                    warn!(address = %keyed.address, error = %e, "Skipping undecodable position");
                    None
                }
            })
            .collect();

        debug!(total, decoded = positions.len(), "Position scan complete");
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpliq_core::programs::DEFAULT_PERPETUALS_PROGRAM_ID;
    use perpliq_core::Side;
    use perpliq_ledger::MockGateway;
    use std::sync::Arc;

    fn position(owner: Pubkey, pool: Pubkey, custody: Pubkey) -> Position {
        Position {
            owner,
            pool,
            custody,
            collateral_custody: custody,
            open_time: 0,
            update_time: 0,
            side: Side::Long,
            price: 1,
            size_usd: 1,
            borrow_size_usd: 0,
            collateral_usd: 1,
            unrealized_profit_usd: 0,
            unrealized_loss_usd: 0,
            cumulative_interest_snapshot: 0,
            locked_amount: 0,
            collateral_amount: 0,
            bump: 255,
        }
    }

    #[tokio::test]
    async fn test_scan_filters_by_pool_and_custody() {
        let mock = Arc::new(MockGateway::new());
        let addrs = ProgramAddresses::new(DEFAULT_PERPETUALS_PROGRAM_ID).unwrap();
        let program = addrs.program_id();
        let mint = Pubkey::new_unique();
        let pool = addrs.pool("SOL-PERP").unwrap();
        let custody = addrs.custody(&pool, &mint).unwrap();
        let other_custody = Pubkey::new_unique();

        let hit = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        mock.set_account(
            hit,
            program,
            position(owner, pool, custody).to_account_data().unwrap(),
        );
        mock.set_account(
            Pubkey::new_unique(),
            program,
            position(owner, pool, other_custody).to_account_data().unwrap(),
        );

        let scanner = PositionScanner::new(mock.clone(), addrs, ScannerConfig::default());
        let found = scanner.scan("SOL-PERP", &mint).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].address, hit);

        let by_owner = scanner.scan_owner(&owner).await.unwrap();
        assert_eq!(by_owner.len(), 2);

        let by_pool = scanner.scan_pool(&pool).await.unwrap();
        assert_eq!(by_pool.len(), 2);
        assert!(scanner.scan_pool(&Pubkey::new_unique()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_skips_undecodable() {
        let mock = Arc::new(MockGateway::new());
        let addrs = ProgramAddresses::new(DEFAULT_PERPETUALS_PROGRAM_ID).unwrap();
        let pool = Pubkey::new_unique();
        let custody = Pubkey::new_unique();

        let mut data = position(Pubkey::new_unique(), pool, custody)
            .to_account_data()
            .unwrap();
        // corrupt the side byte, keep size and prefix intact
        data[8 + 128 + 16] = 7;
        mock.set_account(Pubkey::new_unique(), addrs.program_id(), data);

        let scanner = PositionScanner::new(mock.clone(), addrs, ScannerConfig::default());
        assert!(scanner.scan_custody(&pool, &custody).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_transport_failure_returns_error() {
        let mock = Arc::new(MockGateway::new());
        mock.set_fail_reads(true);
        let addrs = ProgramAddresses::new(DEFAULT_PERPETUALS_PROGRAM_ID).unwrap();
        let scanner = PositionScanner::new(mock, addrs, ScannerConfig::default());
        assert!(scanner
            .scan_custody(&Pubkey::new_unique(), &Pubkey::new_unique())
            .await
            .is_err());
    }

    #[test]
    fn test_scanner_config_default_size() {
        let config: ScannerConfig = toml::from_str("").unwrap();
        assert_eq!(config.position_data_size, 234);
    }
}
