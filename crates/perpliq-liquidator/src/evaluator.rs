//! Remote health classification.
//!
//! The daemon never computes liquidation thresholds. It resolves the
//! accounts a position depends on and asks the ledger's
//! `get_liquidation_state` view for a verdict.

use std::collections::HashMap;

use perpliq_core::instructions::{self, liquidation_state, PositionAccounts};
use perpliq_core::{Custody, Position, ProgramAddresses};
use perpliq_ledger::{fetch_account, DynGateway, LedgerGateway};
use solana_sdk::pubkey::Pubkey;
use tracing::trace;

use crate::error::{LiquidatorError, LiquidatorResult};
use crate::scanner::ScannedPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Liquidatable,
}

impl HealthState {
    fn from_view(data: Option<&[u8]>) -> LiquidatorResult<Self> {
        match data {
            Some([liquidation_state::HEALTHY]) => Ok(HealthState::Healthy),
            Some([liquidation_state::LIQUIDATABLE]) => Ok(HealthState::Liquidatable),
            Some(other) => Err(LiquidatorError::DataIntegrity(format!(
                "unexpected liquidation state {other:?}"
            ))),
            None => Err(LiquidatorError::DataIntegrity(
                "liquidation state view returned no data".to_string(),
            )),
        }
    }
}

/// Everything needed to act on one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPosition {
    pub position: Position,
    pub accounts: PositionAccounts,
    pub collateral_mint: Pubkey,
    pub collateral_custody_token_account: Pubkey,
}

/// Custody accounts read during one cycle.
///
/// Dropped at the end of the cycle; oracle or mint changes are picked up on
/// the next one.
#[derive(Debug, Default)]
pub struct CustodyCache {
    custodies: HashMap<Pubkey, Custody>,
    fetches: usize,
}

impl CustodyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger reads this cache has made.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub async fn load(
        &mut self,
        gateway: &dyn LedgerGateway,
        address: Pubkey,
    ) -> LiquidatorResult<Custody> {
        if let Some(custody) = self.custodies.get(&address) {
            return Ok(custody.clone());
        }
        self.fetches += 1;
        let custody = fetch_account::<Custody, LiquidatorError>(gateway, address)
            .await?
            .ok_or(LiquidatorError::AccountNotFound {
                kind: "custody",
                address,
            })?;
        self.custodies.insert(address, custody.clone());
        Ok(custody)
    }
}

pub struct DecisionEvaluator {
    gateway: DynGateway,
    addrs: ProgramAddresses,
    /// Fee payer named in simulated transactions. Never signs.
    payer: Pubkey,
}

impl DecisionEvaluator {
    pub fn new(gateway: DynGateway, addrs: ProgramAddresses, payer: Pubkey) -> Self {
        Self {
            gateway,
            addrs,
            payer,
        }
    }

    /// Resolve exposure and collateral custodies and their oracles.
    pub async fn resolve(
        &self,
        scanned: &ScannedPosition,
        cache: &mut CustodyCache,
    ) -> LiquidatorResult<ResolvedPosition> {
        let position = &scanned.position;
        if position.collateral_custody == Pubkey::default() {
            return Err(LiquidatorError::DataIntegrity(format!(
                "position {} has no collateral custody",
                scanned.address
            )));
        }

        let gateway = self.gateway.as_ref();
        let custody = cache.load(gateway, position.custody).await?;
        let collateral = cache.load(gateway, position.collateral_custody).await?;

        Ok(ResolvedPosition {
            position: position.clone(),
            accounts: PositionAccounts {
                pool: position.pool,
                position: scanned.address,
                custody: position.custody,
                custody_oracle_account: custody.oracle.oracle_account,
                collateral_custody: position.collateral_custody,
                collateral_custody_oracle_account: collateral.oracle.oracle_account,
            },
            collateral_mint: collateral.mint,
            collateral_custody_token_account: collateral.token_account,
        })
    }

    /// Ask the ledger whether a resolved position can be liquidated.
    pub async fn classify_resolved(
        &self,
        resolved: &ResolvedPosition,
    ) -> LiquidatorResult<HealthState> {
        let ix = instructions::get_liquidation_state(&self.addrs, &resolved.accounts)?;
        let data = self.gateway.simulate(vec![ix], self.payer).await?;
        let health = HealthState::from_view(data.as_deref())?;
        trace!(position = %resolved.accounts.position, ?health, "Classified position");
        Ok(health)
    }

    /// Resolve and classify in one step.
    pub async fn classify(
        &self,
        scanned: &ScannedPosition,
        cache: &mut CustodyCache,
    ) -> LiquidatorResult<(HealthState, ResolvedPosition)> {
        let resolved = self.resolve(scanned, cache).await?;
        let health = self.classify_resolved(&resolved).await?;
        Ok((health, resolved))
    }
}
