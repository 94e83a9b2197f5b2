//! Liquidation daemon loop.
//!
//! One cycle: read global permissions, scan the target custody, then
//! classify and liquidate positions strictly one after another. Per-position
//! failures only move counters. Cycle-wide failures, including a transport
//! failure while classifying, end the cycle and the loop backs off.

use std::sync::Arc;
use std::time::{Duration, Instant};

use perpliq_core::instructions::create_associated_token_account_idempotent;
use perpliq_core::{associated_token_address, Perpetuals, ProgramAddresses};
use perpliq_ledger::{fetch_account, DynGateway};
use perpliq_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use tracing::{debug, error, info, warn};

use crate::error::{LiquidatorError, LiquidatorResult};
use crate::evaluator::{CustodyCache, DecisionEvaluator, HealthState};
use crate::executor::{LiquidationExecutor, LiquidationOutcome};
use crate::scanner::{PositionScanner, ScannerConfig};

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Sleep between completed cycles.
    #[serde(default = "default_liquidation_delay_ms")]
    pub liquidation_delay_ms: u64,
    /// Sleep after a systemic failure or while closing is disabled.
    #[serde(default = "default_error_delay_ms")]
    pub error_delay_ms: u64,
}

fn default_liquidation_delay_ms() -> u64 {
    5_000
}

fn default_error_delay_ms() -> u64 {
    10_000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            liquidation_delay_ms: default_liquidation_delay_ms(),
            error_delay_ms: default_error_delay_ms(),
        }
    }
}

impl DaemonConfig {
    #[must_use]
    pub fn liquidation_delay(&self) -> Duration {
        Duration::from_millis(self.liquidation_delay_ms)
    }

    #[must_use]
    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }
}

// ============================================================================
// State and outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Bootstrapping,
    Polling,
    Scanning,
    Evaluating,
    Executing,
    Sleeping,
    Backoff,
}

/// Per-cycle counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub candidates: usize,
    pub liquidatable: usize,
    pub liquidated: usize,
    pub already_closed: usize,
    pub failed: usize,
    /// Positions that could not be classified this cycle.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleStats),
    /// Global close-position permission is off; nothing was scanned.
    ClosingDisabled,
    /// A cycle-wide read failed, or the gateway failed mid-cycle.
    SystemicFailure(String),
}

impl CycleOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Completed(_) => "completed",
            CycleOutcome::ClosingDisabled => "closing_disabled",
            CycleOutcome::SystemicFailure(_) => "systemic_failure",
        }
    }
}

// ============================================================================
// LiquidationDaemon
// ============================================================================

/// Watches one (pool, instrument) pair and liquidates unhealthy positions.
pub struct LiquidationDaemon {
    gateway: DynGateway,
    addrs: ProgramAddresses,
    signer: Arc<Keypair>,
    pool_name: String,
    mint: Pubkey,
    pool: Pubkey,
    custody: Pubkey,
    scanner: PositionScanner,
    evaluator: DecisionEvaluator,
    executor: LiquidationExecutor,
    config: DaemonConfig,
    state: DaemonState,
    reward_account: Option<Pubkey>,
}

impl LiquidationDaemon {
    /// Derive the target addresses. Fails only on an invalid pool name.
    pub fn new(
        gateway: DynGateway,
        addrs: ProgramAddresses,
        signer: Arc<Keypair>,
        pool_name: impl Into<String>,
        mint: Pubkey,
        config: DaemonConfig,
        scanner_config: ScannerConfig,
    ) -> LiquidatorResult<Self> {
        let pool_name = pool_name.into();
        let pool = addrs.pool(&pool_name)?;
        let custody = addrs.custody(&pool, &mint)?;

        Ok(Self {
            scanner: PositionScanner::new(gateway.clone(), addrs.clone(), scanner_config),
            evaluator: DecisionEvaluator::new(gateway.clone(), addrs.clone(), signer.pubkey()),
            executor: LiquidationExecutor::new(gateway.clone(), addrs.clone(), Arc::clone(&signer)),
            gateway,
            addrs,
            signer,
            pool_name,
            mint,
            pool,
            custody,
            config,
            state: DaemonState::Bootstrapping,
            reward_account: None,
        })
    }

    #[must_use]
    pub fn state(&self) -> DaemonState {
        self.state
    }

    #[must_use]
    pub fn reward_account(&self) -> Option<Pubkey> {
        self.reward_account
    }

    fn transition(&mut self, next: DaemonState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Daemon state");
            self.state = next;
        }
    }

    /// Resolve the reward account, creating it if it does not exist yet.
    pub async fn bootstrap(&mut self) -> LiquidatorResult<Pubkey> {
        if let Some(account) = self.reward_account {
            return Ok(account);
        }
        self.transition(DaemonState::Bootstrapping);

        let owner = self.signer.pubkey();
        let account = associated_token_address(&owner, &self.mint);
        if self.gateway.get_account(account).await?.is_none() {
            info!(%account, mint = %self.mint, "Creating reward token account");
            let ix = create_associated_token_account_idempotent(&owner, &owner, &self.mint);
            self.gateway
                .submit(vec![ix], vec![Arc::clone(&self.signer)])
                .await?;
        }

        info!(
            liquidator = %owner,
            pool_name = %self.pool_name,
            pool = %self.pool,
            custody = %self.custody,
            reward_account = %account,
            "Liquidator initialized"
        );
        self.reward_account = Some(account);
        self.transition(DaemonState::Polling);
        Ok(account)
    }

    /// The bootstrapped account when the collateral is the watched
    /// instrument, otherwise the liquidator's token account for that mint.
    fn reward_account_for(&self, reward_account: Pubkey, collateral_mint: &Pubkey) -> Pubkey {
        if *collateral_mint == self.mint {
            reward_account
        } else {
            associated_token_address(&self.signer.pubkey(), collateral_mint)
        }
    }

    async fn closing_allowed(&self) -> LiquidatorResult<bool> {
        let address = self.addrs.perpetuals();
        let gateway = self.gateway.as_ref();
        let perpetuals = fetch_account::<Perpetuals, LiquidatorError>(gateway, address)
            .await?
            .ok_or(LiquidatorError::AccountNotFound {
                kind: "perpetuals",
                address,
            })?;
        Ok(perpetuals.permissions.allow_close_position)
    }

    /// Run one full cycle without sleeping.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let started = Instant::now();
        let outcome = self.cycle().await;
        Metrics::cycle(outcome.as_str(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        let reward_account = match self.bootstrap().await {
            Ok(account) => account,
            Err(e) => {
                error!(error = %e, "Bootstrap failed");
                return CycleOutcome::SystemicFailure(e.to_string());
            }
        };

        self.transition(DaemonState::Polling);
        match self.closing_allowed().await {
            Ok(true) => {}
            Ok(false) => return CycleOutcome::ClosingDisabled,
            Err(e) => return CycleOutcome::SystemicFailure(e.to_string()),
        }

        self.transition(DaemonState::Scanning);
        let positions = match self.scanner.scan_custody(&self.pool, &self.custody).await {
            Ok(positions) => positions,
            Err(e) => return CycleOutcome::SystemicFailure(e.to_string()),
        };
        Metrics::positions_scanned(positions.len());

        let mut stats = CycleStats {
            candidates: positions.len(),
            ..Default::default()
        };
        let mut cache = CustodyCache::new();

        for scanned in &positions {
            self.transition(DaemonState::Evaluating);
            let resolved = match self.evaluator.classify(scanned, &mut cache).await {
                Ok((HealthState::Healthy, _)) => continue,
                Ok((HealthState::Liquidatable, resolved)) => resolved,
                Err(e) if e.is_transport() => {
                    error!(position = %scanned.address, error = %e, "Gateway failed mid-cycle");
                    return CycleOutcome::SystemicFailure(e.to_string());
                }
                Err(e) => {
                    warn!(position = %scanned.address, error = %e, "Skipping position");
                    Metrics::position_skipped(e.reason());
                    stats.skipped += 1;
                    continue;
                }
            };
            stats.liquidatable += 1;

            self.transition(DaemonState::Executing);
            let reward = self.reward_account_for(reward_account, &resolved.collateral_mint);
            let create_reward = resolved.collateral_mint != self.mint;
            let outcome = self
                .executor
                .liquidate(&resolved, &reward, create_reward)
                .await;
            Metrics::liquidation(outcome.as_str());
            match outcome {
                LiquidationOutcome::Closed { .. } => stats.liquidated += 1,
                LiquidationOutcome::AlreadyClosed => stats.already_closed += 1,
                LiquidationOutcome::Failed { .. } => stats.failed += 1,
            }
        }

        info!(
            pool_name = %self.pool_name,
            candidates = stats.candidates,
            liquidatable = stats.liquidatable,
            liquidated = stats.liquidated,
            already_closed = stats.already_closed,
            failed = stats.failed,
            skipped = stats.skipped,
            custody_reads = cache.fetches(),
            "Cycle complete"
        );
        CycleOutcome::Completed(stats)
    }

    /// Sleep that follows `outcome`, moving to the matching state.
    pub fn pause_after(&mut self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Completed(_) => {
                self.transition(DaemonState::Sleeping);
                self.config.liquidation_delay()
            }
            CycleOutcome::ClosingDisabled => {
                warn!(
                    delay_ms = self.config.error_delay_ms,
                    "Liquidations are not allowed at this time"
                );
                Metrics::backoff("closing_disabled");
                self.transition(DaemonState::Backoff);
                self.config.error_delay()
            }
            CycleOutcome::SystemicFailure(reason) => {
                error!(
                    reason = %reason,
                    delay_ms = self.config.error_delay_ms,
                    "Liquidation cycle failed"
                );
                Metrics::backoff("systemic_failure");
                self.transition(DaemonState::Backoff);
                self.config.error_delay()
            }
        }
    }

    /// Run cycles forever.
    pub async fn run(&mut self) {
        info!(
            pool_name = %self.pool_name,
            mint = %self.mint,
            liquidation_delay_ms = self.config.liquidation_delay_ms,
            error_delay_ms = self.config.error_delay_ms,
            "Starting liquidation daemon"
        );
        loop {
            let outcome = self.run_cycle().await;
            let pause = self.pause_after(&outcome);
            tokio::time::sleep(pause).await;
        }
    }
}
