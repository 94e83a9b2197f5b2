//! Liquidation submission.

use std::sync::Arc;

use perpliq_core::{associated_token_address, instructions, ProgramAddresses};
use perpliq_ledger::DynGateway;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use tracing::{info, warn};

use crate::evaluator::ResolvedPosition;

/// Result of one liquidation attempt. Never an error: every failure is
/// contained to the position it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationOutcome {
    Closed { signature: Signature },
    /// The position was gone before our instruction landed.
    AlreadyClosed,
    Failed { reason: String },
}

impl LiquidationOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LiquidationOutcome::Closed { .. } => "closed",
            LiquidationOutcome::AlreadyClosed => "already_closed",
            LiquidationOutcome::Failed { .. } => "failed",
        }
    }
}

pub struct LiquidationExecutor {
    gateway: DynGateway,
    addrs: ProgramAddresses,
    signer: Arc<Keypair>,
}

impl LiquidationExecutor {
    pub fn new(gateway: DynGateway, addrs: ProgramAddresses, signer: Arc<Keypair>) -> Self {
        Self {
            gateway,
            addrs,
            signer,
        }
    }

    /// Submit `liquidate` for `resolved`, paying the reward to `reward_account`.
    ///
    /// With `create_reward_account` the transaction first creates the
    /// liquidator's token account for the collateral mint (idempotent).
    pub async fn liquidate(
        &self,
        resolved: &ResolvedPosition,
        reward_account: &Pubkey,
        create_reward_account: bool,
    ) -> LiquidationOutcome {
        let position = resolved.accounts.position;
        let liquidator = self.signer.pubkey();
        let receiving =
            associated_token_address(&resolved.position.owner, &resolved.collateral_mint);

        let ix = match instructions::liquidate(
            &self.addrs,
            &liquidator,
            &receiving,
            reward_account,
            &resolved.collateral_custody_token_account,
            &resolved.accounts,
        ) {
            Ok(ix) => ix,
            Err(e) => {
                warn!(%position, error = %e, "Failed to build liquidate instruction");
                return LiquidationOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let mut ixs = Vec::with_capacity(2);
        if create_reward_account {
            ixs.push(instructions::create_associated_token_account_idempotent(
                &liquidator,
                &liquidator,
                &resolved.collateral_mint,
            ));
        }
        ixs.push(ix);

        match self
            .gateway
            .submit(ixs, vec![Arc::clone(&self.signer)])
            .await
        {
            Ok(signature) => {
                info!(
                    %position,
                    owner = %resolved.position.owner,
                    side = %resolved.position.side,
                    size_usd = resolved.position.size_usd,
                    %signature,
                    "Position liquidated"
                );
                LiquidationOutcome::Closed { signature }
            }
            Err(e) if e.is_already_closed() => {
                info!(%position, "Position already closed");
                LiquidationOutcome::AlreadyClosed
            }
            Err(e) => {
                warn!(%position, error = %e, "Liquidation rejected");
                LiquidationOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
