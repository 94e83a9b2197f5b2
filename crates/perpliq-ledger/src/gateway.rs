//! Ledger gateway trait.
//!
//! The gateway is the only path to the remote program. Everything above it
//! (scanner, evaluator, executors, admin flows) is written against this trait
//! so tests can substitute [`crate::mock::MockGateway`].

use std::pin::Pin;
use std::sync::Arc;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};

use crate::error::GatewayResult;
use crate::filter::AccountFilter;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Account returned by a filtered scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedAccount {
    pub address: Pubkey,
    pub data: Vec<u8>,
}

/// Request/response boundary to the ledger program.
pub trait LedgerGateway: Send + Sync {
    /// Raw account data, or `None` if the account does not exist.
    fn get_account(&self, address: Pubkey) -> BoxFuture<'_, GatewayResult<Option<Vec<u8>>>>;

    /// All accounts owned by `program_id` matching every filter.
    fn get_program_accounts(
        &self,
        program_id: Pubkey,
        filters: Vec<AccountFilter>,
    ) -> BoxFuture<'_, GatewayResult<Vec<KeyedAccount>>>;

    /// Run `instructions` as a read-only simulation and return the program's
    /// return data, if any. No signature is checked and no fee is paid.
    fn simulate(
        &self,
        instructions: Vec<Instruction>,
        payer: Pubkey,
    ) -> BoxFuture<'_, GatewayResult<Option<Vec<u8>>>>;

    /// Sign, send and wait for confirmation. The first signer pays the fee.
    fn submit(
        &self,
        instructions: Vec<Instruction>,
        signers: Vec<Arc<Keypair>>,
    ) -> BoxFuture<'_, GatewayResult<Signature>>;
}

/// Arc wrapper for LedgerGateway trait objects.
pub type DynGateway = Arc<dyn LedgerGateway>;
