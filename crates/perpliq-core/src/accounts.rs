//! Ledger account layouts.
//!
//! Each account is an 8-byte discriminator followed by the Borsh encoding of
//! the struct. Only the fields this system reads are modelled; `Custody` is
//! decoded as a prefix and its trailing risk parameters are ignored.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

use crate::error::{CoreError, CoreResult};
use crate::params::{OracleParams, Permissions, TokenRatios};
use crate::side::Side;

/// Length of the account and instruction discriminators.
pub const DISCRIMINATOR_LEN: usize = 8;

/// First 8 bytes of `sha256("<namespace>:<name>")`.
#[must_use]
pub fn sighash(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

// ============================================================================
// LedgerAccount
// ============================================================================

/// A typed view over raw ledger account bytes.
pub trait LedgerAccount: BorshSerialize + BorshDeserialize + Sized {
    /// Account type name as registered by the ledger program.
    const NAME: &'static str;

    #[must_use]
    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        sighash("account", Self::NAME)
    }

    /// Decode account bytes, checking the discriminator first.
    ///
    /// Trailing bytes after the modelled fields are ignored; truncated data
    /// or a wrong discriminator is a `DataIntegrity` error.
    fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(CoreError::DataIntegrity(format!(
                "{} account too short: {} bytes",
                Self::NAME,
                data.len()
            )));
        }
        let (disc, mut body) = data.split_at(DISCRIMINATOR_LEN);
        if disc != Self::discriminator() {
            return Err(CoreError::DataIntegrity(format!(
                "{} discriminator mismatch",
                Self::NAME
            )));
        }
        Self::deserialize(&mut body).map_err(|e| {
            CoreError::DataIntegrity(format!("{} decode failed: {e}", Self::NAME))
        })
    }

    /// Discriminator followed by the Borsh body, as stored on the ledger.
    fn to_account_data(&self) -> CoreResult<Vec<u8>> {
        let mut data = Self::discriminator().to_vec();
        self.serialize(&mut data)?;
        Ok(data)
    }
}

// ============================================================================
// Perpetuals
// ============================================================================

/// Global program state.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Perpetuals {
    pub permissions: Permissions,
    pub pools: Vec<Pubkey>,
    pub transfer_authority_bump: u8,
    pub perpetuals_bump: u8,
    pub inception_time: i64,
}

impl LedgerAccount for Perpetuals {
    const NAME: &'static str = "Perpetuals";
}

// ============================================================================
// Pool
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Pool {
    pub name: String,
    pub custodies: Vec<Pubkey>,
    pub ratios: Vec<TokenRatios>,
    pub aum_usd: u128,
    pub bump: u8,
    pub lp_token_bump: u8,
    pub inception_time: i64,
}

impl LedgerAccount for Pool {
    const NAME: &'static str = "Pool";
}

impl Pool {
    /// Position of `custody` in this pool's custody list.
    #[must_use]
    pub fn custody_index(&self, custody: &Pubkey) -> Option<usize> {
        self.custodies.iter().position(|c| c == custody)
    }
}

// ============================================================================
// Custody
// ============================================================================

/// Leading fields of a custody account.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Custody {
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub token_account: Pubkey,
    pub decimals: u8,
    pub is_stable: bool,
    pub is_virtual: bool,
    pub oracle: OracleParams,
}

impl LedgerAccount for Custody {
    const NAME: &'static str = "Custody";
}

// ============================================================================
// Position
// ============================================================================

/// One leveraged position. USD amounts use 6 decimals.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Position {
    pub owner: Pubkey,
    pub pool: Pubkey,
    pub custody: Pubkey,
    pub collateral_custody: Pubkey,
    pub open_time: i64,
    pub update_time: i64,
    pub side: Side,
    pub price: u64,
    pub size_usd: u64,
    pub borrow_size_usd: u64,
    pub collateral_usd: u64,
    pub unrealized_profit_usd: u64,
    pub unrealized_loss_usd: u64,
    pub cumulative_interest_snapshot: u128,
    pub locked_amount: u64,
    pub collateral_amount: u64,
    pub bump: u8,
}

impl LedgerAccount for Position {
    const NAME: &'static str = "Position";
}

impl Position {
    /// Encoded size including the discriminator.
    pub const LEN: usize = 234;
    /// Byte offset of `owner` in account data.
    pub const OWNER_OFFSET: usize = DISCRIMINATOR_LEN;
    /// Byte offset of `pool`; `custody` follows immediately.
    pub const POOL_OFFSET: usize = DISCRIMINATOR_LEN + 32;
}

// ============================================================================
// Multisig
// ============================================================================

/// Maximum number of admin signers the ledger tracks.
pub const MAX_ADMIN_SIGNERS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Multisig {
    pub num_signers: u8,
    pub num_signed: u8,
    pub min_signatures: u8,
    pub instruction_accounts_len: u8,
    pub instruction_data_len: u16,
    pub instruction_hash: u64,
    pub signers: [Pubkey; MAX_ADMIN_SIGNERS],
    pub signed: [u8; MAX_ADMIN_SIGNERS],
    pub bump: u8,
}

impl LedgerAccount for Multisig {
    const NAME: &'static str = "Multisig";
}

impl Multisig {
    /// Fresh multisig state for `signers` (truncated to the ledger maximum).
    #[must_use]
    pub fn with_signers(signers: &[Pubkey], min_signatures: u8) -> Self {
        let mut keys = [Pubkey::default(); MAX_ADMIN_SIGNERS];
        for (slot, key) in keys.iter_mut().zip(signers) {
            *slot = *key;
        }
        Self {
            num_signers: signers.len().min(MAX_ADMIN_SIGNERS) as u8,
            num_signed: 0,
            min_signatures,
            instruction_accounts_len: 0,
            instruction_data_len: 0,
            instruction_hash: 0,
            signers: keys,
            signed: [0; MAX_ADMIN_SIGNERS],
            bump: 255,
        }
    }

    /// Registered admin keys, in ledger order.
    #[must_use]
    pub fn admin_signers(&self) -> &[Pubkey] {
        let n = usize::from(self.num_signers).min(MAX_ADMIN_SIGNERS);
        &self.signers[..n]
    }
}
