//! Program-derived address computation.
//!
//! Every ledger account this system touches is named by a label plus an
//! ordered list of seeds, hashed together with the owning program id. No
//! lookup table exists: the same inputs always produce the same address.

use solana_sdk::pubkey::{Pubkey, MAX_SEEDS, MAX_SEED_LEN};

use crate::error::{CoreError, CoreResult};
use crate::programs;
use crate::side::Side;

/// Entity labels used as the first seed of every derived address.
pub mod labels {
    pub const MULTISIG: &str = "multisig";
    pub const TRANSFER_AUTHORITY: &str = "transfer_authority";
    pub const PERPETUALS: &str = "perpetuals";
    pub const POOL: &str = "pool";
    pub const LP_TOKEN_MINT: &str = "lp_token_mint";
    pub const CUSTODY: &str = "custody";
    pub const CUSTODY_TOKEN_ACCOUNT: &str = "custody_token_account";
    pub const ORACLE_ACCOUNT: &str = "oracle_account";
    pub const POSITION: &str = "position";
}

// ============================================================================
// Seed
// ============================================================================

/// One seed value contributing to a derived address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed<'a> {
    /// UTF-8 string, contributed as its bytes.
    Str(&'a str),
    /// Raw byte sequence.
    Bytes(&'a [u8]),
    /// Another address, contributed as its 32-byte canonical form.
    Address(&'a Pubkey),
}

impl<'a> Seed<'a> {
    /// Canonical byte form of the seed.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Seed::Str(s) => s.as_bytes(),
            Seed::Bytes(b) => b,
            Seed::Address(key) => key.as_ref(),
        }
    }
}

impl<'a> From<&'a str> for Seed<'a> {
    fn from(value: &'a str) -> Self {
        Seed::Str(value)
    }
}

impl<'a> From<&'a Pubkey> for Seed<'a> {
    fn from(value: &'a Pubkey) -> Self {
        Seed::Address(value)
    }
}

impl<'a> From<&'a [u8]> for Seed<'a> {
    fn from(value: &'a [u8]) -> Self {
        Seed::Bytes(value)
    }
}

// ============================================================================
// derive
// ============================================================================

/// Derive the address for `label` + `seeds` under `program_id`.
///
/// Returns the address and the bump nonce that pushed it off the curve.
///
/// # Errors
/// `CoreError::InvalidSeed` when a seed is longer than 32 bytes, when the
/// label, seeds and bump together exceed the 16-seed limit, or when no bump
/// yields a valid address.
pub fn derive(program_id: &Pubkey, label: &str, seeds: &[Seed<'_>]) -> CoreResult<(Pubkey, u8)> {
    let mut raw: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
    raw.push(label.as_bytes());
    raw.extend(seeds.iter().map(Seed::as_bytes));

    // One slot is reserved for the bump seed.
    if raw.len() >= MAX_SEEDS {
        return Err(CoreError::InvalidSeed {
            label: label.to_string(),
            reason: format!("{} seeds exceed the limit of {}", raw.len(), MAX_SEEDS - 1),
        });
    }

    if let Some((idx, seed)) = raw.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(CoreError::InvalidSeed {
            label: label.to_string(),
            reason: format!("seed {idx} is {} bytes, max {MAX_SEED_LEN}", seed.len()),
        });
    }

    Pubkey::try_find_program_address(&raw, program_id).ok_or_else(|| CoreError::InvalidSeed {
        label: label.to_string(),
        reason: "no viable bump seed".to_string(),
    })
}

/// Associated token account of `wallet` for `mint` (classic token program).
#[must_use]
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    let token_program = programs::TOKEN_PROGRAM_ID;
    Pubkey::find_program_address(
        &[wallet.as_ref(), token_program.as_ref(), mint.as_ref()],
        &programs::ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// Program data account of an upgradeable program.
#[must_use]
pub fn program_data_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[program_id.as_ref()], &programs::BPF_LOADER_UPGRADEABLE_ID).0
}

// ============================================================================
// ProgramAddresses
// ============================================================================

/// Address book for one deployment of the perpetuals program.
///
/// Fixed singletons are derived once at construction; per-entity addresses
/// are computed on demand and never cached.
#[derive(Debug, Clone)]
pub struct ProgramAddresses {
    program_id: Pubkey,
    multisig: Pubkey,
    transfer_authority: Pubkey,
    perpetuals: Pubkey,
}

impl ProgramAddresses {
    /// Derive the fixed addresses for `program_id`.
    pub fn new(program_id: Pubkey) -> CoreResult<Self> {
        let multisig = derive(&program_id, labels::MULTISIG, &[])?.0;
        let transfer_authority = derive(&program_id, labels::TRANSFER_AUTHORITY, &[])?.0;
        let perpetuals = derive(&program_id, labels::PERPETUALS, &[])?.0;

        Ok(Self {
            program_id,
            multisig,
            transfer_authority,
            perpetuals,
        })
    }

    #[must_use]
    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    #[must_use]
    pub fn multisig(&self) -> Pubkey {
        self.multisig
    }

    #[must_use]
    pub fn transfer_authority(&self) -> Pubkey {
        self.transfer_authority
    }

    #[must_use]
    pub fn perpetuals(&self) -> Pubkey {
        self.perpetuals
    }

    /// Program data account holding the deployed program under the
    /// upgradeable loader.
    #[must_use]
    pub fn program_data(&self) -> Pubkey {
        program_data_address(&self.program_id)
    }

    /// Pool address for a pool name. Names longer than 32 bytes are rejected.
    pub fn pool(&self, name: &str) -> CoreResult<Pubkey> {
        Ok(derive(&self.program_id, labels::POOL, &[Seed::Str(name)])?.0)
    }

    pub fn lp_token_mint(&self, pool: &Pubkey) -> CoreResult<Pubkey> {
        Ok(derive(&self.program_id, labels::LP_TOKEN_MINT, &[pool.into()])?.0)
    }

    pub fn custody(&self, pool: &Pubkey, mint: &Pubkey) -> CoreResult<Pubkey> {
        Ok(derive(&self.program_id, labels::CUSTODY, &[pool.into(), mint.into()])?.0)
    }

    pub fn custody_token_account(&self, pool: &Pubkey, mint: &Pubkey) -> CoreResult<Pubkey> {
        Ok(derive(
            &self.program_id,
            labels::CUSTODY_TOKEN_ACCOUNT,
            &[pool.into(), mint.into()],
        )?
        .0)
    }

    /// Venue-owned custom oracle account for a custody.
    pub fn oracle_account(&self, pool: &Pubkey, mint: &Pubkey) -> CoreResult<Pubkey> {
        Ok(derive(&self.program_id, labels::ORACLE_ACCOUNT, &[pool.into(), mint.into()])?.0)
    }

    pub fn position(
        &self,
        owner: &Pubkey,
        pool: &Pubkey,
        custody: &Pubkey,
        side: Side,
    ) -> CoreResult<Pubkey> {
        let side_seed = [side.ledger_byte()];
        Ok(derive(
            &self.program_id,
            labels::POSITION,
            &[
                owner.into(),
                pool.into(),
                custody.into(),
                Seed::Bytes(&side_seed),
            ],
        )?
        .0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Pubkey {
        crate::programs::DEFAULT_PERPETUALS_PROGRAM_ID
    }

    #[test]
    fn test_derive_is_deterministic() {
        let pool = Pubkey::new_unique();
        let a = derive(&program(), "custody", &[Seed::Address(&pool), Seed::Str("x")]).unwrap();
        let b = derive(&program(), "custody", &[Seed::Address(&pool), Seed::Str("x")]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_differs_by_label_and_seed() {
        let a = derive(&program(), "pool", &[Seed::Str("SOL-PERP")]).unwrap().0;
        let b = derive(&program(), "custody", &[Seed::Str("SOL-PERP")]).unwrap().0;
        let c = derive(&program(), "pool", &[Seed::Str("BTC-PERP")]).unwrap().0;
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_derive_differs_by_program() {
        let other = Pubkey::new_unique();
        let a = derive(&program(), "multisig", &[]).unwrap().0;
        let b = derive(&other, "multisig", &[]).unwrap().0;
        assert_ne!(a, b);
    }

    #[test]
    fn test_seed_kinds_canonicalize_to_same_bytes() {
        let key = Pubkey::new_unique();
        let bytes = key.to_bytes();
        let from_address = derive(&program(), "custody", &[Seed::Address(&key)]).unwrap();
        let from_bytes = derive(&program(), "custody", &[Seed::Bytes(&bytes)]).unwrap();
        assert_eq!(from_address, from_bytes);

        let from_str = derive(&program(), "pool", &[Seed::Str("abc")]).unwrap();
        let from_raw = derive(&program(), "pool", &[Seed::Bytes(b"abc")]).unwrap();
        assert_eq!(from_str, from_raw);
    }

    #[test]
    fn test_matches_find_program_address() {
        let (expected, bump) =
            Pubkey::find_program_address(&[b"pool", b"SOL-PERP"], &program());
        let (actual, actual_bump) = derive(&program(), "pool", &[Seed::Str("SOL-PERP")]).unwrap();
        assert_eq!(actual, expected);
        assert_eq!(actual_bump, bump);
    }

    #[test]
    fn test_oversized_seed_rejected() {
        let long_name = "x".repeat(33);
        let err = derive(&program(), "pool", &[Seed::Str(&long_name)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSeed { .. }));
    }

    #[test]
    fn test_too_many_seeds_rejected() {
        let seeds: Vec<Seed<'_>> = (0..15).map(|_| Seed::Str("s")).collect();
        let err = derive(&program(), "pool", &seeds).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSeed { .. }));

        // label + 14 seeds + bump is exactly the limit
        let seeds: Vec<Seed<'_>> = (0..14).map(|_| Seed::Str("s")).collect();
        assert!(derive(&program(), "pool", &seeds).is_ok());
    }

    #[test]
    fn test_position_sides_are_independent_accounts() {
        let addrs = ProgramAddresses::new(program()).unwrap();
        let owner = Pubkey::new_unique();
        let pool = addrs.pool("SOL-PERP").unwrap();
        let custody = addrs.custody(&pool, &Pubkey::new_unique()).unwrap();

        let long = addrs.position(&owner, &pool, &custody, Side::Long).unwrap();
        let short = addrs.position(&owner, &pool, &custody, Side::Short).unwrap();
        assert_ne!(long, short);
        assert_eq!(long, addrs.position(&owner, &pool, &custody, Side::Long).unwrap());
    }

    #[test]
    fn test_fixed_addresses_stable_across_instances() {
        let a = ProgramAddresses::new(program()).unwrap();
        let b = ProgramAddresses::new(program()).unwrap();
        assert_eq!(a.multisig(), b.multisig());
        assert_eq!(a.perpetuals(), b.perpetuals());
        assert_eq!(a.transfer_authority(), b.transfer_authority());
        assert_ne!(a.multisig(), a.perpetuals());
    }

    #[test]
    fn test_pool_name_too_long() {
        let addrs = ProgramAddresses::new(program()).unwrap();
        assert!(addrs.pool(&"P".repeat(40)).is_err());
    }

    #[test]
    fn test_program_data_under_loader() {
        let addrs = ProgramAddresses::new(program()).unwrap();
        let (expected, _) = Pubkey::find_program_address(
            &[program().as_ref()],
            &crate::programs::BPF_LOADER_UPGRADEABLE_ID,
        );
        assert_eq!(addrs.program_data(), expected);
        assert_ne!(addrs.program_data(), addrs.perpetuals());
    }

    #[test]
    fn test_associated_token_address_per_mint() {
        let wallet = Pubkey::new_unique();
        let a = associated_token_address(&wallet, &Pubkey::new_unique());
        let b = associated_token_address(&wallet, &Pubkey::new_unique());
        assert_ne!(a, b);
    }
}
