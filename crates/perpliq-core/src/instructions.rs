//! Instruction builders for the perpetuals program.
//!
//! Instruction data is `sha256("global:<name>")[..8]` followed by the Borsh
//! encoded params. Account order matches the program's account structs and
//! must not be changed.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::{system_program, sysvar};

use crate::accounts::{sighash, DISCRIMINATOR_LEN};
use crate::error::CoreResult;
use crate::params::{
    BorrowRateParams, CustodyConfig, Fees, OracleParams, Permissions, PricingParams, TokenRatios,
};
use crate::pda::ProgramAddresses;
use crate::programs::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::side::Side;

/// Return values of the `get_liquidation_state` view.
pub mod liquidation_state {
    pub const HEALTHY: u8 = 0;
    pub const LIQUIDATABLE: u8 = 1;
}

/// Discriminator for a program instruction.
#[must_use]
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    sighash("global", name)
}

fn instruction_data<P: BorshSerialize>(name: &str, params: &P) -> CoreResult<Vec<u8>> {
    let mut data = instruction_discriminator(name).to_vec();
    params.serialize(&mut data)?;
    Ok(data)
}

// ============================================================================
// Params
// ============================================================================

#[derive(Debug, Clone, Default, BorshSerialize, BorshDeserialize)]
pub struct EmptyParams {}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct AddPoolParams {
    pub name: String,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct AddCustodyParams {
    pub is_stable: bool,
    pub is_virtual: bool,
    pub oracle: OracleParams,
    pub pricing: PricingParams,
    pub permissions: Permissions,
    pub fees: Fees,
    pub borrow_rate: BorrowRateParams,
    pub ratios: Vec<TokenRatios>,
}

impl AddCustodyParams {
    #[must_use]
    pub fn new(config: &CustodyConfig, ratios: Vec<TokenRatios>) -> Self {
        Self {
            is_stable: config.is_stable,
            is_virtual: config.is_virtual,
            oracle: config.oracle.clone(),
            pricing: config.pricing.clone(),
            permissions: config.permissions,
            fees: config.fees.clone(),
            borrow_rate: config.borrow_rate.clone(),
            ratios,
        }
    }
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct RemoveCustodyParams {
    pub ratios: Vec<TokenRatios>,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct SetAdminSignersParams {
    pub min_signatures: u8,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct InitParams {
    pub min_signatures: u8,
    pub permissions: Permissions,
}

/// Price written into a custom oracle account.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SetCustomOraclePriceParams {
    pub price: u64,
    pub expo: i32,
    pub conf: u64,
    pub ema: u64,
    pub publish_time: i64,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct GetOraclePriceParams {
    pub ema: bool,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct GetLiquidationPriceParams {
    pub add_collateral: u64,
    pub remove_collateral: u64,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct GetEntryPriceAndFeeParams {
    pub collateral: u64,
    pub size: u64,
    pub side: Side,
}

// ============================================================================
// View results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PriceAndFee {
    pub price: u64,
    pub fee: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProfitAndLoss {
    pub profit: u64,
    pub loss: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NewPositionPricesAndFee {
    pub entry_price: u64,
    pub liquidation_price: u64,
    pub fee: u64,
}

// ============================================================================
// Liquidation
// ============================================================================

/// Accounts shared by the health view and the liquidate instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionAccounts {
    pub pool: Pubkey,
    pub position: Pubkey,
    pub custody: Pubkey,
    pub custody_oracle_account: Pubkey,
    pub collateral_custody: Pubkey,
    pub collateral_custody_oracle_account: Pubkey,
}

/// Read-only accounts of every per-position view.
fn position_view_metas(addrs: &ProgramAddresses, accounts: &PositionAccounts) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(addrs.perpetuals(), false),
        AccountMeta::new_readonly(accounts.pool, false),
        AccountMeta::new_readonly(accounts.position, false),
        AccountMeta::new_readonly(accounts.custody, false),
        AccountMeta::new_readonly(accounts.custody_oracle_account, false),
        AccountMeta::new_readonly(accounts.collateral_custody, false),
        AccountMeta::new_readonly(accounts.collateral_custody_oracle_account, false),
    ]
}

fn position_view<P: BorshSerialize>(
    addrs: &ProgramAddresses,
    accounts: &PositionAccounts,
    name: &str,
    params: &P,
) -> CoreResult<Instruction> {
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts: position_view_metas(addrs, accounts),
        data: instruction_data(name, params)?,
    })
}

/// Read-only view returning one byte: see [`liquidation_state`].
pub fn get_liquidation_state(
    addrs: &ProgramAddresses,
    accounts: &PositionAccounts,
) -> CoreResult<Instruction> {
    position_view(addrs, accounts, "get_liquidation_state", &EmptyParams {})
}

/// `signer` pays fees and collects the reward.
pub fn liquidate(
    addrs: &ProgramAddresses,
    signer: &Pubkey,
    receiving_account: &Pubkey,
    rewards_receiving_account: &Pubkey,
    collateral_custody_token_account: &Pubkey,
    accounts: &PositionAccounts,
) -> CoreResult<Instruction> {
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts: vec![
            AccountMeta::new(*signer, true),
            AccountMeta::new(*receiving_account, false),
            AccountMeta::new(*rewards_receiving_account, false),
            AccountMeta::new_readonly(addrs.transfer_authority(), false),
            AccountMeta::new_readonly(addrs.perpetuals(), false),
            AccountMeta::new(accounts.pool, false),
            AccountMeta::new(accounts.position, false),
            AccountMeta::new(accounts.custody, false),
            AccountMeta::new_readonly(accounts.custody_oracle_account, false),
            AccountMeta::new(accounts.collateral_custody, false),
            AccountMeta::new_readonly(accounts.collateral_custody_oracle_account, false),
            AccountMeta::new(*collateral_custody_token_account, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: instruction_data("liquidate", &EmptyParams {})?,
    })
}

/// Create `wallet`'s associated token account for `mint` unless it exists.
#[must_use]
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    let ata = crate::pda::associated_token_address(wallet, mint);
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        // 1 = CreateIdempotent
        data: vec![1],
    }
}

// ============================================================================
// Views
// ============================================================================
//
// Simulated only. Each returns a Borsh value through the transaction's
// return data.

/// Liquidation price after adding or removing collateral. Returns `u64`.
pub fn get_liquidation_price(
    addrs: &ProgramAddresses,
    accounts: &PositionAccounts,
    add_collateral: u64,
    remove_collateral: u64,
) -> CoreResult<Instruction> {
    let params = GetLiquidationPriceParams {
        add_collateral,
        remove_collateral,
    };
    position_view(addrs, accounts, "get_liquidation_price", &params)
}

/// Unrealized profit and loss. Returns [`ProfitAndLoss`].
pub fn get_pnl(addrs: &ProgramAddresses, accounts: &PositionAccounts) -> CoreResult<Instruction> {
    position_view(addrs, accounts, "get_pnl", &EmptyParams {})
}

/// Exit price and close fee. Returns [`PriceAndFee`].
pub fn get_exit_price_and_fee(
    addrs: &ProgramAddresses,
    accounts: &PositionAccounts,
) -> CoreResult<Instruction> {
    position_view(addrs, accounts, "get_exit_price_and_fee", &EmptyParams {})
}

/// Custody and oracle accounts of a position that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPositionAccounts {
    pub pool: Pubkey,
    pub custody: Pubkey,
    pub custody_oracle_account: Pubkey,
    pub collateral_custody: Pubkey,
    pub collateral_custody_oracle_account: Pubkey,
}

/// Entry price, liquidation price and open fee for a new position.
/// Returns [`NewPositionPricesAndFee`].
pub fn get_entry_price_and_fee(
    addrs: &ProgramAddresses,
    accounts: &NewPositionAccounts,
    params: &GetEntryPriceAndFeeParams,
) -> CoreResult<Instruction> {
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts: vec![
            AccountMeta::new_readonly(addrs.perpetuals(), false),
            AccountMeta::new_readonly(accounts.pool, false),
            AccountMeta::new_readonly(accounts.custody, false),
            AccountMeta::new_readonly(accounts.custody_oracle_account, false),
            AccountMeta::new_readonly(accounts.collateral_custody, false),
            AccountMeta::new_readonly(accounts.collateral_custody_oracle_account, false),
        ],
        data: instruction_data("get_entry_price_and_fee", params)?,
    })
}

/// Current (or EMA) oracle price of a custody. Returns `u64`.
pub fn get_oracle_price(
    addrs: &ProgramAddresses,
    pool: &Pubkey,
    custody: &Pubkey,
    oracle_account: &Pubkey,
    ema: bool,
) -> CoreResult<Instruction> {
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts: vec![
            AccountMeta::new_readonly(addrs.perpetuals(), false),
            AccountMeta::new_readonly(*pool, false),
            AccountMeta::new_readonly(*custody, false),
            AccountMeta::new_readonly(*oracle_account, false),
        ],
        data: instruction_data("get_oracle_price", &GetOraclePriceParams { ema })?,
    })
}

/// Pool AUM in USD. Returns `u128`.
///
/// `custodies` pairs each custody of the pool with its oracle account, in
/// pool order. All custody accounts come first, then all oracles.
pub fn get_assets_under_management(
    addrs: &ProgramAddresses,
    pool: &Pubkey,
    custodies: &[(Pubkey, Pubkey)],
) -> CoreResult<Instruction> {
    let mut accounts = vec![
        AccountMeta::new_readonly(addrs.perpetuals(), false),
        AccountMeta::new_readonly(*pool, false),
    ];
    accounts.extend(
        custodies
            .iter()
            .map(|(custody, _)| AccountMeta::new_readonly(*custody, false)),
    );
    accounts.extend(
        custodies
            .iter()
            .map(|(_, oracle)| AccountMeta::new_readonly(*oracle, false)),
    );
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts,
        data: instruction_data("get_assets_under_management", &EmptyParams {})?,
    })
}

// ============================================================================
// Administration
// ============================================================================

/// One-time program setup by the upgrade authority. Creates the multisig
/// with `admins` as trailing read-only accounts.
pub fn init(
    addrs: &ProgramAddresses,
    upgrade_authority: &Pubkey,
    admins: &[Pubkey],
    params: &InitParams,
) -> CoreResult<Instruction> {
    let mut accounts = vec![
        AccountMeta::new(*upgrade_authority, true),
        AccountMeta::new(addrs.multisig(), false),
        AccountMeta::new(addrs.transfer_authority(), false),
        AccountMeta::new(addrs.perpetuals(), false),
        AccountMeta::new_readonly(addrs.program_id(), false),
        AccountMeta::new_readonly(addrs.program_data(), false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
    ];
    accounts.extend(admins.iter().map(|key| AccountMeta::new_readonly(*key, false)));
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts,
        data: instruction_data("init", params)?,
    })
}

fn admin_metas(addrs: &ProgramAddresses, admin: &Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(*admin, true),
        AccountMeta::new(addrs.multisig(), false),
    ]
}

pub fn add_pool(addrs: &ProgramAddresses, admin: &Pubkey, name: &str) -> CoreResult<Instruction> {
    let pool = addrs.pool(name)?;
    let mut accounts = admin_metas(addrs, admin);
    accounts.extend([
        AccountMeta::new_readonly(addrs.transfer_authority(), false),
        AccountMeta::new(addrs.perpetuals(), false),
        AccountMeta::new(pool, false),
        AccountMeta::new(addrs.lp_token_mint(&pool)?, false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(sysvar::rent::ID, false),
    ]);
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts,
        data: instruction_data(
            "add_pool",
            &AddPoolParams {
                name: name.to_string(),
            },
        )?,
    })
}

pub fn remove_pool(
    addrs: &ProgramAddresses,
    admin: &Pubkey,
    name: &str,
) -> CoreResult<Instruction> {
    let mut accounts = admin_metas(addrs, admin);
    accounts.extend([
        AccountMeta::new_readonly(addrs.transfer_authority(), false),
        AccountMeta::new(addrs.perpetuals(), false),
        AccountMeta::new(addrs.pool(name)?, false),
        AccountMeta::new_readonly(system_program::ID, false),
    ]);
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts,
        data: instruction_data("remove_pool", &EmptyParams {})?,
    })
}

pub fn add_custody(
    addrs: &ProgramAddresses,
    admin: &Pubkey,
    pool_name: &str,
    mint: &Pubkey,
    params: &AddCustodyParams,
) -> CoreResult<Instruction> {
    let pool = addrs.pool(pool_name)?;
    let mut accounts = admin_metas(addrs, admin);
    accounts.extend([
        AccountMeta::new_readonly(addrs.transfer_authority(), false),
        AccountMeta::new_readonly(addrs.perpetuals(), false),
        AccountMeta::new(pool, false),
        AccountMeta::new(addrs.custody(&pool, mint)?, false),
        AccountMeta::new(addrs.custody_token_account(&pool, mint)?, false),
        AccountMeta::new_readonly(*mint, false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(sysvar::rent::ID, false),
    ]);
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts,
        data: instruction_data("add_custody", params)?,
    })
}

pub fn remove_custody(
    addrs: &ProgramAddresses,
    admin: &Pubkey,
    pool_name: &str,
    mint: &Pubkey,
    ratios: Vec<TokenRatios>,
) -> CoreResult<Instruction> {
    let pool = addrs.pool(pool_name)?;
    let mut accounts = admin_metas(addrs, admin);
    accounts.extend([
        AccountMeta::new_readonly(addrs.transfer_authority(), false),
        AccountMeta::new_readonly(addrs.perpetuals(), false),
        AccountMeta::new(pool, false),
        AccountMeta::new(addrs.custody(&pool, mint)?, false),
        AccountMeta::new(addrs.custody_token_account(&pool, mint)?, false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
    ]);
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts,
        data: instruction_data("remove_custody", &RemoveCustodyParams { ratios })?,
    })
}

/// Replace the admin set. New admins are passed as trailing read-only accounts.
pub fn set_admin_signers(
    addrs: &ProgramAddresses,
    admin: &Pubkey,
    new_admins: &[Pubkey],
    min_signatures: u8,
) -> CoreResult<Instruction> {
    let mut accounts = admin_metas(addrs, admin);
    accounts.extend(
        new_admins
            .iter()
            .map(|key| AccountMeta::new_readonly(*key, false)),
    );
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts,
        data: instruction_data(
            "set_admin_signers",
            &SetAdminSignersParams { min_signatures },
        )?,
    })
}

pub fn set_permissions(
    addrs: &ProgramAddresses,
    admin: &Pubkey,
    permissions: &Permissions,
) -> CoreResult<Instruction> {
    let mut accounts = admin_metas(addrs, admin);
    accounts.push(AccountMeta::new(addrs.perpetuals(), false));
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts,
        data: instruction_data("set_permissions", permissions)?,
    })
}

/// Write a price into the custody's custom oracle account, creating it on
/// first use.
pub fn set_custom_oracle_price(
    addrs: &ProgramAddresses,
    admin: &Pubkey,
    pool_name: &str,
    mint: &Pubkey,
    params: &SetCustomOraclePriceParams,
) -> CoreResult<Instruction> {
    let pool = addrs.pool(pool_name)?;
    let mut accounts = admin_metas(addrs, admin);
    accounts.extend([
        AccountMeta::new_readonly(addrs.perpetuals(), false),
        AccountMeta::new_readonly(pool, false),
        AccountMeta::new_readonly(addrs.custody(&pool, mint)?, false),
        AccountMeta::new(addrs.oracle_account(&pool, mint)?, false),
        AccountMeta::new_readonly(system_program::ID, false),
    ]);
    Ok(Instruction {
        program_id: addrs.program_id(),
        accounts,
        data: instruction_data("set_custom_oracle_price", params)?,
    })
}
