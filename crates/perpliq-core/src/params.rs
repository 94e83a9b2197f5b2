//! Typed parameter sets for administrative instructions.
//!
//! Every struct here is Borsh-encoded in declaration order, so field order
//! must match the ledger program's instruction layout. Defaults are the
//! values the venue ships new custodies with.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{CoreError, CoreResult};
use crate::ratios::BPS_TOTAL;

// ============================================================================
// Permissions
// ============================================================================

/// Operation flags, both global (perpetuals account) and per custody.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Permissions {
    pub allow_swap: bool,
    pub allow_add_liquidity: bool,
    pub allow_remove_liquidity: bool,
    pub allow_open_position: bool,
    pub allow_close_position: bool,
    pub allow_pnl_withdrawal: bool,
    pub allow_collateral_withdrawal: bool,
    pub allow_size_change: bool,
}

impl Permissions {
    /// Everything enabled.
    #[must_use]
    pub fn all() -> Self {
        Self {
            allow_swap: true,
            allow_add_liquidity: true,
            allow_remove_liquidity: true,
            allow_open_position: true,
            allow_close_position: true,
            allow_pnl_withdrawal: true,
            allow_collateral_withdrawal: true,
            allow_size_change: true,
        }
    }

    /// Everything disabled.
    #[must_use]
    pub fn none() -> Self {
        Self {
            allow_swap: false,
            allow_add_liquidity: false,
            allow_remove_liquidity: false,
            allow_open_position: false,
            allow_close_position: false,
            allow_pnl_withdrawal: false,
            allow_collateral_withdrawal: false,
            allow_size_change: false,
        }
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}

// ============================================================================
// Oracle
// ============================================================================

/// Price source kind for a custody.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OracleType {
    #[default]
    None,
    /// Venue-owned oracle account written by an admin.
    Custom,
    /// Third-party Pyth price feed.
    Pyth,
}

/// Oracle configuration for a custody.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct OracleParams {
    pub oracle_account: Pubkey,
    pub oracle_type: OracleType,
    /// Maximum confidence interval (BPS of price).
    pub max_price_error: u64,
    pub max_price_age_sec: u32,
}

impl OracleParams {
    /// Oracle settings with default tolerances for the given feed.
    #[must_use]
    pub fn new(oracle_account: Pubkey, oracle_type: OracleType) -> Self {
        Self {
            oracle_account,
            oracle_type,
            max_price_error: 10_000,
            max_price_age_sec: 60,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.oracle_type != OracleType::None && self.oracle_account == Pubkey::default() {
            return Err(CoreError::InvalidParams(
                "oracle account required for custom/pyth oracles".to_string(),
            ));
        }
        if self.max_price_age_sec == 0 {
            return Err(CoreError::InvalidParams(
                "max_price_age_sec must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Pricing
// ============================================================================

/// Pricing and leverage limits for a custody. Leverage is in BPS (10_000 = 1x).
#[derive(
    Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(default)]
pub struct PricingParams {
    pub use_ema: bool,
    pub use_unrealized_pnl_in_aum: bool,
    pub trade_spread_long: u64,
    pub trade_spread_short: u64,
    pub swap_spread: u64,
    pub min_initial_leverage: u64,
    pub max_initial_leverage: u64,
    pub max_leverage: u64,
    pub max_payoff_mult: u64,
    pub max_utilization: u64,
    pub max_position_locked_usd: u64,
    pub max_total_locked_usd: u64,
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            use_ema: true,
            use_unrealized_pnl_in_aum: true,
            trade_spread_long: 100,
            trade_spread_short: 100,
            swap_spread: 200,
            min_initial_leverage: 10_000,
            max_initial_leverage: 1_000_000,
            max_leverage: 1_000_000,
            max_payoff_mult: 10_000,
            max_utilization: 10_000,
            max_position_locked_usd: 1_000_000_000,
            max_total_locked_usd: 1_000_000_000,
        }
    }
}

impl PricingParams {
    pub fn validate(&self) -> CoreResult<()> {
        if self.min_initial_leverage == 0 || self.min_initial_leverage > self.max_initial_leverage {
            return Err(CoreError::InvalidParams(format!(
                "initial leverage range invalid: {}..{}",
                self.min_initial_leverage, self.max_initial_leverage
            )));
        }
        if self.max_initial_leverage > self.max_leverage {
            return Err(CoreError::InvalidParams(
                "max_initial_leverage exceeds max_leverage".to_string(),
            ));
        }
        if self.max_utilization > BPS_TOTAL {
            return Err(CoreError::InvalidParams(
                "max_utilization above 100%".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Fees
// ============================================================================

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FeesMode {
    Fixed,
    #[default]
    Linear,
    Optimal,
}

/// Fee schedule for a custody, in BPS.
#[derive(
    Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(default)]
pub struct Fees {
    pub mode: FeesMode,
    pub ratio_mult: u64,
    pub utilization_mult: u64,
    pub swap_in: u64,
    pub swap_out: u64,
    pub stable_swap_in: u64,
    pub stable_swap_out: u64,
    pub add_liquidity: u64,
    pub remove_liquidity: u64,
    pub open_position: u64,
    pub close_position: u64,
    pub liquidation: u64,
    pub protocol_share: u64,
}

impl Default for Fees {
    fn default() -> Self {
        Self {
            mode: FeesMode::Linear,
            ratio_mult: 20_000,
            utilization_mult: 20_000,
            swap_in: 100,
            swap_out: 100,
            stable_swap_in: 100,
            stable_swap_out: 100,
            add_liquidity: 100,
            remove_liquidity: 100,
            open_position: 100,
            close_position: 100,
            liquidation: 100,
            protocol_share: 10,
        }
    }
}

impl Fees {
    pub fn validate(&self) -> CoreResult<()> {
        if self.protocol_share > BPS_TOTAL {
            return Err(CoreError::InvalidParams(
                "protocol_share above 100%".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Borrow rate
// ============================================================================

/// Borrow-rate curve. Rates use 9 decimals (1_000_000_000 = 100%).
#[derive(
    Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(default)]
pub struct BorrowRateParams {
    pub base_rate: u64,
    pub slope1: u64,
    pub slope2: u64,
    pub optimal_utilization: u64,
}

/// 100% in borrow-rate units.
pub const RATE_POWER: u64 = 1_000_000_000;

impl Default for BorrowRateParams {
    fn default() -> Self {
        Self {
            base_rate: 0,
            slope1: 80_000,
            slope2: 120_000,
            optimal_utilization: 800_000_000,
        }
    }
}

impl BorrowRateParams {
    pub fn validate(&self) -> CoreResult<()> {
        if self.optimal_utilization == 0 || self.optimal_utilization > RATE_POWER {
            return Err(CoreError::InvalidParams(format!(
                "optimal_utilization out of range: {}",
                self.optimal_utilization
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Token ratios
// ============================================================================

/// Allocation weight of one custody inside its pool, in BPS.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct TokenRatios {
    pub target: u64,
    pub min: u64,
    pub max: u64,
}

impl TokenRatios {
    /// Ratio appended for a freshly added custody before rebalancing.
    pub const NEW_CUSTODY: Self = Self {
        target: 5_000,
        min: 10,
        max: BPS_TOTAL,
    };
}

// ============================================================================
// CustodyConfig
// ============================================================================

/// Full configuration for adding a custody to a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodyConfig {
    pub is_stable: bool,
    pub is_virtual: bool,
    pub oracle: OracleParams,
    pub pricing: PricingParams,
    pub permissions: Permissions,
    pub fees: Fees,
    pub borrow_rate: BorrowRateParams,
}

impl CustodyConfig {
    /// Defaults for everything except the oracle source.
    #[must_use]
    pub fn with_oracle(oracle: OracleParams) -> Self {
        Self {
            is_stable: false,
            is_virtual: false,
            oracle,
            pricing: PricingParams::default(),
            permissions: Permissions::all(),
            fees: Fees::default(),
            borrow_rate: BorrowRateParams::default(),
        }
    }

    /// Validate every parameter group before anything is submitted.
    pub fn validate(&self) -> CoreResult<()> {
        self.oracle.validate()?;
        self.pricing.validate()?;
        self.fees.validate()?;
        self.borrow_rate.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_custody_config_is_valid() {
        let config =
            CustodyConfig::with_oracle(OracleParams::new(Pubkey::new_unique(), OracleType::Pyth));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oracle_requires_account() {
        let oracle = OracleParams::new(Pubkey::default(), OracleType::Custom);
        assert!(oracle.validate().is_err());

        let oracle = OracleParams::new(Pubkey::default(), OracleType::None);
        assert!(oracle.validate().is_ok());
    }

    #[test]
    fn test_pricing_leverage_range() {
        let pricing = PricingParams {
            min_initial_leverage: 20_000,
            max_initial_leverage: 10_000,
            ..Default::default()
        };
        assert!(pricing.validate().is_err());

        let pricing = PricingParams {
            max_initial_leverage: 2_000_000,
            ..Default::default()
        };
        assert!(pricing.validate().is_err());
    }

    #[test]
    fn test_borrow_rate_bounds() {
        let rate = BorrowRateParams {
            optimal_utilization: RATE_POWER + 1,
            ..Default::default()
        };
        assert!(rate.validate().is_err());
    }

    #[test]
    fn test_permissions_layout() {
        let mut p = Permissions::none();
        p.allow_close_position = true;
        assert_eq!(borsh::to_vec(&p).unwrap(), vec![0, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_fees_from_partial_toml() {
        let fees: Fees = toml::from_str("mode = \"optimal\"\nliquidation = 250").unwrap();
        assert_eq!(fees.mode, FeesMode::Optimal);
        assert_eq!(fees.liquidation, 250);
        assert_eq!(fees.swap_in, Fees::default().swap_in);
    }
}
