//! Pool allocation ratio rebalancing.

use crate::params::TokenRatios;

/// 100% in basis points.
pub const BPS_TOTAL: u64 = 10_000;

/// Spread targets evenly across all custodies.
///
/// Each target becomes `BPS_TOTAL / n`; the integer remainder goes to the
/// last entry so the targets always sum to exactly `BPS_TOTAL`. `min` and
/// `max` are left as given. An empty list comes back unchanged.
#[must_use]
pub fn rebalance(ratios: &[TokenRatios]) -> Vec<TokenRatios> {
    let n = ratios.len() as u64;
    if n == 0 {
        return ratios.to_vec();
    }

    let target = BPS_TOTAL / n;
    let remainder = BPS_TOTAL % n;
    let last = ratios.len() - 1;

    ratios
        .iter()
        .enumerate()
        .map(|(idx, ratio)| TokenRatios {
            target: if idx == last { target + remainder } else { target },
            ..*ratio
        })
        .collect()
}
