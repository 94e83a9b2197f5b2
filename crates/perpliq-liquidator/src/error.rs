//! Error types for perpliq-liquidator.

use perpliq_core::CoreError;
use perpliq_ledger::GatewayError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiquidatorError {
    /// Transport or ledger failure. Systemic when it hits a cycle-wide read.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Account contents are unusable; the affected position is skipped.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("{kind} account not found: {address}")]
    AccountNotFound { kind: &'static str, address: Pubkey },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl LiquidatorError {
    /// True when the failure is about one account's contents, not the transport.
    #[must_use]
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            LiquidatorError::DataIntegrity(_)
                | LiquidatorError::AccountNotFound { .. }
                | LiquidatorError::Core(CoreError::DataIntegrity(_))
        )
    }

    /// True when the gateway itself failed. Such an error says nothing about
    /// the position and ends the cycle.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, LiquidatorError::Gateway(e) if e.is_transport())
    }

    /// Short label for metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        if self.is_data_integrity() {
            "data_integrity"
        } else if matches!(self, LiquidatorError::Gateway(_)) {
            "gateway_error"
        } else {
            "other"
        }
    }
}

pub type LiquidatorResult<T> = Result<T, LiquidatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_vs_data_integrity() {
        let timeout = LiquidatorError::from(GatewayError::Timeout("simulate".to_string()));
        assert!(timeout.is_transport());
        assert!(!timeout.is_data_integrity());

        let rejected = LiquidatorError::from(GatewayError::SimulationFailed("0x1771".to_string()));
        assert!(!rejected.is_transport());
        assert_eq!(rejected.reason(), "gateway_error");

        let missing = LiquidatorError::AccountNotFound {
            kind: "custody",
            address: Pubkey::new_unique(),
        };
        assert!(!missing.is_transport());
        assert_eq!(missing.reason(), "data_integrity");
    }
}
