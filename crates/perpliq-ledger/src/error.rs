//! Error types for perpliq-ledger.

use thiserror::Error;

/// Failures talking to the ledger.
///
/// `Clone` so test doubles can replay a scripted error more than once.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Transaction {signature} failed: {reason}")]
    TransactionFailed { signature: String, reason: String },

    #[error("Signing error: {0}")]
    Signing(String),
}

/// Markers the ledger uses when an instruction targets an account that no
/// longer exists or was never initialised. 0xbc4 is AccountNotInitialized.
const ALREADY_CLOSED_MARKERS: &[&str] = &[
    "AccountNotInitialized",
    "custom program error: 0xbc4",
    "AccountNotFound",
    "account not found",
];

impl GatewayError {
    /// True when the rejection means the target account is already gone.
    #[must_use]
    pub fn is_already_closed(&self) -> bool {
        let text = match self {
            GatewayError::Rpc { message, .. } => message.as_str(),
            GatewayError::SimulationFailed(reason) => reason.as_str(),
            GatewayError::TransactionFailed { reason, .. } => reason.as_str(),
            _ => return false,
        };
        ALREADY_CLOSED_MARKERS.iter().any(|m| text.contains(m))
    }

    /// True for failures of the transport itself rather than a ledger verdict.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(_) | GatewayError::Timeout(_))
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_closed_classification() {
        let err = GatewayError::Rpc {
            code: -32002,
            message: "Transaction simulation failed: Error processing Instruction 0: \
                      custom program error: 0xbc4"
                .to_string(),
        };
        assert!(err.is_already_closed());

        let err = GatewayError::TransactionFailed {
            signature: "sig".to_string(),
            reason: "AccountNotInitialized".to_string(),
        };
        assert!(err.is_already_closed());

        let err = GatewayError::Rpc {
            code: -32002,
            message: "custom program error: 0x1771".to_string(),
        };
        assert!(!err.is_already_closed());
        assert!(!GatewayError::Timeout("confirm".to_string()).is_already_closed());
    }

    #[test]
    fn test_transport_classification() {
        assert!(GatewayError::Transport("reset".to_string()).is_transport());
        assert!(!GatewayError::Decode("x".to_string()).is_transport());
    }
}
