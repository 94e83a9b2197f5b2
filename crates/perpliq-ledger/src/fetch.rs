//! Typed account reads.

use perpliq_core::{CoreError, LedgerAccount};
use solana_sdk::pubkey::Pubkey;

use crate::error::GatewayError;
use crate::gateway::LedgerGateway;

/// Fetch and decode one account. `Ok(None)` when the account does not exist.
///
/// Generic over the caller's error type so each crate keeps its own error
/// enum while sharing the read path.
pub async fn fetch_account<T, E>(
    gateway: &dyn LedgerGateway,
    address: Pubkey,
) -> Result<Option<T>, E>
where
    T: LedgerAccount,
    E: From<GatewayError> + From<CoreError>,
{
    match gateway.get_account(address).await? {
        Some(data) => Ok(Some(T::decode(&data)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use perpliq_core::{Perpetuals, Permissions};

    #[derive(Debug)]
    enum TestError {
        Gateway,
        Core,
    }

    impl From<GatewayError> for TestError {
        fn from(_: GatewayError) -> Self {
            TestError::Gateway
        }
    }

    impl From<CoreError> for TestError {
        fn from(_: CoreError) -> Self {
            TestError::Core
        }
    }

    #[tokio::test]
    async fn test_fetch_decodes_and_reports_missing() {
        let mock = MockGateway::new();
        let address = Pubkey::new_unique();
        let perpetuals = Perpetuals {
            permissions: Permissions::all(),
            pools: vec![Pubkey::new_unique()],
            transfer_authority_bump: 254,
            perpetuals_bump: 253,
            inception_time: 0,
        };
        mock.set_account(address, Pubkey::new_unique(), perpetuals.to_account_data().unwrap());

        let fetched: Option<Perpetuals> = fetch_account::<_, TestError>(&mock, address)
            .await
            .unwrap();
        assert_eq!(fetched, Some(perpetuals));

        let missing: Option<Perpetuals> =
            fetch_account::<_, TestError>(&mock, Pubkey::new_unique()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_fetch_error_mapping() {
        let mock = MockGateway::new();
        let address = Pubkey::new_unique();
        mock.set_account(address, Pubkey::new_unique(), vec![0; 16]);
        let err = fetch_account::<Perpetuals, TestError>(&mock, address).await.unwrap_err();
        assert!(matches!(err, TestError::Core));

        mock.set_fail_reads(true);
        let err = fetch_account::<Perpetuals, TestError>(&mock, address).await.unwrap_err();
        assert!(matches!(err, TestError::Gateway));
    }
}
