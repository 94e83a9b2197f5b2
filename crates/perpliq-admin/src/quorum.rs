//! m-of-n admin submission.
//!
//! The ledger counts one signature per transaction: an admin action takes
//! effect only after `min_signatures` distinct admins have each sent the
//! same instruction. The executor sends those copies one at a time, in key
//! order, and stops at the first rejection.

use std::fmt;
use std::sync::Arc;

use perpliq_core::{CoreResult, Multisig, ProgramAddresses};
use perpliq_ledger::{fetch_account, DynGateway};
use perpliq_telemetry::Metrics;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use tracing::{debug, info, warn};

use crate::error::{AdminError, AdminResult};

/// Logical administrative action, used for logs, metrics and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Init,
    AddPool,
    RemovePool,
    AddCustody,
    RemoveCustody,
    SetAdminSigners,
    SetPermissions,
    SetCustomOraclePrice,
}

impl AdminAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::Init => "init",
            AdminAction::AddPool => "add_pool",
            AdminAction::RemovePool => "remove_pool",
            AdminAction::AddCustody => "add_custody",
            AdminAction::RemoveCustody => "remove_custody",
            AdminAction::SetAdminSigners => "set_admin_signers",
            AdminAction::SetPermissions => "set_permissions",
            AdminAction::SetCustomOraclePrice => "set_custom_oracle_price",
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signatures of an accepted action, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumOutcome {
    pub signatures: Vec<Signature>,
}

/// Sends one logical admin action once per required signer.
pub struct QuorumExecutor {
    gateway: DynGateway,
    addrs: ProgramAddresses,
    admins: Vec<Arc<Keypair>>,
}

impl QuorumExecutor {
    /// `admins` is the configured key order; the first `m` keys sign.
    pub fn new(gateway: DynGateway, addrs: ProgramAddresses, admins: Vec<Arc<Keypair>>) -> Self {
        Self {
            gateway,
            addrs,
            admins,
        }
    }

    #[must_use]
    pub fn addresses(&self) -> &ProgramAddresses {
        &self.addrs
    }

    #[must_use]
    pub fn gateway(&self) -> &DynGateway {
        &self.gateway
    }

    /// Read the admin multisig account.
    pub async fn multisig(&self) -> AdminResult<Multisig> {
        let address = self.addrs.multisig();
        fetch_account::<Multisig, AdminError>(self.gateway.as_ref(), address)
            .await?
            .ok_or(AdminError::AccountNotFound(address))
    }

    /// Execute `action` with the threshold read from the ledger's multisig.
    ///
    /// `build` is called once per signer with that signer's key, which the
    /// instruction names as its `admin` account.
    pub async fn execute<F>(&self, action: AdminAction, build: F) -> AdminResult<QuorumOutcome>
    where
        F: Fn(&Pubkey) -> CoreResult<Instruction>,
    {
        let multisig = self.multisig().await?;
        debug!(
            %action,
            min_signatures = multisig.min_signatures,
            num_signers = multisig.num_signers,
            "Read admin threshold"
        );
        self.execute_with_threshold(action, usize::from(multisig.min_signatures), build)
            .await
    }

    /// Execute `action` with a caller-supplied threshold.
    pub async fn execute_with_threshold<F>(
        &self,
        action: AdminAction,
        required: usize,
        build: F,
    ) -> AdminResult<QuorumOutcome>
    where
        F: Fn(&Pubkey) -> CoreResult<Instruction>,
    {
        if required == 0 {
            return Err(AdminError::InvalidParams(
                "signature threshold must be at least 1".to_string(),
            ));
        }
        if self.admins.len() < required {
            return Err(AdminError::InsufficientSigners {
                action,
                required,
                available: self.admins.len(),
            });
        }

        // Build every copy first so a builder error cannot leave a partial quorum.
        let instructions = self.admins[..required]
            .iter()
            .map(|admin| build(&admin.pubkey()))
            .collect::<CoreResult<Vec<_>>>()?;

        let mut signatures = Vec::with_capacity(required);
        for (index, (admin, ix)) in self.admins[..required]
            .iter()
            .zip(instructions)
            .enumerate()
        {
            let signer = admin.pubkey();
            Metrics::quorum_submission(action.as_str());
            match self.gateway.submit(vec![ix], vec![Arc::clone(admin)]).await {
                Ok(signature) => {
                    info!(
                        %action,
                        index,
                        required,
                        %signer,
                        %signature,
                        "Admin submission confirmed"
                    );
                    signatures.push(signature);
                }
                Err(source) => {
                    warn!(%action, index, %signer, error = %source, "Admin submission rejected");
                    return Err(AdminError::Submission {
                        action,
                        index,
                        signer,
                        source,
                    });
                }
            }
        }

        Ok(QuorumOutcome { signatures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpliq_core::instructions;
    use perpliq_core::LedgerAccount;
    use perpliq_core::programs::DEFAULT_PERPETUALS_PROGRAM_ID;
    use perpliq_ledger::{GatewayError, MockGateway};

    fn setup(keys: usize) -> (Arc<MockGateway>, QuorumExecutor, Vec<Arc<Keypair>>) {
        let mock = Arc::new(MockGateway::new());
        let addrs = ProgramAddresses::new(DEFAULT_PERPETUALS_PROGRAM_ID).unwrap();
        let admins: Vec<Arc<Keypair>> = (0..keys).map(|_| Arc::new(Keypair::new())).collect();
        let executor = QuorumExecutor::new(mock.clone(), addrs, admins.clone());
        (mock, executor, admins)
    }

    fn add_pool(executor: &QuorumExecutor) -> impl Fn(&Pubkey) -> CoreResult<Instruction> + '_ {
        move |admin| instructions::add_pool(executor.addresses(), admin, "SOL-PERP")
    }

    #[tokio::test]
    async fn test_exact_threshold_submissions_in_key_order() {
        let (mock, executor, admins) = setup(3);
        let outcome = executor
            .execute_with_threshold(AdminAction::AddPool, 2, add_pool(&executor))
            .await
            .unwrap();

        assert_eq!(outcome.signatures.len(), 2);
        let subs = mock.submissions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].signers, vec![admins[0].pubkey()]);
        assert_eq!(subs[1].signers, vec![admins[1].pubkey()]);
        // each copy names its own signer as the admin account
        assert_eq!(subs[1].instructions[0].accounts[0].pubkey, admins[1].pubkey());
    }

    #[tokio::test]
    async fn test_insufficient_signers_fails_before_submitting() {
        let (mock, executor, _) = setup(1);
        let err = executor
            .execute_with_threshold(AdminAction::AddPool, 2, add_pool(&executor))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AdminError::InsufficientSigners {
                required: 2,
                available: 1,
                ..
            }
        ));
        assert!(mock.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_aborts_sequence() {
        let (mock, executor, admins) = setup(3);
        mock.fail_submissions_referencing(
            admins[1].pubkey(),
            GatewayError::Rpc {
                code: -32002,
                message: "custom program error: 0x1770".to_string(),
            },
        );

        let err = executor
            .execute_with_threshold(AdminAction::AddPool, 3, add_pool(&executor))
            .await
            .unwrap_err();

        match err {
            AdminError::Submission { index, signer, .. } => {
                assert_eq!(index, 1);
                assert_eq!(signer, admins[1].pubkey());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // the third admin never signed
        assert_eq!(mock.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_threshold_read_from_multisig() {
        let (mock, executor, admins) = setup(3);
        let signers: Vec<Pubkey> = admins.iter().map(|k| k.pubkey()).collect();
        mock.set_account(
            executor.addresses().multisig(),
            DEFAULT_PERPETUALS_PROGRAM_ID,
            Multisig::with_signers(&signers, 2)
                .to_account_data()
                .unwrap(),
        );

        let outcome = executor
            .execute(AdminAction::AddPool, add_pool(&executor))
            .await
            .unwrap();
        assert_eq!(outcome.signatures.len(), 2);
        assert_eq!(mock.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_multisig() {
        let (_, executor, _) = setup(1);
        let err = executor
            .execute(AdminAction::AddPool, add_pool(&executor))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_zero_threshold_rejected() {
        let (mock, executor, _) = setup(1);
        let err = executor
            .execute_with_threshold(AdminAction::AddPool, 0, add_pool(&executor))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::InvalidParams(_)));
        assert!(mock.submissions().is_empty());
    }
}
