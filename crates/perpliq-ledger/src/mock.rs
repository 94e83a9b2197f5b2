//! In-memory gateway for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;

use crate::error::{GatewayError, GatewayResult};
use crate::filter::AccountFilter;
use crate::gateway::{BoxFuture, KeyedAccount, LedgerGateway};

/// A submission as the mock received it.
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    pub instructions: Vec<Instruction>,
    /// Signer public keys in the order they were passed.
    pub signers: Vec<Pubkey>,
    pub signature: Signature,
}

impl RecordedSubmission {
    /// True if any instruction names `key`.
    #[must_use]
    pub fn references(&self, key: &Pubkey) -> bool {
        self.instructions
            .iter()
            .any(|ix| ix.accounts.iter().any(|m| m.pubkey == *key))
    }
}

#[derive(Debug, Clone)]
struct MockAccount {
    owner: Pubkey,
    data: Vec<u8>,
}

/// Mock ledger gateway.
///
/// Holds accounts in memory, answers filtered scans locally, returns
/// scripted view results, and records every submission. Failures can be
/// scripted per account or signer.
#[derive(Debug, Default)]
pub struct MockGateway {
    accounts: Mutex<HashMap<Pubkey, MockAccount>>,
    /// View results keyed by an account the simulated instruction names.
    view_results: Mutex<HashMap<Pubkey, Vec<u8>>>,
    submit_failures: Mutex<HashMap<Pubkey, GatewayError>>,
    close_on_submit: Mutex<HashSet<Pubkey>>,
    submissions: Mutex<Vec<RecordedSubmission>>,
    simulations: Mutex<Vec<Vec<Instruction>>>,
    simulate_failure: Mutex<Option<GatewayError>>,
    fail_reads: AtomicBool,
    get_account_calls: AtomicUsize,
    program_accounts_calls: AtomicUsize,
}

impl MockGateway {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an account owned by `owner`.
    pub fn set_account(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.accounts
            .lock()
            .insert(address, MockAccount { owner, data });
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.accounts.lock().remove(address);
    }

    #[must_use]
    pub fn has_account(&self, address: &Pubkey) -> bool {
        self.accounts.lock().contains_key(address)
    }

    /// Return `data` from any simulation whose instruction names `account`.
    pub fn set_view_result(&self, account: Pubkey, data: Vec<u8>) {
        self.view_results.lock().insert(account, data);
    }

    /// Fail every simulation with `error` until cleared with `None`.
    pub fn set_simulate_failure(&self, error: Option<GatewayError>) {
        *self.simulate_failure.lock() = error;
    }

    /// Make every read fail with a transport error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Reject submissions that name `key` as an account or signer.
    pub fn fail_submissions_referencing(&self, key: Pubkey, error: GatewayError) {
        self.submit_failures.lock().insert(key, error);
    }

    /// Delete `address` once a submission naming it succeeds.
    pub fn close_on_submit(&self, address: Pubkey) {
        self.close_on_submit.lock().insert(address);
    }

    /// Recorded successful and failed submissions, in order.
    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.lock().clone()
    }

    pub fn simulations(&self) -> Vec<Vec<Instruction>> {
        self.simulations.lock().clone()
    }

    pub fn get_account_calls(&self) -> usize {
        self.get_account_calls.load(Ordering::SeqCst)
    }

    pub fn program_accounts_calls(&self) -> usize {
        self.program_accounts_calls.load(Ordering::SeqCst)
    }

    pub fn simulate_calls(&self) -> usize {
        self.simulations.lock().len()
    }

    fn check_reads(&self) -> GatewayResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("mock read failure".to_string()));
        }
        Ok(())
    }

    fn submit_now(
        &self,
        instructions: Vec<Instruction>,
        signers: &[Arc<Keypair>],
    ) -> GatewayResult<Signature> {
        if signers.is_empty() {
            return Err(GatewayError::Signing("no signers supplied".to_string()));
        }

        let record = RecordedSubmission {
            instructions,
            signers: signers.iter().map(|k| k.pubkey()).collect(),
            signature: Signature::new_unique(),
        };

        let failure = {
            let failures = self.submit_failures.lock();
            failures
                .iter()
                .find(|(key, _)| record.references(key) || record.signers.contains(key))
                .map(|(_, err)| err.clone())
        };

        let signature = record.signature;
        let closing: Vec<Pubkey> = self
            .close_on_submit
            .lock()
            .iter()
            .filter(|key| record.references(key))
            .copied()
            .collect();
        self.submissions.lock().push(record);

        if let Some(err) = failure {
            return Err(err);
        }

        if !closing.is_empty() {
            let mut accounts = self.accounts.lock();
            let mut views = self.view_results.lock();
            for key in closing {
                accounts.remove(&key);
                views.remove(&key);
            }
        }
        Ok(signature)
    }
}

impl LedgerGateway for MockGateway {
    fn get_account(&self, address: Pubkey) -> BoxFuture<'_, GatewayResult<Option<Vec<u8>>>> {
        Box::pin(async move {
            self.get_account_calls.fetch_add(1, Ordering::SeqCst);
            self.check_reads()?;
            Ok(self.accounts.lock().get(&address).map(|a| a.data.clone()))
        })
    }

    fn get_program_accounts(
        &self,
        program_id: Pubkey,
        filters: Vec<AccountFilter>,
    ) -> BoxFuture<'_, GatewayResult<Vec<KeyedAccount>>> {
        Box::pin(async move {
            self.program_accounts_calls.fetch_add(1, Ordering::SeqCst);
            self.check_reads()?;
            let accounts = self.accounts.lock();
            let mut out: Vec<KeyedAccount> = accounts
                .iter()
                .filter(|(_, a)| a.owner == program_id)
                .filter(|(_, a)| filters.iter().all(|f| f.matches(&a.data)))
                .map(|(address, a)| KeyedAccount {
                    address: *address,
                    data: a.data.clone(),
                })
                .collect();
            // deterministic order for assertions
            out.sort_by_key(|k| k.address);
            Ok(out)
        })
    }

    fn simulate(
        &self,
        instructions: Vec<Instruction>,
        _payer: Pubkey,
    ) -> BoxFuture<'_, GatewayResult<Option<Vec<u8>>>> {
        Box::pin(async move {
            self.simulations.lock().push(instructions.clone());
            self.check_reads()?;
            if let Some(err) = self.simulate_failure.lock().clone() {
                return Err(err);
            }
            let views = self.view_results.lock();
            let result = instructions
                .iter()
                .flat_map(|ix| ix.accounts.iter())
                .find_map(|m| views.get(&m.pubkey).cloned());
            Ok(result)
        })
    }

    fn submit(
        &self,
        instructions: Vec<Instruction>,
        signers: Vec<Arc<Keypair>>,
    ) -> BoxFuture<'_, GatewayResult<Signature>> {
        Box::pin(async move { self.submit_now(instructions, &signers) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::AccountMeta;

    fn ix_touching(key: Pubkey) -> Instruction {
        Instruction {
            program_id: Pubkey::new_unique(),
            accounts: vec![AccountMeta::new(key, false)],
            data: vec![],
        }
    }

    #[tokio::test]
    async fn test_program_accounts_filtering() {
        let mock = MockGateway::new();
        let program = Pubkey::new_unique();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        mock.set_account(a, program, vec![1, 2, 3]);
        mock.set_account(b, program, vec![9, 2, 3]);
        mock.set_account(Pubkey::new_unique(), Pubkey::new_unique(), vec![1, 2, 3]);

        let found = mock
            .get_program_accounts(program, vec![AccountFilter::memcmp(0, vec![1])])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].address, a);
        assert_eq!(mock.program_accounts_calls(), 1);
    }

    #[tokio::test]
    async fn test_close_on_submit_removes_account() {
        let mock = MockGateway::new();
        let target = Pubkey::new_unique();
        mock.set_account(target, Pubkey::new_unique(), vec![0]);
        mock.close_on_submit(target);

        let payer = Arc::new(Keypair::new());
        mock.submit(vec![ix_touching(target)], vec![payer.clone()])
            .await
            .unwrap();

        assert!(!mock.has_account(&target));
        let subs = mock.submissions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].signers, vec![payer.pubkey()]);
    }

    #[tokio::test]
    async fn test_scripted_failure_by_signer() {
        let mock = MockGateway::new();
        let bad = Arc::new(Keypair::new());
        mock.fail_submissions_referencing(
            bad.pubkey(),
            GatewayError::Rpc {
                code: -32002,
                message: "rejected".to_string(),
            },
        );

        let err = mock
            .submit(vec![ix_touching(Pubkey::new_unique())], vec![bad])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rpc { .. }));
        assert_eq!(mock.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_view_result_lookup() {
        let mock = MockGateway::new();
        let position = Pubkey::new_unique();
        mock.set_view_result(position, vec![1]);

        let hit = mock
            .simulate(vec![ix_touching(position)], Pubkey::new_unique())
            .await
            .unwrap();
        assert_eq!(hit, Some(vec![1]));

        let miss = mock
            .simulate(vec![ix_touching(Pubkey::new_unique())], Pubkey::new_unique())
            .await
            .unwrap();
        assert_eq!(miss, None);
        assert_eq!(mock.simulate_calls(), 2);
    }

    #[tokio::test]
    async fn test_scripted_simulate_failure() {
        let mock = MockGateway::new();
        let position = Pubkey::new_unique();
        mock.set_view_result(position, vec![1]);
        mock.set_simulate_failure(Some(GatewayError::Timeout("simulate".to_string())));

        let err = mock
            .simulate(vec![ix_touching(position)], Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(err.is_transport());

        mock.set_simulate_failure(None);
        let hit = mock
            .simulate(vec![ix_touching(position)], Pubkey::new_unique())
            .await
            .unwrap();
        assert_eq!(hit, Some(vec![1]));
    }

    #[tokio::test]
    async fn test_fail_reads() {
        let mock = MockGateway::new();
        mock.set_fail_reads(true);
        assert!(mock.get_account(Pubkey::new_unique()).await.is_err());
        assert_eq!(mock.get_account_calls(), 1);
    }
}
