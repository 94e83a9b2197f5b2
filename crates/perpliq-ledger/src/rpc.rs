//! JSON-RPC implementation of [`LedgerGateway`].

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use tracing::{debug, trace, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::filter::AccountFilter;
use crate::gateway::{BoxFuture, KeyedAccount, LedgerGateway};

// ============================================================================
// GatewayConfig
// ============================================================================

/// Transport settings for the RPC gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound on waiting for a submitted transaction to confirm.
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default = "default_confirm_poll_interval_ms")]
    pub confirm_poll_interval_ms: u64,
    /// Commitment level for reads and confirmation ("processed", "confirmed", "finalized").
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_confirm_timeout_ms() -> u64 {
    30_000
}

fn default_confirm_poll_interval_ms() -> u64 {
    500
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            confirm_poll_interval_ms: default_confirm_poll_interval_ms(),
            commitment: default_commitment(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_ms == 0 || self.confirm_timeout_ms == 0 {
            return Err("gateway timeouts must be positive".to_string());
        }
        if self.confirm_poll_interval_ms == 0 {
            return Err("confirm_poll_interval_ms must be positive".to_string());
        }
        if !matches!(
            self.commitment.as_str(),
            "processed" | "confirmed" | "finalized"
        ) {
            return Err(format!("unknown commitment '{}'", self.commitment));
        }
        Ok(())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct UiAccount {
    /// `[payload, encoding]`
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct UiKeyedAccount {
    pubkey: String,
    account: UiAccount,
}

#[derive(Debug, Deserialize)]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulationValue {
    err: Option<Value>,
    #[serde(default)]
    logs: Option<Vec<String>>,
    #[serde(default)]
    return_data: Option<ReturnData>,
}

#[derive(Debug, Deserialize)]
struct ReturnData {
    data: (String, String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    err: Option<Value>,
    confirmation_status: Option<String>,
}

// ============================================================================
// RpcGateway
// ============================================================================

/// Gateway over a ledger node's HTTP JSON-RPC endpoint.
pub struct RpcGateway {
    client: Client,
    url: String,
    config: GatewayConfig,
    next_id: AtomicU64,
}

impl RpcGateway {
    /// Create a gateway for `url`.
    pub fn new(url: impl Into<String>, config: GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            config,
            next_id: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> GatewayResult<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        trace!(method, id = request.id, "RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(format!("{method}: {e}"))
                } else {
                    GatewayError::Transport(format!("{method}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Transport(format!("{method}: HTTP {status}: {body}")));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("{method}: {e}")))?;

        if let Some(err) = body.error {
            return Err(GatewayError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        body.result
            .ok_or_else(|| GatewayError::Decode(format!("{method}: missing result")))
    }

    fn decode_base64(payload: &str) -> GatewayResult<Vec<u8>> {
        BASE64
            .decode(payload)
            .map_err(|e| GatewayError::Decode(format!("invalid base64: {e}")))
    }

    fn encode_transaction(tx: &Transaction) -> GatewayResult<String> {
        let bytes = bincode::serialize(tx)
            .map_err(|e| GatewayError::Signing(format!("transaction encoding failed: {e}")))?;
        Ok(BASE64.encode(bytes))
    }

    async fn latest_blockhash(&self) -> GatewayResult<Hash> {
        let res: WithContext<LatestBlockhash> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.config.commitment }]),
            )
            .await?;
        Hash::from_str(&res.value.blockhash)
            .map_err(|e| GatewayError::Decode(format!("invalid blockhash: {e}")))
    }

    async fn fetch_account(&self, address: Pubkey) -> GatewayResult<Option<Vec<u8>>> {
        let res: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.config.commitment }
                ]),
            )
            .await?;
        res.value
            .map(|account| Self::decode_base64(&account.data.0))
            .transpose()
    }

    async fn fetch_program_accounts(
        &self,
        program_id: Pubkey,
        filters: Vec<AccountFilter>,
    ) -> GatewayResult<Vec<KeyedAccount>> {
        let filters: Vec<Value> = filters.iter().map(AccountFilter::to_json).collect();
        let res: Vec<UiKeyedAccount> = self
            .call(
                "getProgramAccounts",
                json!([
                    program_id.to_string(),
                    {
                        "encoding": "base64",
                        "commitment": self.config.commitment,
                        "filters": filters,
                    }
                ]),
            )
            .await?;

        res.into_iter()
            .map(|keyed| {
                let address = Pubkey::from_str(&keyed.pubkey)
                    .map_err(|e| GatewayError::Decode(format!("invalid pubkey: {e}")))?;
                Ok(KeyedAccount {
                    address,
                    data: Self::decode_base64(&keyed.account.data.0)?,
                })
            })
            .collect()
    }

    async fn run_simulation(
        &self,
        instructions: Vec<Instruction>,
        payer: Pubkey,
    ) -> GatewayResult<Option<Vec<u8>>> {
        let tx = Transaction::new_unsigned(Message::new(&instructions, Some(&payer)));
        let res: WithContext<SimulationValue> = self
            .call(
                "simulateTransaction",
                json!([
                    Self::encode_transaction(&tx)?,
                    {
                        "encoding": "base64",
                        "commitment": self.config.commitment,
                        "sigVerify": false,
                        "replaceRecentBlockhash": true,
                    }
                ]),
            )
            .await?;

        if let Some(err) = res.value.err {
            let logs = res.value.logs.unwrap_or_default().join("\n");
            return Err(GatewayError::SimulationFailed(format!("{err}: {logs}")));
        }

        match res.value.return_data {
            Some(ret) if !ret.data.0.is_empty() => Ok(Some(Self::decode_base64(&ret.data.0)?)),
            _ => Ok(None),
        }
    }

    async fn send_and_confirm(
        &self,
        instructions: Vec<Instruction>,
        signers: Vec<Arc<Keypair>>,
    ) -> GatewayResult<Signature> {
        let payer = signers
            .first()
            .ok_or_else(|| GatewayError::Signing("no signers supplied".to_string()))?
            .pubkey();

        let blockhash = self.latest_blockhash().await?;
        let mut tx = Transaction::new_with_payer(&instructions, Some(&payer));
        let refs: Vec<&Keypair> = signers.iter().map(|k| &**k).collect();
        tx.try_sign(refs.as_slice(), blockhash)
            .map_err(|e| GatewayError::Signing(e.to_string()))?;

        let sig: String = self
            .call(
                "sendTransaction",
                json!([
                    Self::encode_transaction(&tx)?,
                    { "encoding": "base64", "preflightCommitment": self.config.commitment }
                ]),
            )
            .await?;
        let signature = Signature::from_str(&sig)
            .map_err(|e| GatewayError::Decode(format!("invalid signature: {e}")))?;
        debug!(%signature, "Transaction sent");

        self.confirm(signature).await?;
        Ok(signature)
    }

    async fn confirm(&self, signature: Signature) -> GatewayResult<()> {
        let deadline = Instant::now() + Duration::from_millis(self.config.confirm_timeout_ms);
        let poll = Duration::from_millis(self.config.confirm_poll_interval_ms);
        let wanted_finalized = self.config.commitment == "finalized";

        loop {
            let res: WithContext<Vec<Option<SignatureStatus>>> = self
                .call(
                    "getSignatureStatuses",
                    json!([[signature.to_string()], { "searchTransactionHistory": false }]),
                )
                .await?;

            if let Some(Some(status)) = res.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(GatewayError::TransactionFailed {
                        signature: signature.to_string(),
                        reason: err.to_string(),
                    });
                }
                let reached = match status.confirmation_status.as_deref() {
                    Some("finalized") => true,
                    Some("confirmed") => !wanted_finalized,
                    Some("processed") => self.config.commitment == "processed",
                    _ => false,
                };
                if reached {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                warn!(%signature, "Confirmation timed out");
                return Err(GatewayError::Timeout(format!(
                    "transaction {signature} not confirmed within {}ms",
                    self.config.confirm_timeout_ms
                )));
            }
            tokio::time::sleep(poll).await;
        }
    }
}

impl LedgerGateway for RpcGateway {
    fn get_account(&self, address: Pubkey) -> BoxFuture<'_, GatewayResult<Option<Vec<u8>>>> {
        Box::pin(self.fetch_account(address))
    }

    fn get_program_accounts(
        &self,
        program_id: Pubkey,
        filters: Vec<AccountFilter>,
    ) -> BoxFuture<'_, GatewayResult<Vec<KeyedAccount>>> {
        Box::pin(self.fetch_program_accounts(program_id, filters))
    }

    fn simulate(
        &self,
        instructions: Vec<Instruction>,
        payer: Pubkey,
    ) -> BoxFuture<'_, GatewayResult<Option<Vec<u8>>>> {
        Box::pin(self.run_simulation(instructions, payer))
    }

    fn submit(
        &self,
        instructions: Vec<Instruction>,
        signers: Vec<Arc<Keypair>>,
    ) -> BoxFuture<'_, GatewayResult<Signature>> {
        Box::pin(self.send_and_confirm(instructions, signers))
    }
}
