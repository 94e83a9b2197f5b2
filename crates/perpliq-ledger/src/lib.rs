//! Ledger access for perpliq.
//!
//! The [`LedgerGateway`] trait is the request/response boundary to the
//! perpetuals program. [`RpcGateway`] speaks JSON-RPC to a node;
//! [`MockGateway`] keeps accounts in memory for tests.

pub mod error;
pub mod fetch;
pub mod filter;
pub mod gateway;
pub mod keys;
pub mod mock;
pub mod rpc;

pub use error::{GatewayError, GatewayResult};
pub use fetch::fetch_account;
pub use filter::AccountFilter;
pub use gateway::{BoxFuture, DynGateway, KeyedAccount, LedgerGateway};
pub use keys::{load_keypair, load_keypairs, KeyError, KeySource};
pub use mock::{MockGateway, RecordedSubmission};
pub use rpc::{GatewayConfig, RpcGateway};
