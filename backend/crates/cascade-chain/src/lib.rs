//! Execution-layer plumbing: RPC and relay clients, retry, lookup tables, keys and
//! instruction builders

pub mod builder;
pub mod curve;
pub mod error;
pub mod jsonrpc;
pub mod keys;
pub mod lookup;
pub mod relay;
pub mod retry;
pub mod rpc;
pub mod transfer;
pub mod types;

pub use builder::{BuildError, InstructionBuilder, InstructionSet};
pub use curve::{CurveAccounts, CurvePurchaseBuilder};
pub use error::ChainError;
pub use keys::{load_participant_keys, parse_base58_keypair, KeyError};
pub use lookup::{decode_lookup_table, LookupTableIndex, LookupTables};
pub use relay::{BundleRelay, HttpRelayClient, RelayClientConfig};
pub use retry::RetryPolicy;
pub use rpc::{ExecutionRpc, HttpRpcClient, RpcClientConfig};
pub use transfer::{tip_instruction, FundingBuilder, ReclaimBuilder};
pub use types::{BundleId, BundleResult, ConfirmationStatus, LookupTableResolution, ValidityToken};
