use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_hash::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use tracing::{debug, warn};

use crate::{
  error::ChainError,
  jsonrpc::{JsonRpcTransport, WithContext},
  lookup::decode_lookup_table,
  retry::RetryPolicy,
  types::{ConfirmationStatus, LookupTableResolution, ValidityToken},
};

/// Node capabilities the bundler needs
#[async_trait]
pub trait ExecutionRpc: Send + Sync {
  async fn latest_validity_token(&self) -> Result<ValidityToken, ChainError>;

  async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature, ChainError>;

  /// Poll until the signature is confirmed, fails, or the poll budget runs out
  async fn confirm(&self, signature: &Signature) -> Result<ConfirmationStatus, ChainError>;

  async fn balance(&self, account: &Pubkey) -> Result<u64, ChainError>;

  async fn lookup_table(&self, address: &Pubkey) -> Result<LookupTableResolution, ChainError>;
}

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
  pub read_retry: RetryPolicy,
  pub balance_retry: RetryPolicy,
  pub confirm_polls: u32,
  pub confirm_poll_interval: Duration,
  pub request_timeout: Duration,
}

impl Default for RpcClientConfig {
  fn default() -> Self {
    Self {
      read_retry: RetryPolicy::default(),
      balance_retry: RetryPolicy::new(10, Duration::from_millis(500), 2.0),
      confirm_polls: 30,
      confirm_poll_interval: Duration::from_secs(1),
      request_timeout: Duration::from_secs(30),
    }
  }
}

/// Solana JSON-RPC over HTTP
#[derive(Debug)]
pub struct HttpRpcClient {
  transport: JsonRpcTransport,
  config: RpcClientConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
  blockhash: String,
  last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
  #[serde(default)]
  err: Option<Value>,
  #[serde(default)]
  confirmation_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
  /// `[payload, encoding]`
  data: (String, String),
}

impl HttpRpcClient {
  pub fn new(url: impl Into<String>, config: RpcClientConfig) -> Result<Self, ChainError> {
    let client = reqwest::Client::builder()
      .timeout(config.request_timeout)
      .build()
      .map_err(|e| ChainError::Transport(e.to_string()))?;

    Ok(Self { transport: JsonRpcTransport::new(client, url), config })
  }

  async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>, ChainError> {
    let params = json!([[signature.to_string()], { "searchTransactionHistory": false }]);
    let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
      .config
      .read_retry
      .run("getSignatureStatuses", || {
        self.transport.call("getSignatureStatuses", params.clone())
      })
      .await?;

    Ok(statuses.value.into_iter().next().flatten())
  }
}

fn classify_status(status: &SignatureStatus) -> Option<ConfirmationStatus> {
  if let Some(err) = status.err.as_ref().filter(|e| !e.is_null()) {
    return Some(ConfirmationStatus::Failed(err.to_string()));
  }
  match status.confirmation_status.as_deref() {
    Some("confirmed") | Some("finalized") => Some(ConfirmationStatus::Confirmed),
    _ => None,
  }
}

#[async_trait]
impl ExecutionRpc for HttpRpcClient {
  async fn latest_validity_token(&self) -> Result<ValidityToken, ChainError> {
    let params = json!([{ "commitment": "finalized" }]);
    let latest: WithContext<LatestBlockhash> = self
      .config
      .read_retry
      .run("getLatestBlockhash", || self.transport.call("getLatestBlockhash", params.clone()))
      .await?;

    let blockhash = Hash::from_str(&latest.value.blockhash).map_err(|e| ChainError::Decode {
      what: "blockhash",
      reason: e.to_string(),
    })?;

    Ok(ValidityToken {
      blockhash,
      last_valid_block_height: latest.value.last_valid_block_height,
    })
  }

  async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature, ChainError> {
    let bytes = bincode::serialize(transaction).map_err(|e| ChainError::Encode(e.to_string()))?;
    let params = json!([
      STANDARD.encode(bytes),
      { "encoding": "base64", "skipPreflight": false, "preflightCommitment": "confirmed", "maxRetries": 0 }
    ]);

    // not retried; a resend is the caller's decision
    let signature: String = self.transport.call("sendTransaction", params).await?;
    Signature::from_str(&signature).map_err(|e| ChainError::Decode {
      what: "signature",
      reason: e.to_string(),
    })
  }

  async fn confirm(&self, signature: &Signature) -> Result<ConfirmationStatus, ChainError> {
    for poll in 1..=self.config.confirm_polls {
      if let Some(status) = self.signature_status(signature).await? {
        if let Some(outcome) = classify_status(&status) {
          debug!(%signature, poll, ?outcome, "Signature settled");
          return Ok(outcome);
        }
      }
      tokio::time::sleep(self.config.confirm_poll_interval).await;
    }

    warn!(%signature, polls = self.config.confirm_polls, "Signature still unconfirmed");
    Ok(ConfirmationStatus::Pending)
  }

  async fn balance(&self, account: &Pubkey) -> Result<u64, ChainError> {
    let params = json!([account.to_string(), { "commitment": "confirmed" }]);
    let balance: WithContext<u64> = self
      .config
      .balance_retry
      .run("getBalance", || self.transport.call("getBalance", params.clone()))
      .await?;
    Ok(balance.value)
  }

  async fn lookup_table(&self, address: &Pubkey) -> Result<LookupTableResolution, ChainError> {
    let params = json!([address.to_string(), { "encoding": "base64", "commitment": "confirmed" }]);
    let account: WithContext<Option<AccountInfo>> = self
      .config
      .read_retry
      .run("getAccountInfo", || self.transport.call("getAccountInfo", params.clone()))
      .await?;

    let Some(account) = account.value else {
      return Ok(LookupTableResolution::NotFound);
    };
    let data = STANDARD.decode(&account.data.0).map_err(|e| ChainError::Decode {
      what: "account data",
      reason: e.to_string(),
    })?;

    decode_lookup_table(*address, &data).map(LookupTableResolution::Found)
  }
}
