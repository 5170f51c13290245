//! Block-engine bundle relay

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::json;
use solana_transaction::versioned::VersionedTransaction;
use tracing::{debug, info};

use crate::{
  error::ChainError,
  jsonrpc::{JsonRpcTransport, WithContext},
  retry::RetryPolicy,
  types::{BundleId, BundleResult},
};

#[async_trait]
pub trait BundleRelay: Send + Sync {
  /// Hand an ordered bundle to the relay
  async fn send_bundle(&self, transactions: &[VersionedTransaction]) -> Result<BundleId, ChainError>;

  /// Wait for the relay's verdict on a bundle
  async fn bundle_result(&self, bundle_id: &BundleId) -> Result<BundleResult, ChainError>;
}

#[derive(Debug, Deserialize)]
struct InflightStatus {
  status: String,
}

/// Verdict for one status poll; None means keep polling
fn classify_inflight(status: &str) -> Option<BundleResult> {
  match status {
    "Landed" => Some(BundleResult::Landed),
    "Failed" => Some(BundleResult::Rejected("bundle failed simulation or auction".to_string())),
    // "Pending" is in flight, "Invalid" is not yet (or no longer) known to the engine
    _ => None,
  }
}

#[derive(Debug, Clone)]
pub struct RelayClientConfig {
  pub read_retry: RetryPolicy,
  /// Status polls before a bundle counts as timed out or dropped
  pub polls: u32,
  pub poll_interval: Duration,
  pub request_timeout: Duration,
}

impl Default for RelayClientConfig {
  fn default() -> Self {
    Self {
      read_retry: RetryPolicy::default(),
      polls: 30,
      poll_interval: Duration::from_secs(1),
      request_timeout: Duration::from_secs(30),
    }
  }
}

#[derive(Debug)]
pub struct HttpRelayClient {
  transport: JsonRpcTransport,
  config: RelayClientConfig,
}

impl HttpRelayClient {
  pub fn new(url: impl Into<String>, config: RelayClientConfig) -> Result<Self, ChainError> {
    let client = reqwest::Client::builder()
      .timeout(config.request_timeout)
      .build()
      .map_err(|e| ChainError::Transport(e.to_string()))?;

    let config = RelayClientConfig { polls: config.polls.max(1), ..config };
    Ok(Self { transport: JsonRpcTransport::new(client, url), config })
  }

  pub fn config(&self) -> &RelayClientConfig {
    &self.config
  }
}

#[async_trait]
impl BundleRelay for HttpRelayClient {
  async fn send_bundle(&self, transactions: &[VersionedTransaction]) -> Result<BundleId, ChainError> {
    let encoded = transactions
      .iter()
      .map(|tx| bincode::serialize(tx).map(|bytes| STANDARD.encode(bytes)))
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| ChainError::Encode(e.to_string()))?;

    let bundle_id: String = self
      .transport
      .call("sendBundle", json!([encoded, { "encoding": "base64" }]))
      .await?;

    info!(bundle = %bundle_id, transactions = transactions.len(), "Bundle accepted by relay");
    Ok(BundleId(bundle_id))
  }

  async fn bundle_result(&self, bundle_id: &BundleId) -> Result<BundleResult, ChainError> {
    let params = json!([[bundle_id.0]]);
    let mut last_status = String::from("unknown");

    for poll in 1..=self.config.polls {
      let statuses: WithContext<Vec<InflightStatus>> = self
        .config
        .read_retry
        .run("getInflightBundleStatuses", || {
          self.transport.call("getInflightBundleStatuses", params.clone())
        })
        .await?;

      if let Some(entry) = statuses.value.first() {
        debug!(bundle = %bundle_id, poll, status = %entry.status, "Bundle status");
        if let Some(result) = classify_inflight(&entry.status) {
          return Ok(result);
        }
        last_status = entry.status.clone();
      }

      tokio::time::sleep(self.config.poll_interval).await;
    }

    // never seen landing within the window
    if last_status == "Pending" {
      return Err(ChainError::BundleTimeout { bundle_id: bundle_id.0.clone(), polls: self.config.polls });
    }
    Ok(BundleResult::Dropped)
  }
}

#[cfg(test)]
mod tests {
  use rstest::rstest;

  use super::*;

  #[rstest]
  #[case("Landed", Some(BundleResult::Landed))]
  #[case("Pending", None)]
  #[case("Invalid", None)]
  fn maps_inflight_statuses(#[case] status: &str, #[case] expected: Option<BundleResult>) {
    assert_eq!(classify_inflight(status), expected);
  }

  #[test]
  fn client_takes_its_timeout_from_config() {
    let config = RelayClientConfig { polls: 0, request_timeout: Duration::from_secs(5), ..RelayClientConfig::default() };
    let client = HttpRelayClient::new("http://localhost:9000/api/v1/bundles", config).unwrap();

    assert_eq!(client.config().request_timeout, Duration::from_secs(5));
    assert_eq!(client.config().polls, 1);
  }

  #[test]
  fn failed_bundle_is_rejected() {
    assert!(matches!(classify_inflight("Failed"), Some(BundleResult::Rejected(_))));
  }
}
