//! Bundle submission
//!
//! Each bundle gets exactly one atomic attempt through the relay. If the relay errors,
//! rejects, or drops the bundle, its payloads are sent one at a time straight to the node.
//! Bundles go out strictly one after another.

use cascade_chain::{BundleId, BundleRelay, BundleResult, ChainError, ConfirmationStatus, ExecutionRpc};
use cascade_core::constants::MAX_BUNDLE_LEN;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use tracing::{info, warn};

use crate::signer::{SignedPayload, SigningError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitterConfig {
  pub max_bundle_len: usize,
}

impl Default for SubmitterConfig {
  fn default() -> Self {
    Self { max_bundle_len: MAX_BUNDLE_LEN }
  }
}

/// What happened to one payload sent on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
  Confirmed(Signature),
  /// The node had already processed it
  Duplicate,
  /// Sent, but not confirmed within the polling budget
  Unconfirmed(Signature),
  Failed(String),
}

impl SendOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, Self::Confirmed(_) | Self::Duplicate)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadResult {
  pub index: usize,
  pub outcome: SendOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleOutcome {
  AtomicLanded { bundle_id: BundleId },
  FallbackCompleted { succeeded: usize, failed: usize, results: Vec<PayloadResult> },
  FallbackAbortedNoPayloads,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
  pub bundle: usize,
  pub payloads: Vec<usize>,
  /// Why the atomic path was abandoned, when it was
  pub atomic_failure: Option<String>,
  pub outcome: BundleOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionReport {
  pub bundles: Vec<BundleReport>,
  /// Payloads left out because they could not be signed
  pub unsigned: Vec<SigningError>,
}

impl SubmissionReport {
  pub fn landed_atomically(&self) -> usize {
    self
      .bundles
      .iter()
      .filter(|b| matches!(b.outcome, BundleOutcome::AtomicLanded { .. }))
      .count()
  }

  /// Payloads that ended up on chain by either path
  pub fn payloads_succeeded(&self) -> usize {
    self
      .bundles
      .iter()
      .map(|b| match &b.outcome {
        BundleOutcome::AtomicLanded { .. } => b.payloads.len(),
        BundleOutcome::FallbackCompleted { succeeded, .. } => *succeeded,
        BundleOutcome::FallbackAbortedNoPayloads => 0,
      })
      .sum()
  }

  pub(crate) fn log_finished(&self) {
    info!(
      bundles = self.bundles.len(),
      landed_atomically = self.landed_atomically(),
      succeeded = self.payloads_succeeded(),
      failed = self.payloads_failed(),
      unsigned = self.unsigned.len(),
      "Submission finished"
    );
  }

  pub fn payloads_failed(&self) -> usize {
    self
      .bundles
      .iter()
      .map(|b| match &b.outcome {
        BundleOutcome::FallbackCompleted { failed, .. } => *failed,
        _ => 0,
      })
      .sum()
  }
}

pub struct BundleSubmitter<'a> {
  relay: &'a dyn BundleRelay,
  rpc: &'a dyn ExecutionRpc,
  config: SubmitterConfig,
}

impl<'a> BundleSubmitter<'a> {
  pub fn new(relay: &'a dyn BundleRelay, rpc: &'a dyn ExecutionRpc, config: SubmitterConfig) -> Self {
    Self { relay, rpc, config }
  }

  /// Submit every payload, `max_bundle_len` per bundle, in order
  pub async fn submit(&self, signed: &[SignedPayload]) -> SubmissionReport {
    let mut report = SubmissionReport::default();
    for (bundle, payloads) in signed.chunks(self.config.max_bundle_len.max(1)).enumerate() {
      report.bundles.push(self.submit_bundle(bundle, payloads).await);
    }

    report.log_finished();
    report
  }

  pub async fn submit_bundle(&self, bundle: usize, payloads: &[SignedPayload]) -> BundleReport {
    let indexes: Vec<usize> = payloads.iter().map(|p| p.index).collect();
    if payloads.is_empty() {
      warn!(bundle, "Bundle has no payloads");
      return BundleReport {
        bundle,
        payloads: indexes,
        atomic_failure: None,
        outcome: BundleOutcome::FallbackAbortedNoPayloads,
      };
    }

    let transactions: Vec<VersionedTransaction> = payloads.iter().map(|p| p.transaction.clone()).collect();

    let failure = match self.atomic_attempt(bundle, &transactions).await {
      Ok(bundle_id) => {
        info!(bundle, bundle_id = %bundle_id, payloads = ?indexes, "Bundle landed");
        return BundleReport {
          bundle,
          payloads: indexes,
          atomic_failure: None,
          outcome: BundleOutcome::AtomicLanded { bundle_id },
        };
      }
      Err(reason) => reason,
    };

    warn!(bundle, reason = %failure, "Atomic submission failed, falling back to individual sends");
    let outcome = self.fallback(bundle, payloads).await;
    BundleReport { bundle, payloads: indexes, atomic_failure: Some(failure), outcome }
  }

  async fn atomic_attempt(&self, bundle: usize, transactions: &[VersionedTransaction]) -> Result<BundleId, String> {
    let bundle_id = self
      .relay
      .send_bundle(transactions)
      .await
      .map_err(|e| format!("relay refused bundle: {e}"))?;

    match self.relay.bundle_result(&bundle_id).await {
      Ok(BundleResult::Landed) => Ok(bundle_id),
      Ok(BundleResult::Rejected(reason)) => Err(format!("bundle {bundle_id} rejected: {reason}")),
      Ok(BundleResult::Dropped) => Err(format!("bundle {bundle_id} dropped")),
      Err(e) => {
        warn!(bundle, bundle_id = %bundle_id, error = %e, "No bundle result");
        Err(format!("no result for bundle {bundle_id}: {e}"))
      }
    }
  }

  async fn fallback(&self, bundle: usize, payloads: &[SignedPayload]) -> BundleOutcome {
    let mut results = Vec::with_capacity(payloads.len());

    for payload in payloads {
      let outcome = self.send_one(bundle, payload).await;
      results.push(PayloadResult { index: payload.index, outcome });
    }

    let succeeded = results.iter().filter(|r| r.outcome.is_success()).count();
    let failed = results.len() - succeeded;
    info!(bundle, succeeded, failed, "Fallback finished");
    BundleOutcome::FallbackCompleted { succeeded, failed, results }
  }

  async fn send_one(&self, bundle: usize, payload: &SignedPayload) -> SendOutcome {
    let signature = match self.rpc.send_transaction(&payload.transaction).await {
      Ok(signature) => signature,
      Err(ChainError::AlreadyProcessed) => {
        info!(bundle, payload = payload.index, "Payload already processed, treating as duplicate");
        return SendOutcome::Duplicate;
      }
      Err(error) => {
        warn!(bundle, payload = payload.index, %error, "Individual send failed, abandoning payload");
        return SendOutcome::Failed(error.to_string());
      }
    };

    match self.rpc.confirm(&signature).await {
      Ok(ConfirmationStatus::Confirmed) => {
        info!(bundle, payload = payload.index, %signature, "Payload confirmed");
        SendOutcome::Confirmed(signature)
      }
      Ok(ConfirmationStatus::Failed(reason)) => {
        warn!(bundle, payload = payload.index, %signature, %reason, "Payload failed on chain");
        SendOutcome::Failed(reason)
      }
      Ok(ConfirmationStatus::Pending) => {
        warn!(bundle, payload = payload.index, %signature, "Payload not confirmed in time");
        SendOutcome::Unconfirmed(signature)
      }
      Err(error) => {
        warn!(bundle, payload = payload.index, %signature, %error, "Confirmation lookup failed");
        SendOutcome::Unconfirmed(signature)
      }
    }
  }
}
