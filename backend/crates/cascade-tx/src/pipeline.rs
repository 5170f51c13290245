//! End-to-end phases: simulate and persist, fund, launch, reclaim, clear
//!
//! Simulation and persistence always finish before any batching starts; the phases are
//! separate calls and never overlap.

use std::str::FromStr;

use cascade_chain::{
  tip_instruction, BundleRelay, ChainError, ExecutionRpc, FundingBuilder, InstructionBuilder,
  InstructionSet, LookupTableResolution, LookupTables, ReclaimBuilder, ValidityToken,
};
use cascade_core::{
  constants::{DEFAULT_RECLAIM_GROUP_SIZE, RECLAIM_DUST_LAMPORTS},
  simulate, Contribution, CurveError, Participant, ReserveState, SimulationOutcome,
};
use cascade_store::{AllocationRepository, AllocationStore, StoreError};
use solana_instruction::Instruction;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  batcher::{BatchConfig, BatchError, InstructionBatcher, TransactionPayload},
  signer::{KeyRing, TransactionSigner},
  submitter::{BundleSubmitter, SubmissionReport, SubmitterConfig},
};

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Curve(#[from] CurveError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Chain(#[from] ChainError),

  #[error(transparent)]
  Batch(#[from] BatchError),

  #[error("Stored lookup table address {0:?} is not a valid public key")]
  InvalidLookupTable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipConfig {
  pub account: Pubkey,
  pub lamports: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
  pub batch: BatchConfig,
  pub submitter: SubmitterConfig,
  pub reclaim_group_size: usize,
  pub dust_lamports: u64,
  pub tip: Option<TipConfig>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      batch: BatchConfig::default(),
      submitter: SubmitterConfig::default(),
      reclaim_group_size: DEFAULT_RECLAIM_GROUP_SIZE,
      dust_lamports: RECLAIM_DUST_LAMPORTS,
      tip: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimReport {
  /// Participants swept and the lamports moved
  pub swept: Vec<(Participant, u64)>,
  pub skipped: Vec<Participant>,
  pub submission: SubmissionReport,
  pub cleared: usize,
}

pub struct Pipeline<'a> {
  rpc: &'a dyn ExecutionRpc,
  relay: &'a dyn BundleRelay,
  repository: &'a dyn AllocationRepository,
  payer: &'a Keypair,
  keys: &'a KeyRing,
  config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
  pub fn new(
    rpc: &'a dyn ExecutionRpc,
    relay: &'a dyn BundleRelay,
    repository: &'a dyn AllocationRepository,
    payer: &'a Keypair,
    keys: &'a KeyRing,
    config: PipelineConfig,
  ) -> Self {
    Self { rpc, relay, repository, payer, keys, config }
  }

  /// Run the allocation simulation and optionally persist the records
  ///
  /// Persisting replaces all participant entries and keeps the reserved keys.
  pub fn simulate(
    &self,
    reserve: ReserveState,
    contributions: &[Contribution],
    persist: bool,
  ) -> Result<SimulationOutcome, PipelineError> {
    let mut reserve = reserve;
    let outcome = simulate(&mut reserve, contributions)?;

    info!(
      records = outcome.records.len(),
      skipped = outcome.skipped.len(),
      total_granted = outcome.total_granted(),
      total_share_percent = outcome.total_share_percent(),
      "Simulation finished"
    );

    if persist {
      let mut store = self.repository.load()?;
      store.record_allocations(&outcome.records);
      self.repository.save(&store)?;
      info!(participants = store.len(), "Allocations persisted");
    }
    Ok(outcome)
  }

  /// Send each participant their purchase funds from the payer
  pub async fn fund(&self, participants: &[Participant]) -> Result<SubmissionReport, PipelineError> {
    let store = self.repository.load()?;
    let builder = FundingBuilder::new(self.payer.pubkey());

    let mut instructions: Vec<Instruction> = Vec::new();
    for participant in &store.ordered(participants) {
      let Some(record) = store.record_for(participant) else {
        warn!(%participant, "No complete allocation record, not funding");
        continue;
      };
      match builder.build(participant, &record) {
        Ok(set) => instructions.extend(set.instructions),
        Err(error) => warn!(%participant, %error, "Funding instruction failed, skipping"),
      }
    }
    instructions.extend(self.tip());

    let tables = self.lookup_tables(&store).await?;
    let validity = self.rpc.latest_validity_token().await?;
    let batcher = InstructionBatcher::new(self.config.batch, self.payer.pubkey(), &tables);
    let payloads = batcher.batch_flat(instructions, &validity)?;

    self.sign_and_submit(&batcher, payloads, validity).await
  }

  /// Purchase every participant's allocation, grouped per `group_size`
  ///
  /// Participants are purchased in the order they were simulated in, which is the order each
  /// persisted grant was priced at.
  pub async fn launch(
    &self,
    participants: &[Participant],
    builder: &dyn InstructionBuilder,
  ) -> Result<SubmissionReport, PipelineError> {
    let store = self.repository.load()?;
    let participants = store.ordered(participants);
    let tables = self.lookup_tables(&store).await?;
    let validity = self.rpc.latest_validity_token().await?;
    let batcher = InstructionBatcher::new(self.config.batch, self.payer.pubkey(), &tables);

    let mut payloads = batcher.batch(&participants, &store, builder, &validity)?;
    if let Some(tip) = self.tip() {
      let next = payloads.len();
      let tip_set = InstructionSet::new(self.payer.pubkey(), vec![tip]);
      payloads.push(batcher.compile(next, next, vec![tip_set], &validity)?);
    }

    self.sign_and_submit(&batcher, payloads, validity).await
  }

  /// Sweep participant balances back to the payer, then clear the participant records
  pub async fn reclaim(&self, participants: &[Participant]) -> Result<ReclaimReport, PipelineError> {
    let builder = ReclaimBuilder::new(self.payer.pubkey(), self.config.dust_lamports);
    let mut sets = Vec::new();
    let mut swept = Vec::new();
    let mut skipped = Vec::new();

    for participant in participants {
      let balance = match self.rpc.balance(&participant.key).await {
        Ok(balance) => balance,
        Err(error) => {
          warn!(%participant, %error, "Balance unavailable, skipping");
          skipped.push(*participant);
          continue;
        }
      };
      match builder.build(participant, balance) {
        Ok(set) => {
          sets.push(set);
          swept.push((*participant, balance));
        }
        Err(error) => {
          info!(%participant, %error, "Nothing to reclaim");
          skipped.push(*participant);
        }
      }
    }

    if let Some(tip) = self.tip() {
      sets.push(InstructionSet::new(self.payer.pubkey(), vec![tip]));
    }

    let store = self.repository.load()?;
    let submission = if swept.is_empty() {
      info!("No balances to reclaim");
      SubmissionReport::default()
    } else {
      let tables = self.lookup_tables(&store).await?;
      let validity = self.rpc.latest_validity_token().await?;
      let batcher = InstructionBatcher::new(self.config.batch, self.payer.pubkey(), &tables);
      let payloads = batcher.batch_sets(sets, self.config.reclaim_group_size, &validity)?;
      self.sign_and_submit(&batcher, payloads, validity).await?
    };

    let cleared = store.len();
    self.repository.clear_participants()?;

    Ok(ReclaimReport { swept, skipped, submission, cleared })
  }

  /// Remove participant records, keeping the reserved keys
  pub fn clear(&self) -> Result<AllocationStore, PipelineError> {
    Ok(self.repository.clear_participants()?)
  }

  fn tip(&self) -> Option<Instruction> {
    self
      .config
      .tip
      .filter(|tip| tip.lamports > 0)
      .map(|tip| tip_instruction(&self.payer.pubkey(), &tip.account, tip.lamports))
  }

  /// Fetch the persisted lookup table; a missing table means compiling without one
  async fn lookup_tables(&self, store: &AllocationStore) -> Result<LookupTables, PipelineError> {
    let Some(raw) = store.address_lut.as_deref() else {
      warn!("No lookup table recorded, payloads will carry full account keys");
      return Ok(LookupTables::empty());
    };
    let address = Pubkey::from_str(raw).map_err(|_| PipelineError::InvalidLookupTable(raw.to_string()))?;

    let resolution = self.rpc.lookup_table(&address).await?;
    if resolution == LookupTableResolution::NotFound {
      warn!(table = %address, "Lookup table not found, payloads will carry full account keys");
    }
    Ok(LookupTables::from(resolution))
  }

  /// Sign and submit bundle by bundle
  ///
  /// Payloads are compiled up front so an oversize group fails before anything is sent. Every
  /// bundle after the first is compiled again against a fresh validity token. Payloads that
  /// cannot be signed are reported and left out; the rest of their bundle still goes.
  async fn sign_and_submit(
    &self,
    batcher: &InstructionBatcher<'_>,
    payloads: Vec<TransactionPayload>,
    validity: ValidityToken,
  ) -> Result<SubmissionReport, PipelineError> {
    let signer = TransactionSigner::new(self.payer, self.keys);
    let submitter = BundleSubmitter::new(self.relay, self.rpc, self.config.submitter);
    let mut report = SubmissionReport::default();

    for (bundle, chunk) in payloads.chunks(self.config.submitter.max_bundle_len.max(1)).enumerate() {
      let chunk = if bundle == 0 {
        chunk.to_vec()
      } else {
        let fresh = self.rpc.latest_validity_token().await?;
        debug!(bundle, initial = %validity.blockhash, blockhash = %fresh.blockhash, "Refreshed validity token");
        chunk
          .iter()
          .map(|payload| batcher.recompile(payload, &fresh))
          .collect::<Result<Vec<_>, _>>()?
      };

      let (signed, unsigned) = signer.sign_each(&chunk);
      report.unsigned.extend(unsigned);
      if signed.is_empty() {
        warn!(bundle, "No payload in the bundle could be signed");
        continue;
      }
      report.bundles.push(submitter.submit_bundle(bundle, &signed).await);
    }

    report.log_finished();
    Ok(report)
  }
}
