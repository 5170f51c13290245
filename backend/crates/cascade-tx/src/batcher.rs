//! Instruction batching
//!
//! Groups per-participant instruction sets into fixed-size batches and compiles each batch
//! into a v0 message against the best available lookup table. A compiled payload over the
//! size ceiling is an error for the caller; it is never truncated or split here.

use std::collections::HashSet;

use cascade_chain::{InstructionBuilder, InstructionSet, LookupTableIndex, ValidityToken};
use cascade_core::{
  constants::{DEFAULT_FLAT_GROUP_SIZE, DEFAULT_GROUP_SIZE, MAX_PAYLOAD_BYTES},
  Participant,
};
use cascade_store::AllocationStore;
use solana_instruction::Instruction;
use solana_message::{v0, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
  #[error("Payload for group {group} is {size} bytes, over the {ceiling} byte ceiling; reduce the group size")]
  Oversize { group: usize, size: usize, ceiling: usize },

  #[error("Failed to compile group {group}: {reason}")]
  Compile { group: usize, reason: String },

  #[error("Failed to measure group {group}: {reason}")]
  Encode { group: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
  /// Participants per payload
  pub group_size: usize,
  /// Instructions per payload for flat batches
  pub flat_group_size: usize,
  /// Serialized transaction ceiling in bytes
  pub size_ceiling: usize,
}

impl Default for BatchConfig {
  fn default() -> Self {
    Self {
      group_size: DEFAULT_GROUP_SIZE,
      flat_group_size: DEFAULT_FLAT_GROUP_SIZE,
      size_ceiling: MAX_PAYLOAD_BYTES,
    }
  }
}

/// A compiled, unsigned transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPayload {
  /// Position in submission order
  pub index: usize,
  pub instruction_sets: Vec<InstructionSet>,
  pub fee_payer: Pubkey,
  pub lookup_table: Option<Pubkey>,
  pub validity: ValidityToken,
  pub message: VersionedMessage,
  /// Serialized size with placeholder signatures
  pub size: usize,
}

impl TransactionPayload {
  /// Keys that must sign, in the order the message expects their signatures
  pub fn required_signers(&self) -> &[Pubkey] {
    let count = usize::from(self.message.header().num_required_signatures);
    let keys = self.message.static_account_keys();
    &keys[..count.min(keys.len())]
  }

  pub fn instruction_count(&self) -> usize {
    self.instruction_sets.iter().map(|set| set.instructions.len()).sum()
  }
}

/// Wire size of a transaction carrying `message`, with one blank signature per signer
pub fn serialized_size(message: &VersionedMessage) -> Result<usize, bincode::Error> {
  let signers = usize::from(message.header().num_required_signatures);
  let placeholder = VersionedTransaction {
    signatures: vec![Signature::default(); signers],
    message: message.clone(),
  };
  Ok(bincode::serialized_size(&placeholder)? as usize)
}

pub struct InstructionBatcher<'a> {
  config: BatchConfig,
  fee_payer: Pubkey,
  lookup: &'a dyn LookupTableIndex,
}

impl<'a> InstructionBatcher<'a> {
  pub fn new(config: BatchConfig, fee_payer: Pubkey, lookup: &'a dyn LookupTableIndex) -> Self {
    Self { config, fee_payer, lookup }
  }

  /// One payload per ordinal group of participants with a usable persisted record
  ///
  /// # Arguments
  /// * `participants` - All participants, in ordinal order
  /// * `store` - Persisted allocations; participants without a complete record are skipped
  /// * `builder` - Produces each participant's instructions; failures skip that participant
  /// * `validity` - Blockhash every payload is compiled against
  pub fn batch(
    &self,
    participants: &[Participant],
    store: &AllocationStore,
    builder: &dyn InstructionBuilder,
    validity: &ValidityToken,
  ) -> Result<Vec<TransactionPayload>, BatchError> {
    let group_size = self.config.group_size.max(1);
    let mut payloads = Vec::new();

    for (group, members) in participants.chunks(group_size).enumerate() {
      let sets: Vec<InstructionSet> = members
        .iter()
        .filter_map(|participant| {
          let Some(record) = store.record_for(participant) else {
            warn!(%participant, group, "No complete allocation record, skipping");
            return None;
          };
          match builder.build(participant, &record) {
            Ok(set) => Some(set),
            Err(error) => {
              warn!(%participant, group, %error, "Instruction construction failed, skipping");
              None
            }
          }
        })
        .collect();

      if sets.is_empty() {
        debug!(group, "Group has no usable participants");
        continue;
      }

      payloads.push(self.compile(payloads.len(), group, sets, validity)?);
    }

    info!(payloads = payloads.len(), participants = participants.len(), "Participants batched");
    Ok(payloads)
  }

  /// Payloads of `group_size` prepared instruction sets each
  pub fn batch_sets(
    &self,
    sets: Vec<InstructionSet>,
    group_size: usize,
    validity: &ValidityToken,
  ) -> Result<Vec<TransactionPayload>, BatchError> {
    let group_size = group_size.max(1);
    let mut payloads = Vec::new();
    let mut sets = sets.into_iter().peekable();

    while sets.peek().is_some() {
      let group: Vec<_> = sets.by_ref().take(group_size).collect();
      payloads.push(self.compile(payloads.len(), payloads.len(), group, validity)?);
    }
    Ok(payloads)
  }

  /// Payloads of `flat_group_size` instructions each, all owned by the fee payer
  pub fn batch_flat(
    &self,
    instructions: Vec<Instruction>,
    validity: &ValidityToken,
  ) -> Result<Vec<TransactionPayload>, BatchError> {
    let chunk = self.config.flat_group_size.max(1);
    let sets = instructions
      .chunks(chunk)
      .map(|ixs| InstructionSet::new(self.fee_payer, ixs.to_vec()))
      .collect();
    self.batch_sets(sets, 1, validity)
  }

  /// Compile a payload's instruction sets again against a newer validity token
  pub fn recompile(
    &self,
    payload: &TransactionPayload,
    validity: &ValidityToken,
  ) -> Result<TransactionPayload, BatchError> {
    self.compile(payload.index, payload.index, payload.instruction_sets.clone(), validity)
  }

  /// Compile one group into a payload
  pub fn compile(
    &self,
    index: usize,
    group: usize,
    sets: Vec<InstructionSet>,
    validity: &ValidityToken,
  ) -> Result<TransactionPayload, BatchError> {
    let instructions: Vec<Instruction> =
      sets.iter().flat_map(|set| set.instructions.iter().cloned()).collect();

    let mut seen = HashSet::new();
    let addresses: Vec<Pubkey> = sets
      .iter()
      .flat_map(|set| set.referenced_accounts())
      .filter(|key| seen.insert(**key))
      .copied()
      .collect();

    let resolution = self.lookup.resolve(&addresses);
    let tables: Vec<_> = resolution.table().cloned().into_iter().collect();

    let message = v0::Message::try_compile(&self.fee_payer, &instructions, &tables, validity.blockhash)
      .map_err(|e| BatchError::Compile { group, reason: e.to_string() })?;

    let lookup_table = message
      .address_table_lookups
      .first()
      .map(|lookup| lookup.account_key);

    let message = VersionedMessage::V0(message);
    let size =
      serialized_size(&message).map_err(|e| BatchError::Encode { group, reason: e.to_string() })?;

    if size > self.config.size_ceiling {
      return Err(BatchError::Oversize { group, size, ceiling: self.config.size_ceiling });
    }

    debug!(
      payload = index,
      group,
      size,
      instructions = instructions.len(),
      lookup_table = ?lookup_table,
      "Payload compiled"
    );

    Ok(TransactionPayload {
      index,
      instruction_sets: sets,
      fee_payer: self.fee_payer,
      lookup_table,
      validity: *validity,
      message,
      size,
    })
  }
}
