use cascade_core::{AllocationRecord, Participant};
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use thiserror::Error;

/// Ordered instructions belonging to one participant
///
/// Order is significant: an account must be created before the instruction that uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSet {
  pub owner: Pubkey,
  pub instructions: Vec<Instruction>,
}

impl InstructionSet {
  pub fn new(owner: Pubkey, instructions: Vec<Instruction>) -> Self {
    Self { owner, instructions }
  }

  /// Signers the instructions demand, in first-seen order
  pub fn required_signers(&self) -> Vec<Pubkey> {
    let mut signers = Vec::new();
    for meta in self.instructions.iter().flat_map(|ix| ix.accounts.iter()) {
      if meta.is_signer && !signers.contains(&meta.pubkey) {
        signers.push(meta.pubkey);
      }
    }
    signers
  }

  /// Every account and program the instructions touch
  pub fn referenced_accounts(&self) -> impl Iterator<Item = &Pubkey> {
    self
      .instructions
      .iter()
      .flat_map(|ix| std::iter::once(&ix.program_id).chain(ix.accounts.iter().map(|m| &m.pubkey)))
  }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
  #[error("Amount overflow building instructions for {participant}")]
  AmountOverflow { participant: Participant },

  #[error("Failed to encode instruction data: {0}")]
  Encode(String),

  #[error("Nothing to build for {participant}: {reason}")]
  Nothing { participant: Participant, reason: String },
}

/// Turns a participant's persisted allocation into instructions
pub trait InstructionBuilder: Send + Sync {
  fn build(&self, participant: &Participant, record: &AllocationRecord) -> Result<InstructionSet, BuildError>;
}
