use cascade_core::{math::funding_amount, AllocationRecord, Participant};
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use solana_system_interface::instruction::transfer;

use crate::builder::{BuildError, InstructionBuilder, InstructionSet};

/// Payer sends each participant enough to cover their purchase plus fees
#[derive(Debug, Clone, Copy)]
pub struct FundingBuilder {
  payer: Pubkey,
}

impl FundingBuilder {
  pub fn new(payer: Pubkey) -> Self {
    Self { payer }
  }
}

impl InstructionBuilder for FundingBuilder {
  fn build(&self, participant: &Participant, record: &AllocationRecord) -> Result<InstructionSet, BuildError> {
    let lamports =
      funding_amount(record.contributed).ok_or(BuildError::AmountOverflow { participant: *participant })?;
    Ok(InstructionSet::new(
      participant.key,
      vec![transfer(&self.payer, &participant.key, lamports)],
    ))
  }
}

/// Sweeps a participant's balance back to the payer
#[derive(Debug, Clone, Copy)]
pub struct ReclaimBuilder {
  payer: Pubkey,
  dust: u64,
}

impl ReclaimBuilder {
  pub fn new(payer: Pubkey, dust: u64) -> Self {
    Self { payer, dust }
  }

  /// Transfer of the whole balance, signed by the participant
  pub fn build(&self, participant: &Participant, balance: u64) -> Result<InstructionSet, BuildError> {
    if balance <= self.dust {
      return Err(BuildError::Nothing {
        participant: *participant,
        reason: format!("balance {balance} is at or below {}", self.dust),
      });
    }
    Ok(InstructionSet::new(
      participant.key,
      vec![transfer(&participant.key, &self.payer, balance)],
    ))
  }
}

/// Relay tip paid by the fee payer
pub fn tip_instruction(payer: &Pubkey, tip_account: &Pubkey, lamports: u64) -> Instruction {
  transfer(payer, tip_account, lamports)
}

#[cfg(test)]
mod tests {
  use cascade_core::constants::RECLAIM_DUST_LAMPORTS;

  use super::*;

  #[test]
  fn funding_transfer_is_signed_by_the_payer_only() {
    let payer = Pubkey::new_unique();
    let participant = Participant::new(Pubkey::new_unique(), 0);
    let record = AllocationRecord { participant, contributed: 1_000_000_000, granted: 1, share_percent: 0.0 };

    let set = FundingBuilder::new(payer).build(&participant, &record).unwrap();

    assert_eq!(set.instructions.len(), 1);
    assert_eq!(set.instructions[0].program_id, solana_system_interface::program::ID);
    assert_eq!(set.required_signers(), vec![payer]);
    // SystemInstruction::Transfer is tag 2 followed by the lamports
    assert_eq!(&set.instructions[0].data[4..12], &1_017_500_000u64.to_le_bytes());
  }

  #[test]
  fn reclaim_skips_dust_and_sweeps_the_rest() {
    let payer = Pubkey::new_unique();
    let participant = Participant::new(Pubkey::new_unique(), 2);
    let builder = ReclaimBuilder::new(payer, RECLAIM_DUST_LAMPORTS);

    assert!(matches!(
      builder.build(&participant, RECLAIM_DUST_LAMPORTS),
      Err(BuildError::Nothing { .. })
    ));

    let set = builder.build(&participant, 5_000_000).unwrap();
    assert_eq!(set.required_signers(), vec![participant.key]);
  }
}
