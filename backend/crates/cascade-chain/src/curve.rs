//! Purchase instructions for the launch curve program

use borsh::BorshSerialize;
use cascade_core::{math::max_cost_with_slippage, AllocationRecord, Participant};
use sha2::{Digest, Sha256};
use solana_instruction::{AccountMeta, Instruction};
use solana_pubkey::Pubkey;
use spl_associated_token_account::{
  get_associated_token_address, instruction::create_associated_token_account_idempotent,
};

use crate::builder::{BuildError, InstructionBuilder, InstructionSet};

pub const BONDING_CURVE_SEED: &[u8] = b"bonding-curve";
pub const RENT_SYSVAR: Pubkey = Pubkey::from_str_const("SysvarRent111111111111111111111111111111111");

/// First 8 bytes of sha256("global:<name>")
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
  let digest = Sha256::digest(format!("global:{name}").as_bytes());
  let mut out = [0u8; 8];
  out.copy_from_slice(&digest[..8]);
  out
}

#[derive(Debug, BorshSerialize)]
struct BuyArgs {
  amount: u64,
  max_sol_cost: u64,
}

/// Program-wide accounts every purchase references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveAccounts {
  pub program_id: Pubkey,
  pub global: Pubkey,
  pub fee_recipient: Pubkey,
  pub event_authority: Pubkey,
  pub mint: Pubkey,
}

impl CurveAccounts {
  pub fn bonding_curve(&self) -> Pubkey {
    Pubkey::find_program_address(&[BONDING_CURVE_SEED, self.mint.as_ref()], &self.program_id).0
  }

  pub fn associated_bonding_curve(&self) -> Pubkey {
    get_associated_token_address(&self.bonding_curve(), &self.mint)
  }

  /// Accounts shared by all purchases; worth placing in a lookup table
  pub fn shared(&self) -> Vec<Pubkey> {
    vec![
      self.program_id,
      self.global,
      self.fee_recipient,
      self.event_authority,
      self.mint,
      self.bonding_curve(),
      self.associated_bonding_curve(),
      solana_system_interface::program::ID,
      spl_token::ID,
      spl_associated_token_account::ID,
      RENT_SYSVAR,
    ]
  }
}

/// Token account creation paid by the fee payer, then `buy` signed by the participant
#[derive(Debug, Clone)]
pub struct CurvePurchaseBuilder {
  accounts: CurveAccounts,
  bonding_curve: Pubkey,
  associated_bonding_curve: Pubkey,
  payer: Pubkey,
  slippage_bps: u64,
}

impl CurvePurchaseBuilder {
  pub fn new(accounts: CurveAccounts, payer: Pubkey, slippage_bps: u64) -> Self {
    Self {
      bonding_curve: accounts.bonding_curve(),
      associated_bonding_curve: accounts.associated_bonding_curve(),
      accounts,
      payer,
      slippage_bps,
    }
  }

  fn buy_instruction(&self, user: &Pubkey, amount: u64, max_sol_cost: u64) -> Result<Instruction, BuildError> {
    let mut data = instruction_discriminator("buy").to_vec();
    let args = borsh::to_vec(&BuyArgs { amount, max_sol_cost }).map_err(|e| BuildError::Encode(e.to_string()))?;
    data.extend_from_slice(&args);

    let accounts = vec![
      AccountMeta::new_readonly(self.accounts.global, false),
      AccountMeta::new(self.accounts.fee_recipient, false),
      AccountMeta::new_readonly(self.accounts.mint, false),
      AccountMeta::new(self.bonding_curve, false),
      AccountMeta::new(self.associated_bonding_curve, false),
      AccountMeta::new(get_associated_token_address(user, &self.accounts.mint), false),
      AccountMeta::new(*user, true),
      AccountMeta::new_readonly(solana_system_interface::program::ID, false),
      AccountMeta::new_readonly(spl_token::ID, false),
      AccountMeta::new_readonly(RENT_SYSVAR, false),
      AccountMeta::new_readonly(self.accounts.event_authority, false),
      AccountMeta::new_readonly(self.accounts.program_id, false),
    ];

    Ok(Instruction { program_id: self.accounts.program_id, accounts, data })
  }
}

impl InstructionBuilder for CurvePurchaseBuilder {
  fn build(&self, participant: &Participant, record: &AllocationRecord) -> Result<InstructionSet, BuildError> {
    let max_sol_cost = max_cost_with_slippage(record.contributed, self.slippage_bps)
      .ok_or(BuildError::AmountOverflow { participant: *participant })?;

    let create_ata = create_associated_token_account_idempotent(
      &self.payer,
      &participant.key,
      &self.accounts.mint,
      &spl_token::ID,
    );
    let buy = self.buy_instruction(&participant.key, record.granted, max_sol_cost)?;

    Ok(InstructionSet::new(participant.key, vec![create_ata, buy]))
  }
}
