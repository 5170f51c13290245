use std::fmt;

use serde::{Deserialize, Serialize};
use solana_hash::Hash;
use solana_message::AddressLookupTableAccount;

/// Recent blockhash and the last block height at which it is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityToken {
  pub blockhash: Hash,
  pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
  Confirmed,
  Failed(String),
  /// Still unconfirmed when polling gave up
  Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BundleId(pub String);

impl fmt::Display for BundleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleResult {
  Landed,
  Rejected(String),
  /// No leader picked the bundle up
  Dropped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupTableResolution {
  Found(AddressLookupTableAccount),
  NotFound,
}

impl LookupTableResolution {
  pub fn table(&self) -> Option<&AddressLookupTableAccount> {
    match self {
      Self::Found(table) => Some(table),
      Self::NotFound => None,
    }
  }
}
