use std::fmt;

use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;

/// A wallet taking part in the launch, with its fixed place in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
  pub key: Pubkey,
  pub ordinal: usize,
}

impl Participant {
  pub fn new(key: Pubkey, ordinal: usize) -> Self {
    Self { key, ordinal }
  }

  /// Assigns ordinals in iteration order
  pub fn enumerate(keys: impl IntoIterator<Item = Pubkey>) -> Vec<Self> {
    keys
      .into_iter()
      .enumerate()
      .map(|(ordinal, key)| Self { key, ordinal })
      .collect()
  }
}

impl fmt::Display for Participant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{} {}", self.ordinal, self.key)
  }
}
