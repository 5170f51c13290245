//! Address lookup tables
//!
//! Tables are created elsewhere; this module decodes fetched table accounts and picks the
//! table that covers the most accounts of a payload.

use std::collections::HashSet;

use solana_message::AddressLookupTableAccount;
use solana_pubkey::Pubkey;
use tracing::debug;

use crate::{error::ChainError, types::LookupTableResolution};

/// Fixed metadata header of a lookup table account
pub const LOOKUP_TABLE_META_SIZE: usize = 56;
const LOOKUP_TABLE_DISCRIMINATOR: u32 = 1;

pub trait LookupTableIndex: Send + Sync {
  /// Table to compile a payload against, given every account the payload references
  fn resolve(&self, addresses: &[Pubkey]) -> LookupTableResolution;
}

/// Decode the raw account data of an address lookup table
pub fn decode_lookup_table(key: Pubkey, data: &[u8]) -> Result<AddressLookupTableAccount, ChainError> {
  let decode_err = |reason: String| ChainError::Decode { what: "lookup table", reason };

  if data.len() < LOOKUP_TABLE_META_SIZE {
    return Err(decode_err(format!("{} bytes is shorter than the header", data.len())));
  }

  let mut tag = [0u8; 4];
  tag.copy_from_slice(&data[..4]);
  if u32::from_le_bytes(tag) != LOOKUP_TABLE_DISCRIMINATOR {
    return Err(decode_err("account is not an initialized lookup table".to_string()));
  }

  let body = &data[LOOKUP_TABLE_META_SIZE..];
  if body.len() % 32 != 0 {
    return Err(decode_err(format!("{} address bytes is not a multiple of 32", body.len())));
  }

  let addresses = body
    .chunks_exact(32)
    .map(|chunk| {
      let mut bytes = [0u8; 32];
      bytes.copy_from_slice(chunk);
      Pubkey::new_from_array(bytes)
    })
    .collect();

  Ok(AddressLookupTableAccount { key, addresses })
}

/// Known tables; usually just the one persisted for the launch
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
  tables: Vec<AddressLookupTableAccount>,
}

impl LookupTables {
  pub fn new(tables: Vec<AddressLookupTableAccount>) -> Self {
    Self { tables }
  }

  pub fn empty() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.tables.is_empty()
  }
}

impl From<LookupTableResolution> for LookupTables {
  fn from(resolution: LookupTableResolution) -> Self {
    match resolution {
      LookupTableResolution::Found(table) => Self::new(vec![table]),
      LookupTableResolution::NotFound => Self::empty(),
    }
  }
}

impl LookupTableIndex for LookupTables {
  fn resolve(&self, addresses: &[Pubkey]) -> LookupTableResolution {
    let wanted: HashSet<&Pubkey> = addresses.iter().collect();

    let best = self
      .tables
      .iter()
      .map(|table| {
        let hits = table.addresses.iter().filter(|a| wanted.contains(a)).count();
        (hits, table)
      })
      .filter(|(hits, _)| *hits > 0)
      // first table wins ties
      .fold(None, |best: Option<(usize, &AddressLookupTableAccount)>, candidate| match best {
        Some(current) if current.0 >= candidate.0 => Some(current),
        _ => Some(candidate),
      });

    match best {
      Some((hits, table)) => {
        debug!(table = %table.key, hits, "Lookup table resolved");
        LookupTableResolution::Found(table.clone())
      }
      None => LookupTableResolution::NotFound,
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn raw_table(addresses: &[Pubkey]) -> Vec<u8> {
    let mut data = vec![0u8; LOOKUP_TABLE_META_SIZE];
    data[..4].copy_from_slice(&1u32.to_le_bytes());
    for address in addresses {
      data.extend_from_slice(address.as_ref());
    }
    data
  }

  #[test]
  fn decodes_addresses_after_the_header() {
    let addresses: Vec<_> = (0..3).map(|_| Pubkey::new_unique()).collect();
    let key = Pubkey::new_unique();

    let table = decode_lookup_table(key, &raw_table(&addresses)).unwrap();

    assert_eq!(table.key, key);
    assert_eq!(table.addresses, addresses);
  }

  #[test]
  fn rejects_truncated_and_misaligned_data() {
    let key = Pubkey::new_unique();
    assert!(decode_lookup_table(key, &[1, 0, 0, 0]).is_err());

    let mut data = raw_table(&[Pubkey::new_unique()]);
    data.pop();
    assert!(decode_lookup_table(key, &data).is_err());
  }

  #[test]
  fn rejects_uninitialized_accounts() {
    let mut data = raw_table(&[]);
    data[0] = 0;
    assert!(decode_lookup_table(Pubkey::new_unique(), &data).is_err());
  }

  #[test]
  fn picks_the_table_with_most_hits() {
    let shared: Vec<_> = (0..4).map(|_| Pubkey::new_unique()).collect();
    let small = AddressLookupTableAccount { key: Pubkey::new_unique(), addresses: shared[..1].to_vec() };
    let large = AddressLookupTableAccount { key: Pubkey::new_unique(), addresses: shared.clone() };
    let index = LookupTables::new(vec![small, large.clone()]);

    assert_eq!(index.resolve(&shared), LookupTableResolution::Found(large));
  }

  #[test]
  fn unrelated_tables_resolve_to_nothing() {
    let table = AddressLookupTableAccount {
      key: Pubkey::new_unique(),
      addresses: vec![Pubkey::new_unique()],
    };
    let index = LookupTables::new(vec![table]);

    assert_eq!(index.resolve(&[Pubkey::new_unique()]), LookupTableResolution::NotFound);
    assert_eq!(LookupTables::empty().resolve(&[]), LookupTableResolution::NotFound);
  }
}
