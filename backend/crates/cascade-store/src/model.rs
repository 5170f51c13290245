//! On-disk shape of the allocation store
//!
//! One JSON object keyed by participant public key, plus three reserved top-level keys that
//! belong to the launch rather than to any participant.

use std::collections::BTreeMap;

use cascade_core::{
  math::share_percent,
  units::{format_native_amount, parse_native_amount},
  AllocationRecord, Participant,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Persisted allocation for one participant
///
/// Fields are optional so that a partially written entry still loads; such an entry is
/// reported as incomplete by [`AllocationStore::record_for`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredAllocation {
  /// Native units as a decimal string ("1.5")
  #[serde(
    rename = "solAmount",
    default,
    deserialize_with = "text_or_number",
    skip_serializing_if = "Option::is_none"
  )]
  pub sol_amount: Option<String>,

  /// Token base units
  #[serde(
    rename = "tokenAmount",
    default,
    deserialize_with = "text_or_number",
    skip_serializing_if = "Option::is_none"
  )]
  pub token_amount: Option<String>,

  #[serde(rename = "percentSupply", default, skip_serializing_if = "Option::is_none")]
  pub percent_supply: Option<f64>,

  /// Position in the simulation; purchases must replay in this order
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ordinal: Option<usize>,
}

impl From<&AllocationRecord> for StoredAllocation {
  fn from(record: &AllocationRecord) -> Self {
    Self {
      sol_amount: Some(format_native_amount(record.contributed)),
      token_amount: Some(record.granted.to_string()),
      percent_supply: Some(record.share_percent),
      ordinal: Some(record.participant.ordinal),
    }
  }
}

// Older stores wrote solAmount as a JSON number
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Text(String),
    Number(serde_json::Number),
  }

  Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
    Raw::Text(text) => text,
    Raw::Number(number) => number.to_string(),
  }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationStore {
  #[serde(rename = "addressLUT", default, skip_serializing_if = "Option::is_none")]
  pub address_lut: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mint: Option<String>,

  /// Base58 secret of the mint keypair
  #[serde(rename = "mintPk", default, skip_serializing_if = "Option::is_none")]
  pub mint_pk: Option<String>,

  #[serde(flatten)]
  pub participants: BTreeMap<String, StoredAllocation>,
}

impl AllocationStore {
  /// Drop every participant entry, keeping the reserved keys
  pub fn clear_participants(&mut self) -> usize {
    let removed = self.participants.len();
    self.participants.clear();
    removed
  }

  /// Replace participant entries with a fresh simulation's records
  pub fn record_allocations(&mut self, records: &[AllocationRecord]) {
    self.participants.clear();
    for record in records {
      self
        .participants
        .insert(record.participant.key.to_string(), StoredAllocation::from(record));
    }
  }

  /// Persisted record for a participant, or None when absent or incomplete
  ///
  /// Incomplete means a missing field, an amount that does not parse, or a zero amount.
  pub fn record_for(&self, participant: &Participant) -> Option<AllocationRecord> {
    let stored = self.participants.get(&participant.key.to_string())?;

    let contributed = stored.sol_amount.as_deref().and_then(parse_native_amount);
    let granted = stored
      .token_amount
      .as_deref()
      .and_then(|raw| raw.trim().parse::<u64>().ok());

    match (contributed, granted) {
      (Some(contributed), Some(granted)) if contributed > 0 && granted > 0 => Some(AllocationRecord {
        participant: *participant,
        contributed,
        granted,
        share_percent: stored.percent_supply.unwrap_or_else(|| share_percent(granted)),
      }),
      _ => {
        debug!(%participant, ?stored, "Stored allocation is incomplete");
        None
      }
    }
  }

  /// Participants in simulated order, each carrying its stored ordinal
  ///
  /// Participants without a stored ordinal keep their relative order and come last.
  pub fn ordered(&self, participants: &[Participant]) -> Vec<Participant> {
    let mut ordered: Vec<(Option<usize>, Participant)> = participants
      .iter()
      .map(|p| (self.participants.get(&p.key.to_string()).and_then(|s| s.ordinal), *p))
      .collect();
    ordered.sort_by_key(|(stored, p)| (stored.is_none(), stored.unwrap_or(p.ordinal)));

    ordered
      .into_iter()
      .map(|(stored, p)| Participant::new(p.key, stored.unwrap_or(p.ordinal)))
      .collect()
  }

  pub fn len(&self) -> usize {
    self.participants.len()
  }

  pub fn is_empty(&self) -> bool {
    self.participants.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use rstest::rstest;
  use solana_pubkey::Pubkey;

  use super::*;

  fn entry(sol: Option<&str>, token: Option<&str>) -> StoredAllocation {
    StoredAllocation {
      sol_amount: sol.map(str::to_string),
      token_amount: token.map(str::to_string),
      percent_supply: None,
      ordinal: None,
    }
  }

  #[rstest]
  #[case(entry(Some("1.5"), Some("42")), Some((1_500_000_000, 42)))]
  #[case(entry(None, Some("42")), None)]
  #[case(entry(Some("1"), None), None)]
  #[case(entry(Some("0"), Some("42")), None)]
  #[case(entry(Some("1"), Some("0")), None)]
  #[case(entry(Some("one"), Some("42")), None)]
  #[case(entry(Some("1"), Some("-4")), None)]
  fn incomplete_entries_have_no_record(
    #[case] stored: StoredAllocation,
    #[case] expected: Option<(u64, u64)>,
  ) {
    let participant = Participant::new(Pubkey::new_unique(), 0);
    let mut store = AllocationStore::default();
    store.participants.insert(participant.key.to_string(), stored);

    let found = store.record_for(&participant).map(|r| (r.contributed, r.granted));
    assert_eq!(found, expected);
  }

  #[test]
  fn numeric_sol_amount_is_accepted() {
    let store: AllocationStore = serde_json::from_str(
      r#"{ "11111111111111111111111111111111": { "solAmount": 2.5, "tokenAmount": "7", "percentSupply": 0.1 } }"#,
    )
    .unwrap();

    let participant = Participant::new(Pubkey::default(), 3);
    let record = store.record_for(&participant).unwrap();
    assert_eq!(record.contributed, 2_500_000_000);
    assert_eq!(record.granted, 7);
    assert_eq!(record.share_percent, 0.1);
  }

  #[test]
  fn reserved_keys_are_not_participants() {
    let store: AllocationStore = serde_json::from_str(
      r#"{ "addressLUT": "lut", "mint": "mint", "mintPk": "secret" }"#,
    )
    .unwrap();

    assert_eq!(store.address_lut.as_deref(), Some("lut"));
    assert_eq!(store.mint.as_deref(), Some("mint"));
    assert_eq!(store.mint_pk.as_deref(), Some("secret"));
    assert!(store.is_empty());
  }

  #[test]
  fn recording_replaces_previous_participants() {
    let mut store = AllocationStore {
      address_lut: Some("lut".into()),
      ..Default::default()
    };
    store.participants.insert("stale".into(), entry(Some("1"), Some("1")));

    let participant = Participant::new(Pubkey::new_unique(), 0);
    store.record_allocations(&[AllocationRecord {
      participant,
      contributed: 10_000_000_000,
      granted: 268_249_999_999_999,
      share_percent: 26.825,
    }]);

    assert_eq!(store.len(), 1);
    assert_eq!(store.address_lut.as_deref(), Some("lut"));
    let stored = &store.participants[&participant.key.to_string()];
    assert_eq!(stored.sol_amount.as_deref(), Some("10"));
    assert_eq!(stored.token_amount.as_deref(), Some("268249999999999"));
  }

  #[test]
  fn participants_replay_in_simulated_order() {
    let keys: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
    // simulated as keys[2], keys[0], keys[3]; keys[1] never simulated
    let simulated = [(keys[2], 0), (keys[0], 1), (keys[3], 2)];
    let records: Vec<AllocationRecord> = simulated
      .iter()
      .map(|(key, ordinal)| AllocationRecord {
        participant: Participant::new(*key, *ordinal),
        contributed: 1_000_000_000,
        granted: 1,
        share_percent: 0.0,
      })
      .collect();
    let mut store = AllocationStore::default();
    store.record_allocations(&records);

    let loaded = Participant::enumerate(keys.iter().copied());
    let ordered = store.ordered(&loaded);

    assert_eq!(
      ordered,
      vec![
        Participant::new(keys[2], 0),
        Participant::new(keys[0], 1),
        Participant::new(keys[3], 2),
        Participant::new(keys[1], 1),
      ]
    );
  }

  #[test]
  fn ordinal_survives_the_json_round_trip() {
    let participant = Participant::new(Pubkey::new_unique(), 7);
    let mut store = AllocationStore::default();
    store.record_allocations(&[AllocationRecord {
      participant,
      contributed: 1_000_000_000,
      granted: 5,
      share_percent: 0.0,
    }]);

    let raw = serde_json::to_string(&store).unwrap();
    let back: AllocationStore = serde_json::from_str(&raw).unwrap();

    assert_eq!(back.participants[&participant.key.to_string()].ordinal, Some(7));
  }
}
