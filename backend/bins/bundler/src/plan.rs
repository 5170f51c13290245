use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use cascade_core::{Contribution, Participant};
use serde::Deserialize;
use serde_json::Value;
use solana_pubkey::Pubkey;

#[derive(Debug, Deserialize)]
struct PlannedContribution {
  participant: String,
  /// Native units, as a decimal string or a JSON number
  amount: Value,
}

/// Read a contribution plan; ordinals follow the order of the file
pub fn read_contributions(path: &Path) -> Result<Vec<Contribution>> {
  let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
  parse_contributions(&raw).with_context(|| format!("Invalid contribution plan {}", path.display()))
}

fn parse_contributions(raw: &str) -> Result<Vec<Contribution>> {
  let planned: Vec<PlannedContribution> = serde_json::from_str(raw)?;

  planned
    .into_iter()
    .enumerate()
    .map(|(ordinal, entry)| {
      let key = Pubkey::from_str(&entry.participant)
        .with_context(|| format!("Entry {ordinal}: {:?} is not a public key", entry.participant))?;
      let amount = match entry.amount {
        Value::String(text) => text,
        other => other.to_string(),
      };
      Ok(Contribution::parse(Participant::new(key, ordinal), &amount))
    })
    .collect()
}
