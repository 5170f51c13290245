//! Process settings
//!
//! Read once at start-up from the environment (and an optional `.env` file), then passed by
//! reference to every component. Nothing here is global.

use std::{collections::HashMap, fmt::Display, path::PathBuf, str::FromStr};

use cascade_core::constants::{
  DEFAULT_FLAT_GROUP_SIZE, DEFAULT_GROUP_SIZE, DEFAULT_RECLAIM_GROUP_SIZE, MAX_BUNDLE_LEN,
  MAX_PAYLOAD_BYTES,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("Missing required setting {0}")]
  Missing(&'static str),

  #[error("Invalid value {value:?} for {key}: {reason}")]
  Invalid { key: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoints {
  pub rpc_url: String,
  pub relay_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSettings {
  pub group_size: usize,
  pub flat_group_size: usize,
  pub reclaim_group_size: usize,
  pub max_payload_bytes: usize,
  pub max_bundle_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrySettings {
  pub attempts: u32,
  pub delay_ms: u64,
  pub multiplier: f64,
  pub balance_attempts: u32,
  pub balance_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollSettings {
  pub confirm_polls: u32,
  pub confirm_poll_ms: u64,
  pub bundle_result_polls: u32,
  pub bundle_result_poll_ms: u64,
  /// Per-request HTTP timeout for both the RPC node and the relay
  pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TipSettings {
  pub lamports: u64,
  pub account: Option<String>,
}

/// Accounts of the launch curve program. Only the launch command needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurveSettings {
  pub program_id: String,
  pub global: String,
  pub fee_recipient: String,
  pub event_authority: String,
  pub slippage_bps: u64,
}

#[derive(Clone, PartialEq, Serialize)]
pub struct Settings {
  pub endpoints: Endpoints,
  #[serde(skip)]
  pub payer_private_key: String,
  pub store_path: PathBuf,
  pub keypairs_dir: PathBuf,
  pub mint: Option<String>,
  pub batch: BatchSettings,
  pub retry: RetrySettings,
  pub poll: PollSettings,
  pub tip: TipSettings,
  pub curve: Option<CurveSettings>,
}

impl std::fmt::Debug for Settings {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Settings")
      .field("endpoints", &self.endpoints)
      .field("payer_private_key", &"<redacted>")
      .field("store_path", &self.store_path)
      .field("keypairs_dir", &self.keypairs_dir)
      .field("mint", &self.mint)
      .field("batch", &self.batch)
      .field("retry", &self.retry)
      .field("poll", &self.poll)
      .field("tip", &self.tip)
      .field("curve", &self.curve)
      .finish()
  }
}

impl Settings {
  /// Load `.env` when present, then read the process environment
  pub fn from_env() -> Result<Self, ConfigError> {
    // A missing .env file is fine; the variables may come from the shell.
    let _ = dotenvy::dotenv();
    let vars: HashMap<String, String> = std::env::vars().collect();
    Self::from_lookup(|key| vars.get(key).cloned())
  }

  /// Build settings from any key lookup
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let source = Source { lookup: &lookup };

    let batch = BatchSettings {
      group_size: source.positive("GROUP_SIZE", DEFAULT_GROUP_SIZE)?,
      flat_group_size: source.positive("FLAT_GROUP_SIZE", DEFAULT_FLAT_GROUP_SIZE)?,
      reclaim_group_size: source.positive("RECLAIM_GROUP_SIZE", DEFAULT_RECLAIM_GROUP_SIZE)?,
      max_payload_bytes: source.positive("MAX_PAYLOAD_BYTES", MAX_PAYLOAD_BYTES)?,
      max_bundle_len: source.positive("MAX_BUNDLE_LEN", MAX_BUNDLE_LEN)?,
    };

    let retry = RetrySettings {
      attempts: source.positive("RETRY_ATTEMPTS", 3)?,
      delay_ms: source.parsed("RETRY_DELAY_MS", 1_000)?,
      multiplier: source.parsed("RETRY_MULTIPLIER", 1.0)?,
      balance_attempts: source.positive("BALANCE_RETRY_ATTEMPTS", 10)?,
      balance_delay_ms: source.parsed("BALANCE_RETRY_DELAY_MS", 500)?,
    };
    if !(retry.multiplier >= 1.0) {
      return Err(ConfigError::Invalid {
        key: "RETRY_MULTIPLIER",
        value: retry.multiplier.to_string(),
        reason: "must be at least 1.0".to_string(),
      });
    }

    let poll = PollSettings {
      confirm_polls: source.positive("CONFIRM_POLLS", 30)?,
      confirm_poll_ms: source.parsed("CONFIRM_POLL_MS", 1_000)?,
      bundle_result_polls: source.positive("BUNDLE_RESULT_POLLS", 30)?,
      bundle_result_poll_ms: source.parsed("BUNDLE_RESULT_POLL_MS", 1_000)?,
      request_timeout_ms: source.positive("REQUEST_TIMEOUT_MS", 30_000)?,
    };

    let tip = TipSettings {
      lamports: source.parsed("TIP_LAMPORTS", 0)?,
      account: source.optional("TIP_ACCOUNT"),
    };
    if tip.lamports > 0 && tip.account.is_none() {
      return Err(ConfigError::Missing("TIP_ACCOUNT"));
    }

    let curve = match source.optional("CURVE_PROGRAM_ID") {
      Some(program_id) => Some(CurveSettings {
        program_id,
        global: source.required("CURVE_GLOBAL")?,
        fee_recipient: source.required("CURVE_FEE_RECIPIENT")?,
        event_authority: source.required("CURVE_EVENT_AUTHORITY")?,
        slippage_bps: source.parsed("PURCHASE_SLIPPAGE_BPS", 500)?,
      }),
      None => None,
    };

    Ok(Self {
      endpoints: Endpoints {
        rpc_url: source.required("SOLANA_RPC_URL")?,
        relay_url: source.required("RELAY_URL")?,
      },
      payer_private_key: source.required("PAYER_PRIVATE_KEY")?,
      store_path: source.optional("STORE_PATH").unwrap_or_else(|| "keyInfo.json".to_string()).into(),
      keypairs_dir: source.optional("KEYPAIRS_DIR").unwrap_or_else(|| "keypairs".to_string()).into(),
      mint: source.optional("MINT"),
      batch,
      retry,
      poll,
      tip,
      curve,
    })
  }
}

struct Source<'a> {
  lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Source<'_> {
  fn optional(&self, key: &str) -> Option<String> {
    (self.lookup)(key)
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
  }

  fn required(&self, key: &'static str) -> Result<String, ConfigError> {
    self.optional(key).ok_or(ConfigError::Missing(key))
  }

  fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
  where
    T: FromStr,
    T::Err: Display,
  {
    match self.optional(key) {
      Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
      }),
      None => Ok(default),
    }
  }

  fn positive<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
  where
    T: FromStr + Default + PartialEq + Display,
    T::Err: Display,
  {
    let value = self.parsed(key, default)?;
    if value == T::default() {
      return Err(ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: "must be greater than zero".to_string(),
      });
    }
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
      pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| map.get(key).cloned()
  }

  const REQUIRED: [(&str, &str); 3] = [
    ("SOLANA_RPC_URL", "http://localhost:8899"),
    ("RELAY_URL", "http://localhost:9000/api/v1/bundles"),
    ("PAYER_PRIVATE_KEY", "secret"),
  ];

  #[test]
  fn defaults_follow_packaging_limits() {
    let settings = Settings::from_lookup(lookup(&REQUIRED)).unwrap();

    assert_eq!(settings.batch, BatchSettings {
      group_size: 6,
      flat_group_size: 20,
      reclaim_group_size: 7,
      max_payload_bytes: 1232,
      max_bundle_len: 5,
    });
    assert_eq!(settings.retry.attempts, 3);
    assert_eq!(settings.retry.balance_attempts, 10);
    assert_eq!(settings.store_path, PathBuf::from("keyInfo.json"));
    assert_eq!(settings.curve, None);
    assert_eq!(settings.tip, TipSettings { lamports: 0, account: None });
  }

  #[test]
  fn missing_endpoint_is_reported_by_name() {
    let err = Settings::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
    assert_eq!(err, ConfigError::Missing("SOLANA_RPC_URL"));
  }

  #[test]
  fn zero_group_size_is_invalid() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("GROUP_SIZE", "0"));
    let err = Settings::from_lookup(lookup(&pairs)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "GROUP_SIZE", .. }));
  }

  #[test]
  fn non_numeric_value_is_invalid() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("RETRY_DELAY_MS", "soon"));
    let err = Settings::from_lookup(lookup(&pairs)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "RETRY_DELAY_MS", .. }));
  }

  #[test]
  fn request_timeout_is_configurable() {
    assert_eq!(Settings::from_lookup(lookup(&REQUIRED)).unwrap().poll.request_timeout_ms, 30_000);

    let mut pairs = REQUIRED.to_vec();
    pairs.push(("REQUEST_TIMEOUT_MS", "5000"));
    assert_eq!(Settings::from_lookup(lookup(&pairs)).unwrap().poll.request_timeout_ms, 5_000);

    let zero = REQUIRED.iter().copied().chain([("REQUEST_TIMEOUT_MS", "0")]).collect::<Vec<_>>();
    let err = Settings::from_lookup(lookup(&zero)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "REQUEST_TIMEOUT_MS", .. }));
  }

  #[test]
  fn tip_requires_an_account() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("TIP_LAMPORTS", "1000"));
    assert_eq!(
      Settings::from_lookup(lookup(&pairs)).unwrap_err(),
      ConfigError::Missing("TIP_ACCOUNT")
    );
  }

  #[test]
  fn curve_section_needs_all_accounts() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("CURVE_PROGRAM_ID", "prog"));
    pairs.push(("CURVE_GLOBAL", "global"));
    assert_eq!(
      Settings::from_lookup(lookup(&pairs)).unwrap_err(),
      ConfigError::Missing("CURVE_FEE_RECIPIENT")
    );
  }

  #[test]
  fn secret_never_reaches_serialized_or_debug_output() {
    let settings = Settings::from_lookup(lookup(&REQUIRED)).unwrap();
    let json = serde_json::to_string(&settings).unwrap();
    assert!(!json.contains("secret"));
    assert!(!format!("{settings:?}").contains("secret"));
  }
}
