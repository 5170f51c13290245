use std::{
  fs,
  path::{Path, PathBuf},
};

use solana_keypair::Keypair;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum KeyError {
  #[error("Failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{path} is not a JSON byte array: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("Invalid keypair in {origin}: {reason}")]
  Invalid { origin: String, reason: String },
}

/// Keypair from a base58 secret (64 bytes)
pub fn parse_base58_keypair(encoded: &str) -> Result<Keypair, KeyError> {
  let invalid = |reason: String| KeyError::Invalid { origin: "base58 secret".to_string(), reason };
  let bytes = bs58::decode(encoded.trim()).into_vec().map_err(|e| invalid(e.to_string()))?;
  Keypair::try_from(bytes.as_slice()).map_err(|e| invalid(e.to_string()))
}

/// Read every `*.json` keypair in a directory, in natural file name order
///
/// A trailing number in the file stem sorts numerically, so `keypair2.json` precedes
/// `keypair10.json`.
pub fn load_participant_keys(dir: &Path) -> Result<Vec<Keypair>, KeyError> {
  let io_err = |source| KeyError::Io { path: dir.to_path_buf(), source };

  let mut paths: Vec<PathBuf> = fs::read_dir(dir)
    .map_err(io_err)?
    .collect::<Result<Vec<_>, _>>()
    .map_err(io_err)?
    .into_iter()
    .map(|entry| entry.path())
    .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
    .collect();
  paths.sort_by_cached_key(|path| natural_order(path));

  let keys = paths.iter().map(|path| read_keypair_file(path)).collect::<Result<Vec<_>, _>>()?;
  debug!(dir = %dir.display(), count = keys.len(), "Participant keys loaded");
  Ok(keys)
}

fn natural_order(path: &Path) -> (String, Option<u64>, PathBuf) {
  let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
  let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());
  let number = stem[prefix.len()..].parse().ok();
  (prefix.to_string(), number, path.to_path_buf())
}

fn read_keypair_file(path: &Path) -> Result<Keypair, KeyError> {
  let raw = fs::read_to_string(path).map_err(|source| KeyError::Io { path: path.to_path_buf(), source })?;
  let bytes: Vec<u8> =
    serde_json::from_str(&raw).map_err(|source| KeyError::Json { path: path.to_path_buf(), source })?;

  Keypair::try_from(bytes.as_slice()).map_err(|e| KeyError::Invalid {
    origin: path.display().to_string(),
    reason: e.to_string(),
  })
}
