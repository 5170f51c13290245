use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Failed to access allocation store at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Allocation store at {path} is not valid JSON: {source}")]
  Malformed {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("Failed to encode allocation store: {0}")]
  Encode(#[from] serde_json::Error),
}
