use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
  /// The node already has this transaction
  #[error("Transaction already processed")]
  AlreadyProcessed,

  #[error("Rate limited by {endpoint}")]
  RateLimited { endpoint: String },

  #[error("HTTP {status} from {endpoint}")]
  Http { endpoint: String, status: u16 },

  #[error("Transport error: {0}")]
  Transport(String),

  #[error("RPC error {code}: {message}")]
  Rpc { code: i64, message: String },

  #[error("Failed to decode {what}: {reason}")]
  Decode { what: &'static str, reason: String },

  #[error("Failed to encode transaction: {0}")]
  Encode(String),

  #[error("Bundle {bundle_id} has no result after {polls} polls")]
  BundleTimeout { bundle_id: String, polls: u32 },
}

impl ChainError {
  /// Rate limits, server-side failures and dropped connections are worth another attempt
  pub fn is_transient(&self) -> bool {
    match self {
      Self::RateLimited { .. } | Self::Transport(_) => true,
      Self::Http { status, .. } => *status >= 500,
      // -32429 rate limit, -32005 node behind
      Self::Rpc { code, .. } => matches!(code, -32429 | -32005),
      _ => false,
    }
  }

  pub(crate) fn from_rpc(code: i64, message: String) -> Self {
    if is_already_processed(&message) {
      Self::AlreadyProcessed
    } else {
      Self::Rpc { code, message }
    }
  }
}

fn is_already_processed(message: &str) -> bool {
  message.contains("AlreadyProcessed") || message.contains("already been processed")
}

impl From<reqwest::Error> for ChainError {
  fn from(e: reqwest::Error) -> Self {
    let endpoint = e.url().and_then(|u| u.host_str()).unwrap_or_default().to_string();
    match e.status() {
      Some(status) if status.as_u16() == 429 => Self::RateLimited { endpoint },
      Some(status) => Self::Http { endpoint, status: status.as_u16() },
      None if e.is_decode() => Self::Decode { what: "response body", reason: e.to_string() },
      None => Self::Transport(e.to_string()),
    }
  }
}
