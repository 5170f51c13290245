//! JSON-RPC 2.0 envelope shared by the node and relay clients

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::ChainError;

#[derive(Debug, Serialize)]
struct Request<'a> {
  jsonrpc: &'static str,
  id: u64,
  method: &'a str,
  params: Value,
}

#[derive(Debug, Deserialize)]
struct Response<T> {
  result: Option<T>,
  error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
  code: i64,
  message: String,
  #[serde(default)]
  data: Option<Value>,
}

/// Most node results wrap the payload as `{ context, value }`
#[derive(Debug, Deserialize)]
pub struct WithContext<T> {
  pub value: T,
}

#[derive(Debug)]
pub struct JsonRpcTransport {
  client: reqwest::Client,
  url: String,
  next_id: AtomicU64,
}

impl JsonRpcTransport {
  pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
    Self { client, url: url.into(), next_id: AtomicU64::new(1) }
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    trace!(method, id, url = %self.url, "JSON-RPC request");

    let body = Request { jsonrpc: "2.0", id, method, params };
    let response = self
      .client
      .post(&self.url)
      .json(&body)
      .send()
      .await?
      .error_for_status()?
      .json::<Value>()
      .await?;

    decode_response(method, response)
  }
}

/// Split a raw response into its result or a typed error
pub fn decode_response<T: DeserializeOwned>(method: &str, raw: Value) -> Result<T, ChainError> {
  let response: Response<Value> = serde_json::from_value(raw).map_err(|e| ChainError::Decode {
    what: "JSON-RPC envelope",
    reason: e.to_string(),
  })?;

  if let Some(error) = response.error {
    // simulation failures put the useful text in data.err / data.logs
    let message = match error.data {
      Some(data) if !data.is_null() => format!("{} ({data})", error.message),
      _ => error.message,
    };
    return Err(ChainError::from_rpc(error.code, message));
  }

  let result = response.result.unwrap_or(Value::Null);
  serde_json::from_value(result).map_err(|e| ChainError::Decode {
    what: "JSON-RPC result",
    reason: format!("{method}: {e}"),
  })
}
