//! Bounded retry for execution-layer reads
//!
//! Wraps `backoff` with an attempt budget. Only errors that [`ChainError::is_transient`] accepts
//! are retried; anything else, or the last failure once the budget is spent, goes back to the
//! caller.

use std::{
  future::Future,
  sync::atomic::{AtomicU32, Ordering},
  time::Duration,
};

use backoff::{exponential::ExponentialBackoffBuilder, ExponentialBackoff};
use tracing::warn;

use crate::error::ChainError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  max_attempts: u32,
  initial_delay: Duration,
  multiplier: f64,
}

impl Default for RetryPolicy {
  /// Three attempts, one second apart
  fn default() -> Self {
    Self::fixed(3, Duration::from_secs(1))
  }
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      initial_delay,
      multiplier: multiplier.max(1.0),
    }
  }

  pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
    Self::new(max_attempts, delay, 1.0)
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  /// Delays without jitter and without a wall-clock cap; the attempt count bounds the loop
  fn backoff(&self) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
      .with_initial_interval(self.initial_delay)
      .with_multiplier(self.multiplier)
      .with_randomization_factor(0.0)
      .with_max_interval(Duration::from_secs(60))
      .with_max_elapsed_time(None)
      .build()
  }

  /// Run `operation` until it succeeds, fails permanently, or the attempts run out
  ///
  /// # Arguments
  /// * `label` - Name of the read, used in retry logs
  /// * `operation` - Produces a fresh future per attempt
  pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ChainError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainError>>,
  {
    let attempt = AtomicU32::new(0);
    let max_attempts = self.max_attempts;

    backoff::future::retry_notify(
      self.backoff(),
      || {
        let current = attempt.fetch_add(1, Ordering::Relaxed) + 1;
        let fut = operation();
        async move {
          fut.await.map_err(|e| {
            if e.is_transient() && current < max_attempts {
              backoff::Error::transient(e)
            } else {
              backoff::Error::permanent(e)
            }
          })
        }
      },
      |error: ChainError, delay: Duration| {
        warn!(
          operation = label,
          attempt = attempt.load(Ordering::Relaxed),
          max_attempts,
          delay_ms = delay.as_millis() as u64,
          %error,
          "Transient failure, retrying"
        );
      },
    )
    .await
  }
}
