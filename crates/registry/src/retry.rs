//! Small backoff helper, transplanted from this pack's `embedding` crate's
//! `resilient.rs` (`backoff_for_attempt`/jitter) rather than the registry
//! client reinventing its own. Kept local (not a shared crate) since the
//! `llm` crate needs a rate-limit-aware variant of the same idea and the two
//! have slightly different retry-classification rules.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_backoff: Duration::from_millis(500),
      max_backoff: Duration::from_secs(5),
      backoff_multiplier: 2.0,
    }
  }
}

impl RetryConfig {
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let exp = self.backoff_multiplier.powi(attempt as i32);
    let millis = (self.initial_backoff.as_millis() as f64 * exp).min(self.max_backoff.as_millis() as f64);
    Duration::from_millis(millis as u64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_grows_and_caps() {
    let config = RetryConfig::default();
    assert_eq!(config.backoff_for_attempt(0), Duration::from_millis(500));
    assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(1000));
    assert_eq!(config.backoff_for_attempt(10), config.max_backoff);
  }
}
