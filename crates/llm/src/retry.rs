//! Retry policy for the structured-extraction request. Grounded on this
//! pack's `embedding/src/resilient.rs` (`RetryConfig`, exponential backoff
//! with jitter, a dependency-free PRNG) but split into the three distinct
//! policies the extraction retry taxonomy actually uses: rate-limited
//! responses back off exponentially, other transient failures back off by
//! a fixed delay, and a malformed JSON body is retried immediately.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
  RateLimited,
  Transient,
  MalformedResponse,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub base_delay: Duration,
}

impl RetryConfig {
  pub fn new(max_retries: u32, base_delay: Duration) -> Self {
    Self { max_retries, base_delay }
  }

  /// Backoff to sleep before the next attempt, given why the previous one
  /// failed and which attempt (0-indexed) just ran.
  pub fn backoff_for(&self, reason: RetryReason, attempt: u32) -> Duration {
    match reason {
      RetryReason::RateLimited => {
        let base = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let jittered = base * (1.0 + rand_f64() * 0.25);
        Duration::from_secs_f64(jittered)
      }
      RetryReason::Transient => self.base_delay,
      RetryReason::MalformedResponse => Duration::ZERO,
    }
  }
}

/// A dependency-free jitter source: the sub-second component of the
/// current time, normalized into `[0, 1)`. Only used to spread retries
/// apart, never for anything security-sensitive.
fn rand_f64() -> f64 {
  use std::time::{SystemTime, UNIX_EPOCH};
  let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
  (nanos as f64 / u32::MAX as f64).fract()
}

/// Classify an HTTP status and response body into a retry reason, or
/// `None` if the failure is not worth retrying at all.
pub fn classify_http_failure(status: reqwest::StatusCode, body: &str) -> Option<RetryReason> {
  if status.as_u16() == 429 || body.to_ascii_lowercase().contains("quota") {
    Some(RetryReason::RateLimited)
  } else if status.is_server_error() {
    Some(RetryReason::Transient)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transient_backoff_is_fixed() {
    let config = RetryConfig::new(3, Duration::from_secs(2));
    assert_eq!(config.backoff_for(RetryReason::Transient, 0), Duration::from_secs(2));
    assert_eq!(config.backoff_for(RetryReason::Transient, 5), Duration::from_secs(2));
  }

  #[test]
  fn malformed_response_has_no_backoff() {
    let config = RetryConfig::new(3, Duration::from_secs(2));
    assert_eq!(config.backoff_for(RetryReason::MalformedResponse, 0), Duration::ZERO);
  }

  #[test]
  fn rate_limited_backoff_grows_and_exceeds_base() {
    let config = RetryConfig::new(3, Duration::from_secs(1));
    let first = config.backoff_for(RetryReason::RateLimited, 0);
    let second = config.backoff_for(RetryReason::RateLimited, 1);
    assert!(first >= Duration::from_secs(1));
    assert!(second > first);
  }

  #[test]
  fn classifies_rate_limit_status() {
    assert_eq!(classify_http_failure(reqwest::StatusCode::TOO_MANY_REQUESTS, ""), Some(RetryReason::RateLimited));
  }

  #[test]
  fn classifies_quota_message_even_on_non_429() {
    assert_eq!(
      classify_http_failure(reqwest::StatusCode::FORBIDDEN, "quota exceeded for project"),
      Some(RetryReason::RateLimited)
    );
  }

  #[test]
  fn classifies_server_error_as_transient() {
    assert_eq!(classify_http_failure(reqwest::StatusCode::BAD_GATEWAY, ""), Some(RetryReason::Transient));
  }

  #[test]
  fn non_retryable_status_is_none() {
    assert_eq!(classify_http_failure(reqwest::StatusCode::BAD_REQUEST, "bad prompt"), None);
  }
}
