//! Structured resume-field extraction over HTTP. Grounded on this pack's
//! `embedding/src/openrouter.rs` for the reqwest client shape and
//! `embedding/src/resilient.rs` for the retry wrapper, with the retry
//! taxonomy and request/response contract itself taken from the original
//! service's `ResumeDataExtractor._extract_with_retry`
//! (`google-genai`'s `generate_content` with `temperature=0` and a JSON
//! MIME type).
//!
//! The client never raises: a request that exhausts its retries, or a
//! model response that isn't valid JSON after every attempt, resolves to
//! an all-null record. A record with every field null is a complete,
//! valid result as far as the rest of the pipeline is concerned.

use crate::prompts::field_keys_from_prompt;
use crate::retry::{RetryConfig, RetryReason, classify_http_failure};
use pipeline_core::config::LlmConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Bounds total in-flight requests to this engine's process-wide `L`,
/// regardless of how many pipelines are extracting concurrently.
pub struct LlmClient {
  http: reqwest::Client,
  api_key: String,
  model: String,
  retry: RetryConfig,
  semaphore: Arc<Semaphore>,
}

impl LlmClient {
  pub fn new(config: &LlmConfig, concurrency: usize) -> Self {
    Self {
      http: reqwest::Client::new(),
      api_key: config.api_key.clone(),
      model: config.model.clone(),
      retry: RetryConfig::new(config.max_retries, config.retry_delay),
      semaphore: Arc::new(Semaphore::new(concurrency)),
    }
  }

  /// Extract one document's fields. `field_keys` is the shape to fall back
  /// to on an empty input or an exhausted retry; it should come from
  /// [`field_keys_from_prompt`] applied once per task, not re-derived per
  /// call.
  pub async fn extract(&self, prompt: &str, text: &str, field_keys: &[String]) -> BTreeMap<String, Value> {
    if text.trim().is_empty() {
      debug!("empty input text, short-circuiting without a request");
      return empty_record(field_keys);
    }

    let Ok(_permit) = self.semaphore.acquire().await else {
      return empty_record(field_keys);
    };

    let full_prompt = format!("{prompt}\n\nResume Text:\n{text}");
    self.extract_with_retry(&full_prompt, field_keys).await
  }

  async fn extract_with_retry(&self, prompt: &str, field_keys: &[String]) -> BTreeMap<String, Value> {
    for attempt in 0..self.retry.max_retries {
      match self.request_once(prompt).await {
        Ok(RequestOutcome::Parsed(fields)) => return fields,
        Ok(RequestOutcome::EmptyResponse) => {
          warn!("empty response body from the extraction model");
          return empty_record(field_keys);
        }
        Ok(RequestOutcome::NonObject) => {
          warn!("extraction model returned a non-object JSON value");
          return empty_record(field_keys);
        }
        Err(Failure::Malformed) => {
          warn!(attempt, "invalid JSON in extraction response, retrying immediately");
          // No sleep: matches the taxonomy's "parse failure -> immediate retry".
        }
        Err(Failure::Http { reason, status, ref body }) => {
          let backoff = self.retry.backoff_for(reason, attempt);
          warn!(attempt, %status, body, ?reason, ?backoff, "retryable extraction failure");
          if !backoff.is_zero() {
            tokio::time::sleep(backoff).await;
          }
        }
        Err(Failure::NonRetryable { status, ref body }) => {
          warn!(%status, body, "non-retryable extraction failure, giving up");
          return empty_record(field_keys);
        }
        Err(Failure::Transport(ref error)) => {
          let backoff = self.retry.backoff_for(RetryReason::Transient, attempt);
          warn!(attempt, %error, ?backoff, "transport error calling extraction model");
          tokio::time::sleep(backoff).await;
        }
      }
    }

    warn!(max_retries = self.retry.max_retries, "all extraction attempts failed, returning an all-null record");
    empty_record(field_keys)
  }

  async fn request_once(&self, prompt: &str) -> Result<RequestOutcome, Failure> {
    let url = format!("{API_BASE}/{}:generateContent?key={}", self.model, self.api_key);
    let body = GenerateContentRequest {
      contents: vec![Content { parts: vec![Part { text: prompt.to_string() }] }],
      generation_config: GenerationConfig { temperature: 0.0, response_mime_type: "application/json" },
    };

    let response = self.http.post(&url).json(&body).send().await.map_err(|e| Failure::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(match classify_http_failure(status, &body) {
        Some(reason) => Failure::Http { reason, status: status.as_u16(), body },
        None => Failure::NonRetryable { status: status.as_u16(), body },
      });
    }

    let parsed: GenerateContentResponse = response.json().await.map_err(|_| Failure::Malformed)?;
    let Some(text) = parsed.first_text() else {
      return Ok(RequestOutcome::EmptyResponse);
    };
    if text.trim().is_empty() {
      return Ok(RequestOutcome::EmptyResponse);
    }

    match serde_json::from_str::<Value>(&text) {
      Ok(Value::Object(map)) => Ok(RequestOutcome::Parsed(map.into_iter().collect())),
      Ok(_) => Ok(RequestOutcome::NonObject),
      Err(_) => Err(Failure::Malformed),
    }
  }

  /// Schedule every item through the semaphore concurrently.
  /// `progress_cb` fires once per completion, in completion order; the
  /// returned vector preserves input order.
  pub async fn extract_batch<F, Fut>(&self, prompt: &str, texts: &[(String, String)], field_keys: &[String], mut progress_cb: Option<F>) -> Vec<(String, BTreeMap<String, Value>)>
  where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = ()>,
  {
    let total = texts.len();
    if total == 0 {
      return Vec::new();
    }

    let mut futures = texts
      .iter()
      .enumerate()
      .map(|(index, (id, text))| {
        let id = id.clone();
        async move {
          let fields = self.extract(prompt, text, field_keys).await;
          (index, id, fields)
        }
      })
      .collect::<futures::stream::FuturesUnordered<_>>();

    let mut ordered: Vec<Option<(String, BTreeMap<String, Value>)>> = (0..total).map(|_| None).collect();
    let mut completed = 0usize;

    use futures::StreamExt;
    while let Some((index, id, fields)) = futures.next().await {
      ordered[index] = Some((id, fields));
      completed += 1;
      if let Some(cb) = progress_cb.as_mut() {
        cb(completed, total).await;
      }
    }

    ordered.into_iter().map(|item| item.expect("every index completed exactly once")).collect()
  }
}

fn empty_record(field_keys: &[String]) -> BTreeMap<String, Value> {
  field_keys.iter().map(|key| (key.clone(), Value::Null)).collect()
}

/// Parse the task's extraction prompt once and return the field keys to
/// thread through every call in that task's batch.
pub fn field_keys(prompt: &str) -> Vec<String> {
  field_keys_from_prompt(prompt)
}

enum RequestOutcome {
  Parsed(BTreeMap<String, Value>),
  EmptyResponse,
  NonObject,
}

#[derive(Debug)]
enum Failure {
  Http { reason: RetryReason, status: u16, body: String },
  NonRetryable { status: u16, body: String },
  Malformed,
  Transport(String),
}

#[derive(Serialize)]
struct GenerateContentRequest {
  contents: Vec<Content>,
  #[serde(rename = "generationConfig")]
  generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
  parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
  text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
  temperature: f32,
  #[serde(rename = "responseMimeType")]
  response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
  candidates: Option<Vec<Candidate>>,
}

impl GenerateContentResponse {
  fn first_text(&self) -> Option<String> {
    let candidate = self.candidates.as_ref()?.first()?;
    let part = candidate.content.parts.first()?;
    Some(part.text.clone())
  }
}

#[derive(Deserialize)]
struct Candidate {
  content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
  parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
  text: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  fn test_config() -> LlmConfig {
    LlmConfig { api_key: "test-key".into(), model: "gemini-3-flash".into(), max_retries: 2, retry_delay: Duration::from_millis(1) }
  }

  #[tokio::test]
  async fn empty_text_short_circuits_without_a_request() {
    let client = LlmClient::new(&test_config(), 4);
    let fields = client.extract("extract fields name", "   ", &["name".to_string()]).await;
    assert_eq!(fields.get("name"), Some(&Value::Null));
  }

  #[test]
  fn field_keys_helper_matches_prompt_parser() {
    assert_eq!(field_keys("Return JSON fields name, email"), vec!["name", "email"]);
  }

  #[tokio::test]
  async fn extract_batch_preserves_input_order_with_no_items() {
    let client = LlmClient::new(&test_config(), 4);
    let progress: Option<fn(usize, usize) -> std::future::Ready<()>> = None;
    let results = client.extract_batch("prompt", &[], &["name".to_string()], progress).await;
    assert!(results.is_empty());
  }
}
