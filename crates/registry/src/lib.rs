//! HTTP client for the task registry (§4.4). Grounded on the original
//! service's `fetch_parsing_task`/`update_parsing_task` pattern: a
//! `{"data": {...}}` response envelope and a `status == "SUCCESS"` check on
//! write endpoints, with a deliberate split between operations that are
//! fatal on persistent failure (reading the task, marking it complete) and
//! operations that are best-effort (progress reporting, marking failure).

mod retry;

use pipeline_core::{ParseableFile, Task, TaskId};
use reqwest::StatusCode;
use retry::RetryConfig;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("registry request failed: {0}")]
  Request(String),
  #[error("registry returned an error envelope: {0}")]
  ErrorEnvelope(String),
  #[error("registry response did not match the expected shape: {0}")]
  Shape(String),
  #[error("no parseable files registered for task after retries")]
  NoParseableFiles,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
  data: T,
}

#[derive(Deserialize)]
struct TaskEnvelope {
  #[serde(rename = "parsingTask")]
  parsing_task: Task,
}

#[derive(Deserialize)]
struct PromptEnvelope {
  prompt: String,
}

#[derive(Deserialize)]
struct ParseableFilesEnvelope {
  #[serde(rename = "parseableFiles")]
  parseable_files: Vec<ParseableFile>,
}

pub struct TaskRegistryClient {
  http: reqwest::Client,
  base_url: String,
  retry: RetryConfig,
}

impl TaskRegistryClient {
  pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .expect("reqwest client construction with static config cannot fail");
    Self {
      http,
      base_url: base_url.into(),
      retry: RetryConfig::default(),
    }
  }

  /// `GET {base}/parsing-task?taskId=…` — fatal after bounded retries.
  pub async fn fetch_task(&self, task_id: &TaskId) -> Result<Task, RegistryError> {
    let url = format!("{}/parsing-task", self.base_url);
    let envelope: DataEnvelope<TaskEnvelope> = self
      .get_with_retry(&url, &[("taskId", task_id.as_str())])
      .await?;
    Ok(envelope.data.parsing_task)
  }

  /// `GET {base}/parsing-task/extraction-prompt?taskId=…` — fatal after
  /// bounded retries.
  pub async fn fetch_prompt(&self, task_id: &TaskId) -> Result<String, RegistryError> {
    let url = format!("{}/parsing-task/extraction-prompt", self.base_url);
    let envelope: DataEnvelope<PromptEnvelope> = self
      .get_with_retry(&url, &[("taskId", task_id.as_str())])
      .await?;
    Ok(envelope.data.prompt)
  }

  /// `GET {base}/parseable-files?taskId=…` — retried up to 5 times with 2s
  /// spacing if the list comes back empty, since direct-mode tasks depend on
  /// the web app having finished writing these rows before the broker
  /// message arrives. Empty after all retries is fatal.
  pub async fn fetch_parseable_files(&self, task_id: &TaskId) -> Result<Vec<ParseableFile>, RegistryError> {
    let url = format!("{}/parseable-files", self.base_url);
    for attempt in 0..5 {
      let envelope: DataEnvelope<ParseableFilesEnvelope> =
        self.get_with_retry(&url, &[("taskId", task_id.as_str())]).await?;
      if !envelope.data.parseable_files.is_empty() {
        return Ok(envelope.data.parseable_files);
      }
      if attempt < 4 {
        tokio::time::sleep(Duration::from_secs(2)).await;
      }
    }
    Err(RegistryError::NoParseableFiles)
  }

  /// `PATCH {base}/parsing-task?taskId=…` with `{totalFiles, invalidFiles}`.
  /// Best-effort: non-fatal per §4.4.
  pub async fn update_file_counts(&self, task_id: &TaskId, total: u64, invalid: u64) -> bool {
    self
      .patch_best_effort(
        task_id,
        json!({ "totalFiles": total, "invalidFiles": invalid }),
        "update_file_counts",
      )
      .await
  }

  /// `PATCH {base}/parsing-task?taskId=…` with `{processedFiles}`.
  /// Best-effort; callers throttle invocation frequency themselves.
  pub async fn update_progress(&self, task_id: &TaskId, processed: u64) -> bool {
    self
      .patch_best_effort(task_id, json!({ "processedFiles": processed }), "update_progress")
      .await
  }

  /// Single atomic transition to `COMPLETED` with both artifact paths set.
  /// Fatal on persistent failure (invariant 3/4 in the spec depend on this
  /// landing).
  pub async fn mark_completed(&self, task_id: &TaskId, json_path: &str, sheet_path: &str) -> Result<(), RegistryError> {
    let body = json!({
      "taskStatus": "COMPLETED",
      "jsonFilePath": json_path,
      "sheetFilePath": sheet_path,
    });
    self.patch_with_retry(task_id, body).await
  }

  /// Single atomic transition to `FAILED`. Best-effort: if even this fails,
  /// the task is left in a non-terminal state for a future retry to pick
  /// up, which is an acceptable outcome (see idempotence property in §8).
  pub async fn mark_failed(&self, task_id: &TaskId, error: &str) -> bool {
    self
      .patch_best_effort(task_id, json!({ "taskStatus": "FAILED", "errorMessage": error }), "mark_failed")
      .await
  }

  /// `POST {base}/parseable-files` with `{parseableFiles: [...]}`.
  /// Best-effort supplementary registration performed after archive-mode
  /// materialization (see `SPEC_FULL.md` §4.3).
  pub async fn insert_parseable_files(&self, files: &[ParseableFile]) -> bool {
    let url = format!("{}/parseable-files", self.base_url);
    let body = json!({ "parseableFiles": files });
    match self.http.post(&url).json(&body).send().await {
      Ok(response) if response.status().is_success() => true,
      Ok(response) => {
        warn!(status = %response.status(), "insert_parseable_files rejected");
        false
      }
      Err(err) => {
        warn!(error = %err, "insert_parseable_files request failed");
        false
      }
    }
  }

  async fn get_with_retry<T: for<'de> Deserialize<'de>>(
    &self,
    url: &str,
    query: &[(&str, &str)],
  ) -> Result<T, RegistryError> {
    let mut last_err = None;
    for attempt in 0..=self.retry.max_retries {
      match self.http.get(url).query(query).send().await {
        Ok(response) if response.status().is_success() => {
          return response
            .json::<T>()
            .await
            .map_err(|e| RegistryError::Shape(e.to_string()));
        }
        Ok(response) => {
          last_err = Some(RegistryError::ErrorEnvelope(format!("status {}", response.status())));
        }
        Err(err) => {
          last_err = Some(RegistryError::Request(err.to_string()));
        }
      }
      if attempt < self.retry.max_retries {
        tokio::time::sleep(self.retry.backoff_for_attempt(attempt)).await;
      }
    }
    Err(last_err.unwrap_or(RegistryError::Request("unknown failure".into())))
  }

  async fn patch_with_retry(&self, task_id: &TaskId, body: serde_json::Value) -> Result<(), RegistryError> {
    let url = format!("{}/parsing-task", self.base_url);
    let mut last_err = None;
    for attempt in 0..=self.retry.max_retries {
      match self
        .http
        .patch(&url)
        .query(&[("taskId", task_id.as_str())])
        .json(&body)
        .send()
        .await
      {
        Ok(response) if response.status() == StatusCode::OK => return Ok(()),
        Ok(response) => {
          last_err = Some(RegistryError::ErrorEnvelope(format!("status {}", response.status())));
        }
        Err(err) => {
          last_err = Some(RegistryError::Request(err.to_string()));
        }
      }
      if attempt < self.retry.max_retries {
        tokio::time::sleep(self.retry.backoff_for_attempt(attempt)).await;
      }
    }
    Err(last_err.unwrap_or(RegistryError::Request("unknown failure".into())))
  }

  async fn patch_best_effort(&self, task_id: &TaskId, body: serde_json::Value, op: &'static str) -> bool {
    let url = format!("{}/parsing-task", self.base_url);
    match self
      .http
      .patch(&url)
      .query(&[("taskId", task_id.as_str())])
      .json(&body)
      .send()
      .await
    {
      Ok(response) if response.status().is_success() => true,
      Ok(response) => {
        warn!(op, status = %response.status(), "registry update rejected");
        false
      }
      Err(err) => {
        warn!(op, error = %err, "registry update request failed");
        false
      }
    }
  }
}
