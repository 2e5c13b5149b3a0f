//! The per-task orchestration. Grounded on the original service's
//! `ResumeProcessor.process_task` — same eleven-step contract (fetch task,
//! idempotency short-circuit, scratch materialization, classify, convert,
//! extract, aggregate, publish, terminal transition, guaranteed teardown),
//! re-expressed with owned async stages instead of a single long method with
//! a `finally` block.

use crate::artifacts::{artifact_keys, build_artifacts, ArtifactError};
use crate::fetcher::{FetchError, Fetcher};
use crate::resource_manager::ResourceManager;
use blobstore::{BlobStore, BlobStoreError};
use convert::Converter;
use llm::LlmClient;
use pipeline_core::config::Config;
use pipeline_core::record::Record;
use pipeline_core::scratch::ScratchFile;
use pipeline_core::task::{ProcessingMode, TaskStatus, WorkUnit};
use pipeline_core::{ParseableFile, TaskId};
use registry::TaskRegistryClient;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

const ARCHIVE_BUCKET: &str = "archive-files";

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("registry error: {0}")]
  Registry(#[from] registry::RegistryError),
  #[error("object store error: {0}")]
  Store(#[from] BlobStoreError),
  #[error("fetch error: {0}")]
  Fetch(#[from] FetchError),
  #[error("artifact error: {0}")]
  Artifact(#[from] ArtifactError),
  #[error("local io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("no source files")]
  NoSourceFiles,
}

impl PipelineError {
  fn one_line(&self) -> String {
    self.to_string()
  }
}

pub struct TaskPipeline<S> {
  registry: Arc<TaskRegistryClient>,
  store: Arc<S>,
  fetcher: Fetcher<S>,
  converter: Arc<Converter>,
  llm: Arc<LlmClient>,
  config: Arc<Config>,
}

impl<S> TaskPipeline<S>
where
  S: BlobStore + 'static,
{
  pub fn new(registry: Arc<TaskRegistryClient>, store: Arc<S>, converter: Arc<Converter>, llm: Arc<LlmClient>, config: Arc<Config>) -> Self {
    let fetcher = Fetcher::new(Arc::clone(&store), config.concurrency.download_concurrency);
    Self { registry, store, fetcher, converter, llm, config }
  }

  /// Run one WorkUnit to completion. Never returns an error for a per-file
  /// failure; only registry/object-store/artifact failures that the task
  /// itself cannot recover from propagate, and even those are caught at the
  /// call site and turned into a `failed` transition, not a panic.
  pub async fn process(&self, unit: WorkUnit) {
    let span = info_span!("task_pipeline", task_id = %unit.task_id, user_id = %unit.user_id);
    self.process_inner(unit).instrument(span).await;
  }

  async fn process_inner(&self, unit: WorkUnit) {
    let task_id = unit.task_id.clone();

    let task = match self.registry.fetch_task(&task_id).await {
      Ok(task) => task,
      Err(error) => {
        warn!(%error, "failed to fetch task, abandoning this work unit");
        return;
      }
    };

    if task.status == TaskStatus::Completed {
      info!("task already completed, skipping (idempotent redelivery)");
      return;
    }

    let prompt = match self.registry.fetch_prompt(&task_id).await {
      Ok(prompt) => prompt,
      Err(error) => {
        warn!(%error, "failed to fetch extraction prompt, abandoning this work unit");
        return;
      }
    };
    let field_keys = llm::field_keys(&prompt);

    let manager = match ResourceManager::create(&self.config.work_dir, task_id.as_str()).await {
      Ok(manager) => manager,
      Err(error) => {
        warn!(%error, "failed to create scratch directory, abandoning this work unit");
        return;
      }
    };

    let outcome = self.run_materialized(&unit, &task_id, &task.name, &prompt, &field_keys, manager.root()).await;

    match outcome {
      Ok(RunResult { json_key, sheet_key }) => {
        if self.registry.mark_completed(&task_id, &json_key, &sheet_key).await.is_err() {
          // mark_completed is fatal per the registry contract; its own retry
          // loop already ran, so a failure here is logged and left for a
          // future explicit retry to pick up (task stays non-terminal).
          warn!("failed to mark task completed after bounded retries");
        }
      }
      Err(error) => {
        warn!(error = %error, "pipeline failed, marking task failed");
        self.registry.mark_failed(&task_id, &error.one_line()).await;
      }
    }

    self.cleanup_source_objects(&unit, &task_id).await;
    manager.dispose().await;
  }

  async fn run_materialized(
    &self,
    unit: &WorkUnit,
    task_id: &TaskId,
    task_name: &str,
    prompt: &str,
    field_keys: &[String],
    scratch_root: &Path,
  ) -> Result<RunResult, PipelineError> {
    let files = self.materialize_working_set(unit, task_id, scratch_root).await?;

    // Boundary behaviour (§8): an empty working set is a fatal task failure
    // with a fixed reason, distinct from "every file present is an
    // unsupported extension" (§8's other boundary case), which still
    // completes normally with zero valid files.
    if files.is_empty() {
      return Err(PipelineError::NoSourceFiles);
    }

    let (valid, invalid): (Vec<ScratchFile>, Vec<ScratchFile>) = files.into_iter().partition(ScratchFile::is_supported);
    self.registry.update_file_counts(task_id, valid.len() as u64, invalid.len() as u64).await;

    if unit.mode == ProcessingMode::Archive && !valid.is_empty() {
      let records: Vec<ParseableFile> = valid
        .iter()
        .map(|file| ParseableFile {
          bucket_name: ARCHIVE_BUCKET.to_string(),
          file_name: file.original_name.clone(),
          file_path: file.local_path.to_string_lossy().into_owned(),
          original_name: file.original_name.clone(),
          content_type: pipeline_core::guess_content_type(&file.local_path),
          size: file.size,
          parsing_task_id: task_id.clone(),
        })
        .collect();
      self.registry.insert_parseable_files(&records).await;
    }

    let documents = self.convert_all(valid).await;

    let total = documents.len();
    let texts: Vec<(String, String)> = documents.iter().map(|doc| (doc.source_file.original_name.clone(), doc.text.clone())).collect();

    let batch_size = self.config.progress_batch_size(total as u64);
    let registry = Arc::clone(&self.registry);
    let task_id_for_progress = task_id.clone();
    let progress_cb = move |completed: usize, total: usize| {
      let registry = Arc::clone(&registry);
      let task_id = task_id_for_progress.clone();
      async move {
        let completed = completed as u64;
        let total = total as u64;
        if completed == total || completed % batch_size == 0 {
          registry.update_progress(&task_id, completed).await;
        }
      }
    };

    let extracted = self.llm.extract_batch(prompt, &texts, field_keys, Some(progress_cb)).await;

    let mut records: Vec<Record> = extracted.into_iter().map(|(source_file, fields)| Record::new(source_file, fields)).collect();
    records.sort_by(|a, b| a.source_file.cmp(&b.source_file));

    self.publish(unit, task_id, task_name, &records).await
  }

  async fn materialize_working_set(&self, unit: &WorkUnit, task_id: &TaskId, scratch_root: &Path) -> Result<Vec<ScratchFile>, PipelineError> {
    match unit.mode {
      ProcessingMode::Archive => {
        let prefix = format!("{}/{}/", unit.user_id.as_str(), task_id.as_str());
        let archives = self.fetcher.download_prefix(ARCHIVE_BUCKET, &prefix, scratch_root).await?;

        let mut files = Vec::new();
        for archive_path in archives {
          let extracted = crate::fetcher::extract_archive(&archive_path, scratch_root).await?;
          for path in extracted {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
            files.push(ScratchFile::new(path, name, size));
          }
        }
        Ok(files)
      }
      ProcessingMode::Direct => {
        let declared = self.registry.fetch_parseable_files(task_id).await?;
        let mut files = Vec::with_capacity(declared.len());
        for file in &declared {
          let local_path = self
            .fetcher
            .download_declared(&file.bucket_name, &file.file_path, &file.file_name, scratch_root)
            .await?;
          files.push(ScratchFile::new(local_path, file.original_name.clone(), file.size));
        }
        Ok(files)
      }
    }
  }

  async fn convert_all(&self, files: Vec<ScratchFile>) -> Vec<pipeline_core::scratch::TextDocument> {
    let mut handles = Vec::with_capacity(files.len());
    for file in files {
      let converter = Arc::clone(&self.converter);
      handles.push(tokio::spawn(async move { converter.convert(file).await }));
    }
    let mut documents = Vec::with_capacity(handles.len());
    for handle in handles {
      match handle.await {
        Ok(document) => documents.push(document),
        Err(join_error) => warn!(%join_error, "conversion task panicked, dropping file from this batch"),
      }
    }
    documents
  }

  async fn publish(&self, unit: &WorkUnit, task_id: &TaskId, task_name: &str, records: &[Record]) -> Result<RunResult, PipelineError> {
    let artifacts = build_artifacts(records)?;
    let (json_key, sheet_key) = artifact_keys(unit.user_id.as_str(), task_id.as_str(), task_name);

    const AGGREGATED_BUCKET: &str = "aggregated-results";
    self
      .store
      .put(AGGREGATED_BUCKET, &json_key, artifacts.json_bytes, "application/json")
      .await?;
    self
      .store
      .put(
        AGGREGATED_BUCKET,
        &sheet_key,
        artifacts.sheet_bytes,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
      )
      .await?;

    Ok(RunResult { json_key, sheet_key })
  }

  async fn cleanup_source_objects(&self, unit: &WorkUnit, task_id: &TaskId) {
    match unit.mode {
      ProcessingMode::Archive => {
        let prefix = format!("{}/{}/", unit.user_id.as_str(), task_id.as_str());
        if let Err(error) = self.store.delete_prefix(ARCHIVE_BUCKET, &prefix).await {
          warn!(%error, "failed to delete archive-mode source objects");
        }
      }
      ProcessingMode::Direct => {
        if let Ok(declared) = self.registry.fetch_parseable_files(task_id).await {
          for file in declared {
            if let Err(error) = self.store.delete(&file.bucket_name, &file.file_path).await {
              warn!(%error, bucket = %file.bucket_name, key = %file.file_path, "failed to delete direct-mode source object");
            }
          }
        }
      }
    }
  }
}

struct RunResult {
  json_key: String,
  sheet_key: String,
}
