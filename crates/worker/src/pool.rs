//! The fixed TaskWorker pool (§4.2). `N` identical workers drain the
//! bounded handoff channel; each runs one `WorkUnit` to completion through
//! a shared `TaskPipeline` before returning for the next. Workers never
//! share per-task state — everything for one run lives on the stack of
//! `TaskPipeline::process`'s call.
//!
//! Grounded on the original service's `worker()` coroutine (poll the
//! internal queue with a timeout so the shutdown flag is checked between
//! items) and this pack's `daemon/src/scheduler.rs` `tokio::select!`
//! loop-break idiom for the shutdown branch.

use crate::shutdown::ShutdownCoordinator;
use blobstore::BlobStore;
use pipeline::TaskPipeline;
use pipeline_core::task::WorkUnit;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, info_span, warn, Instrument};

/// The single bounded handoff channel's receiving end, shared by every
/// worker behind a mutex. Grounded directly on the original service's
/// `asyncio.Queue` shared across `worker()` coroutines — only one worker
/// ever holds the lock, and only for the instant it takes to pull the next
/// item, so contention never meaningfully serializes the pool.
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<WorkUnit>>>;

/// Pulls from `receiver` and runs each `WorkUnit` through `pipeline` until
/// the channel closes or shutdown is triggered. On shutdown, a worker
/// finishes its current pipeline subject to `shutdown.grace_period()`,
/// then exits without picking up further work. Ordinary pipeline runs carry
/// no deadline at all: the grace period only starts counting once shutdown
/// actually fires.
pub async fn run_worker<S>(id: usize, receiver: SharedReceiver, pipeline: Arc<TaskPipeline<S>>, shutdown: ShutdownCoordinator)
where
  S: BlobStore + 'static,
{
  let span = info_span!("task_worker", worker_id = id);
  async move {
    info!("worker started");
    let mut shutdown_rx = shutdown.subscribe();

    loop {
      if shutdown.is_triggered() {
        break;
      }

      let unit = tokio::select! {
        biased;
        _ = shutdown_rx.recv() => None,
        unit = async { receiver.lock().await.recv().await } => unit,
      };

      let Some(unit) = unit else {
        break;
      };

      run_one(unit, &pipeline, &shutdown).await;
    }

    // Drain whatever is still queued so every already-dequeued unit at
    // least gets attempted before the worker exits, matching the source's
    // `task_queue.join()` drain-before-cancel sequence. Shutdown is already
    // triggered by the time we reach here, so every drained unit is
    // immediately subject to the grace deadline inside `run_one`.
    loop {
      let unit = {
        let mut guard = receiver.lock().await;
        guard.try_recv().ok()
      };
      let Some(unit) = unit else { break };
      run_one(unit, &pipeline, &shutdown).await;
    }

    info!("worker stopped");
  }
  .instrument(span)
  .await
}

/// Run one `WorkUnit` to completion. The pipeline executes on its own
/// spawned task rather than being awaited inline, so a grace-period
/// timeout here only ever abandons the *wait* — it never cancels
/// `TaskPipeline::process` mid-flight. That keeps `ResourceManager`
/// teardown and the terminal registry transition guaranteed (the spawned
/// task runs them to completion regardless of whether this function is
/// still waiting on it), instead of depending on a dropped future reaching
/// its own cleanup code, which an aborted `tokio::time::timeout` future
/// cannot do.
async fn run_one<S>(unit: WorkUnit, pipeline: &Arc<TaskPipeline<S>>, shutdown: &ShutdownCoordinator)
where
  S: BlobStore + 'static,
{
  let task_id = unit.task_id.clone();
  let pipeline = Arc::clone(pipeline);
  let mut handle = tokio::spawn(async move { pipeline.process(unit).await });

  // Wait unbounded for either the pipeline to finish or shutdown to fire —
  // this is the "no timeout on ordinary operation" half of the contract.
  tokio::select! {
    result = &mut handle => {
      report_join_result(&task_id, result);
      return;
    }
    _ = wait_for_shutdown(shutdown) => {}
  }

  // Shutdown fired while this unit was in flight: give it `grace_period()`
  // from *this* moment to finish on its own, then stop waiting. The handle
  // is never aborted, so `process` keeps running to its guaranteed
  // teardown even if we give up on it here.
  match tokio::time::timeout(shutdown.grace_period(), &mut handle).await {
    Ok(result) => report_join_result(&task_id, result),
    Err(_) => warn!(%task_id, "pipeline exceeded shutdown grace period; abandoning the wait, teardown continues in the background"),
  }
}

async fn wait_for_shutdown(shutdown: &ShutdownCoordinator) {
  if shutdown.is_triggered() {
    return;
  }
  let mut rx = shutdown.subscribe();
  let _ = rx.recv().await;
}

fn report_join_result(task_id: &pipeline_core::TaskId, result: Result<(), tokio::task::JoinError>) {
  if let Err(join_error) = result {
    warn!(%task_id, %join_error, "pipeline task panicked");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use blobstore::InMemoryBlobStore;
  use convert::Converter;
  use llm::LlmClient;
  use pipeline_core::config::{ConcurrencyConfig, Config, LlmConfig, ObjectStoreConfig};
  use pipeline_core::task::{ProcessingMode, WorkUnit};
  use pipeline_core::{TaskId, UserId};
  use registry::TaskRegistryClient;
  use std::time::Duration;

  fn test_config(work_dir: std::path::PathBuf) -> Config {
    Config {
      work_dir,
      rabbitmq_url: String::new(),
      registry_base_url: "http://127.0.0.1:0".into(),
      registry_timeout: Duration::from_millis(50),
      progress_batch_floor: 25,
      progress_batch_ceiling: 150,
      shutdown_grace: Duration::from_secs(5),
      concurrency: ConcurrencyConfig::default(),
      llm: LlmConfig { api_key: "key".into(), model: "gemini-3-flash".into(), max_retries: 1, retry_delay: Duration::from_millis(1) },
      object_store: ObjectStoreConfig { endpoint: String::new(), access_key: String::new(), secret_key: String::new(), use_ssl: false, region: None },
    }
  }

  #[tokio::test]
  async fn worker_exits_when_channel_closes_with_no_work() {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(dir.path().to_path_buf()));
    let store = Arc::new(InMemoryBlobStore::new());
    let registry = Arc::new(TaskRegistryClient::new(config.registry_base_url.clone(), config.registry_timeout));
    let converter = Arc::new(Converter::new(&config.concurrency, config.extraction_dir()));
    let llm = Arc::new(LlmClient::new(&config.llm, config.concurrency.llm_concurrency));
    let pipeline = Arc::new(TaskPipeline::new(registry, store, converter, llm, Arc::clone(&config)));

    let (sender, receiver) = mpsc::channel(1);
    drop(sender);
    let receiver: SharedReceiver = Arc::new(Mutex::new(receiver));
    let shutdown = ShutdownCoordinator::new(Duration::from_millis(100));
    run_worker(0, receiver, pipeline, shutdown).await;
  }

  #[tokio::test]
  async fn wait_for_shutdown_resolves_immediately_when_already_triggered() {
    let shutdown = ShutdownCoordinator::new(Duration::from_secs(5));
    shutdown.trigger();
    tokio::time::timeout(Duration::from_millis(50), wait_for_shutdown(&shutdown))
      .await
      .expect("must resolve immediately once shutdown already fired");
  }

  #[tokio::test]
  async fn wait_for_shutdown_blocks_until_triggered() {
    let shutdown = ShutdownCoordinator::new(Duration::from_secs(5));
    let waiting = tokio::spawn({
      let shutdown = shutdown.clone();
      async move { wait_for_shutdown(&shutdown).await }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!waiting.is_finished(), "must not resolve before shutdown is triggered");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_millis(200), waiting).await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn ordinary_run_is_not_bounded_by_the_shutdown_grace_period() {
    // The registry is unreachable, so `fetch_task` burns through its whole
    // bounded-retry backoff schedule (seconds) before giving up. A 10ms
    // grace period would abandon the run almost instantly if it were
    // applied unconditionally; shutdown is never triggered here, so it
    // must not be.
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.registry_timeout = Duration::from_millis(50);
    let config = Arc::new(config);
    let store = Arc::new(InMemoryBlobStore::new());
    let registry = Arc::new(TaskRegistryClient::new(config.registry_base_url.clone(), config.registry_timeout));
    let converter = Arc::new(Converter::new(&config.concurrency, config.extraction_dir()));
    let llm = Arc::new(LlmClient::new(&config.llm, config.concurrency.llm_concurrency));
    let pipeline = Arc::new(TaskPipeline::new(registry, store, converter, llm, Arc::clone(&config)));

    let shutdown = ShutdownCoordinator::new(Duration::from_millis(10));
    let unit = WorkUnit { user_id: UserId::new("u1"), task_id: TaskId::new("t1"), mode: ProcessingMode::Direct };

    tokio::time::timeout(Duration::from_secs(10), run_one(unit, &pipeline, &shutdown))
      .await
      .expect("an ordinary run must not be cut short by the grace period when shutdown never fires");
  }
}
