//! Process wiring: the broker `Consumer`, the bounded handoff channel, the
//! fixed `TaskWorker` pool, and the `ShutdownCoordinator` that ties them
//! together. Nothing below `main` reaches for an ambient singleton —
//! every component here is constructed once in [`run`] and handed down by
//! reference or `Arc`, per `SPEC_FULL.md`'s "global state -> explicit
//! context" design note.

pub mod consumer;
pub mod pool;
pub mod shutdown;

pub use consumer::Consumer;
pub use shutdown::ShutdownCoordinator;

use blobstore::S3BlobStore;
use convert::Converter;
use llm::LlmClient;
use pipeline::TaskPipeline;
use pipeline_core::config::Config;
use registry::TaskRegistryClient;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

/// Build every component from `config` and run the engine until shutdown.
/// Returns once every worker and the consumer have exited — i.e. after a
/// graceful shutdown completes or the grace deadline has elapsed for every
/// in-flight pipeline.
pub async fn run(config: Config) -> anyhow::Result<()> {
  let config = Arc::new(config);
  tokio::fs::create_dir_all(&config.work_dir).await?;
  tokio::fs::create_dir_all(config.extraction_dir()).await?;

  let store = Arc::new(S3BlobStore::new(&config.object_store).await);
  let registry = Arc::new(TaskRegistryClient::new(config.registry_base_url.clone(), config.registry_timeout));
  let converter = Arc::new(Converter::new(&config.concurrency, config.extraction_dir()));
  let llm = Arc::new(LlmClient::new(&config.llm, config.concurrency.llm_concurrency));
  let pipeline = Arc::new(TaskPipeline::new(Arc::clone(&registry), Arc::clone(&store), converter, llm, Arc::clone(&config)));

  let shutdown = ShutdownCoordinator::new(config.shutdown_grace);
  shutdown.install_signal_handlers();

  let (sender, receiver) = mpsc::channel(config.concurrency.queue_size);
  let receiver: pool::SharedReceiver = Arc::new(Mutex::new(receiver));

  let mut worker_handles = Vec::with_capacity(config.concurrency.worker_count);
  for id in 0..config.concurrency.worker_count {
    let receiver = Arc::clone(&receiver);
    let pipeline = Arc::clone(&pipeline);
    let shutdown = shutdown.clone();
    worker_handles.push(tokio::spawn(pool::run_worker(id, receiver, pipeline, shutdown)));
  }

  info!(
    worker_count = config.concurrency.worker_count,
    queue_size = config.concurrency.queue_size,
    "engine started"
  );

  let consumer = Consumer::new(config.rabbitmq_url.clone(), config.concurrency.broker_prefetch, sender, shutdown.clone());
  consumer.run().await;

  for handle in worker_handles {
    if let Err(error) = handle.await {
      tracing::warn!(%error, "a task worker panicked");
    }
  }

  info!("engine shut down cleanly");
  Ok(())
}
