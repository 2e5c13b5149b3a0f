//! Process bootstrap for the resume-extraction pipeline: argument parsing,
//! environment-driven config assembly, tracing initialization, then a
//! handoff into `worker::run` for the long-running engine. Grounded on the
//! teacher's `cli/src/main.rs` (`clap`-derived `Cli`/`Subcommand`,
//! `tracing_subscriber`/`tracing_appender` daily-rolling file layer
//! alongside a console layer) — re-pointed at this engine's one real
//! subcommand instead of the teacher's memory/search surface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pipeline_core::config::Config;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "resume-pipeline", version)]
#[command(about = "Distributed resume-extraction pipeline worker")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Start the consumer + worker pool and run until shutdown.
  Run,
  /// Load configuration from the environment and report whether the
  /// process would start cleanly, without connecting to anything.
  Healthcheck,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let _guard = init_logging();

  match cli.command {
    Commands::Run => cmd_run().await,
    Commands::Healthcheck => cmd_healthcheck(),
  }
}

/// Start the engine. Exits non-zero on fatal init failure (§6: "missing
/// env, broker unreachable at startup"); runtime broker/registry failures
/// are handled inside `worker::run` and never exit the process.
async fn cmd_run() -> Result<()> {
  let config = Config::from_env().context("fatal: missing or invalid environment configuration")?;

  info!(
    work_dir = %config.work_dir.display(),
    worker_count = config.concurrency.worker_count,
    queue_size = config.concurrency.queue_size,
    llm_concurrency = config.concurrency.llm_concurrency,
    "resume-extraction pipeline starting"
  );

  if let Err(error) = worker::run(config).await {
    error!(%error, "engine exited with a fatal error");
    return Err(error);
  }

  Ok(())
}

/// Validate configuration without connecting to the broker, object store,
/// registry, or LLM provider. Useful in a container readiness probe that
/// wants to fail fast on a missing secret.
fn cmd_healthcheck() -> Result<()> {
  match Config::from_env() {
    Ok(config) => {
      println!("configuration OK (work_dir={})", config.work_dir.display());
      Ok(())
    }
    Err(error) => {
      eprintln!("configuration invalid: {error}");
      Err(anyhow::anyhow!(error))
    }
  }
}

/// Console logging plus a daily-rolling file layer under the OS log
/// directory, both driven by `LOG_LEVEL` (default `info`). Returns the
/// guard that must be kept alive for the duration of the process — letting
/// it drop flushes and closes the non-blocking file writer.
fn init_logging() -> Option<WorkerGuard> {
  let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
  let env_filter = tracing_subscriber::EnvFilter::try_new(&level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

  let log_dir = log_dir();
  if std::fs::create_dir_all(&log_dir).is_err() {
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    return None;
  }

  let file_appender = tracing_appender::rolling::daily(&log_dir, "resume-pipeline.log");
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  let console_layer = tracing_subscriber::fmt::layer().with_target(true).with_ansi(true);
  let file_layer = tracing_subscriber::fmt::layer().with_target(true).with_ansi(false).with_writer(file_writer);

  tracing_subscriber::registry().with(env_filter).with(console_layer).with(file_layer).init();

  Some(guard)
}

fn log_dir() -> std::path::PathBuf {
  dirs::data_local_dir().unwrap_or_else(std::env::temp_dir).join("resume-pipeline").join("logs")
}
