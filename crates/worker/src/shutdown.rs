//! Termination propagation for every long-running stage (§5 "Cancellation
//! and shutdown"). Grounded on `sideseat-sideseat`'s `ShutdownService`
//! (signal handlers spawned once, a cheaply-cloned broadcaster, a bounded
//! drain-then-cancel sequence) re-expressed over `broadcast` instead of
//! `watch` to match this pack's other consumer of the same pattern,
//! `daemon/src/scheduler.rs`'s `broadcast::Receiver` + `tokio::select!`
//! loop-break idiom.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Shared termination flag plus a grace deadline. `Consumer` stops pulling
/// new broker deliveries as soon as a signal fires; in-flight pipelines get
/// `grace` to finish before the process gives up waiting on them (§5: "after
/// the deadline, remaining pipelines are cancelled").
#[derive(Clone)]
pub struct ShutdownCoordinator {
  tx: broadcast::Sender<()>,
  triggered: Arc<AtomicBool>,
  grace: Duration,
}

impl ShutdownCoordinator {
  pub fn new(grace: Duration) -> Self {
    let (tx, _rx) = broadcast::channel(16);
    Self { tx, triggered: Arc::new(AtomicBool::new(false)), grace }
  }

  pub fn grace_period(&self) -> Duration {
    self.grace
  }

  pub fn subscribe(&self) -> broadcast::Receiver<()> {
    self.tx.subscribe()
  }

  /// Fire the shutdown signal. Idempotent: a closed-channel send (no
  /// subscribers left) is not an error here.
  pub fn trigger(&self) {
    self.triggered.store(true, Ordering::SeqCst);
    let _ = self.tx.send(());
  }

  pub fn is_triggered(&self) -> bool {
    self.triggered.load(Ordering::SeqCst)
  }

  /// Spawn the OS signal listener. SIGINT/SIGTERM both trigger the same
  /// graceful path; on non-Unix targets only Ctrl+C is wired up.
  pub fn install_signal_handlers(&self) {
    let coordinator = self.clone();
    tokio::spawn(async move {
      let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
      };

      #[cfg(unix)]
      let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
          Ok(mut stream) => {
            stream.recv().await;
          }
          Err(error) => {
            tracing::warn!(%error, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
          }
        }
      };
      #[cfg(not(unix))]
      let terminate = std::future::pending::<()>();

      tokio::select! {
        _ = ctrl_c => info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => info!("received SIGTERM, starting graceful shutdown"),
      }
      coordinator.trigger();
    });
  }
}

impl Default for ShutdownCoordinator {
  fn default() -> Self {
    Self::new(Duration::from_secs(30))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscribers_observe_trigger() {
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
    let mut rx = coordinator.subscribe();
    coordinator.trigger();
    tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn late_subscriber_still_sees_a_fresh_trigger() {
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
    let mut rx = coordinator.subscribe();
    debug!("subscribed before trigger");
    coordinator.trigger();
    assert!(rx.recv().await.is_ok());
  }
}
