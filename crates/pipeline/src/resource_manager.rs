//! Per-pipeline scratch directory ownership. Grounded on the original
//! service's `processor.py` `finally` block (`cleanup_files`,
//! `cleanup_directory`) and the teacher's `daemon/src/lifecycle.rs`
//! guaranteed-teardown style: one owner, one `dispose()`, always called
//! from the pipeline's terminating path regardless of outcome.

use std::path::{Path, PathBuf};
use tracing::warn;

/// Owns one task's scratch directory tree for the lifetime of a pipeline
/// run. `dispose()` is the only way the directory goes away; a
/// `ResourceManager` dropped without disposal leaves its directory behind,
/// intentionally, so a crash leaves inspectable evidence rather than
/// silently vanishing scratch data.
pub struct ResourceManager {
  root: PathBuf,
}

impl ResourceManager {
  /// Create `{base_dir}/task-{task_id}` and return a handle owning it.
  pub async fn create(base_dir: &Path, task_id: &str) -> std::io::Result<Self> {
    let root = base_dir.join(format!("task-{task_id}"));
    tokio::fs::create_dir_all(&root).await?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Remove the scratch directory tree. Not-found is not an error (another
  /// path may have already cleaned it up, or it was never populated);
  /// permission errors are logged but never propagated, matching §4.9's
  /// "never propagate" contract.
  pub async fn dispose(self) {
    match tokio::fs::remove_dir_all(&self.root).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => warn!(path = %self.root.display(), error = %e, "failed to remove scratch directory"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn dispose_removes_the_scratch_tree() {
    let base = tempfile::tempdir().unwrap();
    let manager = ResourceManager::create(base.path(), "t1").await.unwrap();
    let file_path = manager.root().join("a.txt");
    tokio::fs::write(&file_path, b"hi").await.unwrap();
    assert!(file_path.exists());

    let root = manager.root().to_path_buf();
    manager.dispose().await;
    assert!(!root.exists());
  }

  #[tokio::test]
  async fn dispose_on_already_missing_directory_does_not_panic() {
    let base = tempfile::tempdir().unwrap();
    let manager = ResourceManager::create(base.path(), "t2").await.unwrap();
    tokio::fs::remove_dir_all(manager.root()).await.unwrap();
    manager.dispose().await;
  }
}
