//! Materializes a task's working set onto local disk. In archive mode this
//! downloads every object under the task's archive prefix and extracts each
//! zip into the scratch directory; in direct mode it downloads each declared
//! object straight to the scratch directory. Both paths run under an
//! `F_dl`-sized semaphore so one task's download burst cannot starve another
//! task sharing the same pipeline's object store client.
//!
//! Archive extraction is grounded on `convert::docx`'s own use of the `zip`
//! crate for OOXML bodies, here applied to an arbitrary archive of resumes
//! instead of a single well-known internal layout.

use blobstore::{BlobStore, BlobStoreError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("object store error: {0}")]
  Store(#[from] BlobStoreError),
  #[error("local io error: {0}")]
  Io(#[from] std::io::Error),
}

pub struct Fetcher<S> {
  store: Arc<S>,
  semaphore: Arc<Semaphore>,
}

impl<S> Fetcher<S>
where
  S: BlobStore + 'static,
{
  pub fn new(store: Arc<S>, download_concurrency: usize) -> Self {
    Self { store, semaphore: Arc::new(Semaphore::new(download_concurrency)) }
  }

  /// Download every object under `prefix` in `bucket` into `dest_dir`,
  /// `F_dl` at a time. Returns the local paths written, in listing order.
  pub async fn download_prefix(&self, bucket: &str, prefix: &str, dest_dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let objects = self.store.list(bucket, prefix).await?;
    let mut handles = Vec::with_capacity(objects.len());

    for object in objects {
      let store = Arc::clone(&self.store);
      let semaphore = Arc::clone(&self.semaphore);
      let bucket = bucket.to_string();
      let dest_dir = dest_dir.to_path_buf();
      handles.push(tokio::spawn(async move {
        let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
        download_one(store.as_ref(), &bucket, &object.key, &dest_dir).await
      }));
    }

    let mut paths = Vec::with_capacity(handles.len());
    for handle in handles {
      match handle.await {
        Ok(Ok(path)) => paths.push(path),
        Ok(Err(error)) => return Err(error),
        Err(join_error) => return Err(FetchError::Io(std::io::Error::other(join_error))),
      }
    }
    Ok(paths)
  }

  /// Download one declared object (direct mode) to `dest_dir/file_name`.
  pub async fn download_declared(&self, bucket: &str, key: &str, file_name: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
    let _permit = self.semaphore.acquire().await.expect("semaphore is never closed");
    let bytes = self.store.get(bucket, key).await?;
    let local_path = dest_dir.join(file_name);
    tokio::fs::write(&local_path, &bytes).await?;
    Ok(local_path)
  }
}

async fn download_one<S: BlobStore + ?Sized>(
  store: &S,
  bucket: &str,
  key: &str,
  dest_dir: &Path,
) -> Result<PathBuf, FetchError> {
  let bytes = store.get(bucket, key).await?;
  let file_name = key.rsplit('/').next().unwrap_or(key);
  let local_path = dest_dir.join(file_name);
  tokio::fs::write(&local_path, &bytes).await?;
  Ok(local_path)
}

/// Extract one archive's contents into `dest_dir`, flattening directory
/// structure (resumes inside nested folders are still individual files; the
/// folder hierarchy carries no meaning for this pipeline). Returns the local
/// paths of every regular file extracted. Malformed archives are logged and
/// skipped rather than failing the whole task — one bad zip in an archive
/// mode upload should not take down every other file's extraction.
pub async fn extract_archive(archive_path: &Path, dest_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
  let archive_path = archive_path.to_path_buf();
  let dest_dir = dest_dir.to_path_buf();
  tokio::task::spawn_blocking(move || extract_archive_blocking(&archive_path, &dest_dir))
    .await
    .unwrap_or_else(|join_error| Err(std::io::Error::other(join_error)))
}

fn extract_archive_blocking(archive_path: &Path, dest_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
  let file = std::fs::File::open(archive_path)?;
  let mut archive = match zip::ZipArchive::new(file) {
    Ok(archive) => archive,
    Err(error) => {
      warn!(path = %archive_path.display(), %error, "not a valid zip archive, skipping");
      return Ok(Vec::new());
    }
  };

  let mut extracted = Vec::new();
  // Tracks every path already written this run. Two entries under
  // different directories in the source archive (e.g. `folder1/resume.pdf`
  // and `folder2/resume.pdf`) are extracted under their full relative path
  // rather than flattened to a basename, which is what an upstream
  // archive-files producer already relies on (the same collision the
  // original service's `upload_by_file_type` guards against by prefixing
  // every extracted name with a cuid) — this preserves that guarantee
  // without needing an extra ID generator dependency.
  let mut seen: HashSet<PathBuf> = HashSet::new();
  for index in 0..archive.len() {
    let mut entry = match archive.by_index(index) {
      Ok(entry) => entry,
      Err(error) => {
        warn!(path = %archive_path.display(), %error, "skipping unreadable archive entry");
        continue;
      }
    };
    if entry.is_dir() {
      continue;
    }
    let Some(relative) = entry.enclosed_name() else {
      warn!(path = %archive_path.display(), "skipping archive entry with an unsafe path");
      continue;
    };
    let relative = relative.to_path_buf();

    let mut out_path = dest_dir.join(&relative);
    if seen.contains(&out_path) {
      // A genuine duplicate entry (same relative path twice in one
      // archive) rather than a cross-folder basename collision — the
      // relative-path join above already disambiguates those. Suffix the
      // entry index onto the file stem so the later entry still lands on
      // disk instead of overwriting the earlier one.
      let stem = out_path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
      let new_name = match out_path.extension() {
        Some(ext) => format!("{stem}-{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{index}"),
      };
      out_path = out_path.with_file_name(new_name);
    }

    if let Some(parent) = out_path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let mut out_file = std::fs::File::create(&out_path)?;
    std::io::copy(&mut entry, &mut out_file)?;
    seen.insert(out_path.clone());
    extracted.push(out_path);
  }
  Ok(extracted)
}

#[cfg(test)]
mod tests {
  use super::*;
  use blobstore::InMemoryBlobStore;

  #[tokio::test]
  async fn download_prefix_writes_every_listed_object() {
    let store = Arc::new(InMemoryBlobStore::new());
    store.seed("archive-files", "u1/t1/a.pdf", b"pdf-bytes".to_vec());
    store.seed("archive-files", "u1/t1/b.pdf", b"pdf-bytes-2".to_vec());

    let fetcher = Fetcher::new(store, 4);
    let dest = tempfile::tempdir().unwrap();
    let mut paths = fetcher.download_prefix("archive-files", "u1/t1/", dest.path()).await.unwrap();
    paths.sort();
    assert_eq!(paths.len(), 2);
    for path in &paths {
      assert!(path.exists());
    }
  }

  #[tokio::test]
  async fn download_declared_writes_to_the_given_name() {
    let store = Arc::new(InMemoryBlobStore::new());
    store.seed("parseable-files", "u1/t1/resume.pdf", b"hello".to_vec());
    let fetcher = Fetcher::new(store, 4);
    let dest = tempfile::tempdir().unwrap();
    let path = fetcher
      .download_declared("parseable-files", "u1/t1/resume.pdf", "resume.pdf", dest.path())
      .await
      .unwrap();
    assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
  }

  #[test]
  fn archive_entries_with_colliding_basenames_in_different_folders_are_both_preserved() {
    use std::io::Write;

    let dest = tempfile::tempdir().unwrap();
    let archive_path = dest.path().join("pack.zip");
    {
      let file = std::fs::File::create(&archive_path).unwrap();
      let mut writer = zip::ZipWriter::new(file);
      let options = zip::write::SimpleFileOptions::default();
      writer.start_file("folder1/resume.pdf", options).unwrap();
      writer.write_all(b"first").unwrap();
      writer.start_file("folder2/resume.pdf", options).unwrap();
      writer.write_all(b"second").unwrap();
      writer.finish().unwrap();
    }

    let extracted = extract_archive_blocking(&archive_path, dest.path()).unwrap();
    assert_eq!(extracted.len(), 2);
    let mut contents: Vec<Vec<u8>> = extracted.iter().map(|p| std::fs::read(p).unwrap()).collect();
    contents.sort();
    assert_eq!(contents, vec![b"first".to_vec(), b"second".to_vec()]);
  }

  #[test]
  fn extracting_a_non_zip_file_yields_no_entries_instead_of_erroring() {
    let dest = tempfile::tempdir().unwrap();
    let bogus = dest.path().join("not-a-zip.zip");
    std::fs::write(&bogus, b"not a zip file").unwrap();
    let result = extract_archive_blocking(&bogus, dest.path()).unwrap();
    assert!(result.is_empty());
  }
}
