//! `.doc` → `.docx` external conversion. Grounded on the original service's
//! `WordConverter._convert_doc_to_docx` (unique per-invocation LibreOffice
//! profile directory, `soffice --headless --convert-to docx`) and on this
//! pack's `llm` crate's subprocess spawn/timeout/kill pattern
//! (`tokio::process::Command` + `tokio::time::timeout`, used there for the
//! Claude CLI and reused here verbatim for the same reason: an external
//! process that must never be allowed to hang the worker that invoked it).

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::warn;

const CONVERT_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DocConvertError {
  #[error("soffice not found on PATH")]
  SofficeNotFound,
  #[error("soffice conversion timed out after {0:?}")]
  Timeout(Duration),
  #[error("soffice exited with an error: {0}")]
  ProcessFailed(String),
  #[error("soffice did not produce the expected output file")]
  NoOutput,
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Convert `input` (a `.doc` file) into a sibling `.docx` inside `out_dir`,
/// under a 30s deadline with a unique, always-removed LibreOffice profile
/// directory. Returns the converted file's path.
pub async fn convert_to_docx(input: &Path, out_dir: &Path) -> Result<PathBuf, DocConvertError> {
  which_soffice().ok_or(DocConvertError::SofficeNotFound)?;

  let profile_dir = out_dir.join(format!(".soffice-profile-{}", uuid::Uuid::new_v4()));
  tokio::fs::create_dir_all(&profile_dir).await?;

  let result = run_conversion(input, out_dir, &profile_dir).await;

  if let Err(e) = tokio::fs::remove_dir_all(&profile_dir).await
    && e.kind() != std::io::ErrorKind::NotFound
  {
    warn!(error = %e, path = %profile_dir.display(), "failed to remove soffice profile directory");
  }

  result
}

async fn run_conversion(input: &Path, out_dir: &Path, profile_dir: &Path) -> Result<PathBuf, DocConvertError> {
  let profile_url = format!("file://{}", profile_dir.display());
  let mut command = Command::new("soffice");
  command
    .arg("--headless")
    .arg("--nofirststartwizard")
    .arg(format!("-env:UserInstallation={profile_url}"))
    .arg("--convert-to")
    .arg("docx")
    .arg("--outdir")
    .arg(out_dir)
    .arg(input)
    .env("HOME", "/tmp")
    .kill_on_drop(true);

  let output = match tokio::time::timeout(CONVERT_DEADLINE, command.output()).await {
    Ok(result) => result?,
    Err(_) => return Err(DocConvertError::Timeout(CONVERT_DEADLINE)),
  };

  if !output.status.success() {
    return Err(DocConvertError::ProcessFailed(String::from_utf8_lossy(&output.stderr).into_owned()));
  }

  let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("converted");
  let expected = out_dir.join(format!("{stem}.docx"));
  if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
    Ok(expected)
  } else {
    Err(DocConvertError::NoOutput)
  }
}

fn which_soffice() -> Option<PathBuf> {
  let path_var = std::env::var_os("PATH")?;
  std::env::split_paths(&path_var).find_map(|dir| {
    let candidate = dir.join("soffice");
    candidate.is_file().then_some(candidate)
  })
}
