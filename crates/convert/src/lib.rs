//! File-to-text conversion: one fallback chain per supported extension
//! class, dispatched behind two concurrency caps — `C_conv` for the
//! CPU-bound chains that run in-process, and a smaller `C_doc` for the
//! `.doc` external `soffice` subprocess, which is heavier and far slower
//! than anything else in the chain set.
//!
//! The dispatcher's contract mirrors each individual chain's: it never
//! returns an error. A file that exhausts every tier in its chain yields an
//! empty `TextDocument`, logged at the point of exhaustion, and the
//! pipeline treats that the same as any other low-yield file.

pub mod doc;
pub mod docx;
pub mod image_ocr;
pub mod pdf;
pub mod text;

use pipeline_core::config::ConcurrencyConfig;
use pipeline_core::extensions::FileClass;
use pipeline_core::scratch::{ScratchFile, TextDocument};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// Dispatches `ScratchFile`s to the chain for their `FileClass`, bounding
/// in-process conversion work to `C_conv` concurrent tasks and `.doc`
/// subprocess conversions to a separate, smaller `C_doc`.
pub struct Converter {
  conversion_semaphore: Arc<Semaphore>,
  doc_semaphore: Arc<Semaphore>,
  scratch_dir: PathBuf,
}

impl Converter {
  pub fn new(concurrency: &ConcurrencyConfig, scratch_dir: PathBuf) -> Self {
    Self {
      conversion_semaphore: Arc::new(Semaphore::new(concurrency.conversion_concurrency)),
      doc_semaphore: Arc::new(Semaphore::new(concurrency.doc_conversion_concurrency)),
      scratch_dir,
    }
  }

  /// Convert one file to text. Never fails: an unsupported class, an
  /// unreadable file, or an exhausted fallback chain all yield an empty
  /// `TextDocument` rather than propagating an error up into the pipeline.
  pub async fn convert(&self, file: ScratchFile) -> TextDocument {
    let Some(class) = file.class else {
      warn!(path = %file.local_path.display(), "converter invoked on an unclassified file");
      return TextDocument { source_file: file, text: String::new(), converter_used: None };
    };

    let (text, converter_used) = match class {
      FileClass::Doc => self.convert_doc(&file).await,
      other => self.convert_in_process(&file, other).await,
    };

    if text.trim().is_empty() {
      warn!(
        path = %file.local_path.display(),
        class = ?class,
        "fallback chain exhausted, no text recovered"
      );
    }

    TextDocument { source_file: file, text, converter_used }
  }

  /// `.pdf`, `.docx`, image, `.rtf`, `.txt`: read the bytes, then run the
  /// relevant synchronous chain on a blocking thread, bounded by
  /// `C_conv`.
  async fn convert_in_process(&self, file: &ScratchFile, class: FileClass) -> (String, Option<&'static str>) {
    let bytes = match tokio::fs::read(&file.local_path).await {
      Ok(bytes) => bytes,
      Err(error) => {
        warn!(path = %file.local_path.display(), %error, "failed to read scratch file for conversion");
        return (String::new(), None);
      }
    };

    let Ok(permit) = self.conversion_semaphore.clone().acquire_owned().await else {
      return (String::new(), None);
    };

    let label = chain_label(class);
    let result = tokio::task::spawn_blocking(move || {
      let _permit = permit;
      run_chain(class, &bytes)
    })
    .await;

    match result {
      Ok(text) => (text, Some(label)),
      Err(error) => {
        warn!(path = %file.local_path.display(), %error, "conversion task panicked");
        (String::new(), None)
      }
    }
  }

  /// `.doc`: convert to `.docx` via `soffice` under `C_doc`, then run the
  /// `.docx` chain on the result. If the external conversion itself fails
  /// (timeout, missing `soffice`, non-zero exit), fall back to a direct
  /// text extractor over the raw `.doc` bytes rather than giving up —
  /// `.doc` files are OLE compound documents whose text runs are UTF-16LE
  /// and usually still recoverable by the same encoding-probe chain used
  /// for `.txt`/`.rtf`, even though the binary format is otherwise opaque.
  async fn convert_doc(&self, file: &ScratchFile) -> (String, Option<&'static str>) {
    let Ok(_permit) = self.doc_semaphore.acquire().await else {
      return (String::new(), None);
    };

    let docx_path = match doc::convert_to_docx(&file.local_path, &self.scratch_dir).await {
      Ok(path) => path,
      Err(error) => {
        warn!(path = %file.local_path.display(), %error, "doc-to-docx conversion failed, falling back to direct text extraction");
        return self.doc_direct_text_fallback(file).await;
      }
    };

    let bytes = match tokio::fs::read(&docx_path).await {
      Ok(bytes) => bytes,
      Err(error) => {
        warn!(path = %docx_path.display(), %error, "failed to read converted docx, falling back to direct text extraction");
        let _ = tokio::fs::remove_file(&docx_path).await;
        return self.doc_direct_text_fallback(file).await;
      }
    };

    let _ = tokio::fs::remove_file(&docx_path).await;
    (docx::extract_text(&bytes), Some("doc"))
  }

  /// Last-resort tier for `.doc`, reached only when the `soffice` chain
  /// above could not produce a `.docx` at all.
  async fn doc_direct_text_fallback(&self, file: &ScratchFile) -> (String, Option<&'static str>) {
    match tokio::fs::read(&file.local_path).await {
      Ok(bytes) => (text::extract_txt(&bytes), Some("doc-direct-text")),
      Err(error) => {
        warn!(path = %file.local_path.display(), %error, "failed to read .doc file for direct-text fallback");
        (String::new(), None)
      }
    }
  }
}

fn run_chain(class: FileClass, bytes: &[u8]) -> String {
  match class {
    FileClass::Pdf => pdf::extract_text(bytes),
    FileClass::Docx => docx::extract_text(bytes),
    FileClass::Image => image_ocr::extract_text(bytes),
    FileClass::Rtf => text::extract_rtf(bytes),
    FileClass::Text => text::extract_txt(bytes),
    FileClass::Doc => unreachable!("doc is dispatched via convert_doc"),
  }
}

fn chain_label(class: FileClass) -> &'static str {
  match class {
    FileClass::Pdf => "pdf",
    FileClass::Docx => "docx",
    FileClass::Image => "image",
    FileClass::Rtf => "rtf",
    FileClass::Text => "text",
    FileClass::Doc => "doc",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn converter() -> Converter {
    Converter::new(&ConcurrencyConfig::default(), std::env::temp_dir())
  }

  #[tokio::test]
  async fn unclassified_file_yields_empty_text_without_panicking() {
    let file = ScratchFile { local_path: PathBuf::from("/nonexistent/readme"), original_name: "readme".into(), class: None, size: 0 };
    let doc = converter().convert(file).await;
    assert!(doc.text.is_empty());
    assert_eq!(doc.converter_used, None);
  }

  #[tokio::test]
  async fn missing_file_yields_empty_text() {
    let file = ScratchFile::new(PathBuf::from("/nonexistent/resume.txt"), "resume.txt", 0);
    let doc = converter().convert(file).await;
    assert!(doc.text.is_empty());
  }

  #[tokio::test]
  async fn doc_falls_back_to_direct_text_extraction_when_soffice_conversion_fails() {
    // The sandbox running this suite has no `soffice` on PATH, so
    // `doc::convert_to_docx` reliably fails with `SofficeNotFound` — the
    // same branch a real 30s timeout or non-zero exit would take.
    let path = std::env::temp_dir().join("convert-lib-test-resume.doc");
    tokio::fs::write(&path, b"Jane Doe, Software Engineer with ten years experience").await.unwrap();
    let file = ScratchFile::new(path.clone(), "resume.doc", 0);
    let doc = converter().convert(file).await;
    assert!(doc.text.contains("Jane Doe"));
    assert_eq!(doc.converter_used, Some("doc-direct-text"));
    tokio::fs::remove_file(&path).await.unwrap();
  }

  #[tokio::test]
  async fn text_file_round_trips_through_the_conversion_semaphore() {
    let path = std::env::temp_dir().join("convert-lib-test-resume.txt");
    tokio::fs::write(&path, b"Jane Doe, Software Engineer with ten years experience").await.unwrap();
    let file = ScratchFile::new(path.clone(), "resume.txt", 0);
    let doc = converter().convert(file).await;
    assert!(doc.text.contains("Jane Doe"));
    assert_eq!(doc.converter_used, Some("text"));
    tokio::fs::remove_file(&path).await.unwrap();
  }
}
