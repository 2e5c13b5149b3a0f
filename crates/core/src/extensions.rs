//! The closed set of supported file extensions and the converter chain each
//! one is routed to.

use std::path::Path;

/// Which fallback chain (see `convert`) a file is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
  Pdf,
  Doc,
  Docx,
  Image,
  Rtf,
  Text,
}

const PDF_EXT: &[&str] = &["pdf"];
const DOC_EXT: &[&str] = &["doc"];
const DOCX_EXT: &[&str] = &["docx"];
const IMAGE_EXT: &[&str] = &["jpg", "jpeg", "png", "webp"];
const RTF_EXT: &[&str] = &["rtf"];
const TEXT_EXT: &[&str] = &["txt"];

/// Classify a file by its extension (case-insensitive). `None` means the
/// file is not in the supported set and counts toward `invalid_files`.
pub fn classify(path: &Path) -> Option<FileClass> {
  let ext = path.extension()?.to_str()?.to_ascii_lowercase();
  let ext = ext.as_str();
  if PDF_EXT.contains(&ext) {
    Some(FileClass::Pdf)
  } else if DOC_EXT.contains(&ext) {
    Some(FileClass::Doc)
  } else if DOCX_EXT.contains(&ext) {
    Some(FileClass::Docx)
  } else if IMAGE_EXT.contains(&ext) {
    Some(FileClass::Image)
  } else if RTF_EXT.contains(&ext) {
    Some(FileClass::Rtf)
  } else if TEXT_EXT.contains(&ext) {
    Some(FileClass::Text)
  } else {
    None
  }
}

pub fn is_supported(path: &Path) -> bool {
  classify(path).is_some()
}

/// Best-effort MIME type for registry records, mirroring the mimetypes-guess
/// behaviour the original service relied on.
pub fn guess_content_type(path: &Path) -> String {
  match classify(path) {
    Some(FileClass::Pdf) => "application/pdf",
    Some(FileClass::Doc) => "application/msword",
    Some(FileClass::Docx) => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    Some(FileClass::Image) => match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()) {
      Some(ref e) if e == "png" => "image/png",
      Some(ref e) if e == "webp" => "image/webp",
      _ => "image/jpeg",
    },
    Some(FileClass::Rtf) => "application/rtf",
    Some(FileClass::Text) => "text/plain",
    None => "application/octet-stream",
  }
  .to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn classifies_known_extensions() {
    assert_eq!(classify(&PathBuf::from("a.PDF")), Some(FileClass::Pdf));
    assert_eq!(classify(&PathBuf::from("a.docx")), Some(FileClass::Docx));
    assert_eq!(classify(&PathBuf::from("a.jpeg")), Some(FileClass::Image));
    assert_eq!(classify(&PathBuf::from("a.webp")), Some(FileClass::Image));
  }

  #[test]
  fn unsupported_extension_is_none() {
    assert_eq!(classify(&PathBuf::from("a.exe")), None);
    assert!(!is_supported(&PathBuf::from("a.exe")));
  }

  #[test]
  fn no_extension_is_none() {
    assert_eq!(classify(&PathBuf::from("README")), None);
  }

  #[test]
  fn content_type_defaults_to_octet_stream() {
    assert_eq!(guess_content_type(&PathBuf::from("a.bin")), "application/octet-stream");
  }
}
