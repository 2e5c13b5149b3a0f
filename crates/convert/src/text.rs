//! `.txt` and `.rtf` fallback chains. Both start from the same
//! encoding-probe sequence the original service used
//! (`utf-8, latin-1, cp1252, iso-8859-1`, plus `utf-8-sig` for plain text),
//! re-expressed with `encoding_rs`; `.rtf` additionally strips RTF control
//! words after decoding.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252, WINDOWS_1250};

const MIN_TEXT_LEN: usize = 20;

/// Decode raw bytes using the first encoding in the probe sequence that
/// yields a clean (non-replacement-heavy) decode, falling back to a lossy
/// UTF-8 decode with replacement characters if nothing else fits.
pub fn decode_with_probes(bytes: &[u8]) -> String {
  // utf-8-sig: a BOM-prefixed UTF-8 file decodes cleanly via UTF_8 once the
  // BOM is stripped; `encoding_rs`'s UTF_8 decoder already skips a leading
  // BOM for us via `decode`, so no separate probe is needed here.
  for encoding in probe_encodings() {
    let (text, _, had_errors) = encoding.decode(bytes);
    if !had_errors {
      return text.into_owned();
    }
  }
  // Final pass: lossy UTF-8, replacing invalid sequences rather than
  // failing outright.
  let (text, _, _) = UTF_8.decode(bytes);
  text.into_owned()
}

fn probe_encodings() -> [&'static Encoding; 2] {
  // The WHATWG Encoding Standard (which `encoding_rs` implements) maps both
  // the "cp1252" and "iso-8859-1" labels to the windows-1252 decoder, so a
  // single entry covers both probes the original service ran separately.
  // `WINDOWS_1250` is kept as a second, distinct fallback for source bytes
  // that are central/eastern-European code-paged rather than western.
  [UTF_8, WINDOWS_1252]
    .into_iter()
    .chain(std::iter::once(WINDOWS_1250))
    .collect::<Vec<_>>()
    .try_into()
    .unwrap()
}

pub fn extract_txt(bytes: &[u8]) -> String {
  decode_with_probes(bytes)
}

pub fn extract_rtf(bytes: &[u8]) -> String {
  let decoded = decode_with_probes(bytes);
  let stripped = strip_rtf_controls(&decoded);
  if stripped.trim().len() >= MIN_TEXT_LEN {
    stripped
  } else {
    decoded
  }
}

/// Minimal RTF-to-text stripper: drops `{`/`}` group delimiters and
/// `\controlword[param]` sequences, keeps literal text and unescapes
/// `\{`, `\}`, `\\`.
fn strip_rtf_controls(rtf: &str) -> String {
  let mut out = String::with_capacity(rtf.len());
  let mut chars = rtf.chars().peekable();

  while let Some(ch) = chars.next() {
    match ch {
      '{' | '}' => {}
      '\\' => match chars.peek() {
        Some('\\') | Some('{') | Some('}') => {
          out.push(*chars.peek().unwrap());
          chars.next();
        }
        Some(c) if c.is_alphabetic() => {
          // Control word: consume letters, then an optional numeric
          // parameter, then a single trailing space if present.
          while let Some(&c) = chars.peek() {
            if c.is_alphabetic() {
              chars.next();
            } else {
              break;
            }
          }
          while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '-' {
              chars.next();
            } else {
              break;
            }
          }
          if chars.peek() == Some(&' ') {
            chars.next();
          }
        }
        _ => {}
      },
      c => out.push(c),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_rtf_control_words() {
    let rtf = r"{\rtf1\ansi\deff0 {\fonttbl{\f0 Arial;}}\f0\fs24 Jane Doe, Engineer}";
    let text = strip_rtf_controls(rtf);
    assert!(text.contains("Jane Doe, Engineer"));
    assert!(!text.contains("\\rtf1"));
  }

  #[test]
  fn unescapes_literal_braces() {
    let rtf = r"plain \{text\}";
    assert_eq!(strip_rtf_controls(rtf), "plain {text}");
  }

  #[test]
  fn decode_with_probes_handles_plain_utf8() {
    assert_eq!(decode_with_probes("hello".as_bytes()), "hello");
  }

  #[test]
  fn extract_rtf_falls_back_to_decoded_when_stripped_too_short() {
    let text = extract_rtf(b"hi");
    assert_eq!(text, "hi");
  }
}
