//! `.docx` fallback chain. Grounded on the original service's `WordConverter`
//! (python-docx primary path, raw zipfile+ElementTree fallback on
//! `BadZipFile`) re-expressed with `zip` + `quick-xml` instead of shelling
//! out to a word-processing library.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::io::Read;

const MIN_TEXT_LEN: usize = 20;

pub fn extract_text(bytes: &[u8]) -> String {
  if let Some(text) = structured_extract(bytes)
    && text.trim().len() >= MIN_TEXT_LEN
  {
    return text;
  }
  if let Some(text) = markdown_extract(bytes)
    && text.trim().len() >= MIN_TEXT_LEN
  {
    return text;
  }
  if let Some(text) = raw_xml_paragraph_extract(bytes)
    && text.trim().len() >= MIN_TEXT_LEN
  {
    return text;
  }
  simple_text_extract(bytes).unwrap_or_default()
}

/// Read `word/document.xml` out of a well-formed OOXML zip and walk
/// paragraphs (`w:p`) and table cells (`w:tc`) in document order, inserting
/// a newline per paragraph/table row.
fn structured_extract(bytes: &[u8]) -> Option<String> {
  let xml = read_document_xml(bytes)?;
  Some(walk_paragraphs(&xml, "\n"))
}

/// Same document body, but table rows are joined with `" | "` so a reader
/// can distinguish tabular structure from prose — the closest a plain-text
/// extraction gets to "markdown-ish" without inventing a new format.
fn markdown_extract(bytes: &[u8]) -> Option<String> {
  let xml = read_document_xml(bytes)?;
  Some(walk_paragraphs(&xml, " | "))
}

fn read_document_xml(bytes: &[u8]) -> Option<String> {
  let reader = std::io::Cursor::new(bytes);
  let mut archive = zip::ZipArchive::new(reader).ok()?;
  let mut file = archive.by_name("word/document.xml").ok()?;
  let mut xml = String::new();
  file.read_to_string(&mut xml).ok()?;
  Some(xml)
}

fn walk_paragraphs(xml: &str, cell_join: &str) -> String {
  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text(false);
  let mut out = String::new();
  let mut buf = Vec::new();
  let mut in_text = false;
  let mut in_cell = false;

  loop {
    match reader.read_event_into(&mut buf) {
      Ok(Event::Start(e)) => match e.local_name().as_ref() {
        b"t" => in_text = true,
        b"tc" => in_cell = true,
        _ => {}
      },
      Ok(Event::Text(t)) if in_text => {
        if let Ok(text) = t.decode() {
          out.push_str(&text);
        }
      }
      Ok(Event::End(e)) => match e.local_name().as_ref() {
        b"t" => in_text = false,
        b"tc" => {
          in_cell = false;
          out.push_str(cell_join);
        }
        b"p" if !in_cell => out.push('\n'),
        _ => {}
      },
      Ok(Event::Eof) => break,
      Err(_) => break,
      _ => {}
    }
    buf.clear();
  }
  out
}

/// Malformed archive: scan the raw bytes for `<w:t ...>...</w:t>` runs
/// without going through `zip` at all. This is what recovers text from a
/// `.docx` whose central directory is truncated or corrupted.
fn raw_xml_paragraph_extract(bytes: &[u8]) -> Option<String> {
  let text = String::from_utf8_lossy(bytes);
  let mut out = String::new();
  let mut rest = text.as_ref();
  while let Some(start) = rest.find("<w:t") {
    let after_tag_open = &rest[start..];
    let Some(gt) = after_tag_open.find('>') else { break };
    let body = &after_tag_open[gt + 1..];
    let Some(close) = body.find("</w:t>") else { break };
    out.push_str(&body[..close]);
    out.push(' ');
    rest = &body[close + "</w:t>".len()..];
  }
  if out.trim().is_empty() { None } else { Some(out) }
}

/// Last resort: strip every XML tag from whatever text-decodable content is
/// recoverable, swallowing anything that isn't valid UTF-8.
fn simple_text_extract(bytes: &[u8]) -> Option<String> {
  let text = String::from_utf8_lossy(bytes);
  let mut out = String::new();
  let mut in_tag = false;
  for ch in text.chars() {
    match ch {
      '<' => in_tag = true,
      '>' => in_tag = false,
      c if !in_tag => out.push(c),
      _ => {}
    }
  }
  let trimmed = out.trim();
  if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn raw_xml_extract_recovers_text_runs() {
    let xml = "<w:p><w:r><w:t>Jane Doe, Software Engineer</w:t></w:r></w:p>";
    let text = raw_xml_paragraph_extract(xml.as_bytes()).unwrap();
    assert!(text.contains("Jane Doe"));
  }

  #[test]
  fn simple_text_extract_strips_tags() {
    let text = simple_text_extract(b"<a><b>hello world</b></a>").unwrap();
    assert_eq!(text, "hello world");
  }

  #[test]
  fn garbage_bytes_yield_empty_string() {
    assert_eq!(extract_text(b"\x00\x01\x02"), "");
  }
}
