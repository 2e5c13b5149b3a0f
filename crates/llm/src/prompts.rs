//! Derives the set of field keys a task's `extraction_prompt` asks the LLM
//! to return, so an empty-input short-circuit or an exhausted retry can
//! still produce a shape-correct all-null record instead of an empty map.
//!
//! Task prompts are free text written by whoever created the task, not a
//! formal schema, so this is a best-effort parse of a common phrasing
//! ("...as JSON fields name, email, phone") rather than a real grammar.

const GENERIC_FALLBACK_FIELD: &str = "value";

/// Parse the comma-separated field list out of a prompt's trailing
/// `fields <list>` clause. Falls back to a single generic field if no such
/// clause is found, so callers always have at least one key to populate.
pub fn field_keys_from_prompt(prompt: &str) -> Vec<String> {
  let lower = prompt.to_ascii_lowercase();
  let marker_pos = ["json fields", "fields:", "fields"].iter().find_map(|marker| lower.rfind(marker).map(|pos| (pos, marker.len())));

  let Some((pos, marker_len)) = marker_pos else {
    return vec![GENERIC_FALLBACK_FIELD.to_string()];
  };

  let tail = &prompt[pos + marker_len..];
  let list_end = tail.find(['.', '\n']).unwrap_or(tail.len());
  let keys: Vec<String> = tail[..list_end]
    .split(',')
    .map(|field| field.trim().trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_string())
    .filter(|field| !field.is_empty())
    .collect();

  if keys.is_empty() { vec![GENERIC_FALLBACK_FIELD.to_string()] } else { keys }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_comma_separated_field_list() {
    let prompt = "Extract name and email as JSON fields name, email, phone";
    assert_eq!(field_keys_from_prompt(prompt), vec!["name", "email", "phone"]);
  }

  #[test]
  fn falls_back_to_generic_field_when_unparseable() {
    let prompt = "Summarize this resume";
    assert_eq!(field_keys_from_prompt(prompt), vec![GENERIC_FALLBACK_FIELD]);
  }

  #[test]
  fn stops_the_field_list_at_sentence_end() {
    let prompt = "Return JSON fields name, email. Do not include anything else.";
    assert_eq!(field_keys_from_prompt(prompt), vec!["name", "email"]);
  }
}
