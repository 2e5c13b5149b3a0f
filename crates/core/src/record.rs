//! The output side of the data model: per-file extraction results and the
//! artifacts built from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One structured extraction result. Field keys come from the task's
/// extraction prompt (see `llm::field_keys_from_prompt`); `_source_file` is
/// always present and always last when the record is flattened for the
/// spreadsheet artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
  pub source_file: String,
  pub fields: BTreeMap<String, Value>,
}

impl Record {
  pub fn new(source_file: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
    Self {
      source_file: source_file.into(),
      fields,
    }
  }

  /// An all-null record for a file whose conversion or extraction produced
  /// nothing usable. Still a valid record: invariant 1 in the DATA MODEL
  /// section counts it among `processed_files`, not `invalid_files`.
  pub fn empty_for(source_file: impl Into<String>, field_keys: &[String]) -> Self {
    let fields = field_keys.iter().map(|k| (k.clone(), Value::Null)).collect();
    Self::new(source_file, fields)
  }

  /// Serialize into the single JSON object this record contributes to the
  /// aggregated JSON array, with `_source_file` folded in.
  pub fn to_json_object(&self) -> Value {
    let mut map = serde_json::Map::new();
    for (k, v) in &self.fields {
      map.insert(k.clone(), v.clone());
    }
    map.insert("_source_file".to_string(), Value::String(self.source_file.clone()));
    Value::Object(map)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
  Json,
  Sheet,
}

#[derive(Debug, Clone)]
pub struct Artifact {
  pub kind: ArtifactKind,
  pub object_key: String,
  pub byte_size: u64,
}

/// Sort records by source filename (invariant 5) and return the union of
/// field keys in sorted order, for spreadsheet column layout.
pub fn sorted_field_columns(records: &[Record]) -> Vec<String> {
  let mut columns: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
  for record in records {
    columns.extend(record.fields.keys().cloned());
  }
  columns.into_iter().collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn empty_record_has_null_fields() {
    let record = Record::empty_for("a.pdf", &["name".to_string(), "email".to_string()]);
    assert_eq!(record.fields.get("name"), Some(&Value::Null));
    assert_eq!(record.fields.get("email"), Some(&Value::Null));
  }

  #[test]
  fn to_json_object_includes_source_file() {
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), json!("Alice"));
    let record = Record::new("a.pdf", fields);
    let obj = record.to_json_object();
    assert_eq!(obj["_source_file"], json!("a.pdf"));
    assert_eq!(obj["name"], json!("Alice"));
  }

  #[test]
  fn sorted_field_columns_is_union_sorted() {
    let mut f1 = BTreeMap::new();
    f1.insert("zeta".to_string(), Value::Null);
    f1.insert("alpha".to_string(), Value::Null);
    let mut f2 = BTreeMap::new();
    f2.insert("beta".to_string(), Value::Null);
    let records = vec![Record::new("a", f1), Record::new("b", f2)];
    assert_eq!(sorted_field_columns(&records), vec!["alpha", "beta", "zeta"]);
  }
}
