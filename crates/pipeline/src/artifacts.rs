//! Aggregator and Publisher: turn a task's `Record`s into the two artifacts
//! the registry expects back — a JSON array and an `.xlsx` spreadsheet — and
//! upload both to the aggregated-results bucket.
//!
//! Grounded on the original service's `_create_aggregated_results` /
//! `_create_excel_file` pair: sort by source filename, union the field keys
//! across every record for the spreadsheet's column set, null becomes an
//! empty cell rather than a literal "null" string.

use pipeline_core::record::{Record, sorted_field_columns};
use rust_xlsxwriter::{Workbook, XlsxError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
  #[error("failed to build spreadsheet: {0}")]
  Xlsx(#[from] XlsxError),
  #[error("failed to serialize json artifact: {0}")]
  Json(#[from] serde_json::Error),
}

pub struct Artifacts {
  pub json_bytes: Vec<u8>,
  pub sheet_bytes: Vec<u8>,
}

/// Object keys for the two artifacts a completed task publishes, per the
/// aggregated-results bucket layout.
pub fn artifact_keys(user_id: &str, task_id: &str, task_name: &str) -> (String, String) {
  let json_key = format!("aggregated-results/{user_id}/{task_id}/{task_name}-result.json");
  let sheet_key = format!("aggregated-results/{user_id}/{task_id}/{task_name}-result.xlsx");
  (json_key, sheet_key)
}

/// Build both artifacts from a task's records. Records are sorted by source
/// filename first (invariant 5), so both artifacts present files in the same
/// deterministic order regardless of the order extraction completed in.
pub fn build_artifacts(records: &[Record]) -> Result<Artifacts, ArtifactError> {
  let mut sorted = records.to_vec();
  sorted.sort_by(|a, b| a.source_file.cmp(&b.source_file));

  let json_bytes = build_json(&sorted)?;
  let sheet_bytes = build_sheet(&sorted)?;
  Ok(Artifacts { json_bytes, sheet_bytes })
}

fn build_json(records: &[Record]) -> Result<Vec<u8>, serde_json::Error> {
  let array: Vec<serde_json::Value> = records.iter().map(Record::to_json_object).collect();
  serde_json::to_vec_pretty(&array)
}

fn build_sheet(records: &[Record]) -> Result<Vec<u8>, XlsxError> {
  let columns = sorted_field_columns(records);

  let mut workbook = Workbook::new();
  let worksheet = workbook.add_worksheet();

  worksheet.write(0, 0, "_source_file")?;
  for (col_index, column) in columns.iter().enumerate() {
    worksheet.write(0, (col_index + 1) as u16, column.as_str())?;
  }

  for (row_index, record) in records.iter().enumerate() {
    let row = (row_index + 1) as u32;
    worksheet.write(row, 0, record.source_file.as_str())?;
    for (col_index, column) in columns.iter().enumerate() {
      let cell = record
        .fields
        .get(column)
        .map(value_to_cell_string)
        .unwrap_or_default();
      worksheet.write(row, (col_index + 1) as u16, cell.as_str())?;
    }
  }

  workbook.save_to_buffer()
}

/// `null` and missing fields both become an empty cell; strings are written
/// unquoted; anything else (numbers, bools, nested arrays/objects) falls
/// back to its JSON text form rather than silently dropping data the model
/// returned in an unexpected shape.
fn value_to_cell_string(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::Null => String::new(),
    serde_json::Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::collections::BTreeMap;

  fn record(source_file: &str, fields: &[(&str, serde_json::Value)]) -> Record {
    let mut map = BTreeMap::new();
    for (key, value) in fields {
      map.insert(key.to_string(), value.clone());
    }
    Record::new(source_file, map)
  }

  #[test]
  fn artifact_keys_follow_the_aggregated_results_layout() {
    let (json_key, sheet_key) = artifact_keys("u1", "t1", "My Task");
    assert_eq!(json_key, "aggregated-results/u1/t1/My Task-result.json");
    assert_eq!(sheet_key, "aggregated-results/u1/t1/My Task-result.xlsx");
  }

  #[test]
  fn build_artifacts_sorts_records_by_source_file() {
    let records = vec![
      record("z.pdf", &[("name", json!("Zed"))]),
      record("a.pdf", &[("name", json!("Alice"))]),
    ];
    let artifacts = build_artifacts(&records).unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_slice(&artifacts.json_bytes).unwrap();
    assert_eq!(parsed[0]["_source_file"], json!("a.pdf"));
    assert_eq!(parsed[1]["_source_file"], json!("z.pdf"));
    assert!(!artifacts.sheet_bytes.is_empty());
  }

  #[test]
  fn build_sheet_handles_an_empty_record_set() {
    let artifacts = build_artifacts(&[]).unwrap();
    assert!(!artifacts.sheet_bytes.is_empty());
    let parsed: Vec<serde_json::Value> = serde_json::from_slice(&artifacts.json_bytes).unwrap();
    assert!(parsed.is_empty());
  }
}
