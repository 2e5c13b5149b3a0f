//! The task registry's view of one extraction job, and the work unit that
//! triggers processing of it.

use crate::ids::{TaskId, UserId};
use serde::{Deserialize, Serialize};

/// Closed set of registry task statuses (see the GLOSSARY / §6 of the spec
/// this crate implements). The pipeline only ever *writes* `Completed` and
/// `Failed`; the others are read-only states this process observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
  Created,
  Extracting,
  Converting,
  ExtractingInfo,
  Aggregating,
  Completed,
  Failed,
}

impl TaskStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, TaskStatus::Completed | TaskStatus::Failed)
  }
}

/// Whether the work unit's source files must be recursively extracted from
/// an archive, or are already registered as individual objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProcessingMode {
  #[default]
  Archive,
  Direct,
}

/// One decoded, validated broker delivery. Created by the consumer after
/// envelope validation; consumed by exactly one `TaskPipeline` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
  pub user_id: UserId,
  pub task_id: TaskId,
  #[serde(default)]
  pub mode: ProcessingMode,
}

/// Raw broker envelope shape, decoded before being turned into a `WorkUnit`.
/// Kept separate from `WorkUnit` so validation failures can be reported
/// against field names the producer actually sent.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerEnvelope {
  #[serde(rename = "userId")]
  pub user_id: Option<String>,
  #[serde(rename = "taskId")]
  pub task_id: Option<String>,
  #[serde(rename = "extractFromArchive", default = "default_true")]
  pub extract_from_archive: bool,
}

fn default_true() -> bool {
  true
}

impl BrokerEnvelope {
  pub fn into_work_unit(self) -> Result<WorkUnit, crate::error::Error> {
    let user_id = self
      .user_id
      .filter(|s| !s.is_empty())
      .ok_or_else(|| crate::error::Error::BadMessage("missing userId".into()))?;
    let task_id = self
      .task_id
      .filter(|s| !s.is_empty())
      .ok_or_else(|| crate::error::Error::BadMessage("missing taskId".into()))?;
    Ok(WorkUnit {
      user_id: UserId::new(user_id),
      task_id: TaskId::new(task_id),
      mode: if self.extract_from_archive {
        ProcessingMode::Archive
      } else {
        ProcessingMode::Direct
      },
    })
  }
}

/// The registry's Task record, trimmed to the fields this process reads or
/// writes (invariants 1, 3, 4 in the spec's DATA MODEL section apply to
/// these fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
  pub id: TaskId,
  #[serde(rename = "taskName")]
  pub name: String,
  #[serde(rename = "taskStatus")]
  pub status: TaskStatus,
  #[serde(rename = "totalFiles", default)]
  pub total_files: u64,
  #[serde(rename = "processedFiles", default)]
  pub processed_files: u64,
  #[serde(rename = "invalidFiles", default)]
  pub invalid_files: u64,
  #[serde(rename = "jsonFilePath", default)]
  pub json_path: Option<String>,
  #[serde(rename = "sheetFilePath", default)]
  pub sheet_path: Option<String>,
  #[serde(rename = "errorMessage", default)]
  pub error: Option<String>,
}

/// One declared source file in direct mode, as returned by
/// `fetch_parseable_files` / submitted via `insert_parseable_files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseableFile {
  #[serde(rename = "bucketName")]
  pub bucket_name: String,
  #[serde(rename = "fileName")]
  pub file_name: String,
  #[serde(rename = "filePath")]
  pub file_path: String,
  #[serde(rename = "originalName")]
  pub original_name: String,
  #[serde(rename = "contentType")]
  pub content_type: String,
  pub size: u64,
  #[serde(rename = "parsingTaskId")]
  pub parsing_task_id: TaskId,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_envelope_missing_task_id() {
    let env = BrokerEnvelope {
      user_id: Some("u1".into()),
      task_id: None,
      extract_from_archive: true,
    };
    assert!(env.into_work_unit().is_err());
  }

  #[test]
  fn rejects_envelope_with_empty_user_id() {
    let env = BrokerEnvelope {
      user_id: Some(String::new()),
      task_id: Some("t1".into()),
      extract_from_archive: true,
    };
    assert!(env.into_work_unit().is_err());
  }

  #[test]
  fn defaults_to_archive_mode() {
    let env = BrokerEnvelope {
      user_id: Some("u1".into()),
      task_id: Some("t1".into()),
      extract_from_archive: true,
    };
    let unit = env.into_work_unit().unwrap();
    assert_eq!(unit.mode, ProcessingMode::Archive);
  }

  #[test]
  fn direct_mode_when_flag_false() {
    let env = BrokerEnvelope {
      user_id: Some("u1".into()),
      task_id: Some("t1".into()),
      extract_from_archive: false,
    };
    let unit = env.into_work_unit().unwrap();
    assert_eq!(unit.mode, ProcessingMode::Direct);
  }

  #[test]
  fn terminal_statuses() {
    assert!(TaskStatus::Completed.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(!TaskStatus::Converting.is_terminal());
  }
}
