//! Input validation utilities.
//!
//! Used at the two points where this process parses JSON it did not
//! construct itself: the broker envelope (`core::task::BrokerEnvelope`) and
//! registry API responses. Centralizes consistent error messages instead of
//! each call site hand-rolling `.ok_or_else(...)`.

use std::fmt;
use thiserror::Error;

/// A validation error with field information.
#[derive(Debug, Clone, Error)]
pub struct ValidationError {
  pub field: String,
  pub message: String,
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.field, self.message)
  }
}

impl ValidationError {
  pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      message: message.into(),
    }
  }

  pub fn missing(field: impl Into<String>) -> Self {
    let field = field.into();
    Self {
      message: format!("{} is required", field),
      field,
    }
  }

  pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
    Self {
      field: field.into(),
      message: format!("expected {}", expected),
    }
  }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a required string field in a parsed JSON envelope (e.g. a
/// registry response body that does not otherwise deserialize cleanly into
/// a typed struct).
pub fn require_string(value: Option<&serde_json::Value>, field: &str) -> ValidationResult<String> {
  match value {
    Some(v) => v
      .as_str()
      .map(String::from)
      .ok_or_else(|| ValidationError::invalid_type(field, "string")),
    None => Err(ValidationError::missing(field)),
  }
}

/// Validate an optional string field.
pub fn optional_string(value: Option<&serde_json::Value>, field: &str) -> ValidationResult<Option<String>> {
  match value {
    Some(v) if v.is_null() => Ok(None),
    Some(v) => v
      .as_str()
      .map(|s| Some(s.to_string()))
      .ok_or_else(|| ValidationError::invalid_type(field, "string")),
    None => Ok(None),
  }
}

/// Validate a required array field.
pub fn require_array(value: Option<&serde_json::Value>, field: &str) -> ValidationResult<Vec<serde_json::Value>> {
  match value {
    Some(v) => v
      .as_array()
      .cloned()
      .ok_or_else(|| ValidationError::invalid_type(field, "array")),
    None => Err(ValidationError::missing(field)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn missing_field_error_message() {
    let err = ValidationError::missing("taskId");
    assert_eq!(err.to_string(), "taskId: taskId is required");
  }

  #[test]
  fn require_string_rejects_non_string() {
    let v = json!(42);
    assert!(require_string(Some(&v), "name").is_err());
  }

  #[test]
  fn require_string_accepts_string() {
    let v = json!("hello");
    assert_eq!(require_string(Some(&v), "name").unwrap(), "hello");
  }

  #[test]
  fn optional_string_treats_null_as_none() {
    let v = json!(null);
    assert_eq!(optional_string(Some(&v), "name").unwrap(), None);
  }

  #[test]
  fn require_array_rejects_missing() {
    assert!(require_array(None, "items").is_err());
  }
}
