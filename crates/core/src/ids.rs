//! Identifier newtypes.
//!
//! Unlike the content-addressed document/memory ids this crate's ancestor used
//! (locally generated `Uuid::now_v7()` values), task and user ids here are
//! assigned by the task registry. They are opaque strings from this crate's
//! point of view; the newtype wrapper exists purely to stop them being
//! swapped at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<String> for TaskId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<String> for UserId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn displays_inner_value() {
    let id = TaskId::new("t1");
    assert_eq!(id.to_string(), "t1");
    assert_eq!(id.as_str(), "t1");
  }
}
