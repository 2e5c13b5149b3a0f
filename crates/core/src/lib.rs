pub mod config;
pub mod error;
pub mod extensions;
pub mod ids;
pub mod record;
pub mod scratch;
pub mod task;
pub mod validation;

pub use config::{ConcurrencyConfig, Config, ConfigError, LlmConfig, ObjectStoreConfig};
pub use error::{Error, Result};
pub use extensions::{FileClass, classify, guess_content_type, is_supported};
pub use ids::{TaskId, UserId};
pub use record::{Artifact, ArtifactKind, Record, sorted_field_columns};
pub use scratch::{ScratchFile, TextDocument};
pub use task::{BrokerEnvelope, ParseableFile, ProcessingMode, Task, TaskStatus, WorkUnit};
pub use validation::{ValidationError, ValidationResult, optional_string, require_array, require_string};
