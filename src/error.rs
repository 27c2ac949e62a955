//! Structured error types for task operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    ConflictError,
    NotFoundError,
    StorageError,
}

/// Failure of a task operation.
///
/// Validation, conflict and not-found failures are detected before any
/// write. Storage failures come from the store itself; every multi-row
/// write runs in a transaction, so a storage failure leaves no partial rows.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl TaskError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TaskError::Validation { .. } => ErrorCode::ValidationError,
            TaskError::Conflict(_) => ErrorCode::ConflictError,
            TaskError::NotFound { .. } => ErrorCode::NotFoundError,
            TaskError::Storage(_) => ErrorCode::StorageError,
        }
    }

    // Convenience constructors

    pub fn missing_field(field: &'static str) -> Self {
        TaskError::Validation {
            field,
            message: format!("{} is required", field),
        }
    }

    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        TaskError::Validation {
            field,
            message: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        TaskError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn task_not_found(task_id: impl fmt::Display) -> Self {
        Self::not_found("task", task_id)
    }

    pub fn duplicate_name(name: &str, scope: &str) -> Self {
        TaskError::Conflict(format!("Task: {} already exists in {}", name, scope))
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        TaskError::Storage(err.to_string())
    }

    /// Render the error as a serializable body for outer surfaces.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            field: match self {
                TaskError::Validation { field, .. } => Some(field.to_string()),
                _ => None,
            },
        }
    }
}

impl From<rusqlite::Error> for TaskError {
    fn from(err: rusqlite::Error) -> Self {
        TaskError::storage(err)
    }
}

impl From<refinery::Error> for TaskError {
    fn from(err: refinery::Error) -> Self {
        TaskError::storage(err)
    }
}

/// Structured error for command responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Result type for task operations.
pub type TaskResult<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_in_screaming_snake_case() {
        let body = TaskError::duplicate_name("Buy milk", "your task list").to_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "CONFLICT_ERROR");
        assert_eq!(json["message"], "Task: Buy milk already exists in your task list");
        assert!(json.get("field").is_none());
    }

    #[test]
    fn validation_body_carries_field() {
        let body = TaskError::missing_field("name").to_body();
        assert_eq!(body.code, ErrorCode::ValidationError);
        assert_eq!(body.field.as_deref(), Some("name"));
        assert_eq!(body.message, "name is required");
    }

    #[test]
    fn sqlite_errors_become_storage_errors() {
        let err: TaskError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.code(), ErrorCode::StorageError);
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = TaskError::task_not_found(42);
        assert_eq!(err.to_string(), "task not found: 42");
        assert_eq!(err.code(), ErrorCode::NotFoundError);
    }
}
