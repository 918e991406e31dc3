use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GradeError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("unreadable workbook: {0}")]
    Parse(String),

    #[error("cannot average {field} over an empty class")]
    EmptyDataset { field: String },

    #[error("{message}")]
    NotFound {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GradeError>;

impl GradeError {
    pub fn validation_with(message: impl Into<String>, details: serde_json::Value) -> Self {
        GradeError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(message: impl Into<String>, details: serde_json::Value) -> Self {
        GradeError::NotFound {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Stable code reported to the IPC client.
    pub fn code(&self) -> &'static str {
        match self {
            GradeError::Validation { .. } => "validation_failed",
            GradeError::Parse(_) => "parse_failed",
            GradeError::EmptyDataset { .. } => "empty_dataset",
            GradeError::NotFound { .. } => "not_found",
            GradeError::Io(_) => "io_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GradeError::Validation { details, .. } | GradeError::NotFound { details, .. } => {
                details.clone()
            }
            GradeError::EmptyDataset { field } => Some(json!({ "field": field })),
            GradeError::Parse(_) | GradeError::Io(_) => None,
        }
    }
}
