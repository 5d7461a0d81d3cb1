//! Error types for the cellfreq library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum FreqError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Storage error during {operation}: {source}")]
    Storage {
        operation: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Table '{0}' does not exist")]
    MissingTable(String),

    #[error("No '{response}' observations for cell type '{cell_type}', cannot compare groups")]
    EmptyGroup { cell_type: String, response: String },

    #[error("Sample '{0}' has zero total counts, cannot compute frequencies")]
    ZeroTotal(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FreqError {
    /// Wrap a storage error, surfacing constraint violations as their own kind.
    pub fn storage(operation: &str, source: rusqlite::Error) -> Self {
        match &source {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let detail = msg.clone().unwrap_or_else(|| err.to_string());
                FreqError::Constraint(format!("{}: {}", operation, detail))
            }
            _ => FreqError::Storage {
                operation: operation.to_string(),
                source,
            },
        }
    }

    /// Closure form of [`FreqError::storage`] for use with `map_err`.
    pub fn during(operation: &str) -> impl FnOnce(rusqlite::Error) -> Self + '_ {
        move |source| Self::storage(operation, source)
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, FreqError>;
