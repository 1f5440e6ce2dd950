//! Error taxonomy for the ingestion pipeline and the retention store.
//!
//! Validation and aggregation failures carry enough detail for the caller to
//! fix the input. Storage failures are passed through opaquely.

use crate::models::DatasetId;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a storage backend. Never retried by the core.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt snapshot {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors surfaced by the core to its callers.
#[derive(Debug, Error)]
pub enum EquipError {
    /// The upload could not be decoded as a rectangular CSV table.
    #[error("malformed table: {0}")]
    MalformedTable(String),

    /// One or more required columns are absent (all of them are listed).
    #[error("CSV missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// The table has a valid header but no data rows.
    #[error("dataset has no rows; averages are undefined")]
    EmptyDataset,

    /// A numeric cell failed to parse as a finite number.
    #[error("row {row}: column '{column}' has non-numeric value '{value}'")]
    InvalidNumeric {
        row: usize,
        column: String,
        value: String,
    },

    /// The dataset is not retained for this owner (evicted, deleted, or never existed).
    #[error("dataset {id} not found")]
    NotFound { id: DatasetId },

    #[error("storage failure: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result alias used throughout the library.
pub type EquipResult<T> = Result<T, EquipError>;

/// Coarse classification a transport maps onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Internal,
}

/// Serializable error payload for transports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl EquipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EquipError::MalformedTable(_)
            | EquipError::MissingColumns(_)
            | EquipError::EmptyDataset
            | EquipError::InvalidNumeric { .. } => ErrorKind::InvalidInput,
            EquipError::NotFound { .. } => ErrorKind::NotFound,
            EquipError::Persistence(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EquipError::MalformedTable(_) => "malformed_table",
            EquipError::MissingColumns(_) => "missing_columns",
            EquipError::EmptyDataset => "empty_dataset",
            EquipError::InvalidNumeric { .. } => "invalid_numeric",
            EquipError::NotFound { .. } => "not_found",
            EquipError::Persistence(_) => "persistence",
        }
    }

    /// Build the payload a transport sends back to the caller.
    pub fn to_body(&self) -> ErrorBody {
        let (missing_columns, row, column) = match self {
            EquipError::MissingColumns(cols) => (cols.clone(), None, None),
            EquipError::InvalidNumeric { row, column, .. } => {
                (Vec::new(), Some(*row), Some(column.clone()))
            }
            _ => (Vec::new(), None, None),
        };

        ErrorBody {
            kind: self.kind(),
            code: self.code(),
            message: self.to_string(),
            missing_columns,
            row,
            column,
        }
    }
}
