//! Error type shared by the grid library

use std::time::Duration;
use thiserror::Error;

use crate::model::field::{Comparator, FieldType};

/// Errors raised by grid configuration, data loading and export
#[derive(Debug, Error)]
pub enum GridError {
    #[error("field `{0}` is not defined")]
    UnknownField(String),

    #[error("field `{0}` is defined more than once")]
    DuplicateField(String),

    #[error("more than one identifier field: {}", .0.join(", "))]
    MultipleIdentifiers(Vec<String>),

    #[error("comparator `{comparator}` is not valid for {field_type} field `{field}`")]
    InvalidComparator {
        field: String,
        field_type: FieldType,
        comparator: Comparator,
    },

    #[error("field `{0}` is not filterable")]
    NotFilterable(String),

    #[error("field `{0}` is not sortable")]
    NotSortable(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidFilterValue { field: String, reason: String },

    #[error("malformed data source response: {0}")]
    MalformedResponse(String),

    #[error("row `{0}` not found")]
    RowNotFound(String),

    #[error("a row with identifier `{0}` already exists")]
    DuplicateIdentifier(String),

    #[error("data source timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, GridError>;
