//! Data sources that feed a grid
//!
//! A grid is populated from one of:
//! - rows already in memory
//! - a response body shaped `{ "data": [...] }` (or a bare array), optionally
//!   run through a transform first
//! - a JSON or CSV file on disk
//! - a [`Warehouse`], a cache-like collaborator that owns its own field list
//!
//! Resolving a source never touches grid state, so a failed resolve leaves the
//! grid exactly as it was.

use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::{GridError, Result};
use crate::model::field::{FieldDescriptor, FieldType};
use crate::model::value::{self, Row};

/// Rewrites a parsed response before rows are extracted from it
pub type Transform = Box<dyn FnOnce(Value) -> Result<Value> + Send>;

/// Cache-like row provider that carries its own field configuration
pub trait Warehouse: Send {
    fn fields(&self) -> Vec<FieldDescriptor>;

    fn identifier(&self) -> Option<String> {
        None
    }

    /// Hand rows to `deliver`, in one or more batches
    fn load(&mut self, deliver: &mut dyn FnMut(Vec<Row>)) -> Result<()>;
}

pub enum DataSource {
    Rows(Vec<Row>),
    Response {
        body: String,
        transform: Option<Transform>,
    },
    File(PathBuf),
    Warehouse(Box<dyn Warehouse>),
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Rows(rows) => write!(f, "Rows({})", rows.len()),
            DataSource::Response { body, transform } => f
                .debug_struct("Response")
                .field("bytes", &body.len())
                .field("transform", &transform.is_some())
                .finish(),
            DataSource::File(path) => write!(f, "File({})", path.display()),
            DataSource::Warehouse(_) => f.write_str("Warehouse"),
        }
    }
}

/// Rows resolved from a source, plus whatever field configuration it carried
#[derive(Debug, Clone, Default)]
pub struct LoadedRows {
    pub rows: Vec<Row>,
    /// Empty unless the source supplies its own fields
    pub fields: Vec<FieldDescriptor>,
    pub identifier: Option<String>,
}

impl LoadedRows {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }
}

impl DataSource {
    pub fn response(body: impl Into<String>) -> Self {
        DataSource::Response {
            body: body.into(),
            transform: None,
        }
    }

    pub fn response_with(body: impl Into<String>, transform: Transform) -> Self {
        DataSource::Response {
            body: body.into(),
            transform: Some(transform),
        }
    }

    /// Produce the rows; blocking for file and warehouse sources
    pub fn resolve(self) -> Result<LoadedRows> {
        match self {
            DataSource::Rows(rows) => Ok(LoadedRows::from_rows(rows)),
            DataSource::Response { body, transform } => {
                let mut parsed: Value = serde_json::from_str(&body)
                    .map_err(|e| GridError::MalformedResponse(e.to_string()))?;
                if let Some(transform) = transform {
                    parsed = transform(parsed)?;
                }
                Ok(LoadedRows::from_rows(rows_from_response(parsed)?))
            }
            DataSource::File(path) => {
                let contents = fs::read_to_string(&path)?;
                let rows = match path.extension().and_then(|e| e.to_str()) {
                    Some("csv") => rows_from_csv(&contents)?,
                    _ => parse_response(&contents)?,
                };
                Ok(LoadedRows::from_rows(rows))
            }
            DataSource::Warehouse(mut warehouse) => {
                let mut rows = Vec::new();
                warehouse.load(&mut |batch| rows.extend(batch))?;
                Ok(LoadedRows {
                    rows,
                    fields: warehouse.fields(),
                    identifier: warehouse.identifier(),
                })
            }
        }
    }
}

/// Parse a response body into rows
pub fn parse_response(body: &str) -> Result<Vec<Row>> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| GridError::MalformedResponse(e.to_string()))?;
    rows_from_response(parsed)
}

/// Extract rows from `{ "data": [...] }` or a bare array of objects
pub fn rows_from_response(response: Value) -> Result<Vec<Row>> {
    let items = match response {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(GridError::MalformedResponse(
                    "`data` is not an array".to_string(),
                ))
            }
            None => {
                return Err(GridError::MalformedResponse(
                    "response has no `data` member".to_string(),
                ))
            }
        },
        _ => {
            return Err(GridError::MalformedResponse(
                "expected an object or an array".to_string(),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            value::row_from_value(item)
                .ok_or_else(|| GridError::MalformedResponse(format!("item {} is not an object", index)))
        })
        .collect()
}

/// Read a headed CSV file; every cell becomes a string value
pub fn rows_from_csv(contents: &str) -> Result<Vec<Row>> {
    let mut reader = csv::Reader::from_reader(contents.as_bytes());
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(name, cell)| (name.to_string(), Value::String(cell.to_string())))
                .collect(),
        );
    }
    Ok(rows)
}

/// Derive field descriptors from the rows themselves
///
/// Rows keep their keys sorted, so each row contributes its columns
/// alphabetically; a column first met in a later row goes after all columns
/// of the earlier rows. A column is typed by every non-empty value it holds:
/// all numbers (or numeric text) make a number column, all booleans a
/// boolean column, all arrays a string array, all `YYYY-MM-DD` text a date
/// column. Anything mixed is a string column. A column called `id` becomes
/// the identifier.
pub fn infer_fields(rows: &[Row]) -> Vec<FieldDescriptor> {
    let mut names: Vec<&String> = Vec::new();
    for row in rows {
        for name in row.keys() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    names
        .into_iter()
        .map(|name| {
            let values: Vec<&Value> = rows
                .iter()
                .filter_map(|row| row.get(name))
                .filter(|v| !value::is_missing(Some(v)))
                .collect();
            let mut field = FieldDescriptor::new(name.clone(), infer_type(&values));
            if name == "id" {
                field.identifier = true;
            }
            field
        })
        .collect()
}

fn infer_type(values: &[&Value]) -> FieldType {
    if values.is_empty() {
        return FieldType::String;
    }
    let all = |check: fn(&Value) -> bool| values.iter().all(|v| check(v));

    if all(|v| v.is_boolean()) {
        FieldType::Boolean
    } else if all(|v| v.is_array()) {
        FieldType::StringArray
    } else if all(|v| v.is_number() || v.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())) {
        FieldType::Number
    } else if all(|v| v.as_str().is_some_and(looks_like_date)) {
        FieldType::Date
    } else {
        FieldType::String
    }
}

fn looks_like_date(s: &str) -> bool {
    let s = s.trim();
    s.len() >= 10
        && s.as_bytes().get(4) == Some(&b'-')
        && value::parse_timestamp_str(s).is_some()
}
