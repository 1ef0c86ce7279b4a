//! datagrid - client-side tabular data management
//!
//! Sorting, multi-field filtering, search, column visibility, CSV export, row
//! selection and view-state persistence over rows of JSON-like records. The
//! crate has no rendering of its own; the `datagrid` binary is one front end.

pub mod config;
pub mod error;
pub mod model;
pub mod services;

pub use config::GridConfig;
pub use error::{GridError, Result};
pub use model::{DataList, GridController};
