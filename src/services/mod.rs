//! Data-source services
//!
//! - `source` - in-memory, response, file and warehouse sources
//! - `loader` - background resolution with request sequencing and timeout

pub mod loader;
pub mod source;

pub use loader::SourceLoader;
pub use source::{infer_fields, parse_response, DataSource, LoadedRows, Warehouse};
