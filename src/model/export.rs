//! CSV serialization of grid rows
//!
//! Every cell is quoted, cells are separated by commas and rows by CRLF.
//! Embedded quotes are backslash-escaped by default (`"He said \"hi\""`),
//! and backslashes are doubled so [`read_csv`] gets the text back intact;
//! [`QuoteEscape::Doubled`] switches to RFC 4180 doubling for spreadsheet
//! tools.

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GridError, Result};
use crate::model::field::{FieldDescriptor, FieldType, DEFAULT_ARRAY_SEPARATOR};
use crate::model::value::{self, Row};

pub const CSV_MIME_TYPE: &str = "text/csv";

/// Which header row to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    #[default]
    Labels,
    Names,
    None,
}

impl HeaderMode {
    pub fn all() -> [HeaderMode; 3] {
        [HeaderMode::Labels, HeaderMode::Names, HeaderMode::None]
    }

    pub fn label(&self) -> &'static str {
        match self {
            HeaderMode::Labels => "Column labels",
            HeaderMode::Names => "Field names",
            HeaderMode::None => "No header",
        }
    }
}

/// How quote characters inside a cell are escaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteEscape {
    #[default]
    Backslash,
    Doubled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub header: HeaderMode,
    /// Skip hidden columns and filtered-out rows
    pub obey_view: bool,
    pub array_separator: String,
    pub escape: QuoteEscape,
    pub filename: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            header: HeaderMode::Labels,
            obey_view: true,
            array_separator: DEFAULT_ARRAY_SEPARATOR.to_string(),
            escape: QuoteEscape::Backslash,
            filename: None,
        }
    }
}

/// A finished export, ready to hand to whatever saves or downloads it
#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    pub filename: String,
    pub mime_type: &'static str,
    pub content: String,
}

/// Text written for one cell
pub fn export_value(field: &FieldDescriptor, raw: Option<&Value>, array_separator: &str) -> String {
    if value::is_missing(raw) {
        return String::new();
    }
    match field.field_type {
        FieldType::Date => value::parse_timestamp(raw)
            .and_then(value::format_iso)
            .unwrap_or_else(|| value::text(raw)),
        FieldType::Time => value::parse_timestamp(raw)
            .and_then(value::format_time)
            .unwrap_or_else(|| value::text(raw)),
        FieldType::StringArray => value::text_with_separator(raw, array_separator),
        _ => value::text(raw),
    }
}

fn writer_builder(escape: QuoteEscape) -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .double_quote(escape == QuoteEscape::Doubled)
        .escape(b'\\');
    builder
}

/// The csv writer escapes quotes but not the escape byte itself, so a
/// backslash is doubled up front to keep `read_csv` lossless
fn escape_cell(text: &str, escape: QuoteEscape) -> String {
    match escape {
        QuoteEscape::Backslash => text.replace('\\', "\\\\"),
        QuoteEscape::Doubled => text.to_string(),
    }
}

/// Serialize `rows` restricted to `fields`
pub fn export_csv<'a>(
    fields: &[&FieldDescriptor],
    rows: impl IntoIterator<Item = &'a Row>,
    options: &ExportOptions,
) -> Result<String> {
    let mut writer = writer_builder(options.escape).from_writer(Vec::new());

    let escape = options.escape;
    match options.header {
        HeaderMode::Labels => {
            writer.write_record(fields.iter().map(|f| escape_cell(f.display_label(), escape)))?
        }
        HeaderMode::Names => writer.write_record(fields.iter().map(|f| escape_cell(&f.name, escape)))?,
        HeaderMode::None => {}
    }

    for row in rows {
        writer.write_record(fields.iter().map(|f| {
            let text = export_value(f, row.get(&f.name), &options.array_separator);
            escape_cell(&text, escape)
        }))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| GridError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| GridError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Parse CSV written with the given quote escaping back into records
pub fn read_csv(text: &str, escape: QuoteEscape) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .double_quote(escape == QuoteEscape::Doubled)
        .escape(match escape {
            QuoteEscape::Backslash => Some(b'\\'),
            QuoteEscape::Doubled => None,
        })
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::row_from_value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("name", FieldType::String).with_label("Name"),
            FieldDescriptor::new("tags", FieldType::StringArray).with_label("Tags"),
            FieldDescriptor::new("born", FieldType::Date).with_label("Born"),
        ]
    }

    fn rows() -> Vec<Row> {
        vec![
            row_from_value(json!({"name": "Bo", "tags": ["a", "b"], "born": "1990-06-15"})).unwrap(),
            row_from_value(json!({"name": "Al"})).unwrap(),
        ]
    }

    #[test]
    fn test_export_with_labels() {
        let fields = fields();
        let refs: Vec<&FieldDescriptor> = fields.iter().collect();
        let options = ExportOptions {
            array_separator: "|".to_string(),
            ..ExportOptions::default()
        };
        let csv = export_csv(&refs, &rows(), &options).unwrap();
        assert_eq!(
            csv,
            "\"Name\",\"Tags\",\"Born\"\r\n\
             \"Bo\",\"a|b\",\"1990-06-15T00:00:00.000Z\"\r\n\
             \"Al\",\"\",\"\"\r\n"
        );
    }

    #[test]
    fn test_export_header_modes() {
        let fields = fields();
        let refs: Vec<&FieldDescriptor> = fields.iter().take(1).collect();
        let data = rows();

        let names = ExportOptions {
            header: HeaderMode::Names,
            ..ExportOptions::default()
        };
        assert!(export_csv(&refs, &data, &names).unwrap().starts_with("\"name\"\r\n"));

        let none = ExportOptions {
            header: HeaderMode::None,
            ..ExportOptions::default()
        };
        assert_eq!(export_csv(&refs, &data, &none).unwrap(), "\"Bo\"\r\n\"Al\"\r\n");
    }

    #[test]
    fn test_backslash_escaping_round_trip() {
        let field = FieldDescriptor::new("quote", FieldType::String);
        let row = row_from_value(json!({"quote": "He said \"hi\""})).unwrap();
        let options = ExportOptions {
            header: HeaderMode::None,
            ..ExportOptions::default()
        };

        let csv = export_csv(&[&field], [&row], &options).unwrap();
        assert_eq!(csv, "\"He said \\\"hi\\\"\"\r\n");

        let parsed = read_csv(&csv, QuoteEscape::Backslash).unwrap();
        assert_eq!(parsed, vec![vec!["He said \"hi\"".to_string()]]);
    }

    #[test]
    fn test_backslashes_survive_round_trip() {
        let field = FieldDescriptor::new("path", FieldType::String).with_label("Path\\Name");
        let rows = vec![
            row_from_value(json!({"path": "C:\\temp\\new"})).unwrap(),
            row_from_value(json!({"path": "ends with\\"})).unwrap(),
        ];

        let csv = export_csv(&[&field], &rows, &ExportOptions::default()).unwrap();
        assert_eq!(csv, "\"Path\\\\Name\"\r\n\"C:\\\\temp\\\\new\"\r\n\"ends with\\\\\"\r\n");

        let parsed = read_csv(&csv, QuoteEscape::Backslash).unwrap();
        assert_eq!(
            parsed,
            vec![
                vec!["Path\\Name".to_string()],
                vec!["C:\\temp\\new".to_string()],
                vec!["ends with\\".to_string()],
            ]
        );
    }

    #[test]
    fn test_doubled_escaping_round_trip() {
        let field = FieldDescriptor::new("quote", FieldType::String);
        let row = row_from_value(json!({"quote": "He said \"hi\", twice"})).unwrap();
        let options = ExportOptions {
            header: HeaderMode::None,
            escape: QuoteEscape::Doubled,
            ..ExportOptions::default()
        };

        let csv = export_csv(&[&field], [&row], &options).unwrap();
        assert_eq!(csv, "\"He said \"\"hi\"\", twice\"\r\n");
        assert_eq!(
            read_csv(&csv, QuoteEscape::Doubled).unwrap(),
            vec![vec!["He said \"hi\", twice".to_string()]]
        );
    }
}
