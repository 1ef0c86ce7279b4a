//! Column descriptors
//!
//! A [`FieldDescriptor`] carries a column's datatype contract: how its values
//! are rendered, which filter comparators apply, and the flags that drive
//! column visibility, identity and duplicate-cell de-emphasis.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::model::value::{self, Row};

/// Custom cell renderer: raw value (absent for missing keys) to display text
pub type Renderer = Arc<dyn Fn(Option<&Value>) -> String + Send + Sync>;

/// Default separator for `stringarray` cells
pub const DEFAULT_ARRAY_SEPARATOR: &str = ", ";

/// Sentinels used when rendering boolean cells
pub const TRUE_LABEL: &str = "Yes";
pub const FALSE_LABEL: &str = "No";

/// Column datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Paragraph,
    Number,
    Boolean,
    Date,
    Time,
    Url,
    ImageUrl,
    Email,
    Enumeration,
    StringArray,
    /// Any type name this crate does not know; treated as plain text
    #[serde(other)]
    Unknown,
}

impl FieldType {
    pub fn all() -> [FieldType; 11] {
        [
            FieldType::String,
            FieldType::Paragraph,
            FieldType::Number,
            FieldType::Boolean,
            FieldType::Date,
            FieldType::Time,
            FieldType::Url,
            FieldType::ImageUrl,
            FieldType::Email,
            FieldType::Enumeration,
            FieldType::StringArray,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Paragraph => "paragraph",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Url => "url",
            FieldType::ImageUrl => "imageurl",
            FieldType::Email => "email",
            FieldType::Enumeration => "enumeration",
            FieldType::StringArray => "stringarray",
            FieldType::Unknown => "unknown",
        }
    }

    /// Whether values of this type are compared as timestamps
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Time)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filter comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Contains,
    NotContains,
    Equals,
    DoesNotEqual,
    StartsWith,
    EndsWith,
    IsBefore,
    IsAfter,
    IsGreaterThan,
    IsLessThan,
}

impl Comparator {
    /// Stable identifier, as written to persisted state
    pub fn id(&self) -> &'static str {
        match self {
            Comparator::Contains => "contains",
            Comparator::NotContains => "notcontains",
            Comparator::Equals => "equals",
            Comparator::DoesNotEqual => "doesnotequal",
            Comparator::StartsWith => "startswith",
            Comparator::EndsWith => "endswith",
            Comparator::IsBefore => "isbefore",
            Comparator::IsAfter => "isafter",
            Comparator::IsGreaterThan => "isgreaterthan",
            Comparator::IsLessThan => "islessthan",
        }
    }

    /// Human label used in filter tags and dialogs
    pub fn label(&self) -> &'static str {
        match self {
            Comparator::Contains => "contains",
            Comparator::NotContains => "does not contain",
            Comparator::Equals => "equals",
            Comparator::DoesNotEqual => "does not equal",
            Comparator::StartsWith => "starts with",
            Comparator::EndsWith => "ends with",
            Comparator::IsBefore => "is before",
            Comparator::IsAfter => "is after",
            Comparator::IsGreaterThan => "is greater than",
            Comparator::IsLessThan => "is less than",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Valid comparators for a datatype, in presentation order
pub fn comparators_for(field_type: FieldType) -> &'static [Comparator] {
    match field_type {
        FieldType::Number => &[
            Comparator::Equals,
            Comparator::DoesNotEqual,
            Comparator::IsGreaterThan,
            Comparator::IsLessThan,
        ],
        FieldType::Date | FieldType::Time => &[
            Comparator::Equals,
            Comparator::DoesNotEqual,
            Comparator::IsBefore,
            Comparator::IsAfter,
        ],
        FieldType::Boolean | FieldType::Enumeration => {
            &[Comparator::Equals, Comparator::DoesNotEqual]
        }
        _ => &[
            Comparator::Contains,
            Comparator::NotContains,
            Comparator::Equals,
            Comparator::DoesNotEqual,
            Comparator::StartsWith,
            Comparator::EndsWith,
        ],
    }
}

fn default_true() -> bool {
    true
}

/// Describes one column
#[derive(Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub identifier: bool,
    /// Excluded from duplicate-cell de-emphasis
    #[serde(default)]
    pub nodupe: bool,
    /// Not editable in generated forms
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub required: bool,
    /// Allowed values of an `enumeration` field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Join separator for `stringarray` cells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(skip)]
    pub renderer: Option<Renderer>,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("field_type", &self.field_type)
            .field("filterable", &self.filterable)
            .field("hidden", &self.hidden)
            .field("identifier", &self.identifier)
            .field("nodupe", &self.nodupe)
            .field("renderer", &self.renderer.as_ref().map(|_| "custom"))
            .finish_non_exhaustive()
    }
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            field_type,
            filterable: true,
            sortable: true,
            hidden: false,
            identifier: false,
            nodupe: false,
            readonly: false,
            required: false,
            options: Vec::new(),
            separator: None,
            renderer: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn nodupe(mut self) -> Self {
        self.nodupe = true;
        self
    }

    pub fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    /// Label for display, falling back to the field name
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }

    pub fn array_separator(&self) -> &str {
        self.separator.as_deref().unwrap_or(DEFAULT_ARRAY_SEPARATOR)
    }

    pub fn comparators(&self) -> &'static [Comparator] {
        comparators_for(self.field_type)
    }

    pub fn accepts(&self, comparator: Comparator) -> bool {
        self.comparators().contains(&comparator)
    }

    /// Render this column's cell of `row`
    pub fn render_cell(&self, row: &Row) -> String {
        self.render(row.get(&self.name))
    }

    /// Display text for a raw value; never fails
    pub fn render(&self, raw: Option<&Value>) -> String {
        if let Some(renderer) = &self.renderer {
            return renderer(raw);
        }
        if value::is_missing(raw) {
            return String::new();
        }

        match self.field_type {
            FieldType::StringArray => value::text_with_separator(raw, self.array_separator()),
            FieldType::Date => value::parse_timestamp(raw)
                .and_then(value::format_date)
                .unwrap_or_else(|| value::text(raw)),
            FieldType::Time => value::parse_timestamp(raw)
                .and_then(value::format_time)
                .unwrap_or_else(|| value::text(raw)),
            FieldType::Boolean => match raw {
                Some(Value::Bool(true)) => TRUE_LABEL.to_string(),
                Some(Value::Bool(false)) => FALSE_LABEL.to_string(),
                _ => value::text(raw),
            },
            FieldType::Email => format!("<{}>", value::text(raw)),
            FieldType::ImageUrl => format!("[image] {}", value::text(raw)),
            FieldType::Paragraph => value::text(raw)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
            FieldType::String
            | FieldType::Number
            | FieldType::Url
            | FieldType::Enumeration
            | FieldType::Unknown => value::text(raw),
        }
    }
}

/// Look up a descriptor by field name
pub fn find<'a>(fields: &'a [FieldDescriptor], name: &str) -> Option<&'a FieldDescriptor> {
    fields.iter().find(|f| f.name == name)
}
