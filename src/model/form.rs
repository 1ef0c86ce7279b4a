//! Field-list descriptions for record forms
//!
//! The grid does not draw forms. It describes which fields a form shows, with
//! which values, and which of them may be edited; a form component renders
//! that description and hands the entered values back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::field::{FieldDescriptor, FieldType};
use crate::model::value::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    View,
    Edit,
    Create,
    Duplicate,
    Delete,
}

impl FormMode {
    pub fn title(&self) -> &'static str {
        match self {
            FormMode::View => "View",
            FormMode::Edit => "Edit",
            FormMode::Create => "Create",
            FormMode::Duplicate => "Duplicate",
            FormMode::Delete => "Delete",
        }
    }

    /// Whether any field of a form in this mode can be edited
    pub fn is_editable(&self) -> bool {
        matches!(self, FormMode::Edit | FormMode::Create | FormMode::Duplicate)
    }

    /// Whether the form starts from an existing row
    pub fn needs_row(&self) -> bool {
        !matches!(self, FormMode::Create)
    }
}

/// One entry of a generated form
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    pub value: Value,
    /// Rendered value, for read-only display
    pub display: String,
    pub readonly: bool,
    pub required: bool,
    pub options: Vec<String>,
}

/// Describe the form for `row` in `mode`
///
/// Identifier fields are read-only when editing an existing row, and are
/// cleared when duplicating so the copy gets its own identity.
pub fn form_for(fields: &[FieldDescriptor], row: Option<&Row>, mode: FormMode) -> Vec<FormField> {
    fields
        .iter()
        .map(|field| {
            let value = match (mode, row) {
                (FormMode::Create, _) | (_, None) => Value::Null,
                (FormMode::Duplicate, Some(_)) if field.identifier => Value::Null,
                (_, Some(row)) => row.get(&field.name).cloned().unwrap_or(Value::Null),
            };
            let readonly = match mode {
                FormMode::View | FormMode::Delete => true,
                FormMode::Edit => field.readonly || field.identifier,
                FormMode::Create | FormMode::Duplicate => field.readonly && !field.identifier,
            };
            FormField {
                name: field.name.clone(),
                label: field.display_label().to_string(),
                field_type: field.field_type,
                display: field.render(Some(&value)),
                value,
                readonly,
                required: field.required,
                options: field.options.clone(),
            }
        })
        .collect()
}

/// Collect the editable values of a submitted form into a row
pub fn form_values(form: &[FormField]) -> Row {
    form.iter()
        .filter(|f| !f.readonly && !f.value.is_null())
        .map(|f| (f.name.clone(), f.value.clone()))
        .collect()
}
