use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GridError, Result};
use crate::model::export::ExportOptions;
use crate::model::field::FieldDescriptor;
use crate::model::sort::SortState;

pub const DEFAULT_STORAGE_PREFIX: &str = "datagrid";

fn default_storage_prefix() -> String {
    DEFAULT_STORAGE_PREFIX.to_string()
}

/// Construction-time configuration of one grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub id: String,
    /// Name of the unique-key field, if rows have one
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,
    #[serde(default)]
    pub multi_select: bool,
    /// Clicking a selected row selects it again instead of deselecting it
    #[serde(default)]
    pub select_self: bool,
    #[serde(default)]
    pub default_sort: Option<SortState>,
    #[serde(default)]
    pub export: ExportOptions,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl GridConfig {
    pub fn new(id: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            id: id.into(),
            identifier: None,
            storage_prefix: default_storage_prefix(),
            multi_select: false,
            select_self: false,
            default_sort: None,
            export: ExportOptions::default(),
            fields,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_default_sort(mut self, sort: SortState) -> Self {
        self.default_sort = Some(sort);
        self
    }

    pub fn with_multi_select(mut self, multi_select: bool) -> Self {
        self.multi_select = multi_select;
        self
    }

    /// Load from a YAML (`.yaml`/`.yml`) or JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Check the configuration and settle derived values
    ///
    /// Rejects an empty id, duplicate field names, more than one identifier
    /// field, an identifier flag that contradicts `identifier`, and a default
    /// sort on an unknown field. Empty labels fall back to the field name and
    /// the identifier field is flagged.
    pub fn validate(mut self) -> Result<Self> {
        if self.id.trim().is_empty() {
            return Err(GridError::Config("grid id must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &mut self.fields {
            if !seen.insert(field.name.clone()) {
                return Err(GridError::DuplicateField(field.name.clone()));
            }
            if field.label.is_empty() {
                field.label = field.name.clone();
            }
        }

        let flagged: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.identifier)
            .map(|f| f.name.clone())
            .collect();
        if flagged.len() > 1 {
            return Err(GridError::MultipleIdentifiers(flagged));
        }

        match (&self.identifier, flagged.first()) {
            (Some(configured), Some(marked)) if configured != marked => {
                return Err(GridError::Config(format!(
                    "identifier `{}` disagrees with field `{}` marked as identifier",
                    configured, marked
                )));
            }
            (None, Some(marked)) => self.identifier = Some(marked.clone()),
            _ => {}
        }

        if let Some(identifier) = &self.identifier {
            for field in &mut self.fields {
                if &field.name == identifier {
                    field.identifier = true;
                }
            }
        }

        if let Some(sort) = &self.default_sort {
            if !self.fields.iter().any(|f| f.name == sort.field) {
                return Err(GridError::UnknownField(sort.field.clone()));
            }
        }

        Ok(self)
    }

    /// Application directory: `$HOME/.datagrid`
    pub fn config_dir() -> Option<PathBuf> {
        let home = env::var("HOME").ok()?;
        Some(PathBuf::from(home).join(".datagrid"))
    }

    /// Default directory for persisted grid state
    pub fn state_dir() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("state"))
    }
}
