//! Authoritative in-memory row collection
//!
//! Rows keep insertion order. Display order is derived elsewhere and refers
//! back to rows through their [`RowKey`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::model::value::{self, Row};

/// Stable identity of a row
///
/// Rows with a value in the configured identifier field are keyed by that
/// value's text; all others get an opaque token generated on insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKey {
    Id(String),
    Token(u64),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Id(id) => f.write_str(id),
            RowKey::Token(token) => write!(f, "#{}", token),
        }
    }
}

/// A row plus the token assigned when it was stored
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub token: u64,
    pub data: Row,
}

#[derive(Debug, Clone, Default)]
pub struct RowStore {
    identifier: Option<String>,
    rows: Vec<StoredRow>,
    next_token: u64,
    /// Identifier text to the position of the first row carrying it
    ids: HashMap<String, usize>,
    tokens: HashMap<u64, usize>,
}

impl RowStore {
    pub fn new(identifier: Option<String>) -> Self {
        Self {
            identifier,
            ..Self::default()
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Identifier text of a row, if the store has an identifier field and the
    /// row carries a value for it
    pub fn id_of(&self, row: &Row) -> Option<String> {
        let field = self.identifier.as_deref()?;
        let raw = row.get(field);
        if value::is_missing(raw) {
            None
        } else {
            Some(value::text(raw))
        }
    }

    pub fn key_of(&self, stored: &StoredRow) -> RowKey {
        match self.id_of(&stored.data) {
            Some(id) => RowKey::Id(id),
            None => RowKey::Token(stored.token),
        }
    }

    /// Append a row without any uniqueness check
    pub fn insert(&mut self, row: Row) -> RowKey {
        let token = self.next_token;
        self.next_token += 1;
        let position = self.rows.len();
        let stored = StoredRow { token, data: row };
        let key = self.key_of(&stored);
        if let RowKey::Id(id) = &key {
            self.ids.entry(id.clone()).or_insert(position);
        }
        self.tokens.insert(token, position);
        self.rows.push(stored);
        key
    }

    /// Merge into the row with the same identifier, or append
    ///
    /// Merging is a shallow overwrite of the incoming keys; keys the incoming
    /// row does not mention are left untouched.
    pub fn upsert_by_identifier(&mut self, row: Row) -> RowKey {
        let Some(id) = self.id_of(&row) else {
            return self.insert(row);
        };

        match self.ids.get(&id).copied() {
            Some(index) => {
                let existing = &mut self.rows[index].data;
                for (field, v) in row {
                    existing.insert(field, v);
                }
                RowKey::Id(id)
            }
            None => self.insert(row),
        }
    }

    /// Shallow-merge `changes` into the row at `key`; returns the row's key
    /// afterwards, which differs from `key` when the identifier changed
    pub fn merge(&mut self, key: &RowKey, changes: Row) -> Option<RowKey> {
        let index = self.position(key)?;
        let stored = &mut self.rows[index];
        for (field, v) in changes {
            stored.data.insert(field, v);
        }
        let updated = self.key_of(&self.rows[index]);
        if &updated != key {
            self.reindex();
        }
        Some(updated)
    }

    /// Remove the first row with identifier `id`; absent ids are a no-op
    pub fn remove_by_identifier(&mut self, id: &str) -> Option<Row> {
        let index = self.ids.get(id).copied()?;
        Some(self.remove_at(index))
    }

    pub fn remove(&mut self, key: &RowKey) -> Option<Row> {
        let index = self.position(key)?;
        Some(self.remove_at(index))
    }

    fn remove_at(&mut self, index: usize) -> Row {
        let stored = self.rows.remove(index);
        self.reindex();
        stored.data
    }

    /// Clear and bulk insert
    pub fn replace_all(&mut self, rows: Vec<Row>) {
        self.clear();
        for row in rows {
            self.insert(row);
        }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.ids.clear();
        self.tokens.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Row> {
        let index = *self.ids.get(id)?;
        Some(&self.rows[index].data)
    }

    pub fn get_by_key(&self, key: &RowKey) -> Option<&Row> {
        self.position(key).map(|index| &self.rows[index].data)
    }

    /// All rows in insertion order
    pub fn get_all(&self) -> Vec<&Row> {
        self.rows.iter().map(|stored| &stored.data).collect()
    }

    pub fn entries(&self) -> &[StoredRow] {
        &self.rows
    }

    pub fn position(&self, key: &RowKey) -> Option<usize> {
        match key {
            RowKey::Id(id) => self.ids.get(id).copied(),
            RowKey::Token(token) => self.tokens.get(token).copied(),
        }
    }

    /// Rebuild both lookup tables after positions shift
    fn reindex(&mut self) {
        self.ids.clear();
        self.tokens.clear();
        for (position, stored) in self.rows.iter().enumerate() {
            self.tokens.insert(stored.token, position);
            if let Some(id) = self.id_of(&stored.data) {
                self.ids.entry(id).or_insert(position);
            }
        }
    }
}
