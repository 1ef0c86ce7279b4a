//! Type-aware row ordering
//!
//! Dates and times compare by timestamp, numbers numerically, everything else
//! as case-insensitive text. Values that cannot be read as a number or
//! timestamp sort last in both directions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::model::field::{FieldDescriptor, FieldType};
use crate::model::value::{self, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Asc => "▲",
            SortDirection::Desc => "▼",
        }
    }
}

/// The single active sort of a grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Order two rows by `field` in `direction`
pub fn compare(a: &Row, b: &Row, field: &FieldDescriptor, direction: SortDirection) -> Ordering {
    let left = a.get(&field.name);
    let right = b.get(&field.name);

    match field.field_type {
        FieldType::Date | FieldType::Time => compare_keys(
            value::parse_timestamp(left),
            value::parse_timestamp(right),
            direction,
        ),
        FieldType::Number => compare_numbers(
            value::parse_float(left),
            value::parse_float(right),
            direction,
        ),
        FieldType::Boolean => directed(
            value::text(left).cmp(&value::text(right)),
            direction,
        ),
        _ => {
            let separator = field.array_separator();
            let l = value::text_with_separator(left, separator).to_lowercase();
            let r = value::text_with_separator(right, separator).to_lowercase();
            directed(l.cmp(&r), direction)
        }
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Present keys ordered by direction; absent keys after every present key
fn compare_keys<T: Ord>(left: Option<T>, right: Option<T>, direction: SortDirection) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => directed(l.cmp(&r), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_numbers(left: Option<f64>, right: Option<f64>, direction: SortDirection) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => directed(l.total_cmp(&r), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort of `rows` in place
pub fn sort_rows(rows: &mut [&Row], field: &FieldDescriptor, direction: SortDirection) {
    rows.sort_by(|a, b| compare(a, b, field, direction));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::row_from_value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rows(values: Vec<serde_json::Value>) -> Vec<Row> {
        values.into_iter().filter_map(row_from_value).collect()
    }

    fn names(rows: &[&Row]) -> Vec<String> {
        rows.iter().map(|r| value::text(r.get("name"))).collect()
    }

    #[test]
    fn test_numeric_sort_with_nan_last() {
        let data = rows(vec![
            json!({"name": "a", "age": 30}),
            json!({"name": "b", "age": "unknown"}),
            json!({"name": "c", "age": 9}),
            json!({"name": "d", "age": "100"}),
        ]);
        let age = FieldDescriptor::new("age", FieldType::Number);

        let mut view: Vec<&Row> = data.iter().collect();
        sort_rows(&mut view, &age, SortDirection::Asc);
        assert_eq!(names(&view), vec!["c", "a", "d", "b"]);

        sort_rows(&mut view, &age, SortDirection::Desc);
        assert_eq!(names(&view), vec!["d", "a", "c", "b"]);
    }

    #[test]
    fn test_date_sort_by_timestamp() {
        let data = rows(vec![
            json!({"name": "late", "at": "2024-05-01"}),
            json!({"name": "early", "at": "2023-12-31T23:00:00Z"}),
        ]);
        let at = FieldDescriptor::new("at", FieldType::Date);
        let mut view: Vec<&Row> = data.iter().collect();
        sort_rows(&mut view, &at, SortDirection::Asc);
        assert_eq!(names(&view), vec!["early", "late"]);
    }

    #[test]
    fn test_text_sort_is_case_insensitive() {
        let data = rows(vec![
            json!({"name": "bravo"}),
            json!({"name": "Alpha"}),
            json!({"name": "charlie"}),
        ]);
        let name = FieldDescriptor::new("name", FieldType::String);
        let mut view: Vec<&Row> = data.iter().collect();
        sort_rows(&mut view, &name, SortDirection::Asc);
        assert_eq!(names(&view), vec!["Alpha", "bravo", "charlie"]);
    }

    #[test]
    fn test_sort_is_stable_both_ways() {
        let data = rows(vec![
            json!({"name": "a1", "group": 1}),
            json!({"name": "b2", "group": 2}),
            json!({"name": "a2", "group": 1}),
            json!({"name": "b1", "group": 2}),
            json!({"name": "c1", "group": 3}),
        ]);
        let group = FieldDescriptor::new("group", FieldType::Number);
        let mut view: Vec<&Row> = data.iter().collect();

        sort_rows(&mut view, &group, SortDirection::Asc);
        assert_eq!(names(&view), vec!["a1", "a2", "b2", "b1", "c1"]);

        // Groups reverse; members of a group keep their previous order
        sort_rows(&mut view, &group, SortDirection::Desc);
        assert_eq!(names(&view), vec!["c1", "b2", "b1", "a1", "a2"]);
    }

    #[test]
    fn test_missing_values_compare_equal_to_each_other() {
        let data = rows(vec![json!({"name": "x"}), json!({"name": "y"})]);
        let at = FieldDescriptor::new("at", FieldType::Time);
        assert_eq!(
            compare(&data[0], &data[1], &at, SortDirection::Asc),
            Ordering::Equal
        );
    }
}
