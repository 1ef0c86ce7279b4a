//! Filter predicates and their evaluation
//!
//! Predicates are conjunctive: a row matches a set when it satisfies every
//! predicate in it. Evaluation never fails; a missing cell is read as the
//! empty value of its type (empty text, zero, the epoch, `false`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GridError, Result};
use crate::model::field::{self, Comparator, FieldDescriptor, FieldType};
use crate::model::value::{self, Row};

/// A single filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub field: String,
    pub comparator: Comparator,
    pub value: Value,
}

impl FilterPredicate {
    pub fn new(field: impl Into<String>, comparator: Comparator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            comparator,
            value: value.into(),
        }
    }

    /// Check the predicate against its field's contract
    pub fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        if !field.filterable {
            return Err(GridError::NotFilterable(field.name.clone()));
        }
        if !field.accepts(self.comparator) {
            return Err(GridError::InvalidComparator {
                field: field.name.clone(),
                field_type: field.field_type,
                comparator: self.comparator,
            });
        }
        Ok(())
    }

    /// Human description for filter tags, e.g. `Age is greater than 26`
    pub fn describe(&self, field: Option<&FieldDescriptor>) -> String {
        let label = field.map(|f| f.display_label()).unwrap_or(&self.field);
        let shown = match field {
            Some(f) if f.field_type == FieldType::Boolean => f.render(Some(&self.value)),
            _ => value::text(Some(&self.value)),
        };
        format!("{} {} {}", label, self.comparator.label(), shown)
    }
}

/// Evaluate one predicate against one row
pub fn matches(predicate: &FilterPredicate, row: &Row, field: &FieldDescriptor) -> bool {
    let cell = row.get(&field.name);
    let target = Some(&predicate.value);

    match field.field_type {
        FieldType::Date | FieldType::Time => {
            let left = if value::is_missing(cell) {
                Some(0)
            } else {
                value::parse_timestamp(cell)
            };
            compare_ordered(left, value::parse_timestamp(target), predicate.comparator)
        }
        FieldType::Number => {
            let left = if value::is_missing(cell) {
                Some(0)
            } else {
                value::parse_int(cell)
            };
            compare_ordered(left, value::parse_int(target), predicate.comparator)
        }
        FieldType::Boolean => {
            let left = match cell {
                None | Some(Value::Null) => Value::Bool(false),
                Some(v) => v.clone(),
            };
            match predicate.comparator {
                Comparator::Equals => left == predicate.value,
                Comparator::DoesNotEqual => left != predicate.value,
                _ => false,
            }
        }
        _ => {
            let left = value::text_with_separator(cell, field.array_separator()).to_lowercase();
            let right = value::text(target).to_lowercase();
            match predicate.comparator {
                Comparator::Contains => left.contains(&right),
                Comparator::NotContains => !left.contains(&right),
                Comparator::Equals => left == right,
                Comparator::DoesNotEqual => left != right,
                Comparator::StartsWith => left.starts_with(&right),
                Comparator::EndsWith => left.ends_with(&right),
                _ => false,
            }
        }
    }
}

/// Ordered comparison where an unreadable side behaves like NaN: only
/// `doesnotequal` holds
fn compare_ordered(left: Option<i64>, right: Option<i64>, comparator: Comparator) -> bool {
    let (Some(l), Some(r)) = (left, right) else {
        return comparator == Comparator::DoesNotEqual;
    };
    match comparator {
        Comparator::Equals => l == r,
        Comparator::DoesNotEqual => l != r,
        Comparator::IsGreaterThan | Comparator::IsAfter => l > r,
        Comparator::IsLessThan | Comparator::IsBefore => l < r,
        _ => false,
    }
}

/// Conjunction of all predicates; an empty set always matches
///
/// A predicate naming a field without a descriptor is evaluated as text.
pub fn apply_all(predicates: &[FilterPredicate], row: &Row, fields: &[FieldDescriptor]) -> bool {
    predicates.iter().all(|predicate| match field::find(fields, &predicate.field) {
        Some(descriptor) => matches(predicate, row, descriptor),
        None => {
            let fallback = FieldDescriptor::new(predicate.field.clone(), FieldType::String);
            matches(predicate, row, &fallback)
        }
    })
}

/// Convert raw user input into a predicate value for `field`
pub fn parse_filter_value(field: &FieldDescriptor, input: &str) -> Result<Value> {
    let input = input.trim();
    let invalid = |reason: &str| GridError::InvalidFilterValue {
        field: field.name.clone(),
        reason: reason.to_string(),
    };

    if input.is_empty() {
        return Err(invalid("a value is required"));
    }

    match field.field_type {
        FieldType::Number => value::parse_int_str(input)
            .map(|_| Value::String(input.to_string()))
            .ok_or_else(|| invalid("expected a whole number")),
        FieldType::Date => value::parse_timestamp_str(input)
            .map(|_| Value::String(input.to_string()))
            .ok_or_else(|| invalid("expected a date such as 2024-03-01")),
        FieldType::Time => value::parse_timestamp_str(input)
            .map(|_| Value::String(input.to_string()))
            .ok_or_else(|| invalid("expected a time such as 13:30")),
        FieldType::Boolean => match input.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid("expected true or false")),
        },
        FieldType::Enumeration if !field.options.is_empty() => field
            .options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(input))
            .map(|option| Value::String(option.clone()))
            .ok_or_else(|| invalid(&format!("expected one of: {}", field.options.join(", ")))),
        _ => Ok(Value::String(input.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::row_from_value;
    use serde_json::json;

    fn row(value: Value) -> Row {
        row_from_value(value).unwrap()
    }

    #[test]
    fn test_number_comparators_truncate() {
        let age = FieldDescriptor::new("age", FieldType::Number);
        let r = row(json!({"age": 26.9}));

        // 26.9 is read as 26, so it is not greater than 26
        assert!(!matches(&FilterPredicate::new("age", Comparator::IsGreaterThan, 26), &r, &age));
        assert!(matches(&FilterPredicate::new("age", Comparator::Equals, "26"), &r, &age));
        assert!(matches(&FilterPredicate::new("age", Comparator::IsLessThan, 27.5), &r, &age));
    }

    #[test]
    fn test_unreadable_numbers_only_differ() {
        let age = FieldDescriptor::new("age", FieldType::Number);
        let r = row(json!({"age": "n/a"}));
        assert!(!matches(&FilterPredicate::new("age", Comparator::Equals, 0), &r, &age));
        assert!(matches(&FilterPredicate::new("age", Comparator::DoesNotEqual, 0), &r, &age));
        assert!(!matches(&FilterPredicate::new("age", Comparator::IsLessThan, 5), &r, &age));
    }

    #[test]
    fn test_missing_cell_reads_as_zero_value() {
        let age = FieldDescriptor::new("age", FieldType::Number);
        let born = FieldDescriptor::new("born", FieldType::Date);
        let name = FieldDescriptor::new("name", FieldType::String);
        let active = FieldDescriptor::new("active", FieldType::Boolean);
        let r = row(json!({}));

        assert!(matches(&FilterPredicate::new("age", Comparator::Equals, 0), &r, &age));
        assert!(matches(
            &FilterPredicate::new("born", Comparator::IsBefore, "2000-01-01"),
            &r,
            &born
        ));
        assert!(matches(&FilterPredicate::new("name", Comparator::Equals, ""), &r, &name));
        assert!(matches(&FilterPredicate::new("active", Comparator::Equals, false), &r, &active));
    }

    #[test]
    fn test_date_comparators() {
        let born = FieldDescriptor::new("born", FieldType::Date);
        let r = row(json!({"born": "1990-06-15"}));
        assert!(matches(
            &FilterPredicate::new("born", Comparator::IsAfter, "1990-01-01"),
            &r,
            &born
        ));
        assert!(!matches(
            &FilterPredicate::new("born", Comparator::IsBefore, "1990-01-01"),
            &r,
            &born
        ));
        assert!(matches(
            &FilterPredicate::new("born", Comparator::Equals, "1990-06-15T00:00:00Z"),
            &r,
            &born
        ));
    }

    #[test]
    fn test_boolean_is_not_coerced() {
        let active = FieldDescriptor::new("active", FieldType::Boolean);
        let r = row(json!({"active": true}));
        assert!(matches(&FilterPredicate::new("active", Comparator::Equals, true), &r, &active));
        assert!(!matches(&FilterPredicate::new("active", Comparator::Equals, "true"), &r, &active));
        assert!(matches(&FilterPredicate::new("active", Comparator::DoesNotEqual, false), &r, &active));
    }

    #[test]
    fn test_text_comparators_ignore_case() {
        let name = FieldDescriptor::new("name", FieldType::String);
        let r = row(json!({"name": "Bo Diddley"}));
        let check = |comparator, v: &str| matches(&FilterPredicate::new("name", comparator, v), &r, &name);

        assert!(check(Comparator::Contains, "DIDD"));
        assert!(check(Comparator::NotContains, "zz"));
        assert!(check(Comparator::StartsWith, "bo"));
        assert!(check(Comparator::EndsWith, "LEY"));
        assert!(check(Comparator::Equals, "bo diddley"));
        assert!(check(Comparator::DoesNotEqual, "bo"));
        assert!(!check(Comparator::IsAfter, "a"));
    }

    #[test]
    fn test_string_array_matches_joined_text() {
        let tags = FieldDescriptor::new("tags", FieldType::StringArray);
        let r = row(json!({"tags": ["red", "blue"]}));
        assert!(matches(&FilterPredicate::new("tags", Comparator::Contains, "blue"), &r, &tags));
    }

    #[test]
    fn test_apply_all_is_conjunctive() {
        let fields = vec![
            FieldDescriptor::new("name", FieldType::String),
            FieldDescriptor::new("age", FieldType::Number),
        ];
        let r = row(json!({"name": "Bo", "age": 30}));
        let older = FilterPredicate::new("age", Comparator::IsGreaterThan, 26);
        let named_al = FilterPredicate::new("name", Comparator::Equals, "al");
        let named_bo = FilterPredicate::new("name", Comparator::Equals, "bo");

        assert!(apply_all(&[], &r, &fields));
        assert!(apply_all(&[older.clone(), named_bo.clone()], &r, &fields));
        assert!(!apply_all(&[older.clone(), named_al.clone()], &r, &fields));

        for set in [vec![older.clone()], vec![named_al.clone()], vec![older, named_bo, named_al]] {
            let each = set.iter().all(|p| matches(p, &r, field::find(&fields, &p.field).unwrap()));
            assert_eq!(apply_all(&set, &r, &fields), each);
        }
    }

    #[test]
    fn test_unknown_field_predicate_does_not_panic() {
        let r = row(json!({"name": "Bo"}));
        let p = FilterPredicate::new("nickname", Comparator::Equals, "");
        assert!(apply_all(&[p], &r, &[]));
    }

    #[test]
    fn test_validate_predicate() {
        let age = FieldDescriptor::new("age", FieldType::Number);
        assert!(FilterPredicate::new("age", Comparator::IsGreaterThan, 1).validate(&age).is_ok());
        assert!(matches!(
            FilterPredicate::new("age", Comparator::Contains, 1).validate(&age),
            Err(GridError::InvalidComparator { .. })
        ));

        let notes = FieldDescriptor::new("notes", FieldType::Paragraph).not_filterable();
        assert!(matches!(
            FilterPredicate::new("notes", Comparator::Contains, "x").validate(&notes),
            Err(GridError::NotFilterable(_))
        ));
    }

    #[test]
    fn test_parse_filter_value() {
        let age = FieldDescriptor::new("age", FieldType::Number);
        assert_eq!(parse_filter_value(&age, " 26 ").unwrap(), json!("26"));
        assert!(parse_filter_value(&age, "old").is_err());
        assert!(parse_filter_value(&age, "").is_err());

        let active = FieldDescriptor::new("active", FieldType::Boolean);
        assert_eq!(parse_filter_value(&active, "Yes").unwrap(), json!(true));
        assert!(parse_filter_value(&active, "maybe").is_err());

        let size = FieldDescriptor::new("size", FieldType::Enumeration)
            .with_options(vec!["Small".to_string(), "Large".to_string()]);
        assert_eq!(parse_filter_value(&size, "large").unwrap(), json!("Large"));
        assert!(parse_filter_value(&size, "medium").is_err());

        let born = FieldDescriptor::new("born", FieldType::Date);
        assert!(parse_filter_value(&born, "2024-02-30").is_err());
    }

    #[test]
    fn test_describe() {
        let age = FieldDescriptor::new("age", FieldType::Number).with_label("Age");
        let p = FilterPredicate::new("age", Comparator::IsGreaterThan, 26);
        assert_eq!(p.describe(Some(&age)), "Age is greater than 26");
        assert_eq!(p.describe(None), "age is greater than 26");
    }
}
