//! Filter evaluation for query execution.
//!
//! This module provides the `FilterEvaluator` that evaluates filter
//! predicates from a query descriptor against stored document bodies.
//! Field names may be dotted paths into embedded documents; a path that
//! crosses an array fans out over its elements, and a predicate matches when
//! any reached value matches.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use docrecord_proto::{FilterExpr, Value};

/// Evaluates filter expressions against document bodies.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Check that a body matches every filter.
    pub fn matches_all(filters: &[FilterExpr], body: &BTreeMap<String, Value>) -> bool {
        filters.iter().all(|f| Self::evaluate(f, body))
    }

    /// Evaluate a filter expression against a document body.
    pub fn evaluate(filter: &FilterExpr, body: &BTreeMap<String, Value>) -> bool {
        let field = match filter {
            FilterExpr::Or(branches) => return branches.iter().any(|f| Self::evaluate(f, body)),
            FilterExpr::Not(inner) => return !Self::evaluate(inner, body),
            other => other.field().unwrap_or_default(),
        };
        let found = Self::resolve(body, field);

        match filter {
            FilterExpr::Eq { value, .. } => Self::any_equal(&found, value),
            FilterExpr::Ne { value, .. } => !Self::any_equal(&found, value),
            FilterExpr::Lt { value, .. } => {
                Self::any_scalar(&found, |v| Self::compare_values(v, value).is_some_and(Ordering::is_lt))
            }
            FilterExpr::Le { value, .. } => {
                Self::any_scalar(&found, |v| Self::compare_values(v, value).is_some_and(Ordering::is_le))
            }
            FilterExpr::Gt { value, .. } => {
                Self::any_scalar(&found, |v| Self::compare_values(v, value).is_some_and(Ordering::is_gt))
            }
            FilterExpr::Ge { value, .. } => {
                Self::any_scalar(&found, |v| Self::compare_values(v, value).is_some_and(Ordering::is_ge))
            }
            FilterExpr::In { values, .. } => values.iter().any(|v| Self::any_equal(&found, v)),
            FilterExpr::NotIn { values, .. } => !values.iter().any(|v| Self::any_equal(&found, v)),
            FilterExpr::Range { low, high, .. } => Self::any_scalar(&found, |v| {
                Self::compare_values(v, low).is_some_and(Ordering::is_ge)
                    && Self::compare_values(v, high).is_some_and(Ordering::is_le)
            }),
            FilterExpr::Size { size, .. } => found
                .iter()
                .any(|v| v.as_array().is_some_and(|items| items.len() as i64 == *size)),
            FilterExpr::Type { type_name, .. } => {
                found.iter().any(|v| Self::has_type(v, type_name))
            }
            FilterExpr::All { values, .. } => found.iter().any(|v| match v {
                Value::Array(items) => values
                    .iter()
                    .all(|wanted| items.iter().any(|item| Self::values_equal(item, wanted))),
                _ => false,
            }),
            FilterExpr::Mod {
                divisor, remainder, ..
            } => Self::any_scalar(&found, |v| match v {
                Value::Int32(_) | Value::Int64(_) => {
                    v.as_i64().is_some_and(|n| Self::rem_equals(n, *divisor, *remainder))
                }
                Value::Float64(f) if f.is_finite() => {
                    Self::rem_equals(f.trunc() as i64, *divisor, *remainder)
                }
                _ => false,
            }),
            FilterExpr::Exists { exists, .. } => !found.is_empty() == *exists,
            FilterExpr::ElemMatch { filters, .. } => found.iter().any(|v| match v {
                Value::Array(items) => items.iter().any(|item| match item {
                    Value::Object(element) => Self::matches_all(filters, element),
                    _ => false,
                }),
                _ => false,
            }),
            FilterExpr::Or(_) | FilterExpr::Not(_) => false,
        }
    }

    /// `n % divisor == remainder`. A zero divisor never matches and
    /// `i64::MIN % -1` is 0.
    fn rem_equals(n: i64, divisor: i64, remainder: i64) -> bool {
        divisor != 0 && n.wrapping_rem(divisor) == remainder
    }

    /// Resolve a dotted path to every value it reaches.
    pub fn resolve<'a>(body: &'a BTreeMap<String, Value>, path: &str) -> Vec<&'a Value> {
        let mut parts = path.split('.');
        let Some(first) = parts.next() else {
            return Vec::new();
        };

        let mut current: Vec<&Value> = body.get(first).into_iter().collect();
        for part in parts {
            let mut next = Vec::new();
            for value in current {
                Self::descend(value, part, &mut next);
            }
            current = next;
        }
        current
    }

    fn descend<'a>(value: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
        match value {
            Value::Object(map) => out.extend(map.get(key)),
            Value::Array(items) => {
                if let Some(item) = key.parse::<usize>().ok().and_then(|i| items.get(i)) {
                    out.push(item);
                    return;
                }
                for item in items {
                    if let Value::Object(map) = item {
                        out.extend(map.get(key));
                    }
                }
            }
            _ => {}
        }
    }

    /// Equality that also matches array elements.
    fn any_equal(found: &[&Value], expected: &Value) -> bool {
        found.iter().any(|v| {
            Self::values_equal(v, expected)
                || v.as_array()
                    .is_some_and(|items| items.iter().any(|item| Self::values_equal(item, expected)))
        })
    }

    /// Apply a predicate to each reached scalar, descending one level into
    /// arrays.
    fn any_scalar<F>(found: &[&Value], predicate: F) -> bool
    where
        F: Fn(&Value) -> bool,
    {
        found.iter().any(|v| match v {
            Value::Array(items) => items.iter().any(&predicate),
            other => predicate(other),
        })
    }

    fn has_type(value: &Value, type_name: &str) -> bool {
        match type_name {
            "number" => matches!(value, Value::Int32(_) | Value::Int64(_) | Value::Float64(_)),
            name => value.type_name() == name,
        }
    }

    /// Check if two values are equal, comparing numbers across widths.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
                a.as_i64() == b.as_i64()
            }
            (
                Value::Int32(_) | Value::Int64(_) | Value::Float64(_),
                Value::Int32(_) | Value::Int64(_) | Value::Float64(_),
            ) => a.as_f64() == b.as_f64(),
            _ => a == b,
        }
    }

    /// Compare two values, returning their ordering if comparable.
    pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
                Some(a.as_i64()?.cmp(&b.as_i64()?))
            }
            (
                Value::Int32(_) | Value::Int64(_) | Value::Float64(_),
                Value::Int32(_) | Value::Int64(_) | Value::Float64(_),
            ) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None, // Incompatible types
        }
    }

    /// Total order used for sorting: missing and null values first, then
    /// comparable values, then everything else by type name.
    pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
            (None | Some(Value::Null), _) => Ordering::Less,
            (_, None | Some(Value::Null)) => Ordering::Greater,
            (Some(a), Some(b)) => Self::compare_values(a, b)
                .unwrap_or_else(|| a.type_name().cmp(b.type_name())),
        }
    }
}
