//! Condition translation.
//!
//! Turns framework-style conditions, keyed `"field"` or `"field operator"`,
//! into native [`FilterExpr`] predicates. Translation never fails: unknown
//! operators and malformed operands degrade to equality (or membership for
//! sequence values).

use docrecord_proto::{FilterExpr, Value};
use tracing::debug;

/// Translate a list of conditions into conjunctive predicates.
pub fn translate(conditions: &[(String, Value)], entity_name: &str) -> Vec<FilterExpr> {
    conditions
        .iter()
        .map(|(key, value)| translate_one(key, value, entity_name))
        .collect()
}

/// Translate a single condition.
pub fn translate_one(key: &str, value: &Value, entity_name: &str) -> FilterExpr {
    let key = key.trim();
    let (field, operator) = match key.split_once(' ') {
        Some((field, operator)) => (field, operator.trim()),
        None => (key, "="),
    };
    let field = resolve_field(field, entity_name);

    match operator {
        "=" => equality(field, value),
        "!=" => match value {
            Value::Array(values) => FilterExpr::not_in_values(field, values.clone()),
            other => FilterExpr::ne(field, other.clone()),
        },
        "<" => FilterExpr::lt(field, value.clone()),
        "<=" => FilterExpr::le(field, value.clone()),
        ">" => FilterExpr::gt(field, value.clone()),
        ">=" => FilterExpr::ge(field, value.clone()),
        "between" | "between ? and ?" => match pair(value) {
            Some((low, high)) => FilterExpr::range(field, low.clone(), high.clone()),
            None => degrade(field, operator, value),
        },
        "size" => match value.as_i64() {
            Some(size) => FilterExpr::size(field, size),
            None => degrade(field, operator, value),
        },
        "type" => match value {
            Value::String(type_name) => FilterExpr::type_of(field, type_name.clone()),
            _ => degrade(field, operator, value),
        },
        "all" => match value {
            Value::Array(values) => FilterExpr::all(field, values.clone()),
            _ => degrade(field, operator, value),
        },
        "mod" => match pair(value).and_then(|(d, r)| Some((d.as_i64()?, r.as_i64()?))) {
            Some((divisor, remainder)) if divisor != 0 => {
                FilterExpr::modulo(field, divisor, remainder)
            }
            _ => degrade(field, operator, value),
        },
        "exists" => match value {
            Value::Bool(exists) => FilterExpr::exists(field, *exists),
            _ => degrade(field, operator, value),
        },
        _ => degrade(field, operator, value),
    }
}

/// Strip an `Entity.` prefix naming the entity itself; other dotted paths
/// address embedded documents and are kept verbatim.
fn resolve_field(field: &str, entity_name: &str) -> String {
    match field.split_once('.') {
        Some((owner, rest)) if owner == entity_name => rest.to_string(),
        _ => field.to_string(),
    }
}

fn equality(field: String, value: &Value) -> FilterExpr {
    match value {
        Value::Array(values) => FilterExpr::in_values(field, values.clone()),
        other => FilterExpr::eq(field, other.clone()),
    }
}

fn pair(value: &Value) -> Option<(&Value, &Value)> {
    match value.as_array()? {
        [first, second] => Some((first, second)),
        _ => None,
    }
}

fn degrade(field: String, operator: &str, value: &Value) -> FilterExpr {
    debug!(
        field = %field,
        operator,
        "Unsupported operator or operand, falling back to equality"
    );
    equality(field, value)
}
