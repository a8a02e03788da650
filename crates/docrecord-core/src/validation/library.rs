//! Built-in named validators.
//!
//! Each validator takes the field value and the rule's extra parameters and
//! returns whether the value passes. Unknown names resolve to `None` so the
//! caller can fall through to the next handler.

use std::sync::OnceLock;

use dashmap::DashMap;
use docrecord_proto::Value;
use regex::Regex;

/// Signature of a library validator.
pub type LibraryValidator = fn(&Value, &[Value]) -> bool;

/// Look up a library validator by name.
pub fn lookup(name: &str) -> Option<LibraryValidator> {
    let validator: LibraryValidator = match name {
        "notEmpty" => not_empty,
        "blank" => blank,
        "alphaNumeric" => alpha_numeric,
        "between" => between,
        "minLength" => min_length,
        "maxLength" => max_length,
        "numeric" => numeric,
        "naturalNumber" => natural_number,
        "boolean" => boolean,
        "email" => email,
        "inList" => in_list,
        "range" => range,
        "equalTo" => equal_to,
        "custom" => custom,
        _ => return None,
    };
    Some(validator)
}

/// Split a delimited pattern such as `/body/flags` or `{body}` into its body
/// and flags. Returns `None` for bare expressions and names.
pub fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let open = pattern.chars().next()?;
    if open.is_alphanumeric() || open.is_whitespace() || matches!(open, '\\' | '_') {
        return None;
    }

    let close = match open {
        '(' => ')',
        '{' => '}',
        '[' => ']',
        '<' => '>',
        other => other,
    };
    let rest = &pattern[open.len_utf8()..];
    let end = rest.rfind(close)?;
    Some((&rest[..end], &rest[end + close.len_utf8()..]))
}

/// Compile a pattern, accepting the delimited form as well as a bare
/// expression.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let Some((body, flags)) = split_delimited(pattern) else {
        return Regex::new(pattern);
    };
    let flags: String = flags
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
        .collect();

    if flags.is_empty() {
        Regex::new(body)
    } else {
        Regex::new(&format!("(?{flags}){body}"))
    }
}

/// [`compile_pattern`] through a process-wide cache keyed by the pattern
/// text. Failures are cached too.
pub fn cached_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    static PATTERNS: OnceLock<DashMap<String, Result<Regex, regex::Error>>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(DashMap::new);

    if let Some(compiled) = patterns.get(pattern) {
        return compiled.value().clone();
    }
    let compiled = compile_pattern(pattern);
    patterns.insert(pattern.to_string(), compiled.clone());
    compiled
}

/// String form of a scalar value for text-based checks.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int32(i) => Some(i.to_string()),
        Value::Int64(i) => Some(i.to_string()),
        Value::Float64(f) => Some(f.to_string()),
        _ => None,
    }
}

fn param_usize(params: &[Value], index: usize) -> Option<usize> {
    params
        .get(index)
        .and_then(Value::as_i64)
        .and_then(|n| usize::try_from(n).ok())
}

fn char_len(value: &Value) -> Option<usize> {
    text(value).map(|s| s.chars().count())
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

fn not_empty(value: &Value, _params: &[Value]) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        other => !other.is_empty(),
    }
}

fn blank(value: &Value, _params: &[Value]) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty(),
        other => other.is_null(),
    }
}

fn alpha_numeric(value: &Value, _params: &[Value]) -> bool {
    text(value).is_some_and(|s| !s.is_empty() && s.chars().all(char::is_alphanumeric))
}

fn between(value: &Value, params: &[Value]) -> bool {
    let (Some(min), Some(max)) = (param_usize(params, 0), param_usize(params, 1)) else {
        return false;
    };
    char_len(value).is_some_and(|len| len >= min && len <= max)
}

fn min_length(value: &Value, params: &[Value]) -> bool {
    match (char_len(value), param_usize(params, 0)) {
        (Some(len), Some(min)) => len >= min,
        _ => false,
    }
}

fn max_length(value: &Value, params: &[Value]) -> bool {
    match (char_len(value), param_usize(params, 0)) {
        (Some(len), Some(max)) => len <= max,
        _ => false,
    }
}

fn numeric(value: &Value, _params: &[Value]) -> bool {
    value.is_numeric()
}

fn natural_number(value: &Value, params: &[Value]) -> bool {
    let allow_zero = params.first().and_then(Value::as_bool).unwrap_or(false);
    let n = match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        other => other.as_i64(),
    };
    match n {
        Some(0) => allow_zero,
        Some(n) => n > 0,
        None => false,
    }
}

fn boolean(value: &Value, _params: &[Value]) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Int32(i) => *i == 0 || *i == 1,
        Value::Int64(i) => *i == 0 || *i == 1,
        Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    }
}

fn email(value: &Value, _params: &[Value]) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").ok()
    });
    match (pattern, value.as_str()) {
        (Some(re), Some(s)) => re.is_match(s),
        _ => false,
    }
}

fn in_list(value: &Value, params: &[Value]) -> bool {
    let Some(list) = params.first().and_then(Value::as_array) else {
        return false;
    };
    let needle = text(value);
    list.iter()
        .any(|candidate| candidate == value || (needle.is_some() && text(candidate) == needle))
}

fn range(value: &Value, params: &[Value]) -> bool {
    let Some(n) = number(value) else {
        return false;
    };
    if !n.is_finite() {
        return false;
    }
    match (params.first().and_then(number), params.get(1).and_then(number)) {
        (Some(low), Some(high)) => n > low && n < high,
        _ => true,
    }
}

fn equal_to(value: &Value, params: &[Value]) -> bool {
    params.first().is_some_and(|expected| expected == value)
}

fn custom(value: &Value, params: &[Value]) -> bool {
    let Some(pattern) = params.first().and_then(Value::as_str) else {
        return false;
    };
    match (cached_pattern(pattern), text(value)) {
        (Ok(re), Some(s)) => re.is_match(&s),
        _ => false,
    }
}
