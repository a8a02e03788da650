//! Field type definitions and value coercion.

use docrecord_proto::Value;

/// Scalar data types a document field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// Document identifier.
    Id,
}

/// Declared type of a document field.
///
/// Associations are not fields: embedded and referenced documents are
/// declared with [`AssociationDef`](super::AssociationDef).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// A scalar value that may be null.
    OptionalScalar(ScalarType),
    /// A list of scalar values.
    ArrayScalar(ScalarType),
    /// A free-form nested object.
    Hash,
}

impl ScalarType {
    /// Convert a value to this type when the conversion is lossless.
    /// Anything else is returned unchanged and left to validation.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ScalarType::Int32, Value::Int64(i)) => match i32::try_from(i) {
                Ok(i) => Value::Int32(i),
                Err(_) => Value::Int64(i),
            },
            (ScalarType::Int32, Value::String(s)) => match s.trim().parse::<i32>() {
                Ok(i) => Value::Int32(i),
                Err(_) => Value::String(s),
            },
            (ScalarType::Int64, Value::Int32(i)) => Value::Int64(i64::from(i)),
            (ScalarType::Int64, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Int64(i),
                Err(_) => Value::String(s),
            },
            (ScalarType::Float64, Value::Int32(i)) => Value::Float64(f64::from(i)),
            (ScalarType::Float64, Value::Int64(i)) => Value::Float64(i as f64),
            (ScalarType::Float64, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Float64(f),
                Err(_) => Value::String(s),
            },
            (ScalarType::Bool, Value::Int32(i)) if i == 0 || i == 1 => Value::Bool(i == 1),
            (ScalarType::Bool, Value::String(s)) => match s.as_str() {
                "1" | "true" => Value::Bool(true),
                "0" | "false" => Value::Bool(false),
                _ => Value::String(s),
            },
            (ScalarType::String, Value::Int32(i)) => Value::String(i.to_string()),
            (ScalarType::String, Value::Int64(i)) => Value::String(i.to_string()),
            (ScalarType::Timestamp, Value::Int64(t)) => Value::Timestamp(t),
            (ScalarType::Timestamp, Value::Int32(t)) => Value::Timestamp(i64::from(t)),
            (_, value) => value,
        }
    }
}

impl FieldType {
    /// Check if this type holds a timestamp.
    pub fn is_timestamp(&self) -> bool {
        matches!(
            self,
            FieldType::Scalar(ScalarType::Timestamp) | FieldType::OptionalScalar(ScalarType::Timestamp)
        )
    }

    /// Convert an assigned value to the declared type where possible.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (FieldType::Scalar(s) | FieldType::OptionalScalar(s), value) => s.coerce(value),
            (FieldType::ArrayScalar(s), Value::Array(items)) => {
                Value::Array(items.into_iter().map(|item| s.coerce(item)).collect())
            }
            (_, value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        let salary = FieldType::Scalar(ScalarType::Float64);
        assert_eq!(salary.coerce(Value::from(100)), Value::Float64(100.0));
        assert_eq!(salary.coerce(Value::from(" 101.5")), Value::Float64(101.5));
        assert_eq!(salary.coerce(Value::from("lots")), Value::from("lots"));

        let age = FieldType::Scalar(ScalarType::Int32);
        assert_eq!(age.coerce(Value::Int64(42)), Value::Int32(42));
        assert_eq!(age.coerce(Value::Int64(i64::MAX)), Value::Int64(i64::MAX));
    }

    #[test]
    fn test_bool_and_null_coercion() {
        let active = FieldType::OptionalScalar(ScalarType::Bool);
        assert_eq!(active.coerce(Value::from("1")), Value::Bool(true));
        assert_eq!(active.coerce(Value::Int32(0)), Value::Bool(false));
        assert_eq!(active.coerce(Value::Null), Value::Null);
    }

    #[test]
    fn test_array_and_hash_coercion() {
        let scores = FieldType::ArrayScalar(ScalarType::Int64);
        assert_eq!(
            scores.coerce(Value::array([1, 2])),
            Value::Array(vec![Value::Int64(1), Value::Int64(2)])
        );
        let meta = Value::object([("a", 1)]);
        assert_eq!(FieldType::Hash.coerce(meta.clone()), meta);
    }

    #[test]
    fn test_timestamp_detection() {
        assert!(FieldType::Scalar(ScalarType::Timestamp).is_timestamp());
        assert!(FieldType::OptionalScalar(ScalarType::Timestamp).is_timestamp());
        assert!(!FieldType::ArrayScalar(ScalarType::Timestamp).is_timestamp());
        assert!(!FieldType::Scalar(ScalarType::Int64).is_timestamp());
        assert_eq!(
            FieldType::Scalar(ScalarType::Timestamp).coerce(Value::Int64(5)),
            Value::Timestamp(5)
        );
    }
}
