//! Record type for stored documents.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use docrecord_proto::Value;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A stored document.
///
/// The body holds plain fields, embedded documents inline (objects and
/// arrays of objects) and referenced documents as identifier strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Entity type.
    pub entity: String,

    /// Document identifier.
    pub id: String,

    /// Document body.
    pub body: BTreeMap<String, Value>,

    /// Write timestamp in microseconds since Unix epoch.
    pub written_at: i64,
}

impl Record {
    /// Create a new record with the current timestamp.
    pub fn new(entity: impl Into<String>, id: impl Into<String>, body: BTreeMap<String, Value>) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
            body,
            written_at: current_timestamp(),
        }
    }

    /// Serialize the record to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Current time in microseconds since Unix epoch.
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let mut body = BTreeMap::new();
        body.insert("username".to_string(), Value::from("jose"));
        body.insert("address".to_string(), Value::object([("city", "Los Angeles")]));

        let record = Record::new("User", "abc", body);
        let bytes = record.to_bytes().unwrap();
        let decoded = Record::from_bytes(&bytes).unwrap();

        assert_eq!(record, decoded);
        assert!(decoded.written_at > 0);
    }

    #[test]
    fn test_corrupt_bytes() {
        assert!(matches!(Record::from_bytes(b"not json"), Err(Error::Deserialization(_))));
    }
}
