//! Content codec: document fields <-> stored bytes.
//!
//! The stored form of a document body is canonical JSON of
//! `{"content": {...}, "metadata": {...}}`. Field maps are `BTreeMap`s, so
//! equal bodies always encode to equal bytes.
//!
//! Null rule: a top-level content or metadata field whose value is null is
//! never written. Nulls nested inside lists or maps are values in their own
//! right and are kept as they are.

use serde::{Deserialize, Serialize};

use super::CodecError;
use crate::domain::FieldMap;

#[derive(Serialize)]
struct BodyRef<'a> {
    content: &'a FieldMap,
    metadata: &'a FieldMap,
}

/// Decoded document body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DocumentBody {
    #[serde(default)]
    pub content: FieldMap,
    #[serde(default)]
    pub metadata: FieldMap,
}

/// Encoded document body as held by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody(Vec<u8>);

impl EncodedBody {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Copy of `fields` without top-level nulls.
pub fn strip_nulls(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Encode content and metadata, dropping null fields.
pub fn encode(content: &FieldMap, metadata: &FieldMap) -> Result<EncodedBody, CodecError> {
    let content = strip_nulls(content);
    let metadata = strip_nulls(metadata);
    let bytes = serde_json::to_vec(&BodyRef {
        content: &content,
        metadata: &metadata,
    })?;
    Ok(EncodedBody(bytes))
}

pub fn decode(body: &EncodedBody) -> Result<DocumentBody, CodecError> {
    Ok(serde_json::from_slice(body.as_bytes())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn fields(value: Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn nulls_are_dropped_on_encode() {
        let content = fields(json!({"field": "value", "nullfield": null}));
        let meta = fields(json!({"gone": null}));

        let decoded = decode(&encode(&content, &meta).unwrap()).unwrap();
        assert_eq!(decoded.content, fields(json!({"field": "value"})));
        assert!(decoded.metadata.is_empty());
    }

    #[test]
    fn types_and_nesting_survive() {
        let content = fields(json!({
            "int": 42,
            "float": 1.5,
            "bool": false,
            "list": [1, "two", null, {"three": 3}],
            "map": {"inner": {"deep": [true]}, "keep": null},
        }));

        let decoded = decode(&encode(&content, &FieldMap::new()).unwrap()).unwrap();
        assert_eq!(decoded.content, content);
        assert!(decoded.content["int"].is_u64());
        assert!(decoded.content["float"].is_f64());
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = fields(json!({"b": 1, "a": 2}));
        let mut b = FieldMap::new();
        b.insert("a".into(), json!(2));
        b.insert("b".into(), json!(1));

        assert_eq!(
            encode(&a, &FieldMap::new()).unwrap(),
            encode(&b, &FieldMap::new()).unwrap()
        );
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode(&EncodedBody::from_bytes(b"{not json".to_vec())).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }
}
