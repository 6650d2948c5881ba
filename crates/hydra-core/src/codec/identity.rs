//! Identity codec: [`DocumentId`] <-> JSON text and JSON primitive.
//!
//! The primitive form is a `Value::String` holding the canonical ULID; the
//! JSON form is that primitive serialized. Both also accept the `doc-`
//! prefixed display form.

use serde_json::Value;

use super::CodecError;
use crate::domain::DocumentId;

pub fn to_primitive(id: &DocumentId) -> Value {
    Value::String(id.to_canonical())
}

pub fn to_json(id: &DocumentId) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&to_primitive(id))?)
}

pub fn from_primitive(value: &Value) -> Result<DocumentId, CodecError> {
    match value {
        Value::String(s) => s.parse(),
        other => Err(CodecError::InvalidId(format!(
            "expected a string id, got {other}"
        ))),
    }
}

pub fn from_json(json: &str) -> Result<DocumentId, CodecError> {
    let value: Value = serde_json::from_str(json)?;
    from_primitive(&value)
}
