//! Document: content fields + metadata + status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DocumentId, Status, TerminalKind};

/// Field name -> value. `BTreeMap` keeps encoding deterministic.
pub type FieldMap = BTreeMap<String, Value>;

/// Metadata key holding `{tag: claim time}` for every tag that claimed a document.
pub const FETCHED_METADATA_TAG: &str = "fetched";

/// A document as seen by producers, workers and stages.
///
/// Content fields may hold `Value::Null` locally; a null field means "absent"
/// and is dropped when the document is persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<DocumentId>,
    #[serde(default)]
    status: Status,
    #[serde(default)]
    content: FieldMap,
    #[serde(default)]
    metadata: FieldMap,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        id: DocumentId,
        status: Status,
        content: FieldMap,
        metadata: FieldMap,
    ) -> Self {
        Self {
            id: Some(id),
            status,
            content,
            metadata,
        }
    }

    /// Empty document that keeps `id` when inserted.
    pub fn with_id(id: DocumentId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Parse a document from its JSON form (see [`Document::to_json`]).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Id assigned by the store; `None` until the document is inserted.
    pub fn id(&self) -> Option<DocumentId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: DocumentId) {
        self.id = Some(id);
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Set a content field. Setting `Value::Null` marks the field for removal.
    pub fn put_content_field(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.content.insert(name.into(), value.into())
    }

    pub fn remove_content_field(&mut self, name: &str) -> Option<Value> {
        self.content.remove(name)
    }

    /// Non-null value of a content field.
    pub fn content_field(&self, name: &str) -> Option<&Value> {
        self.content.get(name).filter(|v| !v.is_null())
    }

    pub fn has_content_field(&self, name: &str) -> bool {
        self.content_field(name).is_some()
    }

    pub fn content_fields(&self) -> &FieldMap {
        &self.content
    }

    pub fn content_fields_mut(&mut self) -> &mut FieldMap {
        &mut self.content
    }

    pub fn metadata(&self) -> &FieldMap {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut FieldMap {
        &mut self.metadata
    }

    /// Time at which `tag` claimed this document, if it ever did.
    pub fn fetched_at(&self, tag: &str) -> Option<DateTime<Utc>> {
        self.stamp(FETCHED_METADATA_TAG, tag)
    }

    pub fn was_fetched_by(&self, tag: &str) -> bool {
        self.metadata
            .get(FETCHED_METADATA_TAG)
            .and_then(Value::as_object)
            .is_some_and(|fetched| fetched.contains_key(tag))
    }

    /// Tags that claimed this document.
    pub fn fetched_tags(&self) -> Vec<String> {
        self.metadata
            .get(FETCHED_METADATA_TAG)
            .and_then(Value::as_object)
            .map(|fetched| fetched.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop `tag` from the claim history. Persist with an update.
    pub fn remove_fetched(&mut self, tag: &str) -> bool {
        self.metadata
            .get_mut(FETCHED_METADATA_TAG)
            .and_then(Value::as_object_mut)
            .is_some_and(|fetched| fetched.remove(tag).is_some())
    }

    /// Metadata without the store's own stamps (`fetched` and the terminal
    /// keys). This is the part of the metadata a caller is accountable for.
    pub(crate) fn caller_metadata(&self) -> FieldMap {
        self.metadata
            .iter()
            .filter(|(key, _)| !is_stamp_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub(crate) fn record_fetch(&mut self, tag: &str, at: DateTime<Utc>) {
        self.record_stamp(FETCHED_METADATA_TAG, tag, at);
    }

    /// Record `{tag: at}` under metadata `key`, creating the map if needed.
    pub(crate) fn record_stamp(&mut self, key: &str, tag: &str, at: DateTime<Utc>) {
        let entry = self
            .metadata
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(stamps) = entry {
            stamps.insert(tag.to_string(), Value::String(at.to_rfc3339()));
        }
    }

    fn stamp(&self, key: &str, tag: &str) -> Option<DateTime<Utc>> {
        let raw = self.metadata.get(key)?.as_object()?.get(tag)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

fn is_stamp_key(key: &str) -> bool {
    key == FETCHED_METADATA_TAG
        || [
            TerminalKind::Processed,
            TerminalKind::Failed,
            TerminalKind::Discarded,
        ]
        .iter()
        .any(|kind| kind.metadata_key() == key)
}
