//! Query: predicate used by claims and lookups.

use serde_json::Value;

use super::Document;

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    ContentEquals(String, Value),
    ContentExists(String),
    ContentMissing(String),
    FetchedBy(String),
    NotFetchedBy(String),
}

impl Condition {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Condition::ContentEquals(field, value) => doc.content_field(field) == Some(value),
            Condition::ContentExists(field) => doc.has_content_field(field),
            Condition::ContentMissing(field) => !doc.has_content_field(field),
            Condition::FetchedBy(tag) => doc.was_fetched_by(tag),
            Condition::NotFetchedBy(tag) => !doc.was_fetched_by(tag),
        }
    }
}

/// Conjunction of conditions over content fields and claim history.
///
/// `Query::new()` matches every document. Claims add the `Pending` status
/// condition themselves, so an empty query passed to a claim means "any
/// pending document".
///
/// ```ignore
/// let query = Query::new()
///     .content_exists("url")
///     .not_fetched_by("render-html");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::ContentEquals(field.into(), value.into()));
        self
    }

    pub fn content_exists(mut self, field: impl Into<String>) -> Self {
        self.conditions.push(Condition::ContentExists(field.into()));
        self
    }

    pub fn content_missing(mut self, field: impl Into<String>) -> Self {
        self.conditions.push(Condition::ContentMissing(field.into()));
        self
    }

    pub fn fetched_by(mut self, tag: impl Into<String>) -> Self {
        self.conditions.push(Condition::FetchedBy(tag.into()));
        self
    }

    pub fn not_fetched_by(mut self, tag: impl Into<String>) -> Self {
        self.conditions.push(Condition::NotFetchedBy(tag.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}
