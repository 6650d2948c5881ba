//! Domain model: ids, documents, statuses, queries, retention status, errors.

pub mod document;
pub mod errors;
pub mod ids;
pub mod pipeline_status;
pub mod query;
pub mod status;

pub use document::{Document, FETCHED_METADATA_TAG, FieldMap};
pub use errors::StoreError;
pub use ids::DocumentId;
pub use pipeline_status::PipelineStatus;
pub use query::Query;
pub use status::{Status, TerminalKind};
