//! Codecs between domain values and their stored / external forms.

pub mod content;
pub mod identity;

pub use content::{DocumentBody, EncodedBody};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid document id {0}")]
    InvalidId(String),
}
