//! AttachmentSource port - files attached to documents.
//!
//! Attachments live outside the store; documents only reference them by id.
//! Stages reach them through [`crate::ports::StageContext`].

use std::pin::Pin;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::domain::DocumentId;

pub type AttachmentStream = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("no attachment {name:?} for {id}")]
    NotFound { name: String, id: DocumentId },

    #[error("attachment io: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Names of the files attached to `id` (empty when there are none).
    async fn file_names(&self, id: DocumentId) -> Result<Vec<String>, AttachmentError>;

    async fn file(&self, name: &str, id: DocumentId) -> Result<AttachmentStream, AttachmentError>;
}
