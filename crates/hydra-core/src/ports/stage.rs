//! Stage port - the processing steps that consume claimed documents.
//!
//! A stage gets a claimed document, edits its content fields and returns.
//! It never claims or marks documents itself; [`crate::app::StageRunner`]
//! does that around it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::{AttachmentError, AttachmentSource};
use crate::domain::{Document, Query};

#[derive(Debug, Error)]
pub enum StageError {
    /// The document should leave the pipeline as `Discarded`.
    #[error("discarded: {0}")]
    Discard(String),

    #[error("processing failed: {0}")]
    Failed(String),

    #[error("stage timed out after {0:?}")]
    TimedOut(Duration),

    #[error("no attachment source configured")]
    NoAttachments,

    #[error(transparent)]
    Attachment(#[from] AttachmentError),
}

/// What a stage may reach besides the document.
#[derive(Clone, Default)]
pub struct StageContext {
    attachments: Option<Arc<dyn AttachmentSource>>,
}

impl StageContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attachments(mut self, attachments: Arc<dyn AttachmentSource>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn attachments(&self) -> Result<&dyn AttachmentSource, StageError> {
        self.attachments.as_deref().ok_or(StageError::NoAttachments)
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name; the runner also uses it as the claim tag.
    fn name(&self) -> &str;

    /// Which pending documents this stage wants. Defaults to all of them.
    fn query(&self) -> Query {
        Query::new()
    }

    async fn process(&self, doc: &mut Document, ctx: &StageContext) -> Result<(), StageError>;
}
