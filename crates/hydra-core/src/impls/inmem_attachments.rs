//! InMemoryAttachments - attachment source backed by a map of byte buffers.
//!
//! Used by tests and the demo CLI. Files are keyed by `(document id, name)`.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::DocumentId;
use crate::ports::{AttachmentError, AttachmentSource, AttachmentStream};

#[derive(Debug, Clone, Default)]
pub struct InMemoryAttachments {
    files: Arc<RwLock<HashMap<DocumentId, BTreeMap<String, Arc<[u8]>>>>>,
}

impl InMemoryAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `bytes` to `id` as `name`, replacing an existing file.
    pub async fn put(&self, id: DocumentId, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let mut files = self.files.write().await;
        files
            .entry(id)
            .or_default()
            .insert(name.into(), Arc::from(bytes.into()));
    }
}

#[async_trait]
impl AttachmentSource for InMemoryAttachments {
    async fn file_names(&self, id: DocumentId) -> Result<Vec<String>, AttachmentError> {
        let files = self.files.read().await;
        Ok(files
            .get(&id)
            .map(|named| named.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn file(&self, name: &str, id: DocumentId) -> Result<AttachmentStream, AttachmentError> {
        let files = self.files.read().await;
        let bytes = files
            .get(&id)
            .and_then(|named| named.get(name))
            .cloned()
            .ok_or_else(|| AttachmentError::NotFound {
                name: name.to_string(),
                id,
            })?;
        Ok(Box::pin(Cursor::new(bytes)))
    }
}
