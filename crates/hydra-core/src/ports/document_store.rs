//! DocumentStore ports - active / history ストアと status の窓口
//!
//! 3 つの trait に分かれる：
//! - **DocumentReader**: 参照系（lookup、件数、history の tail）
//! - **DocumentWriter**: 更新系（insert / update / claim / 終端遷移 / prepare）
//! - **StatusCoordinator**: パイプライン status レコードと準備状態
//!
//! # 設計原則
//! - claim（`get_and_tag`）は 1 文書を高々 1 つの tag にしか渡さない
//! - 終端遷移は active からの削除と history への追加を一度に行う
//! - 呼び出し側（StageRunner、bootstrap、CLI）はこの trait だけを見る
//!
//! # 実装
//! - **InMemoryDocumentStore**: [`crate::impls::memory`]

use async_trait::async_trait;

use crate::domain::{Document, DocumentId, PipelineStatus, Query, StoreError, TerminalKind};
use crate::tail::TailableIterator;

/// Read side: lookups, sizes and the history tail.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// First active document (any status) matching `query`. No state change.
    async fn get_document(&self, query: &Query) -> Result<Option<Document>, StoreError>;

    /// Point lookup. With `include_history`, misses fall through to history.
    async fn get_document_by_id(
        &self,
        id: DocumentId,
        include_history: bool,
    ) -> Result<Option<Document>, StoreError>;

    /// Number of documents in the active store.
    async fn active_size(&self) -> Result<usize, StoreError>;

    /// Number of documents retained in history.
    async fn inactive_size(&self) -> Result<usize, StoreError>;

    /// Tail history from now on. Requires a prepared store.
    async fn inactive_iterator(&self) -> Result<TailableIterator, StoreError>;
}

/// Write side: insert/update, the atomic claim, terminal transitions.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Persist a new document as `Pending`. Assigns an id when `doc` has none
    /// and writes it back into `doc` on success.
    ///
    /// # Errors
    /// `DocumentTooLarge` when the encoded body exceeds the record limit;
    /// nothing is stored and `doc` is left as it was.
    async fn insert(&self, doc: &mut Document) -> Result<DocumentId, StoreError>;

    /// Replace content and metadata of an active document. Status is kept.
    async fn update(&self, doc: &Document) -> Result<(), StoreError>;

    /// Atomically claim one pending document matching `query` for `tag`.
    ///
    /// Returns `Ok(None)` when nothing is claimable.
    async fn get_and_tag(&self, query: &Query, tag: &str) -> Result<Option<Document>, StoreError>;

    /// Move a document claimed by `tag` to history with a terminal status.
    async fn mark(&self, doc: &Document, tag: &str, kind: TerminalKind) -> Result<(), StoreError>;

    async fn mark_processed(&self, doc: &Document, tag: &str) -> Result<(), StoreError> {
        self.mark(doc, tag, TerminalKind::Processed).await
    }

    async fn mark_failed(&self, doc: &Document, tag: &str) -> Result<(), StoreError> {
        self.mark(doc, tag, TerminalKind::Failed).await
    }

    async fn mark_discarded(&self, doc: &Document, tag: &str) -> Result<(), StoreError> {
        self.mark(doc, tag, TerminalKind::Discarded).await
    }

    /// Create missing collections and bound history by the current status.
    /// Idempotent.
    async fn prepare(&self) -> Result<(), StoreError>;
}

/// Pipeline status record and readiness.
#[async_trait]
pub trait StatusCoordinator: Send + Sync {
    async fn has_status(&self) -> bool;

    /// # Errors
    /// `NoStatus` when no record was ever written.
    async fn get_status(&self) -> Result<PipelineStatus, StoreError>;

    /// Write the status record. A new `number_to_keep` is applied by the
    /// next `prepare()`.
    async fn set_status(&self, status: PipelineStatus) -> Result<(), StoreError>;

    /// Status set and `prepare()` done.
    async fn is_prepared(&self) -> bool;
}

/// Everything a pipeline needs from one store handle.
pub trait DocumentStore: DocumentReader + DocumentWriter + StatusCoordinator {}

impl<T> DocumentStore for T where T: DocumentReader + DocumentWriter + StatusCoordinator + ?Sized {}
