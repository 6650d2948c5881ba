//! Errors - ストア操作のエラー型
//!
//! # 分類
//! - 対象なし: `NotFound`
//! - 入力の問題: `DocumentTooLarge`, `AlreadyExists`, `MissingId`
//! - 準備不足: `NoStatus`, `NotPrepared`
//! - 権限のない遷移: `UnauthorizedTransition`
//! - 読み出し失敗: `Codec`, `IterationFailure`

use thiserror::Error;

use super::DocumentId;
use crate::codec::CodecError;

/// Errors surfaced by the active/history stores and the status coordinator.
///
/// A claim that finds nothing is not an error: it returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    #[error("document already exists: {0}")]
    AlreadyExists(DocumentId),

    #[error("document has no id; insert it first")]
    MissingId,

    #[error("encoded document is {size} bytes, limit is {limit}")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("tag {tag:?} never claimed document {id}")]
    UnauthorizedTransition { id: DocumentId, tag: String },

    #[error("store is not prepared; set a status and call prepare() first")]
    NotPrepared,

    #[error("no status set")]
    NoStatus,

    #[error("history iteration failed: {0}")]
    IterationFailure(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StoreError {
    /// Lookup misses are recoverable; callers typically treat them as "empty".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::MissingId)
    }
}
