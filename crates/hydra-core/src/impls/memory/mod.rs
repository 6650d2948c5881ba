//! In-memory document store.
//!
//! One `tokio::sync::Mutex` guards the active collection, the history log and
//! the status record. Every operation takes the lock once and finishes under
//! it, which makes claims a true compare-and-swap: the "is it pending?" check
//! and the "now it is processing" write cannot be split by another caller.
//!
//! History appends publish the new head sequence on a `watch` channel. Tail
//! feeders wait on that channel instead of polling.

mod active;
mod history;

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use self::active::ActiveCollection;
use self::history::HistoryLog;
use crate::codec::{EncodedBody, content};
use crate::config::StoreConfig;
use crate::domain::{
    Document, DocumentId, PipelineStatus, Query, Status, StoreError, TerminalKind,
};
use crate::ports::{
    Clock, DocumentReader, DocumentWriter, IdGenerator, StatusCoordinator, SystemClock,
    UlidGenerator,
};
use crate::tail::{TailFeed, TailableIterator};

#[derive(Debug, Default)]
struct StoreState {
    active: ActiveCollection,

    /// `None` until `prepare()` creates the collection.
    history: Option<HistoryLog>,

    /// The configuration record.
    status: Option<PipelineStatus>,
}

impl StoreState {
    fn ensure_ready(&self) -> Result<(), StoreError> {
        if self.status.is_none() || self.history.is_none() {
            return Err(StoreError::NotPrepared);
        }
        Ok(())
    }
}

struct Shared {
    state: Mutex<StoreState>,
    /// Sequence number of the next history append.
    history_head: watch::Sender<u64>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

/// In-memory implementation of every store port.
///
/// Cloning gives another handle to the same store.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    shared: Arc<Shared>,
}

fn retention_capacity(status: &PipelineStatus) -> usize {
    usize::try_from(status.number_to_keep).unwrap_or(usize::MAX)
}

impl InMemoryDocumentStore {
    /// Empty, unprepared store with no status record.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_ports(
            config,
            Arc::new(SystemClock),
            Arc::new(UlidGenerator::new(SystemClock)),
        )
    }

    pub fn with_ports(
        config: StoreConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let (history_head, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(StoreState::default()),
                history_head,
                config,
                clock,
                ids,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Encode a caller write and enforce the record limit.
    ///
    /// The limit is measured without the store's own stamps (`fetched` and
    /// the terminal keys). Every active record therefore fits once its stamps
    /// are left out, and adding a stamp can never push it over.
    fn encode_checked(&self, doc: &Document) -> Result<EncodedBody, StoreError> {
        let body = content::encode(doc.content_fields(), doc.metadata())?;
        let limit = self.shared.config.max_document_bytes;
        if body.len() <= limit {
            return Ok(body);
        }
        let size = content::encode(doc.content_fields(), &doc.caller_metadata())?.len();
        if size > limit {
            return Err(StoreError::DocumentTooLarge { size, limit });
        }
        Ok(body)
    }
}

#[async_trait]
impl DocumentReader for InMemoryDocumentStore {
    async fn get_document(&self, query: &Query) -> Result<Option<Document>, StoreError> {
        let state = self.shared.state.lock().await;
        for (id, record) in state.active.iter_by_arrival() {
            let doc = record.decode(id)?;
            if query.matches(&doc) {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    async fn get_document_by_id(
        &self,
        id: DocumentId,
        include_history: bool,
    ) -> Result<Option<Document>, StoreError> {
        let state = self.shared.state.lock().await;
        if let Some(record) = state.active.get(&id) {
            return Ok(Some(record.decode(id)?));
        }
        if include_history
            && let Some(entry) = state.history.as_ref().and_then(|h| h.find(&id))
        {
            return Ok(Some(entry.decode()?));
        }
        Ok(None)
    }

    async fn active_size(&self) -> Result<usize, StoreError> {
        Ok(self.shared.state.lock().await.active.len())
    }

    async fn inactive_size(&self) -> Result<usize, StoreError> {
        let state = self.shared.state.lock().await;
        Ok(state.history.as_ref().map_or(0, HistoryLog::len))
    }

    async fn inactive_iterator(&self) -> Result<TailableIterator, StoreError> {
        // Position and subscription are taken under the lock, so no append can
        // land between them.
        let (cursor, head) = {
            let state = self.shared.state.lock().await;
            let history = state.history.as_ref().ok_or(StoreError::NotPrepared)?;
            (history.next_seq(), self.shared.history_head.subscribe())
        };
        debug!(cursor, "starting history tail");
        let shared = Arc::downgrade(&self.shared);
        Ok(TailableIterator::spawn(
            self.shared.config.tail_buffer,
            move |feed| tail_history(shared, head, cursor, feed),
        ))
    }
}

/// Feeder task behind [`InMemoryDocumentStore::inactive_iterator`].
///
/// Holds only a weak handle so a forgotten iterator does not keep the store
/// alive; losing the store while tailing counts as a read failure.
async fn tail_history(
    shared: Weak<Shared>,
    mut head: watch::Receiver<u64>,
    mut cursor: u64,
    feed: TailFeed,
) {
    loop {
        let latest = *head.borrow_and_update();
        if cursor < latest {
            let Some(store) = shared.upgrade() else {
                feed.fail("history store was dropped");
                return;
            };
            let batch = {
                let state = store.state.lock().await;
                match state.history.as_ref() {
                    Some(history) => history.read_from(cursor),
                    None => {
                        feed.fail("history collection disappeared");
                        return;
                    }
                }
            };
            drop(store);

            if batch.skipped > 0 {
                warn!(
                    skipped = batch.skipped,
                    cursor, "tail fell behind retention; evicted entries were not delivered"
                );
            }
            for entry in batch.entries {
                let doc = match entry.decode() {
                    Ok(doc) => doc,
                    Err(e) => {
                        feed.fail(format!("decoding history entry {}: {e}", entry.seq));
                        return;
                    }
                };
                if !feed.deliver(doc).await {
                    return;
                }
            }
            cursor = batch.next_cursor;
            continue;
        }

        tokio::select! {
            biased;
            _ = feed.cancelled() => return,
            changed = head.changed() => {
                if changed.is_err() {
                    feed.fail("history store was dropped");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl DocumentWriter for InMemoryDocumentStore {
    async fn insert(&self, doc: &mut Document) -> Result<DocumentId, StoreError> {
        let body = self.encode_checked(doc)?;
        let id = doc
            .id()
            .unwrap_or_else(|| self.shared.ids.generate_document_id());
        {
            let mut state = self.shared.state.lock().await;
            if state.active.contains(&id) {
                return Err(StoreError::AlreadyExists(id));
            }
            state.active.insert(id, body);
        }
        doc.set_id(id);
        doc.set_status(Status::Pending);
        debug!(id = %id, "inserted document");
        Ok(id)
    }

    async fn update(&self, doc: &Document) -> Result<(), StoreError> {
        let id = doc.id().ok_or(StoreError::MissingId)?;
        let body = self.encode_checked(doc)?;
        let mut state = self.shared.state.lock().await;
        let record = state.active.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.body = body;
        debug!(id = %id, "updated document");
        Ok(())
    }

    async fn get_and_tag(&self, query: &Query, tag: &str) -> Result<Option<Document>, StoreError> {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock().await;
        state.ensure_ready()?;

        let mut candidate = None;
        for (id, record) in state.active.iter_by_arrival() {
            if !record.status.is_claimable() {
                continue;
            }
            let doc = record.decode(id)?;
            if query.matches(&doc) {
                candidate = Some(doc);
                break;
            }
        }
        let Some(mut doc) = candidate else {
            return Ok(None);
        };
        let id = doc.id().ok_or(StoreError::MissingId)?;

        doc.record_fetch(tag, now);
        doc.set_status(Status::Processing);
        // only a stamp was added; the caller part passed the limit when written
        let body = content::encode(doc.content_fields(), doc.metadata())?;

        let record = state.active.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.status = Status::Processing;
        record.body = body;
        debug!(id = %id, tag, "claimed document");
        Ok(Some(doc))
    }

    async fn mark(&self, doc: &Document, tag: &str, kind: TerminalKind) -> Result<(), StoreError> {
        let id = doc.id().ok_or(StoreError::MissingId)?;
        let now = self.shared.clock.now();
        let mut guard = self.shared.state.lock().await;
        guard.ensure_ready()?;
        let state = &mut *guard;

        let record = state.active.get(&id).ok_or(StoreError::NotFound(id))?;
        let stored = record.decode(id)?;
        if !stored.was_fetched_by(tag) {
            return Err(StoreError::UnauthorizedTransition {
                id,
                tag: tag.to_string(),
            });
        }

        // Caller's content, store's claim history.
        let mut finished = Document::from_parts(
            id,
            kind.status(),
            doc.content_fields().clone(),
            stored.metadata().clone(),
        );
        finished.record_stamp(kind.metadata_key(), tag, now);
        let body = self.encode_checked(&finished)?;

        let history = state.history.as_mut().ok_or(StoreError::NotPrepared)?;
        state.active.remove(&id);
        let (seq, evicted) = history.append(id, kind.status(), body);
        self.shared.history_head.send_replace(history.next_seq());

        info!(id = %id, tag, status = %kind.status(), seq, "document left active store");
        if evicted > 0 {
            debug!(evicted, retained = history.len(), "trimmed history");
        }
        Ok(())
    }

    async fn prepare(&self) -> Result<(), StoreError> {
        let mut state = self.shared.state.lock().await;
        let status = state.status.ok_or(StoreError::NoStatus)?;
        let capacity = retention_capacity(&status);
        match state.history.as_mut() {
            Some(history) => {
                if history.capacity() != capacity {
                    info!(
                        from = history.capacity(),
                        to = capacity,
                        "history bound changed"
                    );
                }
                history.set_capacity(capacity);
            }
            None => {
                info!(capacity, "created history collection");
                state.history = Some(HistoryLog::with_capacity(capacity));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StatusCoordinator for InMemoryDocumentStore {
    async fn has_status(&self) -> bool {
        self.shared.state.lock().await.status.is_some()
    }

    async fn get_status(&self) -> Result<PipelineStatus, StoreError> {
        self.shared
            .state
            .lock()
            .await
            .status
            .ok_or(StoreError::NoStatus)
    }

    async fn set_status(&self, status: PipelineStatus) -> Result<(), StoreError> {
        self.shared.state.lock().await.status = Some(status);
        info!(number_to_keep = status.number_to_keep, "status written");
        Ok(())
    }

    async fn is_prepared(&self) -> bool {
        self.shared.state.lock().await.ensure_ready().is_ok()
    }
}
