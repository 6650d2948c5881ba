//! StageRunner - worker tasks that drive documents through stages.
//!
//! Each worker loops: claim a pending document for its stage (the stage name
//! is the claim tag), run the stage, then mark the document processed,
//! discarded or failed. Shutdown stops new claims; a stage call already in
//! progress finishes and its document is marked.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::registry::StageRegistry;
use crate::config::StoreConfig;
use crate::domain::{Document, StoreError};
use crate::ports::{DocumentReader, DocumentStore, DocumentWriter, Stage, StageContext, StageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    pub workers_per_stage: usize,

    /// Back-off after a claim found nothing (or failed).
    pub poll_interval: Duration,

    pub stage_timeout: Option<Duration>,
}

impl RunnerOptions {
    pub fn from_config(config: &StoreConfig, workers_per_stage: usize) -> Self {
        Self {
            workers_per_stage,
            poll_interval: config.claim_poll_interval(),
            stage_timeout: config.stage_timeout(),
        }
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default(), 1)
    }
}

/// Handle to the running workers.
/// - `request_shutdown()` で新しい claim を止める（処理中の文書は mark まで進む）
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct StageRunner {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl StageRunner {
    /// Spawn `options.workers_per_stage` workers for every registered stage.
    pub fn spawn(
        store: Arc<dyn DocumentStore>,
        registry: &StageRegistry,
        ctx: StageContext,
        options: RunnerOptions,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(registry.len() * options.workers_per_stage);
        for stage in registry.stages() {
            for worker_id in 0..options.workers_per_stage {
                let span = info_span!("stage_worker", stage = %stage.name(), worker = worker_id);
                let worker = StageWorker {
                    store: Arc::clone(&store),
                    stage: Arc::clone(stage),
                    ctx: ctx.clone(),
                    options,
                };
                let rx = shutdown_rx.clone();
                joins.push(tokio::spawn(worker.run(rx).instrument(span)));
            }
        }
        info!(
            stages = registry.len(),
            workers = joins.len(),
            "stage runner started"
        );

        Self { shutdown_tx, joins }
    }

    pub fn worker_count(&self) -> usize {
        self.joins.len()
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "stage worker panicked");
            }
        }
        info!("stage runner stopped");
    }
}

struct StageWorker {
    store: Arc<dyn DocumentStore>,
    stage: Arc<dyn Stage>,
    ctx: StageContext,
    options: RunnerOptions,
}

impl StageWorker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let query = self.stage.query();
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // get_and_tag does not await once it holds the store lock, so
            // dropping it here never leaves a half-claimed document.
            let claimed = tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                claimed = self.store.get_and_tag(&query, self.stage.name()) => claimed,
            };

            match claimed {
                Ok(Some(doc)) => self.handle(doc).await,
                Ok(None) => {
                    if !self.back_off(&mut shutdown_rx).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "claim failed");
                    if !self.back_off(&mut shutdown_rx).await {
                        break;
                    }
                }
            }
        }
        debug!("stage worker stopped");
    }

    /// Sleep for the poll interval. Returns `false` when shutdown arrived.
    async fn back_off(&self, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            changed = shutdown_rx.changed() => changed.is_ok() && !*shutdown_rx.borrow(),
            _ = tokio::time::sleep(self.options.poll_interval) => true,
        }
    }

    async fn handle(&self, mut doc: Document) {
        let tag = self.stage.name();
        let id = doc.id();
        let outcome = match self.options.stage_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.stage.process(&mut doc, &self.ctx)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(StageError::TimedOut(limit)),
                }
            }
            None => self.stage.process(&mut doc, &self.ctx).await,
        };

        let marked = match outcome {
            Ok(()) => {
                debug!(id = ?id, "stage succeeded");
                self.store.mark_processed(&doc, tag).await
            }
            Err(StageError::Discard(reason)) => {
                info!(id = ?id, %reason, "stage discarded document");
                self.store.mark_discarded(&doc, tag).await
            }
            Err(e) => {
                warn!(id = ?id, error = %e, "stage failed");
                self.store.mark_failed(&doc, tag).await
            }
        };

        match marked {
            Ok(()) => {}
            Err(StoreError::DocumentTooLarge { size, limit }) => {
                warn!(id = ?id, size, limit, "stage output too large; failing with stored content");
                self.fail_with_stored(&doc).await;
            }
            Err(e) => error!(id = ?id, error = %e, "terminal mark failed"),
        }
    }

    async fn fail_with_stored(&self, doc: &Document) {
        let Some(id) = doc.id() else {
            return;
        };
        let result = match self.store.get_document_by_id(id, false).await {
            Ok(Some(stored)) => self.store.mark_failed(&stored, self.stage.name()).await,
            Ok(None) => Err(StoreError::NotFound(id)),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!(id = %id, error = %e, "could not fail oversized document");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PipelineStatus, Query, Status};
    use crate::impls::InMemoryDocumentStore;
    use crate::ports::{DocumentReader, DocumentWriter, StatusCoordinator};
    use async_trait::async_trait;
    use serde_json::json;

    struct Scripted;

    #[async_trait]
    impl Stage for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn process(&self, doc: &mut Document, _ctx: &StageContext) -> Result<(), StageError> {
            match doc.content_field("action").and_then(|v| v.as_str()) {
                Some("discard") => Err(StageError::Discard("unwanted".into())),
                Some("fail") => Err(StageError::Failed("broken".into())),
                Some("inflate") => {
                    doc.put_content_field("blob", "y".repeat(4096));
                    Ok(())
                }
                Some("hang") => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => {
                    doc.put_content_field("seen", true);
                    Ok(())
                }
            }
        }
    }

    async fn store() -> Arc<InMemoryDocumentStore> {
        let store = InMemoryDocumentStore::new(StoreConfig::default());
        store.set_status(PipelineStatus::new(100)).await.unwrap();
        store.prepare().await.unwrap();
        Arc::new(store)
    }

    async fn wait_until_drained(store: &InMemoryDocumentStore, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.inactive_size().await.unwrap() < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    fn options() -> RunnerOptions {
        RunnerOptions {
            workers_per_stage: 2,
            poll_interval: Duration::from_millis(10),
            stage_timeout: Some(Duration::from_millis(200)),
        }
    }

    #[tokio::test]
    async fn outcomes_map_to_terminal_statuses() {
        let store = store().await;
        let mut ids = Vec::new();
        for action in ["ok", "discard", "fail", "hang"] {
            let mut doc = Document::new();
            doc.put_content_field("action", action);
            ids.push(store.insert(&mut doc).await.unwrap());
        }

        let mut registry = StageRegistry::new();
        registry.register(Arc::new(Scripted)).unwrap();
        let runner = StageRunner::spawn(store.clone(), &registry, StageContext::new(), options());
        assert_eq!(runner.worker_count(), 2);

        wait_until_drained(&store, 4).await;
        runner.shutdown_and_join().await;

        let mut statuses = Vec::new();
        for id in &ids {
            let doc = store.get_document_by_id(*id, true).await.unwrap().unwrap();
            statuses.push(doc.status());
        }
        assert_eq!(
            statuses,
            vec![Status::Processed, Status::Discarded, Status::Failed, Status::Failed]
        );
        let ok = store.get_document_by_id(ids[0], true).await.unwrap().unwrap();
        assert_eq!(ok.content_field("seen"), Some(&json!(true)));
        assert_eq!(store.active_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn oversized_stage_output_still_leaves_the_active_store() {
        let config = StoreConfig {
            max_document_bytes: 256,
            ..StoreConfig::default()
        };
        let store = Arc::new(InMemoryDocumentStore::new(config));
        store.set_status(PipelineStatus::new(10)).await.unwrap();
        store.prepare().await.unwrap();

        // close to the limit before any stamps are added
        let mut doc = Document::new();
        doc.put_content_field("action", "inflate");
        doc.put_content_field("pad", "x".repeat(150));
        let id = store.insert(&mut doc).await.unwrap();

        let mut registry = StageRegistry::new();
        registry.register(Arc::new(Scripted)).unwrap();
        let runner = StageRunner::spawn(store.clone(), &registry, StageContext::new(), options());

        wait_until_drained(&store, 1).await;
        runner.shutdown_and_join().await;

        assert_eq!(store.active_size().await.unwrap(), 0);
        let done = store.get_document_by_id(id, true).await.unwrap().unwrap();
        assert_eq!(done.status(), Status::Failed);
        assert!(done.content_field("blob").is_none());
        assert_eq!(done.content_field("pad"), Some(&json!("x".repeat(150))));
    }

    #[tokio::test]
    async fn shutdown_stops_idle_workers() {
        let store = store().await;
        let mut registry = StageRegistry::new();
        registry.register(Arc::new(Scripted)).unwrap();
        let runner = StageRunner::spawn(store.clone(), &registry, StageContext::new(), options());

        tokio::time::timeout(Duration::from_secs(5), runner.shutdown_and_join())
            .await
            .unwrap();

        // nothing claims after shutdown
        store.insert(&mut Document::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get_document(&Query::new()).await.unwrap().is_some());
        assert_eq!(store.inactive_size().await.unwrap(), 0);
    }
}
