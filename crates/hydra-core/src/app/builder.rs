//! StoreBuilder - ストアの構築と起動時準備
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//!
//! [`StoreBuilder::build`] から出てきたストアは status レコードを持ち、
//! prepare 済みなので、claim と mark がすぐ使える。

use std::sync::Arc;

use tracing::info;

use crate::config::{ConfigError, StoreConfig};
use crate::domain::{PipelineStatus, StoreError};
use crate::impls::InMemoryDocumentStore;
use crate::ports::{
    Clock, DocumentStore, DocumentWriter, IdGenerator, StatusCoordinator, SystemClock,
    UlidGenerator,
};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no status record and no retention configured; set default_number_to_keep or call with_status()")]
    MissingStatus,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Bring any store to the prepared state.
///
/// An existing status record wins over `fallback`; `fallback` is only written
/// when the store has none.
pub async fn connect<S>(store: &S, fallback: Option<PipelineStatus>) -> Result<(), BuildError>
where
    S: DocumentStore + ?Sized,
{
    if !store.has_status().await {
        let status = fallback.ok_or(BuildError::MissingStatus)?;
        store.set_status(status).await?;
    }
    store.prepare().await?;
    let status = store.get_status().await?;
    info!(number_to_keep = status.number_to_keep, "store connected");
    Ok(())
}

/// # Example
/// ```ignore
/// let store = StoreBuilder::new(StoreConfig::default())
///     .with_status(PipelineStatus::new(1000))
///     .build()
///     .await?;
/// ```
pub struct StoreBuilder {
    config: StoreConfig,
    status: Option<PipelineStatus>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl StoreBuilder {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            status: None,
            clock: None,
            ids: None,
        }
    }

    /// Retention to write at build time. Overrides `default_number_to_keep`.
    pub fn with_status(mut self, status: PipelineStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub async fn build(self) -> Result<InMemoryDocumentStore, BuildError> {
        self.config.validate()?;
        let status = self.status.or_else(|| {
            self.config
                .default_number_to_keep
                .map(PipelineStatus::new)
        });
        let status = status.ok_or(BuildError::MissingStatus)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        let store = InMemoryDocumentStore::with_ports(self.config, clock, ids);
        connect(&store, Some(status)).await?;
        Ok(store)
    }
}
