//! hydra-core
//!
//! Document queue for multi-stage processing pipelines.
//!
//! # Modules
//! - **domain**: documents, ids, statuses, queries, retention status, errors
//! - **codec**: content codec (null stripping, size) and identity codec
//! - **ports**: store traits, stage/attachment boundary, clock, id generator
//! - **impls**: in-memory store and attachment source
//! - **tail**: the history tailing iterator
//! - **app**: builder, stage registry, stage runner, stats
//! - **config**: TOML configuration

pub mod app;
pub mod codec;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod tail;

pub use crate::app::{StageRegistry, StageRunner, StoreBuilder, StoreStats};
pub use crate::config::StoreConfig;
pub use crate::domain::{Document, DocumentId, PipelineStatus, Query, Status, StoreError};
pub use crate::impls::InMemoryDocumentStore;
pub use crate::ports::{DocumentReader, DocumentStore, DocumentWriter, StatusCoordinator};
pub use crate::tail::{Interrupter, TailableIterator};
