//! Status - point-in-time view of a store.

use serde::Serialize;

use crate::domain::StoreError;
use crate::ports::{DocumentReader, DocumentStore, StatusCoordinator};

/// Counts and readiness of one store.
///
/// # Example
/// ```ignore
/// let stats = StoreStats::collect(&store).await?;
/// println!("{}", serde_json::to_string_pretty(&stats)?);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub active: usize,
    pub inactive: usize,
    /// `None` when no status record exists.
    pub number_to_keep: Option<u64>,
    pub prepared: bool,
}

impl StoreStats {
    pub async fn collect<S>(store: &S) -> Result<Self, StoreError>
    where
        S: DocumentStore + ?Sized,
    {
        let number_to_keep = match store.get_status().await {
            Ok(status) => Some(status.number_to_keep),
            Err(StoreError::NoStatus) => None,
            Err(e) => return Err(e),
        };
        Ok(Self {
            active: store.active_size().await?,
            inactive: store.inactive_size().await?,
            number_to_keep,
            prepared: store.is_prepared().await,
        })
    }
}
