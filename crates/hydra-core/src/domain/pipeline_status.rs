use serde::{Deserialize, Serialize};

/// Pipeline-wide configuration record.
///
/// Only `number_to_keep` matters to the store: it bounds the history.
/// A store with no record at all is in the "no status set" state, which is
/// different from `number_to_keep == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub number_to_keep: u64,
}

impl PipelineStatus {
    pub fn new(number_to_keep: u64) -> Self {
        Self { number_to_keep }
    }
}
