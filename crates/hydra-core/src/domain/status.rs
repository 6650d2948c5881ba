//! Status - 文書の状態
//!
//! active ストアにいる間は Pending / Processing、history に移ると終端状態になる。

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a document is in its lifecycle.
///
/// State transitions:
/// - Pending -> Processing (claimed by a tag)
/// - Processing -> Processed | Failed | Discarded (moved to history)
///
/// Terminal statuses never change again; a document carrying one lives in the
/// history store until it is evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Inserted and waiting for a claim.
    #[default]
    Pending,

    /// Claimed by a worker tag.
    Processing,

    Processed,
    Failed,
    Discarded,
}

impl Status {
    /// Is this a terminal status (document belongs to history)?
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Processed | Status::Failed | Status::Discarded)
    }

    /// Can a claim pick this document up?
    pub fn is_claimable(self) -> bool {
        matches!(self, Status::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Processed => "processed",
            Status::Failed => "failed",
            Status::Discarded => "discarded",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three ways a claimed document can leave the active store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    Processed,
    Failed,
    Discarded,
}

impl TerminalKind {
    pub fn status(self) -> Status {
        match self {
            TerminalKind::Processed => Status::Processed,
            TerminalKind::Failed => Status::Failed,
            TerminalKind::Discarded => Status::Discarded,
        }
    }

    /// Metadata key under which the terminal stamp `{tag: time}` is recorded.
    pub fn metadata_key(self) -> &'static str {
        self.status().as_str()
    }
}
