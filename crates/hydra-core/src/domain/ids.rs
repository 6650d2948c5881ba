//! Document identifiers.
//!
//! Ids are ULIDs: 128-bit, sortable by creation time, and generated without
//! coordination, so any writer can assign one at insert time.
//!
//! Three forms are supported and all of them decode back to an equal id:
//! - native: [`DocumentId`] itself (wrapping [`Ulid`])
//! - primitive: a JSON string value (`serde_json::Value::String`)
//! - string: the canonical 26-character ULID text, optionally prefixed with
//!   `doc-` as printed by `Display`
//!
//! See [`crate::codec::identity`] for the JSON conversions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::codec::CodecError;

const DISPLAY_PREFIX: &str = "doc-";

/// Identifier of a document, stable across the active and history stores.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Ulid);

impl DocumentId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Canonical ULID text without the display prefix.
    pub fn to_canonical(&self) -> String {
        self.0.to_string()
    }
}

impl From<Ulid> for DocumentId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DISPLAY_PREFIX}{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(DISPLAY_PREFIX).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self)
            .map_err(|e| CodecError::InvalidId(format!("{s:?}: {e}")))
    }
}
