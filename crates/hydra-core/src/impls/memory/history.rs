//! History log: append-ordered, count-bounded, oldest evicted first.
//!
//! Every entry gets a sequence number at append time; sequence numbers are
//! never reused, so a tail position survives evictions. A tailer that falls
//! further behind than the retention window finds its next entries evicted;
//! [`HistoryLog::read_from`] reports how many were skipped.

use std::collections::VecDeque;

use crate::codec::{CodecError, EncodedBody, content};
use crate::domain::{Document, DocumentId, Status};

#[derive(Debug, Clone)]
pub(super) struct HistoryEntry {
    pub seq: u64,
    pub id: DocumentId,
    pub status: Status,
    pub body: EncodedBody,
}

impl HistoryEntry {
    pub fn decode(&self) -> Result<Document, CodecError> {
        let body = content::decode(&self.body)?;
        Ok(Document::from_parts(
            self.id,
            self.status,
            body.content,
            body.metadata,
        ))
    }
}

/// Result of reading history from a tail position.
#[derive(Debug)]
pub(super) struct HistoryBatch {
    pub entries: Vec<HistoryEntry>,
    /// Entries at or after the position that were evicted before this read.
    pub skipped: u64,
    /// Position to read from next time.
    pub next_cursor: u64,
}

#[derive(Debug)]
pub(super) struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    next_seq: u64,
    capacity: usize,
}

impl HistoryLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the bound. Nothing is evicted here; a smaller bound is applied
    /// by the next append.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Append and trim. Returns the new entry's sequence number and how many
    /// entries were evicted.
    pub fn append(&mut self, id: DocumentId, status: Status, body: EncodedBody) -> (u64, usize) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(HistoryEntry {
            seq,
            id,
            status,
            body,
        });

        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        (seq, evicted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sequence number the next append will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Most recent entry for `id`.
    pub fn find(&self, id: &DocumentId) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|entry| entry.id == *id)
    }

    pub fn read_from(&self, cursor: u64) -> HistoryBatch {
        let oldest = self.entries.front().map_or(self.next_seq, |entry| entry.seq);
        let skipped = oldest.saturating_sub(cursor);
        let entries = self
            .entries
            .iter()
            .filter(|entry| entry.seq >= cursor)
            .cloned()
            .collect();
        HistoryBatch {
            entries,
            skipped,
            next_cursor: self.next_seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldMap;
    use serde_json::json;
    use ulid::Ulid;

    fn body(n: i64) -> EncodedBody {
        let mut content = FieldMap::new();
        content.insert("num".into(), json!(n));
        content::encode(&content, &FieldMap::new()).unwrap()
    }

    fn append_n(log: &mut HistoryLog, n: i64) -> Vec<DocumentId> {
        (0..n)
            .map(|i| {
                let id = DocumentId::from_ulid(Ulid::new());
                log.append(id, Status::Processed, body(i));
                id
            })
            .collect()
    }

    fn nums(batch: &HistoryBatch) -> Vec<i64> {
        batch
            .entries
            .iter()
            .map(|e| e.decode().unwrap().content_field("num").unwrap().as_i64().unwrap())
            .collect()
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut log = HistoryLog::with_capacity(3);
        let ids = append_n(&mut log, 5);

        assert_eq!(log.len(), 3);
        assert!(log.find(&ids[0]).is_none());
        assert!(log.find(&ids[1]).is_none());
        assert!(log.find(&ids[4]).is_some());
        assert_eq!(nums(&log.read_from(0)), vec![2, 3, 4]);
    }

    #[test]
    fn read_from_reports_skipped_entries() {
        let mut log = HistoryLog::with_capacity(2);
        append_n(&mut log, 5);

        let batch = log.read_from(1);
        assert_eq!(batch.skipped, 2);
        assert_eq!(nums(&batch), vec![3, 4]);
        assert_eq!(batch.next_cursor, 5);

        let caught_up = log.read_from(5);
        assert!(caught_up.entries.is_empty());
        assert_eq!(caught_up.skipped, 0);
    }

    #[test]
    fn enlarging_stops_eviction_until_new_bound() {
        let mut log = HistoryLog::with_capacity(2);
        append_n(&mut log, 2);
        log.set_capacity(4);
        append_n(&mut log, 2);
        assert_eq!(log.len(), 4);
        append_n(&mut log, 1);
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn shrinking_applies_on_next_append() {
        let mut log = HistoryLog::with_capacity(5);
        append_n(&mut log, 5);
        log.set_capacity(2);
        assert_eq!(log.len(), 5);

        let (_, evicted) = log.append(DocumentId::from_ulid(Ulid::new()), Status::Failed, body(9));
        assert_eq!(evicted, 4);
        assert_eq!(log.len(), 2);
        assert_eq!(nums(&log.read_from(0)), vec![4, 9]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut log = HistoryLog::with_capacity(0);
        append_n(&mut log, 3);
        assert_eq!(log.len(), 0);
        assert_eq!(log.next_seq(), 3);
        assert_eq!(log.read_from(0).skipped, 3);
    }
}
