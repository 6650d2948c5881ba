//! Active collection: one row per in-flight document, keyed by id.

use std::collections::{BTreeMap, HashMap};

use crate::codec::{CodecError, EncodedBody, content};
use crate::domain::{Document, DocumentId, Status};

#[derive(Debug, Clone)]
pub(super) struct ActiveRecord {
    pub status: Status,
    pub body: EncodedBody,
    /// Insertion order; claims and lookups prefer the oldest match.
    pub arrival: u64,
}

impl ActiveRecord {
    pub fn decode(&self, id: DocumentId) -> Result<Document, CodecError> {
        let body = content::decode(&self.body)?;
        Ok(Document::from_parts(id, self.status, body.content, body.metadata))
    }
}

#[derive(Debug, Default)]
pub(super) struct ActiveCollection {
    records: HashMap<DocumentId, ActiveRecord>,
    /// arrival -> id, kept in step with `records`.
    by_arrival: BTreeMap<u64, DocumentId>,
    next_arrival: u64,
}

impl ActiveCollection {
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.records.contains_key(id)
    }

    pub fn insert(&mut self, id: DocumentId, body: EncodedBody) {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        self.by_arrival.insert(arrival, id);
        self.records.insert(
            id,
            ActiveRecord {
                status: Status::Pending,
                body,
                arrival,
            },
        );
    }

    pub fn get(&self, id: &DocumentId) -> Option<&ActiveRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &DocumentId) -> Option<&mut ActiveRecord> {
        self.records.get_mut(id)
    }

    pub fn remove(&mut self, id: &DocumentId) -> Option<ActiveRecord> {
        let record = self.records.remove(id)?;
        self.by_arrival.remove(&record.arrival);
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records in insertion order. Lazy, so a scan that stops at the first
    /// match does not touch the rest of the collection.
    pub fn iter_by_arrival(&self) -> impl Iterator<Item = (DocumentId, &ActiveRecord)> + '_ {
        self.by_arrival
            .values()
            .filter_map(|id| self.records.get(id).map(|record| (*id, record)))
    }
}
