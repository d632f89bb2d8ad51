use crate::domain::EventRecord;
use std::collections::VecDeque;

/// Ordered in-memory buffer of records awaiting delivery.
///
/// Records leave the queue only through [`EventQueue::drain_all`]; a drained
/// set that failed delivery comes back through [`EventQueue::requeue_front`]
/// and lands ahead of anything appended since the drain.
#[derive(Debug, Default)]
pub struct EventQueue {
    records: VecDeque<EventRecord>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn append(&mut self, record: EventRecord) {
        self.records.push_back(record);
    }

    /// Removes and returns every queued record, leaving the queue empty.
    pub fn drain_all(&mut self) -> Vec<EventRecord> {
        self.records.drain(..).collect()
    }

    /// Puts a previously drained set back at the head, keeping its order.
    pub fn requeue_front(&mut self, records: Vec<EventRecord>) {
        if self.records.is_empty() {
            self.records.extend(records);
            return;
        }

        self.records.reserve(records.len());
        for record in records.into_iter().rev() {
            self.records.push_front(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }
}
