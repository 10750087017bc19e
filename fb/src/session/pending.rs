//! Pending-request correlation table
//!
//! An explicit bounded map from sequence id to an unresolved reply slot.
//! Every entry leaves the table exactly once: response arrival, timeout
//! eviction, or close-time drain. The sequence counter lives in the core
//! task and dies with it, so entries can never leak across a reconnect.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::messages::SessionResponse;

/// One in-flight request awaiting its response
#[derive(Debug)]
pub(crate) struct PendingRequest {
    /// Request message name, kept for diagnostics
    pub name: String,

    /// Completion slot, resolved exactly once
    pub reply: oneshot::Sender<SessionResponse<Value>>,

    /// When the request times out
    pub deadline: Instant,
}

/// Bounded map of in-flight requests keyed by sequence id
#[derive(Debug)]
pub(crate) struct PendingTable {
    entries: HashMap<u32, PendingRequest>,
    capacity: usize,
}

impl PendingTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register an in-flight request; hands the entry back when full
    pub fn insert(&mut self, seq: u32, entry: PendingRequest) -> Result<(), PendingRequest> {
        if self.entries.len() >= self.capacity {
            return Err(entry);
        }
        self.entries.insert(seq, entry);
        Ok(())
    }

    /// Remove and return the entry for a response's sequence id
    pub fn take(&mut self, seq: u32) -> Option<PendingRequest> {
        self.entries.remove(&seq)
    }

    /// Remove and return every entry whose deadline has passed
    pub fn take_expired(&mut self, now: Instant) -> Vec<PendingRequest> {
        let expired: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(seq, _)| *seq)
            .collect();
        expired.into_iter().filter_map(|seq| self.entries.remove(&seq)).collect()
    }

    /// Remove and return everything, for close-time rejection
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(deadline: Instant) -> (PendingRequest, oneshot::Receiver<SessionResponse<Value>>) {
        let (tx, rx) = oneshot::channel();
        (
            PendingRequest {
                name: "Test".to_string(),
                reply: tx,
                deadline,
            },
            rx,
        )
    }

    #[test]
    fn test_insert_and_take() {
        let mut table = PendingTable::new(4);
        let now = Instant::now();
        let (pending, _rx) = entry(now + Duration::from_secs(1));

        table.insert(1, pending).unwrap();
        assert_eq!(table.len(), 1);

        assert!(table.take(1).is_some());
        // Resolved entries are never retained
        assert!(table.take(1).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_rejects_when_full() {
        let mut table = PendingTable::new(2);
        let now = Instant::now();

        for seq in 0..2 {
            let (pending, _rx) = entry(now + Duration::from_secs(1));
            table.insert(seq, pending).unwrap();
        }

        let (pending, _rx) = entry(now + Duration::from_secs(1));
        assert!(table.insert(99, pending).is_err());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_take_expired_removes_only_past_deadlines() {
        let mut table = PendingTable::new(4);
        let now = Instant::now();

        let (expired, _rx1) = entry(now - Duration::from_millis(1));
        let (alive, _rx2) = entry(now + Duration::from_secs(5));
        table.insert(1, expired).unwrap();
        table.insert(2, alive).unwrap();

        let evicted = table.take_expired(now);
        assert_eq!(evicted.len(), 1);
        assert_eq!(table.len(), 1);
        assert!(table.take(2).is_some());
    }

    #[test]
    fn test_drain_empties_the_table() {
        let mut table = PendingTable::new(4);
        let now = Instant::now();

        for seq in 0..3 {
            let (pending, _rx) = entry(now + Duration::from_secs(1));
            table.insert(seq, pending).unwrap();
        }

        assert_eq!(table.drain().len(), 3);
        assert!(table.is_empty());
    }
}
