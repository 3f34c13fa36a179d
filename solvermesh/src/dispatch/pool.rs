//! The worker pool: idle/busy bookkeeping and assignment channels.

use crate::worker::{SolveAssignment, WorkerId};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::mpsc;

/// The fixed set of solver workers and their idle/busy partition.
///
/// Invariants: idle and busy are disjoint and their union is the pool; a
/// worker is busy exactly while it holds a dispatched request. Claiming
/// always takes the lowest idle address so dispatch order is deterministic.
#[derive(Debug, Default)]
pub struct WorkerPool {
    assignment_channels: HashMap<WorkerId, mpsc::Sender<SolveAssignment>>,
    idle: BTreeSet<WorkerId>,
    busy: BTreeSet<WorkerId>,
}

impl WorkerPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a worker; it starts idle.
    pub fn register(&mut self, id: WorkerId, assignments: mpsc::Sender<SolveAssignment>) {
        self.assignment_channels.insert(id, assignments);
        self.idle.insert(id);
    }

    /// Removes a worker whose assignment channel is gone.
    pub fn evict(&mut self, id: WorkerId) {
        self.assignment_channels.remove(&id);
        self.idle.remove(&id);
        self.busy.remove(&id);
    }

    /// Claims the lowest idle worker, moving it to busy.
    pub fn claim_idle(&mut self) -> Option<WorkerId> {
        let id = self.idle.pop_first()?;
        self.busy.insert(id);
        Some(id)
    }

    /// Returns a busy worker to the idle set.
    ///
    /// Unknown or already-idle workers are ignored: an evicted worker may
    /// still have an event in flight.
    pub fn release(&mut self, id: WorkerId) {
        if self.busy.remove(&id) {
            self.idle.insert(id);
        }
    }

    /// Assignment channel of a worker.
    pub fn assignments(&self, id: WorkerId) -> Option<&mpsc::Sender<SolveAssignment>> {
        self.assignment_channels.get(&id)
    }

    /// Number of idle workers.
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Number of busy workers.
    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    /// Total pool size.
    pub fn size(&self) -> usize {
        self.assignment_channels.len()
    }

    /// Checks the partition invariant; used by tests and debug assertions.
    pub fn partition_is_consistent(&self) -> bool {
        self.idle.is_disjoint(&self.busy)
            && self.idle.len() + self.busy.len() == self.assignment_channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(size: usize) -> (WorkerPool, Vec<mpsc::Receiver<SolveAssignment>>) {
        let mut pool = WorkerPool::new();
        let mut receivers = Vec::new();
        for index in 0..size {
            let (tx, rx) = mpsc::channel(1);
            pool.register(WorkerId(index), tx);
            receivers.push(rx);
        }
        (pool, receivers)
    }

    #[test]
    fn test_registered_workers_start_idle() {
        let (pool, _rx) = pool_of(3);
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.busy_count(), 0);
        assert!(pool.partition_is_consistent());
    }

    #[test]
    fn test_claim_moves_worker_to_busy() {
        let (mut pool, _rx) = pool_of(2);

        let first = pool.claim_idle().unwrap();
        assert_eq!(first, WorkerId(0));
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.busy_count(), 1);
        assert!(pool.partition_is_consistent());

        let second = pool.claim_idle().unwrap();
        assert_eq!(second, WorkerId(1));
        assert!(pool.claim_idle().is_none());
        assert!(pool.partition_is_consistent());
    }

    #[test]
    fn test_release_returns_worker_to_idle() {
        let (mut pool, _rx) = pool_of(1);
        let id = pool.claim_idle().unwrap();

        pool.release(id);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.busy_count(), 0);
        assert!(pool.partition_is_consistent());
    }

    #[test]
    fn test_release_of_idle_worker_is_harmless() {
        let (mut pool, _rx) = pool_of(1);
        pool.release(WorkerId(0));
        assert_eq!(pool.idle_count(), 1);
        assert!(pool.partition_is_consistent());
    }

    #[test]
    fn test_evicted_worker_leaves_partition() {
        let (mut pool, _rx) = pool_of(2);
        let id = pool.claim_idle().unwrap();

        pool.evict(id);
        assert_eq!(pool.size(), 1);
        assert!(pool.partition_is_consistent());

        // A late completion event for the evicted worker is ignored.
        pool.release(id);
        assert!(pool.partition_is_consistent());
    }
}
