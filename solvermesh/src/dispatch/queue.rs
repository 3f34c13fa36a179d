//! The pending-request queue.

use crate::error::SolverError;
use crate::messages::ExecutionContextRequest;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

/// One queued request and the moment it arrived.
#[derive(Debug)]
struct PendingRequest {
    request: ExecutionContextRequest,
    queued_at: Instant,
}

/// Time-ordered multi-sequence of pending execution-context requests.
///
/// Requests are served in ascending timestamp order; equal timestamps are
/// served in arrival order, which a monotonic sequence counter in the
/// ordering key provides. Identifiers of pending requests must be unique:
/// a duplicate rejects the later request.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: BTreeMap<(u64, u64), PendingRequest>,
    next_sequence: u64,
    pending_ids: HashSet<String>,
}

impl RequestQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request.
    pub fn push(&mut self, request: ExecutionContextRequest) -> Result<(), SolverError> {
        if let Some(id) = &request.identifier {
            if !self.pending_ids.insert(id.clone()) {
                return Err(SolverError::duplicate_context(id.clone()));
            }
        }

        let key = (request.timestamp, self.next_sequence);
        self.next_sequence += 1;
        self.entries.insert(
            key,
            PendingRequest {
                request,
                queued_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Removes and returns the earliest pending request.
    pub fn pop_earliest(&mut self) -> Option<ExecutionContextRequest> {
        let (_, pending) = self.entries.pop_first()?;
        if let Some(id) = &pending.request.identifier {
            self.pending_ids.remove(id);
        }
        Some(pending.request)
    }

    /// How long the most-delayed pending request has been waiting.
    ///
    /// The earliest-timestamp entry is not necessarily the oldest arrival, so
    /// this scans the whole queue.
    pub fn longest_wait(&self) -> Option<Duration> {
        self.entries
            .values()
            .map(|pending| pending.queued_at.elapsed())
            .max()
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn request(identifier: Option<&str>, timestamp: u64) -> ExecutionContextRequest {
        ExecutionContextRequest {
            identifier: identifier.map(|id| id.to_string()),
            timestamp,
            objective: None,
            metrics: Map::new(),
            deploy: true,
        }
    }

    #[test]
    fn test_pops_in_timestamp_order() {
        let mut queue = RequestQueue::new();
        queue.push(request(None, 3000)).unwrap();
        queue.push(request(None, 1000)).unwrap();
        queue.push(request(None, 2000)).unwrap();

        assert_eq!(queue.pop_earliest().unwrap().timestamp, 1000);
        assert_eq!(queue.pop_earliest().unwrap().timestamp, 2000);
        assert_eq!(queue.pop_earliest().unwrap().timestamp, 3000);
        assert!(queue.pop_earliest().is_none());
    }

    #[test]
    fn test_equal_timestamps_serve_arrival_order() {
        let mut queue = RequestQueue::new();
        queue.push(request(Some("first"), 1000)).unwrap();
        queue.push(request(Some("second"), 1000)).unwrap();
        queue.push(request(Some("third"), 1000)).unwrap();

        assert_eq!(
            queue.pop_earliest().unwrap().identifier.as_deref(),
            Some("first")
        );
        assert_eq!(
            queue.pop_earliest().unwrap().identifier.as_deref(),
            Some("second")
        );
        assert_eq!(
            queue.pop_earliest().unwrap().identifier.as_deref(),
            Some("third")
        );
    }

    #[test]
    fn test_duplicate_identifier_rejects_later_request() {
        let mut queue = RequestQueue::new();
        queue.push(request(Some("ctx"), 1000)).unwrap();

        let rejected = queue.push(request(Some("ctx"), 2000)).unwrap_err();
        assert!(matches!(rejected, SolverError::DuplicateContextId { .. }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_identifier_frees_on_dispatch() {
        let mut queue = RequestQueue::new();
        queue.push(request(Some("ctx"), 1000)).unwrap();
        queue.pop_earliest().unwrap();

        // The identifier is no longer pending, so reuse is allowed.
        assert!(queue.push(request(Some("ctx"), 2000)).is_ok());
    }

    #[test]
    fn test_anonymous_requests_never_collide() {
        let mut queue = RequestQueue::new();
        queue.push(request(None, 1000)).unwrap();
        queue.push(request(None, 1000)).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_longest_wait_tracks_pending_requests() {
        let mut queue = RequestQueue::new();
        assert!(queue.longest_wait().is_none());

        queue.push(request(None, 1000)).unwrap();
        let waited = queue.longest_wait().unwrap();
        assert!(waited < Duration::from_secs(1));

        queue.pop_earliest().unwrap();
        assert!(queue.longest_wait().is_none());
    }
}
