//! Telemetry for dispatch observability.
//!
//! The solver manager emits structured events via a sink abstraction and does
//! not know how they are consumed. Consumers (logging, metrics pipelines,
//! dashboards) decide how to present or aggregate them, which keeps the
//! dispatcher itself free of presentation concerns.

use crate::worker::WorkerId;

// =============================================================================
// Dispatch Events
// =============================================================================

/// Events emitted while requests move through the queue and the worker pool.
#[derive(Clone, Debug)]
pub enum DispatchEvent {
    /// A request entered the pending queue.
    RequestQueued {
        identifier: Option<String>,
        timestamp: u64,
        queue_depth: usize,
    },

    /// A request was rejected because its identifier is already pending.
    RequestRejected { identifier: String },

    /// A request left the queue for a worker.
    RequestDispatched {
        worker: WorkerId,
        timestamp: u64,
        queue_depth: usize,
    },

    /// A worker published a solution and returned to the idle set.
    SolutionPublished {
        worker: WorkerId,
        timestamp: u64,
        objective: String,
    },

    /// A worker reported a failed solve; nothing was published.
    SolveFailed { worker: WorkerId },

    /// A worker dropped a request because it held no problem.
    RequestDropped { worker: WorkerId },

    /// A worker became unreachable and left the pool.
    WorkerEvicted { worker: WorkerId },
}

impl DispatchEvent {
    /// Returns a short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RequestQueued { .. } => "request_queued",
            Self::RequestRejected { .. } => "request_rejected",
            Self::RequestDispatched { .. } => "request_dispatched",
            Self::SolutionPublished { .. } => "solution_published",
            Self::SolveFailed { .. } => "solve_failed",
            Self::RequestDropped { .. } => "request_dropped",
            Self::WorkerEvicted { .. } => "worker_evicted",
        }
    }

    /// Returns the worker associated with this event, if any.
    pub fn worker(&self) -> Option<WorkerId> {
        match self {
            Self::RequestDispatched { worker, .. }
            | Self::SolutionPublished { worker, .. }
            | Self::SolveFailed { worker }
            | Self::RequestDropped { worker }
            | Self::WorkerEvicted { worker } => Some(*worker),
            Self::RequestQueued { .. } | Self::RequestRejected { .. } => None,
        }
    }
}

// =============================================================================
// Dispatch Sink Trait
// =============================================================================

/// Sink for dispatch events.
///
/// Implementations must be thread-safe and fast; events are emitted from the
/// manager's hot path. Buffer internally if consumption is expensive.
pub trait DispatchSink: Send + Sync {
    /// Called for every dispatch event.
    fn emit(&self, event: DispatchEvent);
}

/// No-op sink for when telemetry is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDispatchSink;

impl DispatchSink for NullDispatchSink {
    fn emit(&self, _event: DispatchEvent) {}
}

/// Sink that logs events using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatchSink;

impl DispatchSink for TracingDispatchSink {
    fn emit(&self, event: DispatchEvent) {
        match &event {
            DispatchEvent::RequestQueued {
                identifier,
                timestamp,
                queue_depth,
            } => {
                tracing::debug!(
                    identifier = identifier.as_deref().unwrap_or("-"),
                    timestamp,
                    queue_depth,
                    "Request queued"
                );
            }
            DispatchEvent::RequestRejected { identifier } => {
                tracing::warn!(identifier = %identifier, "Request rejected");
            }
            DispatchEvent::RequestDispatched {
                worker,
                timestamp,
                queue_depth,
            } => {
                tracing::debug!(worker = %worker, timestamp, queue_depth, "Request dispatched");
            }
            DispatchEvent::SolutionPublished {
                worker,
                timestamp,
                objective,
            } => {
                tracing::debug!(
                    worker = %worker,
                    timestamp,
                    objective = %objective,
                    "Solution published"
                );
            }
            DispatchEvent::SolveFailed { worker } => {
                tracing::debug!(worker = %worker, "Solve failed");
            }
            DispatchEvent::RequestDropped { worker } => {
                tracing::debug!(worker = %worker, "Request dropped");
            }
            DispatchEvent::WorkerEvicted { worker } => {
                tracing::warn!(worker = %worker, "Worker evicted");
            }
        }
    }
}
