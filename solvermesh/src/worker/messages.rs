//! Messages between the solver manager and its workers.

use super::WorkerId;
use crate::error::SolverError;
use crate::messages::{ExecutionContextRequest, SolutionPayload};

/// One solve request dispatched to a claimed-idle worker.
#[derive(Clone, Debug)]
pub struct SolveAssignment {
    /// The execution context to solve for.
    pub request: ExecutionContextRequest,
}

/// How a dispatched request ended at the worker.
#[derive(Debug)]
pub enum WorkerOutcome {
    /// A solution was found and should be published.
    Solved(SolutionPayload),

    /// The solve aborted; nothing is published and the error is logged.
    Failed(SolverError),

    /// The worker held no defined problem and dropped the request silently.
    /// Solve triggers can race problem redefinition, so this is not an error.
    Dropped,
}

/// Completion report a worker sends back to the manager.
///
/// Every dispatched assignment produces exactly one event, whatever its
/// outcome, so the manager always returns the worker to the idle set.
#[derive(Debug)]
pub struct WorkerEvent {
    /// The reporting worker.
    pub worker: WorkerId,

    /// What happened to the dispatched request.
    pub outcome: WorkerOutcome,
}
