//! Solver workers.
//!
//! A worker owns one optimisation model and one engine instance. It handles
//! three operations: problem definition, data-file updates and solve
//! requests. Problem and data messages arrive from the bus (every worker in
//! the pool ingests them); solve requests arrive from the solver manager,
//! which guarantees at most one outstanding request per worker.

mod messages;
mod solver;

pub use messages::{SolveAssignment, WorkerEvent, WorkerOutcome};
pub use solver::{SolverWorker, WorkerState};

use std::fmt;

/// Address of one worker within the pool.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}
