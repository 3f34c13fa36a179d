//! Request scheduling and worker-pool management.
//!
//! The solver manager sits between the trigger side (metric updater, external
//! requesters) and the worker pool. It keeps pending requests in a
//! time-ordered queue, dispatches the earliest request whenever a worker is
//! idle, and republishes every solution the workers produce. Workers never
//! see more than one outstanding request; queue depth is the system's
//! back-pressure signal.

mod manager;
mod pool;
mod queue;
mod telemetry;

pub use manager::SolverManager;
pub use pool::WorkerPool;
pub use queue::RequestQueue;
pub use telemetry::{DispatchEvent, DispatchSink, NullDispatchSink, TracingDispatchSink};
