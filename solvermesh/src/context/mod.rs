//! Application execution context tracking.
//!
//! The execution context is the set of currently predicted metric values for
//! the application's environment. This module owns that state: the metric
//! registry folds prediction updates into a current snapshot, the lifecycle
//! gate decides whether reconfiguration triggers are meaningful, and the
//! metric updater is the actor that ties both to the message bus and turns
//! SLO-violation events into solve requests.

mod lifecycle;
mod registry;
mod updater;

pub use lifecycle::ApplicationState;
pub use registry::{MetricListDelta, MetricRegistry};
pub use updater::MetricUpdater;
