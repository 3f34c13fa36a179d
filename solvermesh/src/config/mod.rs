//! Configuration for the coordination core.
//!
//! Settings are plain data grouped per concern; the CLI populates them from
//! its argument surface and the service consumes them at wiring time.

mod settings;

pub use settings::{
    BrokerSettings, ConfigFile, LoggingSettings, SolverSettings, TopicSettings,
    DEFAULT_BACKEND_SOLVER, DEFAULT_BROKER_PORT, DEFAULT_WORKER_COUNT,
};
