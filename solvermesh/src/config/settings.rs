//! Settings structs for all configuration concerns.

use std::path::PathBuf;

// =============================================================================
// Defaults
// =============================================================================

/// Default AMQP broker port.
pub const DEFAULT_BROKER_PORT: u16 = 5672;

/// Default back-end solver algorithm.
pub const DEFAULT_BACKEND_SOLVER: &str = "couenne";

/// Default number of solver workers.
pub const DEFAULT_WORKER_COUNT: usize = 1;

// =============================================================================
// Settings
// =============================================================================

/// Complete configuration for one solver endpoint.
#[derive(Clone, Debug, Default)]
pub struct ConfigFile {
    /// Messaging-broker connection parameters.
    pub broker: BrokerSettings,
    /// Engine and worker-pool parameters.
    pub solver: SolverSettings,
    /// Wire names of all topics.
    pub topics: TopicSettings,
    /// Log destination.
    pub logging: LoggingSettings,
}

/// Messaging-broker connection parameters.
///
/// The broker itself is an external collaborator; these parameters belong to
/// the deployment and are handed to whichever bus implementation bridges to
/// it. The endpoint name scopes this process's subscriptions so several
/// solver endpoints can share one broker.
#[derive(Clone, Debug)]
pub struct BrokerSettings {
    /// Broker host name.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Endpoint name used to scope subscriptions.
    pub endpoint: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_BROKER_PORT,
            user: "admin".to_string(),
            password: "admin".to_string(),
            endpoint: "solver".to_string(),
        }
    }
}

/// Engine and worker-pool parameters.
#[derive(Clone, Debug)]
pub struct SolverSettings {
    /// AMPL installation directory; empty resolves the interpreter from PATH.
    pub engine_dir: PathBuf,
    /// Directory problem and data files are stored under.
    pub problem_dir: PathBuf,
    /// Back-end solver algorithm name.
    pub backend: String,
    /// Number of solver workers in the pool.
    pub workers: usize,
    /// Root name for the workers; workers are named `<root>-1`, `<root>-2`, ...
    pub worker_root_name: String,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            engine_dir: PathBuf::new(),
            problem_dir: std::env::temp_dir().join("solvermesh-problems"),
            backend: DEFAULT_BACKEND_SOLVER.to_string(),
            workers: DEFAULT_WORKER_COUNT,
            worker_root_name: "solver".to_string(),
        }
    }
}

/// Wire names of every topic the core touches.
///
/// Names are deployment parameters; the defaults follow the platform's
/// dotted namespace convention. `metric_value_prefix` is a topic-name prefix,
/// not a topic: per-metric value topics live directly under it.
#[derive(Clone, Debug)]
pub struct TopicSettings {
    /// Authoritative metric-name list (in).
    pub metric_list: String,
    /// Root of the per-metric prediction topics (in, one subscription per
    /// registered metric).
    pub metric_value_prefix: String,
    /// Application lifecycle state feed (in).
    pub lifecycle: String,
    /// SLO-violation trigger events (in).
    pub slo_violation: String,
    /// Optimisation-problem uploads (in).
    pub problem_definition: String,
    /// Data-file updates (in).
    pub data_file: String,
    /// Execution-context solve requests (internal and in).
    pub exec_context: String,
    /// Solution publications (out).
    pub solution: String,
    /// Component status publications (out).
    pub status: String,
    /// Orderly-shutdown command (in).
    pub stop: String,
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            metric_list: "optimiser.metrics.list".to_string(),
            metric_value_prefix: "optimiser.metrics.value.".to_string(),
            lifecycle: "optimiser.application.state".to_string(),
            slo_violation: "optimiser.slo.violation".to_string(),
            problem_definition: "optimiser.solver.model".to_string(),
            data_file: "optimiser.solver.data".to_string(),
            exec_context: "optimiser.solver.context".to_string(),
            solution: "optimiser.solver.solution".to_string(),
            status: "optimiser.solver.status".to_string(),
            stop: "optimiser.solver.stop".to_string(),
        }
    }
}

/// Log destination.
#[derive(Clone, Debug)]
pub struct LoggingSettings {
    /// Directory log files are written to.
    pub dir: String,
    /// Log file name.
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            file: "solvermesh.log".to_string(),
        }
    }
}
