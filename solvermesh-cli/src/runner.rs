//! CLI runner for common setup and operations.
//!
//! Encapsulates logging initialization and endpoint startup to keep the
//! command handlers small.

use crate::error::CliError;
use solvermesh::broker::InProcessBus;
use solvermesh::config::ConfigFile;
use solvermesh::engine::AmplEngineFactory;
use solvermesh::logging::{init_logging, LoggingGuard};
use solvermesh::service::{ServiceHandle, SolverService};
use std::sync::Arc;
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while the runner exists.
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Assembled configuration.
    config: ConfigFile,
}

impl CliRunner {
    /// Creates a runner, initializing logging from the configuration.
    pub fn new(config: ConfigFile) -> Result<Self, CliError> {
        let logging_guard = init_logging(&config.logging.dir, &config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// The assembled configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Logs startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("Solvermesh v{}", solvermesh::VERSION);
        info!("Solvermesh CLI: {} command", command);
    }

    /// Starts the solver endpoint.
    ///
    /// The endpoint uses the in-process bus; bridging to the configured
    /// broker is the deployment's messaging sidecar's concern, scoped by the
    /// endpoint name logged at startup.
    pub fn start_endpoint(&self) -> Result<ServiceHandle, CliError> {
        let bus = Arc::new(InProcessBus::new());
        let factory = Arc::new(AmplEngineFactory::new(
            self.config.solver.engine_dir.clone(),
            self.config.solver.problem_dir.clone(),
            self.config.solver.backend.clone(),
        ));

        let handle = SolverService::start(&self.config, bus, factory)?;
        info!("Solver endpoint started");
        Ok(handle)
    }
}
