//! Solvermesh - optimisation-solver coordination for adaptive cloud applications
//!
//! This library is the concurrent coordination layer between an application
//! platform's event stream and a mathematical-programming engine. It keeps
//! the predicted execution context current, queues reconfiguration requests
//! in time order, dispatches them to a pool of solver workers and publishes
//! the solutions the workers find.
//!
//! # High-Level API
//!
//! The [`service`] module provides the assembled endpoint:
//!
//! ```ignore
//! use solvermesh::broker::InProcessBus;
//! use solvermesh::config::ConfigFile;
//! use solvermesh::engine::AmplEngineFactory;
//! use solvermesh::service::SolverService;
//! use std::sync::Arc;
//!
//! let config = ConfigFile::default();
//! let bus = Arc::new(InProcessBus::new());
//! let factory = Arc::new(AmplEngineFactory::new(
//!     config.solver.engine_dir.clone(),
//!     config.solver.problem_dir.clone(),
//!     config.solver.backend.clone(),
//! ));
//!
//! let handle = SolverService::start(&config, bus, factory)?;
//! handle.wait_stopped().await;
//! ```

pub mod broker;
pub mod config;
pub mod context;
pub mod control;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod logging;
pub mod messages;
pub mod problem;
pub mod service;
pub mod value;
pub mod worker;

/// Version of the solvermesh library and CLI.
///
/// This is synchronized across all components in the workspace. The version
/// is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
