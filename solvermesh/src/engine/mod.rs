//! The mathematical-programming engine interface.
//!
//! The engine is an opaque "solve" capability: it holds one model, takes
//! parameter assignments, maximises exactly one objective per run and exposes
//! the solved objective and variable values. Back-ends are selected at
//! construction time through an [`EngineFactory`]; the provided back-end
//! drives an AMPL interpreter installation (see [`ampl`]).
//!
//! All methods are synchronous. A solve may run for minutes; the worker that
//! owns the engine moves the call onto a blocking thread and stays in its
//! Working state for the duration, which is the system's sole back-pressure
//! mechanism.

mod ampl;

pub use ampl::{AmplEngine, AmplEngineFactory};

use crate::value::ParamValue;
use std::path::Path;

/// One optimisation back-end holding one model.
pub trait OptimisationEngine: Send {
    /// Loads (or replaces) the model from a problem file.
    fn load_problem(&mut self, model: &Path) -> Result<(), EngineError>;

    /// Loads a data file into the held model, updating its parameters.
    fn load_data(&mut self, data: &Path) -> Result<(), EngineError>;

    /// Assigns a value to the named model parameter.
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<(), EngineError>;

    /// Names of every objective the held model declares, in declaration order.
    fn objective_names(&self) -> Vec<String>;

    /// Makes the named objective the one the next solve optimises.
    fn keep_objective(&mut self, name: &str) -> Result<(), EngineError>;

    /// Excludes the named objective from the next solve.
    fn drop_objective(&mut self, name: &str) -> Result<(), EngineError>;

    /// Runs the back-end solver. May block for a long time.
    fn solve(&mut self) -> Result<(), EngineError>;

    /// Value of the named objective at the last solution.
    fn objective_value(&self, name: &str) -> Result<f64, EngineError>;

    /// Names of every decision variable the held model declares.
    fn variable_names(&self) -> Vec<String>;

    /// Value of the named decision variable at the last solution.
    fn variable_value(&self, name: &str) -> Result<f64, EngineError>;
}

/// Creates one engine instance per solver worker.
pub trait EngineFactory: Send + Sync + 'static {
    /// Builds an engine for the named worker.
    ///
    /// Workers own their engine exclusively; the factory is the only shared
    /// piece of the engine layer.
    fn create(&self, worker_name: &str) -> Result<Box<dyn OptimisationEngine + Send>, EngineError>;
}

/// Error reported by an engine back-end.
#[derive(Debug, Clone)]
pub struct EngineError {
    /// Human-readable description, including any solver output worth keeping.
    pub message: String,
}

impl EngineError {
    /// Creates an engine error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EngineError {}
