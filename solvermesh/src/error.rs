//! Error taxonomy for the coordination core.
//!
//! Two families exist: caller errors on inbound payloads (malformed problem,
//! malformed metric list, unsupported value kinds, objective selection) and
//! engine-reported failures (invalid model, invalid data, failed solve). All
//! of them abort processing of the one message that caused them; no component
//! terminates on a data error.
//!
//! Every variant carries the [`ErrorOrigin`] of the site that raised it and,
//! where one exists, the offending payload so the log line alone is enough to
//! diagnose a bad message.

use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Error Origin
// =============================================================================

/// Source location captured where an error was raised.
#[derive(Clone, Copy, Debug)]
pub struct ErrorOrigin {
    /// Source file of the raising call site.
    pub file: &'static str,
    /// Line within the file.
    pub line: u32,
}

impl ErrorOrigin {
    /// Captures the caller's location.
    #[track_caller]
    pub fn here() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl std::fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// =============================================================================
// Solver Error
// =============================================================================

/// Errors raised while coordinating problem definition, metric state and
/// solve requests.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The problem-definition payload is missing mandatory fields or is not
    /// an object at all.
    #[error("[{origin}] malformed optimisation problem: {reason}; payload: {payload}")]
    MalformedProblem {
        origin: ErrorOrigin,
        reason: String,
        payload: serde_json::Value,
    },

    /// The metric-list payload could not be interpreted.
    #[error("[{origin}] malformed metric list: {reason}; payload: {payload}")]
    MalformedMetricList {
        origin: ErrorOrigin,
        reason: String,
        payload: serde_json::Value,
    },

    /// A metric value has a JSON kind that no model parameter can take.
    #[error("[{origin}] metric '{metric}' has unsupported value kind; payload: {payload}")]
    UnsupportedValueKind {
        origin: ErrorOrigin,
        metric: String,
        payload: serde_json::Value,
    },

    /// A solve request named no objective and the worker holds no default.
    #[error("[{origin}] no objective function selected and no default stored")]
    NoObjectiveSelected { origin: ErrorOrigin },

    /// The requested objective is not declared by the held model.
    #[error("[{origin}] objective '{name}' is not declared by the current model")]
    UnknownObjective { origin: ErrorOrigin, name: String },

    /// The engine rejected the problem description.
    #[error("[{origin}] engine rejected the model: {reason}")]
    ModelInvalid { origin: ErrorOrigin, reason: String },

    /// The engine rejected a data-file update.
    #[error("[{origin}] engine rejected the data update: {reason}")]
    DataInvalid { origin: ErrorOrigin, reason: String },

    /// The engine failed while searching for a solution.
    #[error("[{origin}] solve failed: {reason}")]
    SolveFailed { origin: ErrorOrigin, reason: String },

    /// A problem-store write failed. Treated like a malformed problem from the
    /// caller's point of view.
    #[error("[{origin}] could not write '{}': {source}", .path.display())]
    Io {
        origin: ErrorOrigin,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two pending requests share a context identifier; the later one is
    /// rejected.
    #[error("[{origin}] a pending request already carries identifier '{id}'")]
    DuplicateContextId { origin: ErrorOrigin, id: String },
}

impl SolverError {
    /// Builds a `MalformedProblem` at the caller's location.
    #[track_caller]
    pub fn malformed_problem(reason: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::MalformedProblem {
            origin: ErrorOrigin::here(),
            reason: reason.into(),
            payload,
        }
    }

    /// Builds a `MalformedMetricList` at the caller's location.
    #[track_caller]
    pub fn malformed_metric_list(reason: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::MalformedMetricList {
            origin: ErrorOrigin::here(),
            reason: reason.into(),
            payload,
        }
    }

    /// Builds an `UnsupportedValueKind` at the caller's location.
    #[track_caller]
    pub fn unsupported_value(metric: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::UnsupportedValueKind {
            origin: ErrorOrigin::here(),
            metric: metric.into(),
            payload,
        }
    }

    /// Builds a `NoObjectiveSelected` at the caller's location.
    #[track_caller]
    pub fn no_objective() -> Self {
        Self::NoObjectiveSelected {
            origin: ErrorOrigin::here(),
        }
    }

    /// Builds an `UnknownObjective` at the caller's location.
    #[track_caller]
    pub fn unknown_objective(name: impl Into<String>) -> Self {
        Self::UnknownObjective {
            origin: ErrorOrigin::here(),
            name: name.into(),
        }
    }

    /// Builds a `ModelInvalid` at the caller's location.
    #[track_caller]
    pub fn model_invalid(reason: impl Into<String>) -> Self {
        Self::ModelInvalid {
            origin: ErrorOrigin::here(),
            reason: reason.into(),
        }
    }

    /// Builds a `DataInvalid` at the caller's location.
    #[track_caller]
    pub fn data_invalid(reason: impl Into<String>) -> Self {
        Self::DataInvalid {
            origin: ErrorOrigin::here(),
            reason: reason.into(),
        }
    }

    /// Builds a `SolveFailed` at the caller's location.
    #[track_caller]
    pub fn solve_failed(reason: impl Into<String>) -> Self {
        Self::SolveFailed {
            origin: ErrorOrigin::here(),
            reason: reason.into(),
        }
    }

    /// Builds an `Io` error at the caller's location.
    #[track_caller]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            origin: ErrorOrigin::here(),
            path: path.into(),
            source,
        }
    }

    /// Builds a `DuplicateContextId` at the caller's location.
    #[track_caller]
    pub fn duplicate_context(id: impl Into<String>) -> Self {
        Self::DuplicateContextId {
            origin: ErrorOrigin::here(),
            id: id.into(),
        }
    }
}
