//! Wire payloads exchanged over the message bus.
//!
//! Field names follow the external contract: problem and request payloads use
//! the PascalCase keys the controller publishes, metric telemetry uses the
//! monitoring feed's camelCase keys. Every struct here is plain serde data;
//! validation beyond shape lives with the component that consumes the message.

use crate::value::MetricValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Problem Definition
// =============================================================================

/// Optimisation-problem upload, as posted on the problem-definition topic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProblemPayload {
    /// File name the problem description is stored under.
    #[serde(rename = "ProblemFile")]
    pub file_name: String,

    /// The problem description itself (opaque DSL text).
    #[serde(rename = "ProblemDescription")]
    pub description: String,

    /// Objective used when a request names none.
    #[serde(rename = "DefaultObjectiveFunction")]
    pub default_objective: String,

    /// Optional initial data-file name.
    #[serde(rename = "DataFile", default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,

    /// Optional initial data-file contents.
    #[serde(rename = "NewData", default, skip_serializing_if = "Option::is_none")]
    pub data_contents: Option<String>,

    /// Constant parameters that track decision variables between solves,
    /// keyed by constant name.
    #[serde(rename = "Constants", default, skip_serializing_if = "Option::is_none")]
    pub constants: Option<BTreeMap<String, ConstantSpec>>,
}

/// One entry of the problem's constants section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstantSpec {
    /// Decision variable whose solved value feeds this constant.
    #[serde(rename = "Variable")]
    pub variable: String,

    /// Initial value of the constant, used until the first deployed solution.
    #[serde(rename = "Value")]
    pub value: MetricValue,
}

/// Data-file update, as posted on the data-file topic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataFilePayload {
    /// File name the data is stored under.
    #[serde(rename = "FileName")]
    pub file_name: String,

    /// The data-file contents (opaque DSL text).
    #[serde(rename = "FileContent")]
    pub contents: String,
}

// =============================================================================
// Execution Context Request
// =============================================================================

/// One solve request: the predicted execution context a configuration must be
/// found for.
///
/// Metric values stay raw JSON here; the worker applies the type-directed
/// coercion when it assigns them to model parameters, so an externally
/// injected request with a bad value kind fails there with the payload intact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionContextRequest {
    /// Caller-chosen identifier, echoed back with the solution. Unique among
    /// pending requests.
    #[serde(rename = "Identifier", default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Microseconds since the Unix epoch; the queue's ordering key.
    #[serde(rename = "Timestamp")]
    pub timestamp: u64,

    /// Objective to optimise; the worker's stored default applies when absent.
    #[serde(
        rename = "ObjectiveFunction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub objective: Option<String>,

    /// Metric snapshot: predicted value per metric name.
    #[serde(rename = "ExecutionContext")]
    pub metrics: BTreeMap<String, serde_json::Value>,

    /// True when the found configuration will be deployed, which feeds solved
    /// variable values back into their tracking constants.
    #[serde(rename = "DeploySolution")]
    pub deploy: bool,
}

// =============================================================================
// Solution
// =============================================================================

/// Feasible assignments found for one execution context.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolutionPayload {
    /// Identifier of the request this solution answers, when one was given.
    #[serde(rename = "Identifier", default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Timestamp of the answered request.
    #[serde(rename = "Timestamp")]
    pub timestamp: u64,

    /// Objective the solver maximised.
    #[serde(rename = "ObjectiveFunction")]
    pub objective: String,

    /// Value of every declared objective at the found solution.
    #[serde(rename = "ObjectiveValues")]
    pub objective_values: BTreeMap<String, f64>,

    /// Value of every decision variable at the found solution.
    #[serde(rename = "VariableValues")]
    pub variable_values: BTreeMap<String, f64>,

    /// Deployment flag copied from the request.
    #[serde(rename = "DeploySolution")]
    pub deploy: bool,
}

// =============================================================================
// Monitoring Feed
// =============================================================================

/// Authoritative metric-name list from the controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricListPayload {
    /// The complete current set of metric names.
    pub metrics: Vec<String>,
}

/// One metric prediction update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricValuePayload {
    /// The predicted value. Kept raw so unsupported kinds can be reported
    /// with the payload attached.
    #[serde(rename = "metricValue")]
    pub value: serde_json::Value,

    /// Validity time of the prediction, microseconds since the Unix epoch.
    #[serde(rename = "predictionTime")]
    pub prediction_time: u64,
}

/// Application lifecycle state feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LifecyclePayload {
    /// State name, e.g. `"RUNNING"`.
    pub state: String,
}

/// Trigger event: an SLO violation is forecast and a new configuration must
/// be computed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SloViolationPayload {
    /// Time point the violation is predicted for; becomes the request
    /// timestamp.
    #[serde(rename = "predictionTime")]
    pub prediction_time: u64,

    /// Optional identifier the controller uses to match solutions to events.
    #[serde(rename = "Identifier", default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Optional objective override for this reconfiguration.
    #[serde(
        rename = "ObjectiveFunction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub objective: Option<String>,
}

// =============================================================================
// Component Status
// =============================================================================

/// Component lifecycle status, published on the status topic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Wall-clock time of the transition, RFC 3339.
    pub when: String,

    /// The lifecycle state entered.
    pub state: String,

    /// Optional human-readable note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
