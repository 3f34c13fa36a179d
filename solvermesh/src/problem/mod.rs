//! Optimisation-problem ingestion.
//!
//! Problem and data payloads arrive as messages whose body is a file name and
//! file contents. The [`ProblemStore`] persists them under the problem-file
//! directory so the engine always reads the latest received description, and
//! [`ProblemDefinition`] is the validated form of a problem-definition
//! payload.

mod store;

pub use store::ProblemStore;

use crate::error::SolverError;
use crate::messages::ProblemPayload;
use crate::value::MetricValue;
use std::collections::BTreeMap;

/// A validated optimisation-problem definition.
///
/// A problem is either fully absent or fully defined: this type only exists
/// once every mandatory field of the payload has been checked, so holding one
/// is what flips a worker's problem-defined flag.
#[derive(Clone, Debug)]
pub struct ProblemDefinition {
    /// File name the description is stored under.
    pub file_name: String,

    /// The problem description (opaque DSL text).
    pub description: String,

    /// Objective used when a request names none.
    pub default_objective: String,

    /// Optional initial data file: name and contents.
    pub initial_data: Option<(String, String)>,

    /// Decision variable name to constant-parameter name.
    pub variables_to_constants: BTreeMap<String, String>,

    /// Initial values for the constant parameters, keyed by constant name.
    pub constant_initials: BTreeMap<String, MetricValue>,
}

impl ProblemDefinition {
    /// Validates a problem-definition payload.
    ///
    /// Missing mandatory fields, empty names and malformed constants sections
    /// are all `MalformedProblem`; the offending payload travels with the
    /// error.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, SolverError> {
        let parsed: ProblemPayload = serde_json::from_value(payload.clone())
            .map_err(|error| SolverError::malformed_problem(error.to_string(), payload.clone()))?;

        if parsed.file_name.trim().is_empty() {
            return Err(SolverError::malformed_problem(
                "problem file name is empty",
                payload.clone(),
            ));
        }
        if parsed.description.is_empty() {
            return Err(SolverError::malformed_problem(
                "problem description is empty",
                payload.clone(),
            ));
        }
        if parsed.default_objective.trim().is_empty() {
            return Err(SolverError::malformed_problem(
                "default objective function is empty",
                payload.clone(),
            ));
        }

        let initial_data = match (parsed.data_file, parsed.data_contents) {
            (Some(name), Some(contents)) => Some((name, contents)),
            (None, None) => None,
            _ => {
                return Err(SolverError::malformed_problem(
                    "data file name and contents must be given together",
                    payload.clone(),
                ))
            }
        };

        let mut variables_to_constants = BTreeMap::new();
        let mut constant_initials = BTreeMap::new();
        for (constant, spec) in parsed.constants.unwrap_or_default() {
            if spec.variable.trim().is_empty() {
                return Err(SolverError::malformed_problem(
                    format!("constant '{}' names no variable", constant),
                    payload.clone(),
                ));
            }
            variables_to_constants.insert(spec.variable.clone(), constant.clone());
            constant_initials.insert(constant, spec.value);
        }

        Ok(Self {
            file_name: parsed.file_name,
            description: parsed.description,
            default_objective: parsed.default_objective,
            initial_data,
            variables_to_constants,
            constant_initials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_payload() -> serde_json::Value {
        json!({
            "ProblemFile": "sizing.mod",
            "ProblemDescription": "var x >= 0; maximize cost: -x;",
            "DefaultObjectiveFunction": "cost",
            "DataFile": "sizing.dat",
            "NewData": "param load := 1;",
            "Constants": {
                "previous_x": {"Variable": "x", "Value": 0.5}
            }
        })
    }

    #[test]
    fn test_full_payload_parses() {
        let definition = ProblemDefinition::from_payload(&full_payload()).unwrap();
        assert_eq!(definition.file_name, "sizing.mod");
        assert_eq!(definition.default_objective, "cost");
        assert_eq!(
            definition.initial_data,
            Some(("sizing.dat".to_string(), "param load := 1;".to_string()))
        );
        assert_eq!(definition.variables_to_constants["x"], "previous_x");
        assert_eq!(
            definition.constant_initials["previous_x"],
            MetricValue::Float(0.5)
        );
    }

    #[test]
    fn test_missing_default_objective_is_malformed() {
        let payload = json!({
            "ProblemFile": "sizing.mod",
            "ProblemDescription": "var x;"
        });
        let error = ProblemDefinition::from_payload(&payload).unwrap_err();
        assert!(matches!(error, SolverError::MalformedProblem { .. }));
    }

    #[test]
    fn test_empty_file_name_is_malformed() {
        let mut payload = full_payload();
        payload["ProblemFile"] = json!("  ");
        let error = ProblemDefinition::from_payload(&payload).unwrap_err();
        assert!(matches!(error, SolverError::MalformedProblem { .. }));
    }

    #[test]
    fn test_data_contents_without_name_is_malformed() {
        let mut payload = full_payload();
        payload.as_object_mut().unwrap().remove("DataFile");
        let error = ProblemDefinition::from_payload(&payload).unwrap_err();
        assert!(matches!(error, SolverError::MalformedProblem { .. }));
    }

    #[test]
    fn test_constants_are_optional() {
        let payload = json!({
            "ProblemFile": "sizing.mod",
            "ProblemDescription": "maximize cost: 0;",
            "DefaultObjectiveFunction": "cost"
        });
        let definition = ProblemDefinition::from_payload(&payload).unwrap();
        assert!(definition.variables_to_constants.is_empty());
        assert!(definition.initial_data.is_none());
    }
}
