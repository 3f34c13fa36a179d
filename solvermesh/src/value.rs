//! Tagged scalar values for metrics, parameters and solutions.
//!
//! Metric predictions, problem constants and solved variable values all move
//! through the system as JSON scalars. [`MetricValue`] is the tagged type they
//! are folded into, and [`ParamValue`] is the engine-native shape a value takes
//! when it is assigned to a model parameter. The type-directed coercion between
//! the two lives here so every component agrees on it.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Metric Value
// =============================================================================

/// A scalar value as carried by metric predictions and request snapshots.
///
/// The wire representation is the plain JSON scalar; the untagged serde
/// representation keeps payloads identical to what external producers send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Signed integer (JSON integers, signed or unsigned).
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Free-form text.
    Text(String),
}

impl MetricValue {
    /// Folds a JSON value into a tagged scalar.
    ///
    /// Returns `None` for JSON kinds that are not permissible metric values
    /// (arrays, objects, null). Callers turn that into an
    /// `UnsupportedValueKind` error with the offending payload attached.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(flag) => Some(Self::Bool(*flag)),
            serde_json::Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Some(Self::Int(int))
                } else if let Some(uint) = number.as_u64() {
                    // Out-of-range unsigned values saturate rather than wrap.
                    Some(Self::Int(i64::try_from(uint).unwrap_or(i64::MAX)))
                } else {
                    number.as_f64().map(Self::Float)
                }
            }
            serde_json::Value::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }

    /// Renders the scalar back into its JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(int) => serde_json::Value::from(*int),
            Self::Float(float) => serde_json::Value::from(*float),
            Self::Bool(flag) => serde_json::Value::from(*flag),
            Self::Text(text) => serde_json::Value::from(text.clone()),
        }
    }

    /// Type-directed coercion to an engine parameter value.
    ///
    /// Integers and booleans become signed longs, floats become doubles and
    /// strings stay strings. This is the single place where the coercion rule
    /// is written down.
    pub fn to_parameter(&self) -> ParamValue {
        match self {
            Self::Int(int) => ParamValue::Long(*int),
            Self::Bool(flag) => ParamValue::Long(i64::from(*flag)),
            Self::Float(float) => ParamValue::Double(*float),
            Self::Text(text) => ParamValue::Text(text.clone()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(int) => write!(f, "{}", int),
            Self::Float(float) => write!(f, "{}", float),
            Self::Bool(flag) => write!(f, "{}", flag),
            Self::Text(text) => write!(f, "{}", text),
        }
    }
}

// =============================================================================
// Parameter Value
// =============================================================================

/// An engine-native parameter value.
///
/// This is what actually reaches the mathematical-programming back-end when a
/// model parameter is assigned.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// Signed long integer.
    Long(i64),
    /// Double-precision float.
    Double(f64),
    /// Text parameter (symbolic AMPL parameters).
    Text(String),
}

impl fmt::Display for ParamValue {
    /// Formats the value the way a model interpreter expects it in an
    /// assignment statement: text quoted, numbers bare.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(int) => write!(f, "{}", int),
            Self::Double(float) => write!(f, "{}", float),
            Self::Text(text) => write!(f, "'{}'", text.replace('\'', "''")),
        }
    }
}
