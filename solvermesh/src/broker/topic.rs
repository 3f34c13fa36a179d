//! Topic names.

use std::fmt;

/// Name of a pub/sub topic.
///
/// Wire names are deployment parameters; nothing in the core assumes a
/// particular namespace beyond the metric-value prefix convention, which the
/// metric updater uses to recover a metric name from its value topic.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TopicName(String);

impl TopicName {
    /// Creates a topic name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strips a prefix, yielding the remainder when this topic lives under it.
    ///
    /// Used to recover the metric name from a metric-value topic.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TopicName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TopicName {
    fn from(name: String) -> Self {
        Self(name)
    }
}
