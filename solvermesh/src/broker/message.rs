//! Message envelope delivered to subscribers.

use super::topic::TopicName;

/// One published message: the topic it was published on and its JSON payload.
///
/// Subscribers receive the topic alongside the payload because several
/// subscriptions can share one mailbox — the metric-value handler recovers
/// the metric name from the topic, not from the payload.
#[derive(Clone, Debug)]
pub struct Envelope {
    /// Topic the message was published on.
    pub topic: TopicName,

    /// Message body.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope.
    pub fn new(topic: impl Into<TopicName>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}
