//! Messaging substrate interface.
//!
//! All inter-component and external communication uses pub/sub topics. The
//! substrate itself (an AMQP broker in production deployments) is an external
//! collaborator; this module specifies only the calls the core makes against
//! it and provides an in-process implementation used for local wiring and
//! tests.
//!
//! Subscriptions are per exact topic; the per-metric value topics get one
//! subscription each, so the subscription set always mirrors the metric
//! registry. Each component owns a single mailbox channel and routes every
//! topic it subscribes to into that mailbox, so messages are processed
//! strictly one at a time per component.

mod bus;
mod message;
mod topic;

pub use bus::{InProcessBus, MessageBus, SubscriptionId};
pub use message::Envelope;
pub use topic::TopicName;
