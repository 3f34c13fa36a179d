//! The message-bus trait and its in-process implementation.

use super::message::Envelope;
use super::topic::TopicName;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::trace;

/// Identifier of one subscription, used to cancel it.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// The calls the core makes against the messaging substrate.
///
/// Every subscription names exactly one topic; dynamic topic families (the
/// per-metric value topics) get one subscription per member, which is what
/// keeps the metric registry and the subscription set in lockstep. A
/// subscriber passes the sending half of its own mailbox, and several
/// subscriptions may feed the same mailbox, which is how each component keeps
/// a single inbound queue over all of its topics. Implementations must be
/// safe to call from any task.
pub trait MessageBus: Send + Sync + 'static {
    /// Routes every message published on `topic` into `mailbox`.
    fn subscribe(
        &self,
        topic: TopicName,
        mailbox: mpsc::UnboundedSender<Envelope>,
    ) -> SubscriptionId;

    /// Cancels a subscription. Unknown identifiers are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Publishes a message to every subscriber of its topic.
    fn publish(&self, envelope: Envelope);

    /// Terminates the substrate: drops all subscriptions so components
    /// blocked on their mailbox observe end-of-stream and exit.
    fn shutdown(&self);
}

// =============================================================================
// In-Process Bus
// =============================================================================

struct SubscriptionEntry {
    topic: TopicName,
    mailbox: mpsc::UnboundedSender<Envelope>,
}

/// Channel-backed bus for single-process deployments and tests.
///
/// Delivery is fan-out: every subscriber of the published topic receives its
/// own clone of the envelope, in publish order per subscriber. Subscriptions
/// whose mailbox has been dropped are pruned on the next publish touching
/// them.
#[derive(Default)]
pub struct InProcessBus {
    subscriptions: DashMap<u64, SubscriptionEntry>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl InProcessBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions, used by tests and diagnostics.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl MessageBus for InProcessBus {
    fn subscribe(
        &self,
        topic: TopicName,
        mailbox: mpsc::UnboundedSender<Envelope>,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(subscription = id, %topic, "Subscription created");
        self.subscriptions
            .insert(id, SubscriptionEntry { topic, mailbox });
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        trace!(subscription = id.0, "Subscription removed");
        self.subscriptions.remove(&id.0);
    }

    fn publish(&self, envelope: Envelope) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let mut dead = Vec::new();
        for entry in self.subscriptions.iter() {
            if entry.topic == envelope.topic && entry.mailbox.send(envelope.clone()).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.subscriptions.remove(&id);
        }
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.subscriptions.clear();
    }
}
