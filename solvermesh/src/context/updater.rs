//! The metric updater actor.
//!
//! Subscribes to the monitoring feed, folds prediction updates into the
//! metric registry, tracks the application lifecycle and translates
//! SLO-violation events into execution-context requests for the solver
//! manager. One mailbox carries every inbound topic so messages are handled
//! strictly one at a time.

use super::lifecycle::ApplicationState;
use super::registry::MetricRegistry;
use crate::broker::{Envelope, MessageBus, SubscriptionId, TopicName};
use crate::config::TopicSettings;
use crate::error::SolverError;
use crate::messages::{
    ExecutionContextRequest, LifecyclePayload, MetricListPayload, MetricValuePayload,
    SloViolationPayload,
};
use crate::value::MetricValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Actor owning the metric registry and the lifecycle gate.
pub struct MetricUpdater {
    bus: Arc<dyn MessageBus>,
    topics: TopicSettings,
    mailbox: mpsc::UnboundedReceiver<Envelope>,
    mailbox_tx: mpsc::UnboundedSender<Envelope>,
    registry: MetricRegistry,
    lifecycle: ApplicationState,

    /// One value-topic subscription per registered metric. The registry and
    /// this map always cover the same set of names.
    value_subscriptions: HashMap<String, SubscriptionId>,
}

impl MetricUpdater {
    /// Creates the updater and subscribes its control topics.
    pub fn new(bus: Arc<dyn MessageBus>, topics: TopicSettings) -> Self {
        let (mailbox_tx, mailbox) = mpsc::unbounded_channel();

        bus.subscribe(
            TopicName::from(topics.metric_list.as_str()),
            mailbox_tx.clone(),
        );
        bus.subscribe(
            TopicName::from(topics.lifecycle.as_str()),
            mailbox_tx.clone(),
        );
        bus.subscribe(
            TopicName::from(topics.slo_violation.as_str()),
            mailbox_tx.clone(),
        );

        Self {
            bus,
            topics,
            mailbox,
            mailbox_tx,
            registry: MetricRegistry::new(),
            lifecycle: ApplicationState::default(),
            value_subscriptions: HashMap::new(),
        }
    }

    /// Runs until shutdown or until the bus closes the mailbox.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Metric updater started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                envelope = self.mailbox.recv() => {
                    let Some(envelope) = envelope else { break };
                    if let Err(problem) = self.handle_envelope(envelope) {
                        error!("{}", problem);
                    }
                }
            }
        }

        info!("Metric updater stopped");
    }

    /// Routes one inbound message to its handler.
    fn handle_envelope(&mut self, envelope: Envelope) -> Result<(), SolverError> {
        let topic = envelope.topic.as_str();

        if topic == self.topics.metric_list {
            self.handle_metric_list(&envelope.payload)
        } else if topic == self.topics.lifecycle {
            self.handle_lifecycle(&envelope.payload);
            Ok(())
        } else if topic == self.topics.slo_violation {
            self.handle_slo_violation(&envelope.payload);
            Ok(())
        } else if let Some(metric) = envelope
            .topic
            .strip_prefix(&self.topics.metric_value_prefix)
        {
            let metric = metric.to_string();
            self.handle_metric_value(&metric, &envelope.payload);
            Ok(())
        } else {
            debug!(topic, "Message on unexpected topic dropped");
            Ok(())
        }
    }

    /// Reconciles subscriptions against the authoritative metric list.
    fn handle_metric_list(&mut self, payload: &serde_json::Value) -> Result<(), SolverError> {
        let parsed: MetricListPayload = serde_json::from_value(payload.clone())
            .map_err(|error| SolverError::malformed_metric_list(error.to_string(), payload.clone()))?;

        let delta = self.registry.apply_metric_list(&parsed.metrics);

        for name in &delta.added {
            let topic = format!("{}{}", self.topics.metric_value_prefix, name);
            let id = self
                .bus
                .subscribe(TopicName::from(topic.as_str()), self.mailbox_tx.clone());
            self.value_subscriptions.insert(name.clone(), id);
        }
        for name in &delta.removed {
            if let Some(id) = self.value_subscriptions.remove(name) {
                self.bus.unsubscribe(id);
            }
        }

        info!(
            added = delta.added.len(),
            removed = delta.removed.len(),
            total = self.registry.len(),
            "Metric list reconciled"
        );
        Ok(())
    }

    /// Stores one prediction update; unknown metrics are dropped silently.
    fn handle_metric_value(&mut self, metric: &str, payload: &serde_json::Value) {
        let parsed: MetricValuePayload = match serde_json::from_value(payload.clone()) {
            Ok(parsed) => parsed,
            Err(problem) => {
                warn!(metric, %problem, "Unparseable metric value dropped");
                return;
            }
        };

        let Some(value) = MetricValue::from_json(&parsed.value) else {
            error!(
                "{}",
                SolverError::unsupported_value(metric, payload.clone())
            );
            return;
        };

        if self
            .registry
            .record_value(metric, value, parsed.prediction_time)
        {
            debug!(metric, prediction_time = parsed.prediction_time, "Metric updated");
        } else {
            debug!(metric, "Value for unregistered metric dropped");
        }
    }

    /// Stores the externally fed lifecycle state.
    fn handle_lifecycle(&mut self, payload: &serde_json::Value) {
        let parsed: LifecyclePayload = match serde_json::from_value(payload.clone()) {
            Ok(parsed) => parsed,
            Err(problem) => {
                warn!(%problem, "Unparseable lifecycle message dropped");
                return;
            }
        };

        match parsed.state.parse::<ApplicationState>() {
            Ok(state) => {
                info!(from = %self.lifecycle, to = %state, "Application lifecycle changed");
                self.lifecycle = state;
            }
            Err(problem) => warn!(%problem, "Lifecycle message dropped"),
        }
    }

    /// Turns an SLO-violation event into an execution-context request when
    /// the gate allows it.
    fn handle_slo_violation(&mut self, payload: &serde_json::Value) {
        let parsed: SloViolationPayload = match serde_json::from_value(payload.clone()) {
            Ok(parsed) => parsed,
            Err(problem) => {
                warn!(%problem, "Unparseable SLO-violation message dropped");
                return;
            }
        };

        if !self.lifecycle.accepts_reconfiguration() {
            debug!(
                state = %self.lifecycle,
                "SLO violation ignored outside Running"
            );
            return;
        }
        if self.registry.is_empty() {
            debug!("SLO violation ignored: no metrics registered");
            return;
        }
        if !self.registry.is_complete() {
            debug!("SLO violation ignored: execution context incomplete");
            return;
        }

        let metrics = self
            .registry
            .snapshot()
            .into_iter()
            .map(|(name, value)| (name, value.to_json()))
            .collect();

        let request = ExecutionContextRequest {
            identifier: parsed.identifier,
            timestamp: parsed.prediction_time,
            objective: parsed.objective,
            metrics,
            deploy: true,
        };

        match serde_json::to_value(&request) {
            Ok(body) => {
                info!(
                    timestamp = request.timestamp,
                    metrics = request.metrics.len(),
                    "Reconfiguration requested"
                );
                self.bus
                    .publish(Envelope::new(self.topics.exec_context.as_str(), body));
                // Repeated events must not pile up; the next reconfiguration
                // is gated on an external Running message.
                self.lifecycle = ApplicationState::Deploying;
            }
            Err(problem) => error!(%problem, "Could not serialise execution context"),
        }
    }

    #[cfg(test)]
    fn lifecycle(&self) -> ApplicationState {
        self.lifecycle
    }
}
