//! Process-level execution control.
//!
//! The solver endpoint runs for as long as the application it optimises. An
//! external stop message ends it: the control actor publishes a final status,
//! tells the messaging substrate to terminate and cancels the shutdown token
//! every other component selects on. Hosts wait on the same token; a
//! cancellation token has no spurious wake-ups, so waiting is a single await.

use crate::broker::{Envelope, MessageBus, TopicName};
use crate::config::TopicSettings;
use crate::messages::StatusPayload;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Lifecycle states of this solver endpoint, published on the status topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentState {
    /// Wiring is being built.
    Starting,
    /// All components are up and subscribed.
    Started,
    /// Shutdown has begun.
    Stopping,
    /// The endpoint has shut down.
    Stopped,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "Starting",
            Self::Started => "Started",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        };
        write!(f, "{}", name)
    }
}

/// Actor owning orderly shutdown and status publication.
pub struct ExecutionControl {
    bus: Arc<dyn MessageBus>,
    topics: TopicSettings,
    mailbox: mpsc::UnboundedReceiver<Envelope>,
    shutdown: CancellationToken,
}

impl ExecutionControl {
    /// Creates the control actor, subscribes the stop topic and announces
    /// `Starting`.
    pub fn new(
        bus: Arc<dyn MessageBus>,
        topics: TopicSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let (mailbox_tx, mailbox) = mpsc::unbounded_channel();
        bus.subscribe(TopicName::from(topics.stop.as_str()), mailbox_tx);

        let control = Self {
            bus,
            topics,
            mailbox,
            shutdown,
        };
        control.publish_status(ComponentState::Starting, None);
        control
    }

    /// Publishes a status message on the status topic.
    pub fn publish_status(&self, state: ComponentState, message: Option<String>) {
        publish_status(&*self.bus, &self.topics, state, message);
    }

    /// Runs until a stop message arrives or the token is cancelled from
    /// outside (host signal handling).
    pub async fn run(mut self) {
        tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => {
                info!("Shutdown requested by host");
            }

            envelope = self.mailbox.recv() => {
                // Any payload on the stop topic is a stop command.
                if envelope.is_some() {
                    info!("Stop message received");
                }
            }
        }

        // Publish the terminal statuses while the substrate is still up,
        // then close it and wake every waiter.
        self.publish_status(ComponentState::Stopping, None);
        self.publish_status(ComponentState::Stopped, None);
        self.bus.shutdown();
        self.shutdown.cancel();
    }
}

/// Publishes one status message without needing the actor.
pub fn publish_status(
    bus: &dyn MessageBus,
    topics: &TopicSettings,
    state: ComponentState,
    message: Option<String>,
) {
    let payload = StatusPayload {
        when: chrono::Utc::now().to_rfc3339(),
        state: state.to_string(),
        message,
    };
    match serde_json::to_value(&payload) {
        Ok(body) => bus.publish(Envelope::new(topics.status.as_str(), body)),
        Err(problem) => error!(%problem, "Could not serialise status message"),
    }
}

/// Blocks the caller until the endpoint has shut down.
pub async fn wait_for_termination(shutdown: &CancellationToken) {
    shutdown.cancelled().await;
}
