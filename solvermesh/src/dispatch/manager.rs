//! The solver manager actor.
//!
//! Owns the worker pool and the pending-request queue. Requests arrive on the
//! execution-context topic — from the metric updater and from any external
//! requester — and drain to idle workers in strict timestamp order. Solutions
//! are republished on the solution topic and free their worker for the next
//! queued request.
//!
//! The manager never retries a failed solve, never times one out, and never
//! pre-empts a running worker: a failed solve returns the worker to idle
//! without a publication, and a hung solve holds its worker until shutdown.

use super::pool::WorkerPool;
use super::queue::RequestQueue;
use super::telemetry::{DispatchEvent, DispatchSink, NullDispatchSink};
use crate::broker::{Envelope, MessageBus, TopicName};
use crate::config::TopicSettings;
use crate::messages::ExecutionContextRequest;
use crate::worker::{SolveAssignment, WorkerEvent, WorkerOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Interval between queue-health log lines while the manager runs.
const QUEUE_HEALTH_INTERVAL_SECS: u64 = 30;

/// Queue wait after which pending requests are worth a warning. Long solves
/// are legitimate; the threshold only decides when waiting becomes loggable.
const QUEUE_WAIT_WARN_THRESHOLD: Duration = Duration::from_secs(60);

/// Actor matching pending requests to idle workers.
pub struct SolverManager {
    bus: Arc<dyn MessageBus>,
    topics: TopicSettings,
    mailbox: mpsc::UnboundedReceiver<Envelope>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    pool: WorkerPool,
    queue: RequestQueue,
    telemetry: Arc<dyn DispatchSink>,
}

impl SolverManager {
    /// Creates the manager and subscribes the execution-context topic.
    ///
    /// `events` is the receiving half of the channel every worker reports
    /// completions through; the wiring layer hands its sending half to the
    /// workers.
    pub fn new(
        bus: Arc<dyn MessageBus>,
        topics: TopicSettings,
        pool: WorkerPool,
        events: mpsc::UnboundedReceiver<WorkerEvent>,
    ) -> Self {
        Self::with_telemetry(bus, topics, pool, events, Arc::new(NullDispatchSink))
    }

    /// Creates the manager with a telemetry sink.
    pub fn with_telemetry(
        bus: Arc<dyn MessageBus>,
        topics: TopicSettings,
        pool: WorkerPool,
        events: mpsc::UnboundedReceiver<WorkerEvent>,
        telemetry: Arc<dyn DispatchSink>,
    ) -> Self {
        let (mailbox_tx, mailbox) = mpsc::unbounded_channel();
        bus.subscribe(TopicName::from(topics.exec_context.as_str()), mailbox_tx);

        Self {
            bus,
            topics,
            mailbox,
            events,
            pool,
            queue: RequestQueue::new(),
            telemetry,
        }
    }

    /// Runs until shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(workers = self.pool.size(), "Solver manager started");

        let mut health_tick =
            tokio::time::interval(Duration::from_secs(QUEUE_HEALTH_INTERVAL_SECS));
        health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                envelope = self.mailbox.recv() => {
                    let Some(envelope) = envelope else { break };
                    self.handle_request(envelope);
                }

                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    self.handle_worker_event(event);
                }

                _ = health_tick.tick() => {
                    self.log_queue_health();
                }
            }
        }

        info!(
            pending = self.queue.len(),
            busy = self.pool.busy_count(),
            "Solver manager stopped"
        );
    }

    /// Reports queue health.
    ///
    /// The core never cancels or times out a solve, so requests can wait
    /// behind workers held by long-running engines indefinitely; this makes
    /// that state visible in the log without acting on it.
    fn log_queue_health(&self) {
        let Some(waited) = self.queue.longest_wait() else {
            return;
        };

        if self.pool.idle_count() == 0 && waited >= QUEUE_WAIT_WARN_THRESHOLD {
            warn!(
                pending = self.queue.len(),
                busy = self.pool.busy_count(),
                waited_secs = waited.as_secs(),
                "Requests waiting with every worker busy; long-running solves hold the pool"
            );
        } else {
            debug!(
                pending = self.queue.len(),
                idle = self.pool.idle_count(),
                waited_secs = waited.as_secs(),
                "Queue health"
            );
        }
    }

    /// Enqueues one execution-context request and drains the queue.
    fn handle_request(&mut self, envelope: Envelope) {
        let request: ExecutionContextRequest = match serde_json::from_value(envelope.payload) {
            Ok(request) => request,
            Err(problem) => {
                warn!(%problem, "Unparseable execution-context request dropped");
                return;
            }
        };

        debug!(
            timestamp = request.timestamp,
            identifier = request.identifier.as_deref().unwrap_or("-"),
            "Request enqueued"
        );

        let identifier = request.identifier.clone();
        let timestamp = request.timestamp;
        if let Err(rejected) = self.queue.push(request) {
            error!("{}", rejected);
            self.telemetry.emit(DispatchEvent::RequestRejected {
                identifier: identifier.unwrap_or_default(),
            });
            return;
        }

        self.telemetry.emit(DispatchEvent::RequestQueued {
            identifier,
            timestamp,
            queue_depth: self.queue.len(),
        });

        self.try_dispatch();
    }

    /// Publishes solutions, frees the worker and drains the queue.
    fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event.outcome {
            WorkerOutcome::Solved(solution) => {
                info!(
                    worker = %event.worker,
                    timestamp = solution.timestamp,
                    objective = %solution.objective,
                    "Solution found"
                );
                self.telemetry.emit(DispatchEvent::SolutionPublished {
                    worker: event.worker,
                    timestamp: solution.timestamp,
                    objective: solution.objective.clone(),
                });
                match serde_json::to_value(&solution) {
                    Ok(body) => self
                        .bus
                        .publish(Envelope::new(self.topics.solution.as_str(), body)),
                    Err(problem) => error!(%problem, "Could not serialise solution"),
                }
            }
            WorkerOutcome::Failed(problem) => {
                error!(worker = %event.worker, "{}", problem);
                self.telemetry.emit(DispatchEvent::SolveFailed {
                    worker: event.worker,
                });
            }
            WorkerOutcome::Dropped => {
                debug!(worker = %event.worker, "Request dropped by worker");
                self.telemetry.emit(DispatchEvent::RequestDropped {
                    worker: event.worker,
                });
            }
        }

        self.pool.release(event.worker);
        self.try_dispatch();
    }

    /// Dispatches queued requests while both a request and an idle worker
    /// exist: strict time order, at most one outstanding request per worker.
    fn try_dispatch(&mut self) {
        while !self.queue.is_empty() && self.pool.idle_count() > 0 {
            let Some(request) = self.queue.pop_earliest() else {
                return;
            };
            let Some(worker) = self.pool.claim_idle() else {
                // No worker after all; put the request back at its slot.
                let _ = self.queue.push(request);
                return;
            };

            let Some(channel) = self.pool.assignments(worker) else {
                self.pool.evict(worker);
                self.telemetry.emit(DispatchEvent::WorkerEvicted { worker });
                let _ = self.queue.push(request);
                continue;
            };

            // A claimed-idle worker has an empty assignment slot, so this
            // only fails when the worker task is gone.
            match channel.try_send(SolveAssignment {
                request: request.clone(),
            }) {
                Ok(()) => {
                    debug!(%worker, timestamp = request.timestamp, "Request dispatched");
                    self.telemetry.emit(DispatchEvent::RequestDispatched {
                        worker,
                        timestamp: request.timestamp,
                        queue_depth: self.queue.len(),
                    });
                }
                Err(_) => {
                    warn!(%worker, "Worker unreachable; evicting from pool");
                    self.pool.evict(worker);
                    self.telemetry.emit(DispatchEvent::WorkerEvicted { worker });
                    let _ = self.queue.push(request);
                }
            }

            debug_assert!(self.pool.partition_is_consistent());
        }
    }
}
