//! Service facade: builds and runs the whole endpoint.
//!
//! One call wires the bus, the engine factory, the worker pool, the solver
//! manager, the metric updater and execution control, spawning each component
//! on its own task. The returned handle is the host's surface: request a
//! stop, or wait until the endpoint has shut down.
//!
//! ```text
//! metric feed ──► MetricUpdater ──exec-context──► SolverManager
//!                                                     │   ▲
//!                                           assignment│   │completion
//!                                                     ▼   │
//! problem feed ───────────────────────────────► SolverWorker × N
//!                                                     │
//! stop ─────────► ExecutionControl              solution topic
//! ```

use crate::broker::{Envelope, MessageBus};
use crate::config::ConfigFile;
use crate::context::MetricUpdater;
use crate::control::{self, ComponentState, ExecutionControl};
use crate::dispatch::{SolverManager, TracingDispatchSink, WorkerPool};
use crate::engine::EngineFactory;
use crate::error::SolverError;
use crate::problem::ProblemStore;
use crate::worker::{SolverWorker, WorkerId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The assembled solver endpoint.
pub struct SolverService;

impl SolverService {
    /// Builds every component and spawns them.
    ///
    /// The bus and the engine factory are injected so deployments can bridge
    /// to their broker and tests can script the engine.
    pub fn start(
        config: &ConfigFile,
        bus: Arc<dyn MessageBus>,
        factory: Arc<dyn EngineFactory>,
    ) -> Result<ServiceHandle, SolverError> {
        let shutdown = CancellationToken::new();
        let topics = config.topics.clone();

        info!(
            broker = %format!("{}:{}", config.broker.host, config.broker.port),
            user = %config.broker.user,
            endpoint = %config.broker.endpoint,
            workers = config.solver.workers,
            backend = %config.solver.backend,
            "Starting solver endpoint"
        );

        // Control goes first so Starting is the first status published.
        let execution_control = ExecutionControl::new(bus.clone(), topics.clone(), shutdown.clone());

        let store = ProblemStore::new(config.solver.problem_dir.clone())?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut pool = WorkerPool::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        for index in 0..config.solver.workers.max(1) {
            let name = format!("{}-{}", config.solver.worker_root_name, index + 1);
            let (worker, assignment_tx) = SolverWorker::new(
                WorkerId(index),
                name,
                factory.clone(),
                store.clone(),
                &bus,
                topics.clone(),
                event_tx.clone(),
            )?;
            pool.register(WorkerId(index), assignment_tx);
            tasks.push(tokio::spawn(worker.run(shutdown.clone())));
        }

        let manager = SolverManager::with_telemetry(
            bus.clone(),
            topics.clone(),
            pool,
            event_rx,
            Arc::new(TracingDispatchSink),
        );
        tasks.push(tokio::spawn(manager.run(shutdown.clone())));

        let updater = MetricUpdater::new(bus.clone(), topics.clone());
        tasks.push(tokio::spawn(updater.run(shutdown.clone())));

        // Wiring is complete before control starts serving stop messages.
        execution_control.publish_status(ComponentState::Started, None);
        tasks.push(tokio::spawn(execution_control.run()));

        Ok(ServiceHandle {
            shutdown,
            tasks,
            bus,
            stop_topic: topics.stop.clone(),
        })
    }
}

/// Handle to a running endpoint.
pub struct ServiceHandle {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    bus: Arc<dyn MessageBus>,
    stop_topic: String,
}

/// Cloneable stop requester, detachable from the service handle.
#[derive(Clone)]
pub struct StopHandle {
    bus: Arc<dyn MessageBus>,
    stop_topic: String,
}

impl StopHandle {
    /// Requests an orderly stop, equivalent to a message on the stop topic.
    pub fn request_stop(&self) {
        self.bus
            .publish(Envelope::new(self.stop_topic.as_str(), serde_json::json!({})));
    }
}

impl ServiceHandle {
    /// Requests an orderly stop, equivalent to a message on the stop topic.
    ///
    /// Execution control publishes the final status, closes the substrate and
    /// cancels the shutdown token.
    pub fn request_stop(&self) {
        self.bus
            .publish(Envelope::new(self.stop_topic.as_str(), serde_json::json!({})));
    }

    /// A cloneable handle other tasks can request a stop through.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            bus: self.bus.clone(),
            stop_topic: self.stop_topic.clone(),
        }
    }

    /// True once shutdown has completed.
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Waits for shutdown, then tears the component tasks down.
    ///
    /// In-flight solves are abandoned: a worker blocked in its engine holds
    /// its task until this abort, and no solution is emitted for it.
    pub async fn wait_stopped(self) {
        control::wait_for_termination(&self.shutdown).await;

        for task in &self.tasks {
            task.abort();
        }
        futures::future::join_all(self.tasks).await;

        info!("Solver endpoint stopped");
    }
}
