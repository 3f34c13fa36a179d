//! Shared test harness: a scripted engine back-end and a fully wired
//! endpoint over the in-process bus.

use solvermesh::broker::{Envelope, InProcessBus, MessageBus, TopicName};
use solvermesh::config::{ConfigFile, TopicSettings};
use solvermesh::engine::{EngineError, EngineFactory, OptimisationEngine};
use solvermesh::service::{ServiceHandle, SolverService};
use solvermesh::value::ParamValue;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// Scripted Engine
// =============================================================================

/// A deterministic engine standing in for the AMPL back-end.
///
/// Declares the objectives and variables it is constructed with. A solve
/// sleeps for the number of milliseconds found in the `solve_ms` parameter,
/// if any, which lets tests hold a worker busy per request. Solved values are
/// position-based so every declared name gets a distinct value.
pub struct ScriptedEngine {
    objectives: Vec<String>,
    variables: Vec<String>,
    parameters: BTreeMap<String, ParamValue>,
    active: Option<String>,
}

impl ScriptedEngine {
    fn new(objectives: Vec<String>, variables: Vec<String>) -> Self {
        Self {
            objectives,
            variables,
            parameters: BTreeMap::new(),
            active: None,
        }
    }
}

impl OptimisationEngine for ScriptedEngine {
    fn load_problem(&mut self, _model: &Path) -> Result<(), EngineError> {
        Ok(())
    }

    fn load_data(&mut self, _data: &Path) -> Result<(), EngineError> {
        Ok(())
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<(), EngineError> {
        self.parameters.insert(name.to_string(), value);
        Ok(())
    }

    fn objective_names(&self) -> Vec<String> {
        self.objectives.clone()
    }

    fn keep_objective(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.objectives.iter().any(|candidate| candidate == name) {
            return Err(EngineError::new(format!("undeclared objective {}", name)));
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    fn drop_objective(&mut self, _name: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn solve(&mut self) -> Result<(), EngineError> {
        if let Some(ParamValue::Long(millis)) = self.parameters.get("solve_ms") {
            std::thread::sleep(Duration::from_millis(*millis as u64));
        }
        Ok(())
    }

    fn objective_value(&self, name: &str) -> Result<f64, EngineError> {
        self.objectives
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| 10.0 + index as f64)
            .ok_or_else(|| EngineError::new(format!("unknown objective {}", name)))
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables.clone()
    }

    fn variable_value(&self, name: &str) -> Result<f64, EngineError> {
        self.variables
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| 3.0 + index as f64)
            .ok_or_else(|| EngineError::new(format!("unknown variable {}", name)))
    }
}

/// Factory handing every worker a fresh scripted engine.
pub struct ScriptedFactory {
    pub objectives: Vec<String>,
    pub variables: Vec<String>,
}

impl ScriptedFactory {
    pub fn standard() -> Self {
        Self {
            objectives: vec!["cost".to_string(), "latency".to_string()],
            variables: vec!["x".to_string()],
        }
    }
}

impl EngineFactory for ScriptedFactory {
    fn create(&self, _worker: &str) -> Result<Box<dyn OptimisationEngine + Send>, EngineError> {
        Ok(Box::new(ScriptedEngine::new(
            self.objectives.clone(),
            self.variables.clone(),
        )))
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A running endpoint plus probes on its outbound topics.
pub struct Harness {
    pub bus: Arc<InProcessBus>,
    pub topics: TopicSettings,
    pub handle: ServiceHandle,
    pub solutions: mpsc::UnboundedReceiver<Envelope>,
}

impl Harness {
    /// Starts an endpoint with the standard scripted engine.
    pub fn start(workers: usize) -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();

        let mut config = ConfigFile::default();
        config.solver.workers = workers;
        config.solver.problem_dir =
            std::env::temp_dir().join(format!("solvermesh-harness-{}", nanos));

        let bus = Arc::new(InProcessBus::new());
        let topics = config.topics.clone();

        let (solution_tx, solutions) = mpsc::unbounded_channel();
        bus.subscribe(TopicName::from(topics.solution.as_str()), solution_tx);

        let shared: Arc<dyn MessageBus> = bus.clone();
        let handle =
            SolverService::start(&config, shared, Arc::new(ScriptedFactory::standard()))
                .expect("endpoint should start");

        Self {
            bus,
            topics,
            handle,
            solutions,
        }
    }

    /// Publishes a payload on a topic.
    pub fn publish(&self, topic: &str, payload: serde_json::Value) {
        self.bus.publish(Envelope::new(topic, payload));
    }

    /// Publishes the standard two-objective problem definition.
    pub fn publish_problem(&self) {
        let topic = self.topics.problem_definition.clone();
        self.publish(
            &topic,
            serde_json::json!({
                "ProblemFile": "sizing.mod",
                "ProblemDescription": "var x >= 0; maximize cost: -x; minimize latency: x;",
                "DefaultObjectiveFunction": "cost",
                "Constants": {
                    "previous_x": {"Variable": "x", "Value": 0}
                }
            }),
        );
    }

    /// Waits for the next published solution.
    pub async fn next_solution(&mut self) -> serde_json::Value {
        tokio::time::timeout(Duration::from_secs(2), self.solutions.recv())
            .await
            .expect("timed out waiting for a solution")
            .expect("solution stream ended")
            .payload
    }

    /// Asserts no solution is published within the window.
    pub async fn expect_no_solution(&mut self, window: Duration) {
        let outcome = tokio::time::timeout(window, self.solutions.recv()).await;
        assert!(outcome.is_err(), "unexpected solution: {:?}", outcome);
    }

    /// Lets the components drain their mailboxes.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    /// Stops the endpoint and waits for it.
    pub async fn stop(self) {
        let Harness { handle, .. } = self;
        handle.request_stop();
        tokio::time::timeout(Duration::from_secs(2), handle.wait_stopped())
            .await
            .expect("endpoint should stop");
    }
}
