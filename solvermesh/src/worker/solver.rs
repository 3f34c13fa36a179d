//! The solver worker actor.
//!
//! Each worker ingests problem definitions and data updates from the bus and
//! serves solve assignments from the manager, strictly one message at a time.
//! The engine's solve call can run for minutes; it is moved onto a blocking
//! thread while the worker stays in its Working state, so a busy worker is
//! exactly a worker whose engine is solving.

use super::messages::{SolveAssignment, WorkerEvent, WorkerOutcome};
use super::WorkerId;
use crate::broker::{Envelope, MessageBus, TopicName};
use crate::config::TopicSettings;
use crate::engine::{EngineFactory, OptimisationEngine};
use crate::error::SolverError;
use crate::messages::{DataFilePayload, ExecutionContextRequest, SolutionPayload};
use crate::problem::{ProblemDefinition, ProblemStore};
use crate::value::{MetricValue, ParamValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Assignment channel capacity: the manager never sends a second request
/// before the first completes.
const ASSIGNMENT_CHANNEL_CAPACITY: usize = 1;

/// Worker lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorkerState {
    /// No problem held; solve requests are dropped.
    #[default]
    Undefined,
    /// Problem defined, no active solve.
    Idle,
    /// A solve is in flight.
    Working,
}

/// One solver worker: one model, one engine, one mailbox.
pub struct SolverWorker {
    id: WorkerId,
    name: String,
    factory: Arc<dyn EngineFactory>,
    engine: Option<Box<dyn OptimisationEngine + Send>>,
    store: ProblemStore,
    mailbox: mpsc::UnboundedReceiver<Envelope>,
    assignments: mpsc::Receiver<SolveAssignment>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    topics: TopicSettings,

    default_objective: Option<String>,
    variables_to_constants: BTreeMap<String, String>,
    problem_defined: bool,
    state: WorkerState,
}

impl SolverWorker {
    /// Creates a worker, its engine and its subscriptions.
    ///
    /// Returns the worker and the assignment sender the manager dispatches
    /// through.
    pub fn new(
        id: WorkerId,
        name: String,
        factory: Arc<dyn EngineFactory>,
        store: ProblemStore,
        bus: &Arc<dyn MessageBus>,
        topics: TopicSettings,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<(Self, mpsc::Sender<SolveAssignment>), SolverError> {
        let engine = factory
            .create(&name)
            .map_err(|problem| SolverError::model_invalid(problem.to_string()))?;

        let (mailbox_tx, mailbox) = mpsc::unbounded_channel();
        bus.subscribe(
            TopicName::from(topics.problem_definition.as_str()),
            mailbox_tx.clone(),
        );
        bus.subscribe(TopicName::from(topics.data_file.as_str()), mailbox_tx);

        let (assignment_tx, assignments) = mpsc::channel(ASSIGNMENT_CHANNEL_CAPACITY);

        let worker = Self {
            id,
            name,
            factory,
            engine: Some(engine),
            store,
            mailbox,
            assignments,
            events,
            topics,
            default_objective: None,
            variables_to_constants: BTreeMap::new(),
            problem_defined: false,
            state: WorkerState::Undefined,
        };
        Ok((worker, assignment_tx))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Runs until shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(worker = %self.name, "Solver worker started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                envelope = self.mailbox.recv() => {
                    let Some(envelope) = envelope else { break };
                    if let Err(problem) = self.handle_envelope(envelope) {
                        error!(worker = %self.name, "{}", problem);
                    }
                }

                assignment = self.assignments.recv() => {
                    let Some(assignment) = assignment else { break };
                    self.handle_assignment(assignment).await;
                }
            }
        }

        info!(worker = %self.name, "Solver worker stopped");
    }

    /// Routes a bus message to the problem or data handler.
    fn handle_envelope(&mut self, envelope: Envelope) -> Result<(), SolverError> {
        let topic = envelope.topic.as_str();
        if topic == self.topics.problem_definition {
            self.define_problem(&envelope.payload)
        } else if topic == self.topics.data_file {
            self.update_data(&envelope.payload)
        } else {
            debug!(worker = %self.name, topic, "Message on unexpected topic dropped");
            Ok(())
        }
    }

    /// Define-Problem: replaces any held model.
    ///
    /// A model the engine rejects discards the previous problem too; the
    /// worker ends Undefined rather than silently keeping a stale model.
    fn define_problem(&mut self, payload: &serde_json::Value) -> Result<(), SolverError> {
        let definition = ProblemDefinition::from_payload(payload)?;
        let path = self.store.save(&definition.file_name, &definition.description)?;

        self.problem_defined = false;
        self.state = WorkerState::Undefined;
        self.default_objective = None;
        self.variables_to_constants.clear();

        let engine = self.engine_mut()?;
        engine
            .load_problem(&path)
            .map_err(|problem| SolverError::model_invalid(problem.to_string()))?;

        for (constant, value) in &definition.constant_initials {
            engine
                .set_parameter(constant, value.to_parameter())
                .map_err(|problem| SolverError::model_invalid(problem.to_string()))?;
        }

        self.default_objective = Some(definition.default_objective.clone());
        self.variables_to_constants = definition.variables_to_constants.clone();
        self.problem_defined = true;
        self.state = WorkerState::Idle;

        info!(
            worker = %self.name,
            problem = %definition.file_name,
            default_objective = %definition.default_objective,
            "Problem defined"
        );

        // Initial data goes through the same path as a data-file update. A
        // failure here leaves the problem defined, exactly as if the update
        // had arrived separately.
        if let Some((data_name, data_contents)) = &definition.initial_data {
            self.load_data_file(data_name, data_contents)?;
        }

        Ok(())
    }

    /// Data-File-Update: refreshes parameters of the held model.
    fn update_data(&mut self, payload: &serde_json::Value) -> Result<(), SolverError> {
        let parsed: DataFilePayload = serde_json::from_value(payload.clone())
            .map_err(|problem| SolverError::malformed_problem(problem.to_string(), payload.clone()))?;
        self.load_data_file(&parsed.file_name, &parsed.contents)
    }

    /// Saves and loads one data file.
    fn load_data_file(&mut self, file_name: &str, contents: &str) -> Result<(), SolverError> {
        let path = self.store.save(file_name, contents)?;
        self.engine_mut()?
            .load_data(&path)
            .map_err(|problem| SolverError::data_invalid(problem.to_string()))?;
        debug!(worker = %self.name, data = file_name, "Data file loaded");
        Ok(())
    }

    /// Solve-Problem: runs the engine against one execution context.
    async fn handle_assignment(&mut self, assignment: SolveAssignment) {
        if !self.problem_defined {
            // Solve triggers can race problem redefinition; dropping is the
            // specified behaviour, not a failure.
            debug!(worker = %self.name, "No problem defined; request dropped");
            self.send_event(WorkerOutcome::Dropped);
            return;
        }

        let Some(engine) = self.engine.take() else {
            self.send_event(WorkerOutcome::Failed(SolverError::solve_failed(
                "engine unavailable",
            )));
            return;
        };

        self.state = WorkerState::Working;
        let inputs = SolveInputs {
            request: assignment.request,
            default_objective: self.default_objective.clone(),
            variables_to_constants: self.variables_to_constants.clone(),
        };

        debug!(
            worker = %self.name,
            timestamp = inputs.request.timestamp,
            "Solve started"
        );

        match tokio::task::spawn_blocking(move || {
            let mut engine = engine;
            let outcome = solve_with(engine.as_mut(), &inputs);
            (engine, outcome)
        })
        .await
        {
            Ok((engine, outcome)) => {
                self.engine = Some(engine);
                self.state = WorkerState::Idle;
                match outcome {
                    Ok(solution) => self.send_event(WorkerOutcome::Solved(solution)),
                    Err(problem) => self.send_event(WorkerOutcome::Failed(problem)),
                }
            }
            Err(join_problem) => {
                // The solve panicked and took the engine with it. Recreate
                // the engine; the problem must be redefined before the worker
                // serves again.
                error!(worker = %self.name, %join_problem, "Solve task aborted");
                self.problem_defined = false;
                self.state = WorkerState::Undefined;
                match self.factory.create(&self.name) {
                    Ok(engine) => self.engine = Some(engine),
                    Err(problem) => {
                        error!(worker = %self.name, %problem, "Engine recreation failed")
                    }
                }
                self.send_event(WorkerOutcome::Failed(SolverError::solve_failed(
                    join_problem.to_string(),
                )));
            }
        }
    }

    fn engine_mut(&mut self) -> Result<&mut dyn OptimisationEngine, SolverError> {
        match self.engine.as_mut() {
            Some(engine) => Ok(engine.as_mut()),
            None => Err(SolverError::model_invalid("engine unavailable")),
        }
    }

    fn send_event(&self, outcome: WorkerOutcome) {
        let event = WorkerEvent {
            worker: self.id,
            outcome,
        };
        if self.events.send(event).is_err() {
            warn!(worker = %self.name, "Manager gone; completion event dropped");
        }
    }
}

// =============================================================================
// The Solve Procedure
// =============================================================================

/// Everything a solve needs besides the engine, so the whole procedure can
/// move onto a blocking thread.
struct SolveInputs {
    request: ExecutionContextRequest,
    default_objective: Option<String>,
    variables_to_constants: BTreeMap<String, String>,
}

/// Runs one solve: parameters, objective selection, solve, extraction and
/// deployment feedback.
fn solve_with(
    engine: &mut dyn OptimisationEngine,
    inputs: &SolveInputs,
) -> Result<SolutionPayload, SolverError> {
    let request = &inputs.request;

    // Metric snapshot into model parameters, type-directed.
    for (name, raw) in &request.metrics {
        let value = MetricValue::from_json(raw)
            .ok_or_else(|| SolverError::unsupported_value(name.clone(), raw.clone()))?;
        engine
            .set_parameter(name, value.to_parameter())
            .map_err(|problem| SolverError::data_invalid(problem.to_string()))?;
    }

    // The active objective: request override, else the stored default.
    let objective = request
        .objective
        .clone()
        .or_else(|| inputs.default_objective.clone())
        .ok_or_else(SolverError::no_objective)?;

    let declared = engine.objective_names();
    if !declared.iter().any(|name| *name == objective) {
        return Err(SolverError::unknown_objective(objective));
    }

    for name in &declared {
        let selection = if *name == objective {
            engine.keep_objective(name)
        } else {
            engine.drop_objective(name)
        };
        selection.map_err(|problem| SolverError::solve_failed(problem.to_string()))?;
    }

    engine
        .solve()
        .map_err(|problem| SolverError::solve_failed(problem.to_string()))?;

    let mut objective_values = BTreeMap::new();
    for name in &declared {
        let value = engine
            .objective_value(name)
            .map_err(|problem| SolverError::solve_failed(problem.to_string()))?;
        objective_values.insert(name.clone(), value);
    }

    let mut variable_values = BTreeMap::new();
    for name in engine.variable_names() {
        let value = engine
            .variable_value(&name)
            .map_err(|problem| SolverError::solve_failed(problem.to_string()))?;
        variable_values.insert(name, value);
    }

    // A deployed solution becomes the baseline for the next solve: solved
    // variable values feed their tracking constants.
    if request.deploy {
        for (variable, constant) in &inputs.variables_to_constants {
            match variable_values.get(variable) {
                Some(value) => {
                    engine
                        .set_parameter(constant, ParamValue::Double(*value))
                        .map_err(|problem| SolverError::solve_failed(problem.to_string()))?;
                }
                None => warn!(
                    variable,
                    constant, "Tracked variable missing from solution"
                ),
            }
        }
    }

    Ok(SolutionPayload {
        identifier: request.identifier.clone(),
        timestamp: request.timestamp,
        objective,
        objective_values,
        variable_values,
        deploy: request.deploy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InProcessBus;
    use crate::engine::EngineError;
    use serde_json::json;

    // A scriptable engine standing in for the AMPL back-end.
    struct MockEngine {
        objectives: Vec<String>,
        variables: Vec<String>,
        parameters: BTreeMap<String, ParamValue>,
        active_objective: Option<String>,
        fail_solve: bool,
        fail_data: bool,
        solved: bool,
    }

    impl MockEngine {
        fn new() -> Self {
            Self {
                objectives: vec!["cost".into(), "latency".into()],
                variables: vec!["x".into()],
                parameters: BTreeMap::new(),
                active_objective: None,
                fail_solve: false,
                fail_data: false,
                solved: false,
            }
        }
    }

    impl OptimisationEngine for MockEngine {
        fn load_problem(&mut self, _model: &std::path::Path) -> Result<(), EngineError> {
            Ok(())
        }

        fn load_data(&mut self, _data: &std::path::Path) -> Result<(), EngineError> {
            if self.fail_data {
                Err(EngineError::new("bad data"))
            } else {
                Ok(())
            }
        }

        fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<(), EngineError> {
            self.parameters.insert(name.to_string(), value);
            Ok(())
        }

        fn objective_names(&self) -> Vec<String> {
            self.objectives.clone()
        }

        fn keep_objective(&mut self, name: &str) -> Result<(), EngineError> {
            self.active_objective = Some(name.to_string());
            Ok(())
        }

        fn drop_objective(&mut self, _name: &str) -> Result<(), EngineError> {
            Ok(())
        }

        fn solve(&mut self) -> Result<(), EngineError> {
            if self.fail_solve {
                Err(EngineError::new("infeasible"))
            } else {
                self.solved = true;
                Ok(())
            }
        }

        fn objective_value(&self, name: &str) -> Result<f64, EngineError> {
            match name {
                "cost" => Ok(12.5),
                "latency" => Ok(0.25),
                _ => Err(EngineError::new("unknown objective")),
            }
        }

        fn variable_names(&self) -> Vec<String> {
            self.variables.clone()
        }

        fn variable_value(&self, _name: &str) -> Result<f64, EngineError> {
            Ok(3.0)
        }
    }

    fn request(objective: Option<&str>, deploy: bool) -> ExecutionContextRequest {
        ExecutionContextRequest {
            identifier: None,
            timestamp: 2000,
            objective: objective.map(|name| name.to_string()),
            metrics: BTreeMap::from([("load".to_string(), json!(4.0))]),
            deploy,
        }
    }

    fn inputs(objective: Option<&str>, deploy: bool) -> SolveInputs {
        SolveInputs {
            request: request(objective, deploy),
            default_objective: Some("cost".into()),
            variables_to_constants: BTreeMap::from([("x".to_string(), "previous_x".to_string())]),
        }
    }

    #[test]
    fn test_solve_reports_all_objectives_and_variables() {
        let mut engine = MockEngine::new();
        let solution = solve_with(&mut engine, &inputs(None, true)).unwrap();

        assert_eq!(solution.objective, "cost");
        assert_eq!(solution.objective_values["cost"], 12.5);
        assert_eq!(solution.objective_values["latency"], 0.25);
        assert_eq!(solution.variable_values["x"], 3.0);
        assert_eq!(solution.timestamp, 2000);
        assert!(solution.deploy);
    }

    #[test]
    fn test_metric_parameters_are_coerced() {
        let mut engine = MockEngine::new();
        let mut solve_inputs = inputs(None, false);
        solve_inputs
            .request
            .metrics
            .insert("replicas".to_string(), json!(3));
        solve_inputs
            .request
            .metrics
            .insert("spot".to_string(), json!(true));

        solve_with(&mut engine, &solve_inputs).unwrap();
        assert_eq!(engine.parameters["load"], ParamValue::Double(4.0));
        assert_eq!(engine.parameters["replicas"], ParamValue::Long(3));
        assert_eq!(engine.parameters["spot"], ParamValue::Long(1));
    }

    #[test]
    fn test_unsupported_metric_kind_aborts() {
        let mut engine = MockEngine::new();
        let mut solve_inputs = inputs(None, false);
        solve_inputs
            .request
            .metrics
            .insert("broken".to_string(), json!([1, 2]));

        let problem = solve_with(&mut engine, &solve_inputs).unwrap_err();
        assert!(matches!(problem, SolverError::UnsupportedValueKind { .. }));
        assert!(!engine.solved);
    }

    #[test]
    fn test_objective_override_wins_over_default() {
        let mut engine = MockEngine::new();
        let solution = solve_with(&mut engine, &inputs(Some("latency"), false)).unwrap();
        assert_eq!(solution.objective, "latency");
        assert_eq!(engine.active_objective.as_deref(), Some("latency"));
        // All declared objectives are still reported.
        assert_eq!(solution.objective_values.len(), 2);
    }

    #[test]
    fn test_missing_objective_everywhere_errors() {
        let mut engine = MockEngine::new();
        let mut solve_inputs = inputs(None, false);
        solve_inputs.default_objective = None;

        let problem = solve_with(&mut engine, &solve_inputs).unwrap_err();
        assert!(matches!(problem, SolverError::NoObjectiveSelected { .. }));
    }

    #[test]
    fn test_unknown_objective_errors_before_solve() {
        let mut engine = MockEngine::new();
        let problem = solve_with(&mut engine, &inputs(Some("throughput"), false)).unwrap_err();
        assert!(matches!(problem, SolverError::UnknownObjective { .. }));
        assert!(!engine.solved);
    }

    #[test]
    fn test_engine_failure_is_solve_failed() {
        let mut engine = MockEngine::new();
        engine.fail_solve = true;
        let problem = solve_with(&mut engine, &inputs(None, false)).unwrap_err();
        assert!(matches!(problem, SolverError::SolveFailed { .. }));
    }

    #[test]
    fn test_deployed_solution_feeds_constants() {
        let mut engine = MockEngine::new();
        solve_with(&mut engine, &inputs(None, true)).unwrap();
        assert_eq!(engine.parameters["previous_x"], ParamValue::Double(3.0));
    }

    #[test]
    fn test_undeployed_solution_leaves_constants_alone() {
        let mut engine = MockEngine::new();
        solve_with(&mut engine, &inputs(None, false)).unwrap();
        assert!(!engine.parameters.contains_key("previous_x"));
    }

    // ------------------------------------------------------------------
    // Worker state machine
    // ------------------------------------------------------------------

    struct MockFactory;

    impl EngineFactory for MockFactory {
        fn create(
            &self,
            _worker: &str,
        ) -> Result<Box<dyn OptimisationEngine + Send>, EngineError> {
            Ok(Box::new(MockEngine::new()))
        }
    }

    fn scratch_store(tag: &str) -> ProblemStore {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        ProblemStore::new(std::env::temp_dir().join(format!("solvermesh-worker-{}-{}", tag, nanos)))
            .unwrap()
    }

    fn worker(
        tag: &str,
    ) -> (
        SolverWorker,
        mpsc::Sender<SolveAssignment>,
        mpsc::UnboundedReceiver<WorkerEvent>,
    ) {
        let bus: Arc<dyn MessageBus> = Arc::new(InProcessBus::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (worker, assignment_tx) = SolverWorker::new(
            WorkerId(0),
            "solver-1".to_string(),
            Arc::new(MockFactory),
            scratch_store(tag),
            &bus,
            TopicSettings::default(),
            event_tx,
        )
        .unwrap();
        (worker, assignment_tx, event_rx)
    }

    fn problem_payload() -> serde_json::Value {
        json!({
            "ProblemFile": "sizing.mod",
            "ProblemDescription": "maximize cost: 0;",
            "DefaultObjectiveFunction": "cost"
        })
    }

    #[tokio::test]
    async fn test_worker_starts_undefined() {
        let (worker, _assignments, _events) = worker("start");
        assert_eq!(worker.state(), WorkerState::Undefined);
        assert!(!worker.problem_defined);
    }

    #[tokio::test]
    async fn test_define_problem_reaches_idle() {
        let (mut worker, _assignments, _events) = worker("define");

        worker.define_problem(&problem_payload()).unwrap();
        assert_eq!(worker.state(), WorkerState::Idle);
        assert!(worker.problem_defined);
        assert_eq!(worker.default_objective.as_deref(), Some("cost"));
    }

    #[tokio::test]
    async fn test_malformed_problem_keeps_worker_state() {
        let (mut worker, _assignments, _events) = worker("malformed");
        worker.define_problem(&problem_payload()).unwrap();

        let problem = worker.define_problem(&json!({"ProblemFile": "x"})).unwrap_err();
        assert!(matches!(problem, SolverError::MalformedProblem { .. }));
        // Validation failed before anything was replaced.
        assert!(worker.problem_defined);
    }

    #[tokio::test]
    async fn test_solve_without_problem_drops_silently() {
        let (mut worker, _assignments, mut events) = worker("drop");

        worker
            .handle_assignment(SolveAssignment {
                request: request(None, true),
            })
            .await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event.outcome, WorkerOutcome::Dropped));
        assert_eq!(worker.state(), WorkerState::Undefined);
    }

    #[tokio::test]
    async fn test_solve_round_trip_returns_to_idle() {
        let (mut worker, _assignments, mut events) = worker("solve");
        worker.define_problem(&problem_payload()).unwrap();

        worker
            .handle_assignment(SolveAssignment {
                request: request(None, true),
            })
            .await;

        let event = events.recv().await.unwrap();
        match event.outcome {
            WorkerOutcome::Solved(solution) => {
                assert_eq!(solution.objective, "cost");
                assert_eq!(solution.timestamp, 2000);
            }
            other => panic!("expected a solution, got {:?}", other),
        }
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[tokio::test]
    async fn test_unknown_objective_fails_but_worker_recovers() {
        let (mut worker, _assignments, mut events) = worker("unknown");
        worker.define_problem(&problem_payload()).unwrap();

        worker
            .handle_assignment(SolveAssignment {
                request: request(Some("throughput"), true),
            })
            .await;
        let event = events.recv().await.unwrap();
        assert!(matches!(
            event.outcome,
            WorkerOutcome::Failed(SolverError::UnknownObjective { .. })
        ));
        assert_eq!(worker.state(), WorkerState::Idle);

        // The next valid request is served normally.
        worker
            .handle_assignment(SolveAssignment {
                request: request(None, true),
            })
            .await;
        let event = events.recv().await.unwrap();
        assert!(matches!(event.outcome, WorkerOutcome::Solved(_)));
    }

    #[tokio::test]
    async fn test_data_update_failure_is_data_invalid() {
        let (mut worker, _assignments, _events) = worker("data");
        worker.define_problem(&problem_payload()).unwrap();

        // Swap in an engine that rejects data loads.
        let mut failing = MockEngine::new();
        failing.fail_data = true;
        worker.engine = Some(Box::new(failing));

        let problem = worker
            .update_data(&json!({"FileName": "sizing.dat", "FileContent": "param load := 1;"}))
            .unwrap_err();
        assert!(matches!(problem, SolverError::DataInvalid { .. }));
        // The problem-defined flag is untouched by data failures.
        assert!(worker.problem_defined);
    }

    #[tokio::test]
    async fn test_data_update_is_idempotent() {
        let (mut worker, _assignments, _events) = worker("idempotent");
        worker.define_problem(&problem_payload()).unwrap();

        let payload = json!({"FileName": "sizing.dat", "FileContent": "param load := 1;"});
        worker.update_data(&payload).unwrap();
        worker.update_data(&payload).unwrap();

        let stored = worker.store.directory().join("sizing.dat");
        assert_eq!(
            std::fs::read_to_string(stored).unwrap(),
            "param load := 1;"
        );
        assert!(worker.problem_defined);
    }
}
