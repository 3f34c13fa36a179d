//! AMPL interpreter back-end.
//!
//! Drives a stand-alone AMPL installation in batch mode: every solve renders
//! the held model, data, parameter assignments and objective selection into a
//! run script, executes the interpreter and parses the displayed results.
//! The back-end solver algorithm (couenne, ipopt, ...) is selected with an
//! `option solver` statement in the generated script.
//!
//! Declared objective and variable names are recovered by scanning the model
//! text on load; the batch interface needs them to emit `display` statements
//! and the worker needs them to validate objective selection before a solve
//! is attempted.

use super::{EngineError, EngineFactory, OptimisationEngine};
use crate::value::ParamValue;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Marker line separating objective output from variable output.
const OBJECTIVES_MARKER: &str = "### objectives";
/// Marker line introducing variable output.
const VARIABLES_MARKER: &str = "### variables";

// =============================================================================
// Engine
// =============================================================================

/// An AMPL model held as files plus the state needed to re-run it.
pub struct AmplEngine {
    /// The `ampl` executable.
    interpreter: PathBuf,

    /// Scratch directory for generated run scripts.
    work_dir: PathBuf,

    /// Back-end solver algorithm passed to `option solver`.
    backend: String,

    model_path: Option<PathBuf>,
    data_path: Option<PathBuf>,

    /// Parameter assignments applied before the next solve.
    parameters: BTreeMap<String, ParamValue>,

    /// Objectives declared by the held model, in declaration order.
    objectives: Vec<String>,

    /// Decision variables declared by the held model.
    variables: Vec<String>,

    /// Objective the next solve optimises.
    active_objective: Option<String>,

    /// Values captured from the last successful solve.
    last_objectives: BTreeMap<String, f64>,
    last_variables: BTreeMap<String, f64>,

    /// Sequence number for run-script file names.
    run_counter: u64,
}

impl AmplEngine {
    /// Creates an engine against an AMPL installation.
    ///
    /// An empty installation directory resolves the interpreter from `PATH`.
    pub fn new(install_dir: &Path, work_dir: PathBuf, backend: impl Into<String>) -> Self {
        let interpreter = if install_dir.as_os_str().is_empty() {
            PathBuf::from("ampl")
        } else {
            install_dir.join("ampl")
        };

        Self {
            interpreter,
            work_dir,
            backend: backend.into(),
            model_path: None,
            data_path: None,
            parameters: BTreeMap::new(),
            objectives: Vec::new(),
            variables: Vec::new(),
            active_objective: None,
            last_objectives: BTreeMap::new(),
            last_variables: BTreeMap::new(),
            run_counter: 0,
        }
    }

    /// Renders the run script for one solve.
    fn render_run_script(&self) -> Result<String, EngineError> {
        let model = self
            .model_path
            .as_ref()
            .ok_or_else(|| EngineError::new("no model loaded"))?;

        let mut script = String::new();
        let _ = writeln!(script, "model \"{}\";", model.display());
        if let Some(data) = &self.data_path {
            let _ = writeln!(script, "data \"{}\";", data.display());
        }
        let _ = writeln!(script, "option solver {};", self.backend);

        for (name, value) in &self.parameters {
            let _ = writeln!(script, "let {} := {};", name, value);
        }

        if let Some(active) = &self.active_objective {
            let _ = writeln!(script, "objective {};", active);
        }

        let _ = writeln!(script, "solve;");
        let _ = writeln!(script, "print \"{}\";", OBJECTIVES_MARKER);
        for objective in &self.objectives {
            let _ = writeln!(script, "display {};", objective);
        }
        let _ = writeln!(script, "print \"{}\";", VARIABLES_MARKER);
        for variable in &self.variables {
            let _ = writeln!(script, "display {};", variable);
        }

        Ok(script)
    }

    /// Runs the interpreter over a script, returning its standard output.
    fn run_script(&mut self, script: &str) -> Result<String, EngineError> {
        self.run_counter += 1;
        let script_path = self.work_dir.join(format!("run-{}.ampl", self.run_counter));
        fs::write(&script_path, script).map_err(|error| {
            EngineError::new(format!(
                "could not write run script {}: {}",
                script_path.display(),
                error
            ))
        })?;

        debug!(script = %script_path.display(), "Invoking AMPL interpreter");

        let output = Command::new(&self.interpreter)
            .arg(&script_path)
            .output()
            .map_err(|error| {
                EngineError::new(format!(
                    "could not start {}: {}",
                    self.interpreter.display(),
                    error
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::new(format!(
                "interpreter exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // AMPL reports syntax and solver errors on stdout with a zero exit
        // status, so the output itself must be inspected.
        for line in stdout.lines() {
            let line = line.trim();
            if line.starts_with("syntax error") || line.starts_with("error processing") {
                return Err(EngineError::new(line.to_string()));
            }
        }

        Ok(stdout)
    }

    /// Checks a model or data file by loading it and quitting.
    fn check_load(&mut self, statement: &str) -> Result<(), EngineError> {
        let mut script = String::new();
        if let Some(model) = &self.model_path {
            let _ = writeln!(script, "model \"{}\";", model.display());
        }
        let _ = writeln!(script, "{}", statement);
        let _ = writeln!(script, "quit;");
        self.run_script(&script).map(|_| ())
    }
}

impl OptimisationEngine for AmplEngine {
    fn load_problem(&mut self, model: &Path) -> Result<(), EngineError> {
        let text = fs::read_to_string(model).map_err(|error| {
            EngineError::new(format!("could not read model {}: {}", model.display(), error))
        })?;

        let (objectives, variables) = scan_declarations(&text);
        if objectives.is_empty() {
            return Err(EngineError::new(format!(
                "model {} declares no objective",
                model.display()
            )));
        }

        // Replacing the model resets everything derived from the old one.
        self.model_path = None;
        self.data_path = None;
        self.parameters.clear();
        self.active_objective = None;
        self.last_objectives.clear();
        self.last_variables.clear();

        self.objectives = objectives;
        self.variables = variables;
        self.model_path = Some(model.to_path_buf());

        self.check_load("")
    }

    fn load_data(&mut self, data: &Path) -> Result<(), EngineError> {
        if self.model_path.is_none() {
            return Err(EngineError::new("no model to load data into"));
        }
        let statement = format!("data \"{}\";", data.display());
        self.check_load(&statement)?;
        self.data_path = Some(data.to_path_buf());
        Ok(())
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<(), EngineError> {
        if name.is_empty() {
            return Err(EngineError::new("parameter name is empty"));
        }
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
        self.active_objective = Some(name.to_string());
        Ok(())
    }

    fn drop_objective(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.objectives.iter().any(|candidate| candidate == name) {
            return Err(EngineError::new(format!("undeclared objective {}", name)));
        }
        if self.active_objective.as_deref() == Some(name) {
            self.active_objective = None;
        }
        Ok(())
    }

    fn solve(&mut self) -> Result<(), EngineError> {
        let script = self.render_run_script()?;
        let output = self.run_script(&script)?;

        if let Some(reason) = find_failure(&output) {
            return Err(EngineError::new(reason));
        }

        let (objectives, variables) = parse_display_output(&output);
        self.last_objectives = objectives;
        self.last_variables = variables;
        Ok(())
    }

    fn objective_value(&self, name: &str) -> Result<f64, EngineError> {
        self.last_objectives
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::new(format!("no solved value for objective {}", name)))
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables.clone()
    }

    fn variable_value(&self, name: &str) -> Result<f64, EngineError> {
        self.last_variables
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::new(format!("no solved value for variable {}", name)))
    }
}

// =============================================================================
// Model Scanning and Output Parsing
// =============================================================================

/// Extracts declared objective and variable names from model text.
///
/// Only top-level declarations are recognised: `var NAME ...;`,
/// `maximize NAME: ...;` and `minimize NAME: ...;`. Indexed declarations keep
/// the bare name. Comment lines are skipped.
fn scan_declarations(text: &str) -> (Vec<String>, Vec<String>) {
    let mut objectives = Vec::new();
    let mut variables = Vec::new();

    for line in text.lines() {
        let line = line.trim_start();
        if line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("var ") {
            if let Some(name) = leading_identifier(rest) {
                variables.push(name);
            }
        } else if let Some(rest) = line
            .strip_prefix("maximize ")
            .or_else(|| line.strip_prefix("minimize "))
        {
            if let Some(name) = leading_identifier(rest) {
                objectives.push(name);
            }
        }
    }

    (objectives, variables)
}

/// First identifier of a declaration body.
fn leading_identifier(text: &str) -> Option<String> {
    let name: String = text
        .trim_start()
        .chars()
        .take_while(|character| character.is_alphanumeric() || *character == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

/// Parses `display` output into objective and variable value maps.
///
/// The run script brackets the two groups with marker lines; within each
/// group AMPL prints scalar values as `name = value`.
fn parse_display_output(output: &str) -> (BTreeMap<String, f64>, BTreeMap<String, f64>) {
    let mut objectives = BTreeMap::new();
    let mut variables = BTreeMap::new();
    let mut section = None;

    for line in output.lines() {
        let line = line.trim();
        if line == OBJECTIVES_MARKER {
            section = Some(&mut objectives);
            continue;
        }
        if line == VARIABLES_MARKER {
            section = Some(&mut variables);
            continue;
        }

        let Some(target) = section.as_deref_mut() else {
            continue;
        };
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            continue;
        }
        match value.parse::<f64>() {
            Ok(parsed) => {
                target.insert(name.to_string(), parsed);
            }
            Err(_) => {
                warn!(name, value, "Unparseable display value from interpreter");
            }
        }
    }

    (objectives, variables)
}

/// Looks for solver-failure markers in interpreter output.
fn find_failure(output: &str) -> Option<String> {
    for line in output.lines() {
        let line = line.trim();
        let lowered = line.to_lowercase();
        if lowered.contains("infeasible")
            || lowered.contains("unbounded")
            || lowered.contains("solve_result = failure")
        {
            return Some(line.to_string());
        }
    }
    None
}

// =============================================================================
// Factory
// =============================================================================

/// Builds one [`AmplEngine`] per worker, each with its own scratch directory.
pub struct AmplEngineFactory {
    install_dir: PathBuf,
    work_dir: PathBuf,
    backend: String,
}

impl AmplEngineFactory {
    /// Creates a factory.
    ///
    /// * `install_dir` - AMPL installation directory (empty: resolve via PATH)
    /// * `work_dir` - root scratch directory; each worker gets a subdirectory
    /// * `backend` - back-end solver algorithm name
    pub fn new(install_dir: PathBuf, work_dir: PathBuf, backend: impl Into<String>) -> Self {
        Self {
            install_dir,
            work_dir,
            backend: backend.into(),
        }
    }
}

impl EngineFactory for AmplEngineFactory {
    fn create(&self, worker_name: &str) -> Result<Box<dyn OptimisationEngine + Send>, EngineError> {
        let work_dir = self.work_dir.join(worker_name);
        fs::create_dir_all(&work_dir).map_err(|error| {
            EngineError::new(format!(
                "could not create scratch directory {}: {}",
                work_dir.display(),
                error
            ))
        })?;

        Ok(Box::new(AmplEngine::new(
            &self.install_dir,
            work_dir,
            self.backend.clone(),
        )))
    }
}
