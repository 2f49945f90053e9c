//! Core types: plans, phases, tasks and execution results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Component identifier (e.g. `wordpress`, `traefik`)
pub type Component = String;

/// Charter version stamped on plans when none is requested
pub const DEFAULT_CHARTER_VERSION: &str = "1.0.3";

/// The fixed phase vocabulary, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseName {
    Preparation,
    Installation,
    Validation,
    Integration,
    Documentation,
}

impl PhaseName {
    /// All phases in the order they execute
    pub const ALL: [PhaseName; 5] = [
        PhaseName::Preparation,
        PhaseName::Installation,
        PhaseName::Validation,
        PhaseName::Integration,
        PhaseName::Documentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparation => "preparation",
            Self::Installation => "installation",
            Self::Validation => "validation",
            Self::Integration => "integration",
            Self::Documentation => "documentation",
        }
    }

    /// Default human description of the phase
    pub fn description(&self) -> &'static str {
        match self {
            Self::Preparation => "Validate environment and prerequisites",
            Self::Installation => "Install components in dependency order",
            Self::Validation => "Run component test suites",
            Self::Integration => "Validate component integrations",
            Self::Documentation => "Update documentation and generate reports",
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a task
///
/// `pending -> simulated` on dry runs, otherwise
/// `pending -> running -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Simulated,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the task reached an end state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Simulated | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Simulated => "simulated",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A single, individually statusable unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// `<phase>-<n>`, unique within the plan
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    /// Opaque command handed to the task runner
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Component>,
    pub description: String,
    /// Service to validate through the network probe instead of running `command`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,
    /// Failure text, set when `status` is `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Create a pending task
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        command: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TaskStatus::Pending,
            command: command.into(),
            component: None,
            description: description.into(),
            probe: None,
            error: None,
        }
    }

    pub fn with_component(mut self, component: impl Into<Component>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_probe(mut self, service: impl Into<String>) -> Self {
        self.probe = Some(service.into());
        self
    }

    /// What the task would do, for logs and dry runs
    pub fn action(&self) -> String {
        match &self.probe {
            Some(service) => format!("validate service '{service}'"),
            None => self.command.clone(),
        }
    }
}

/// A named stage holding tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: PhaseName,
    pub description: String,
    pub tasks: Vec<Task>,
}

impl Phase {
    /// Create a phase with its default description
    pub fn new(name: PhaseName, tasks: Vec<Task>) -> Self {
        Self {
            name,
            description: name.description().to_string(),
            tasks,
        }
    }
}

/// Options that shape plan construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOptions {
    /// Populate the validation phase with one test task per component
    pub tdd_compliance: bool,
    /// Populate the integration phase from the rule table
    pub mcp_integration: bool,
    /// Include service-validation integration rules (network probes)
    pub validate_web_service: bool,
    pub charter_version: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            tdd_compliance: true,
            mcp_integration: true,
            validate_web_service: true,
            charter_version: DEFAULT_CHARTER_VERSION.to_string(),
        }
    }
}

/// A complete deployment plan
///
/// Built once by the planner; only task `status`/`error` change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub name: String,
    pub client_id: String,
    /// Components as requested (request order)
    pub components: Vec<Component>,
    pub charter_version: String,
    pub tdd_compliance: bool,
    pub phases: Vec<Phase>,
    pub created_at: DateTime<Utc>,
}

impl DeploymentPlan {
    /// Iterate over all tasks in execution order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.phases.iter().flat_map(|p| p.tasks.iter())
    }

    /// Find a task by id
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks().find(|t| t.id == id)
    }

    /// Find a phase by name
    pub fn phase(&self, name: PhaseName) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Count tasks per status
    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for task in self.tasks() {
            summary.add(task.status);
        }
        summary
    }

    /// Put failed tasks back to `pending` so the plan can be re-executed
    ///
    /// Returns the number of tasks reset.
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        for task in self.phases.iter_mut().flat_map(|p| p.tasks.iter_mut()) {
            if task.status == TaskStatus::Failed {
                task.status = TaskStatus::Pending;
                task.error = None;
                reset += 1;
            }
        }
        reset
    }
}

/// Task counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub pending: usize,
    pub simulated: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusSummary {
    pub fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Simulated => self.simulated += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.simulated + self.running + self.completed + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Options for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteOptions {
    /// Don't run anything, mark tasks `simulated`
    pub dry_run: bool,
    /// Halt at the first failed task
    pub stop_on_error: bool,
}

impl ExecuteOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn continue_on_error() -> Self {
        Self {
            stop_on_error: false,
            ..Self::default()
        }
    }
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            stop_on_error: true,
        }
    }
}

/// The task that caused a run to fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    pub id: String,
    pub name: String,
    pub error: String,
}

/// Outcome of executing a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    /// First failing task, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_task: Option<FailedTask>,
    pub plan: DeploymentPlan,
}
