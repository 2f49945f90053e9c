//! Execution seams
//!
//! These traits keep the executor free of any process, network or
//! terminal dependency:
//!
//! - [`TaskRunner`]: performs the side effect of one task
//! - [`ProgressCallback`]: observes phase and task transitions
//! - [`ConfirmCallback`]: asks the user before a real run

use crate::error::TaskExecutionError;
use crate::types::{PhaseName, Task};
use std::collections::HashMap;

/// Performs a task's side effect
///
/// Only called for non-dry runs. Errors are recorded on the task by the
/// executor; they never abort `execute`.
pub trait TaskRunner {
    fn run(&mut self, task: &Task) -> Result<(), TaskExecutionError>;
}

impl<R: TaskRunner + ?Sized> TaskRunner for &mut R {
    fn run(&mut self, task: &Task) -> Result<(), TaskExecutionError> {
        (**self).run(task)
    }
}

impl<R: TaskRunner + ?Sized> TaskRunner for Box<R> {
    fn run(&mut self, task: &Task) -> Result<(), TaskExecutionError> {
        (**self).run(task)
    }
}

/// Progress callback for plan execution
pub trait ProgressCallback {
    /// Called when a phase starts, with the number of tasks it holds
    fn on_phase_start(&mut self, phase: PhaseName, tasks: usize);

    /// Called before a task runs (or is simulated)
    fn on_task_start(&mut self, task: &Task);

    /// Called once the task reached its new status
    fn on_task_complete(&mut self, task: &Task);

    /// Called when a phase finishes
    fn on_phase_complete(&mut self, phase: PhaseName);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase_start(&mut self, _phase: PhaseName, _tasks: usize) {}
    fn on_task_start(&mut self, _task: &Task) {}
    fn on_task_complete(&mut self, _task: &Task) {}
    fn on_phase_complete(&mut self, _phase: PhaseName) {}
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed.
    fn confirm(&mut self, prompt: &str) -> std::io::Result<bool>;
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> std::io::Result<bool> {
        Ok(true)
    }
}

/// Runner that succeeds unless told otherwise, recording every call
///
/// Used by tests and by callers that want to exercise a plan without side
/// effects beyond status changes.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    failures: HashMap<String, TaskExecutionError>,
    calls: Vec<String>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the task with `id` fail with a command error
    pub fn failing(mut self, id: &str, stderr: &str) -> Self {
        self.failures.insert(
            id.to_string(),
            TaskExecutionError::Exited {
                code: 1,
                stderr: stderr.to_string(),
            },
        );
        self
    }

    /// Make the task with `id` fail with a specific error
    pub fn failing_with(mut self, id: &str, error: TaskExecutionError) -> Self {
        self.failures.insert(id.to_string(), error);
        self
    }

    /// Ids of the tasks run so far, in order
    pub fn calls(&self) -> &[String] {
        &self.calls
    }
}

impl TaskRunner for ScriptedRunner {
    fn run(&mut self, task: &Task) -> Result<(), TaskExecutionError> {
        self.calls.push(task.id.clone());
        match self.failures.get(&task.id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_runner_fails_only_chosen_ids() {
        let mut runner = ScriptedRunner::new().failing("installation-2", "no rule");
        let ok = Task::new("installation-1", "Install traefik", "make traefik", "");
        let bad = Task::new("installation-2", "Install keycloak", "make keycloak", "");

        assert!(runner.run(&ok).is_ok());
        assert!(matches!(
            runner.run(&bad),
            Err(TaskExecutionError::Exited { code: 1, .. })
        ));
        assert_eq!(runner.calls(), ["installation-1", "installation-2"]);
    }

    #[test]
    fn boxed_runner_delegates() {
        let mut runner: Box<dyn TaskRunner> = Box::new(
            ScriptedRunner::new().failing_with("x", TaskExecutionError::TimedOut { seconds: 1 }),
        );
        let task = Task::new("x", "x", "sleep 5", "");
        assert_eq!(
            runner.run(&task),
            Err(TaskExecutionError::TimedOut { seconds: 1 })
        );
    }

    #[test]
    fn auto_confirm_accepts() {
        assert!(AutoConfirm.confirm("Apply?").unwrap());
    }
}
