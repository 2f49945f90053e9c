//! Sequential plan execution with dry-run and stop-on-error semantics

use crate::context::{NoProgress, ProgressCallback, TaskRunner};
use crate::types::{
    DeploymentPlan, ExecuteOptions, ExecutionResult, FailedTask, TaskStatus,
};
use stackenv::EventSink;

/// Walks a plan phase by phase, task by task
///
/// # Type Parameters
/// * `R` - performs task side effects
/// * `S` - receives log events
/// * `P` - receives progress updates
pub struct PlanExecutor<R, S, P = NoProgress> {
    runner: R,
    sink: S,
    progress: P,
}

impl<R: TaskRunner, S: EventSink> PlanExecutor<R, S, NoProgress> {
    pub fn new(runner: R, sink: S) -> Self {
        Self {
            runner,
            sink,
            progress: NoProgress,
        }
    }
}

impl<R: TaskRunner, S: EventSink, P: ProgressCallback> PlanExecutor<R, S, P> {
    /// Replace the progress callback
    pub fn with_progress<Q: ProgressCallback>(self, progress: Q) -> PlanExecutor<R, S, Q> {
        PlanExecutor {
            runner: self.runner,
            sink: self.sink,
            progress,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (R, S, P) {
        (self.runner, self.sink, self.progress)
    }

    /// Execute every pending task of `plan` in order
    ///
    /// Tasks that are not `pending` (e.g. completed in an earlier run) are
    /// skipped. Task failures are recorded on the task and in the result;
    /// this never returns an error.
    pub fn execute(
        &mut self,
        mut plan: DeploymentPlan,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        self.sink.info(&format!("Executing deployment plan: {}", plan.name));

        let mut first_failure: Option<FailedTask> = None;
        let mut failures = 0usize;
        let mut halted = false;

        'phases: for phase in &mut plan.phases {
            self.sink
                .info(&format!("Starting phase: {} - {}", phase.name, phase.description));
            self.progress.on_phase_start(phase.name, phase.tasks.len());

            for task in &mut phase.tasks {
                if task.status != TaskStatus::Pending {
                    continue;
                }

                self.sink.info(&format!("Executing task {}: {}", task.id, task.name));
                self.progress.on_task_start(task);

                if options.dry_run {
                    self.sink.warn(&format!("[DRY RUN] Would execute: {}", task.action()));
                    task.status = TaskStatus::Simulated;
                    self.progress.on_task_complete(task);
                    continue;
                }

                task.status = TaskStatus::Running;
                match self.runner.run(task) {
                    Ok(()) => {
                        task.status = TaskStatus::Completed;
                        task.error = None;
                    }
                    Err(err) => {
                        let message = err.to_string();
                        self.sink.error(&format!("Task {} failed: {message}", task.id));
                        task.status = TaskStatus::Failed;
                        task.error = Some(message.clone());
                        failures += 1;
                        first_failure.get_or_insert_with(|| FailedTask {
                            id: task.id.clone(),
                            name: task.name.clone(),
                            error: message,
                        });
                    }
                }
                self.progress.on_task_complete(task);

                if task.status == TaskStatus::Failed && options.stop_on_error {
                    self.sink.error("Stopping deployment execution due to error");
                    halted = true;
                    break 'phases;
                }
            }

            self.sink.info(&format!("Completed phase: {}", phase.name));
            self.progress.on_phase_complete(phase.name);
        }

        let message = match (&first_failure, halted) {
            (None, _) => "Deployment plan executed successfully".to_string(),
            (Some(failed), true) => format!(
                "Deployment failed at task {} ({}): {}",
                failed.id, failed.name, failed.error
            ),
            (Some(failed), false) => format!(
                "Deployment finished with {failures} failed task(s); first failure at task {} ({}): {}",
                failed.id, failed.name, failed.error
            ),
        };

        ExecutionResult {
            success: first_failure.is_none(),
            message,
            failed_task: first_failure,
            plan,
        }
    }
}
