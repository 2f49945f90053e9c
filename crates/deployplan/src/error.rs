//! Error types for planning and task execution.
//!
//! Planning errors abort plan construction before anything runs. Task
//! execution errors never escape the executor: they are recorded on the
//! failing task and summarised in the execution result.

use std::fmt;

/// Categories of errors, for user-facing hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request or the static configuration is wrong.
    Configuration,
    /// A task command could not start or exited unsuccessfully.
    Command,
    /// A task command exceeded its wall-clock limit.
    Timeout,
    /// A service validation task found no working network path.
    Validation,
}

impl ErrorCategory {
    /// Whether re-running the failed task as-is may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Validation)
    }

    /// Actionable advice for this category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Configuration => "Check the component names and the dependency map in the config file",
            Self::Command => "Inspect the task command output with -vv and fix the failing target",
            Self::Timeout => "Raise [execution] timeout_secs or check for a hung command",
            Self::Validation => "Run `stackpilot probe <service>` to see which network path is broken",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "Configuration error",
            Self::Command => "Command failed",
            Self::Timeout => "Timed out",
            Self::Validation => "Validation failed",
        };
        f.write_str(s)
    }
}

/// Errors that abort plan construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanningError {
    /// A requested component is not in the dependency map.
    #[error("unknown component '{0}' (not in the dependency map)")]
    UnknownComponent(String),

    /// The same component was requested twice.
    #[error("component '{0}' requested more than once")]
    DuplicateComponent(String),

    /// The dependency map references a component it does not define.
    #[error("'{component}' depends on '{dependency}', which is not in the dependency map")]
    MissingDependency {
        /// Component declaring the dependency.
        component: String,
        /// Undefined dependency.
        dependency: String,
    },

    /// The dependency map contains a cycle.
    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// The client id is empty.
    #[error("client id must not be empty")]
    EmptyClientId,

    /// A template references a variable that does not exist.
    #[error("template '{template}' uses unknown placeholder '${{{name}}}'")]
    UnknownPlaceholder {
        /// The offending template.
        template: String,
        /// Placeholder name.
        name: String,
    },
}

impl PlanningError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Why a single task failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskExecutionError {
    /// The command could not be started.
    #[error("failed to start command: {0}")]
    Spawn(String),

    /// The command exited with a non-zero status.
    #[error("command exited with status {code}: {stderr}")]
    Exited {
        /// Exit status.
        code: i32,
        /// Trimmed standard error.
        stderr: String,
    },

    /// The command was terminated by a signal.
    #[error("command terminated by signal: {stderr}")]
    Killed {
        /// Trimmed standard error.
        stderr: String,
    },

    /// The command ran past its wall-clock limit and was killed.
    #[error("command timed out after {seconds}s")]
    TimedOut {
        /// Limit that was exceeded.
        seconds: u64,
    },

    /// A service validation task did not reach the target service.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

impl TaskExecutionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Spawn(_) | Self::Exited { .. } | Self::Killed { .. } => ErrorCategory::Command,
            Self::TimedOut { .. } => ErrorCategory::Timeout,
            Self::ValidationFailed(_) => ErrorCategory::Validation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}
