//! # deployplan
//!
//! Dependency-ordered deployment planning and sequential execution.
//!
//! ## Core Concepts
//!
//! - **DependencyMap**: static map of component -> components that must install first
//! - **DependencyResolver**: orders a requested component set so dependencies come first
//! - **DeploymentPlan**: five fixed phases (`preparation`, `installation`,
//!   `validation`, `integration`, `documentation`) holding [`Task`]s
//! - **PlanBuilder**: turns `(client_id, components, options)` into a plan
//! - **RuleTable**: `(required components, task template)` entries that fill
//!   the integration phase
//! - **PlanExecutor**: walks the plan task by task with dry-run and
//!   stop-on-error semantics
//!
//! ## Example
//!
//! ```
//! use deployplan::{
//!     DependencyMap, DependencyResolver, ExecuteOptions, PlanBuilder, PlanExecutor,
//!     PlanOptions, ScriptedRunner,
//! };
//! use stackenv::{Environment, NullSink};
//!
//! let map = DependencyMap::new()
//!     .with("traefik", &[])
//!     .with("keycloak", &["traefik"]);
//! let resolver = DependencyResolver::new(map)?;
//! let builder = PlanBuilder::new(resolver, Environment::native());
//!
//! let requested = vec!["keycloak".to_string(), "traefik".to_string()];
//! let plan = builder.build("acme", &requested, &PlanOptions::default())?;
//!
//! let mut executor = PlanExecutor::new(ScriptedRunner::new(), NullSink);
//! let result = executor.execute(plan, &ExecuteOptions::dry_run());
//! assert!(result.success);
//! # Ok::<(), deployplan::PlanningError>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`TaskRunner`]: performs a task's side effect (shell, probe, fake)
//! - [`ProgressCallback`]: receives phase/task progress
//! - [`ConfirmCallback`]: asks before a real run
//! - [`stackenv::EventSink`]: receives log events

pub mod context;
pub mod error;
pub mod executor;
pub mod planner;
pub mod request;
pub mod resolver;
pub mod rules;
pub mod template;
pub mod types;

pub use context::{
    AutoConfirm, ConfirmCallback, NoProgress, ProgressCallback, ScriptedRunner, TaskRunner,
};
pub use error::{ErrorCategory, PlanningError, TaskExecutionError};
pub use executor::PlanExecutor;
pub use planner::{PlanBuilder, PlanTemplates};
pub use request::{PlanRequest, RequestOptions};
pub use resolver::{DependencyMap, DependencyResolver};
pub use rules::{IntegrationRule, RuleKind, RuleTable};
pub use template::{TaskTemplate, TemplateVars};
pub use types::{
    Component, DEFAULT_CHARTER_VERSION, DeploymentPlan, ExecuteOptions, ExecutionResult,
    FailedTask, Phase, PhaseName, PlanOptions, StatusSummary, Task, TaskStatus,
};
