//! Plan construction
//!
//! A plan always has the five phases in fixed order. Preparation and
//! documentation hold fixed tasks; installation follows the resolved
//! dependency order; validation follows the request order; integration is
//! filled from the rule table. Content depends only on the inputs, except
//! for `created_at`.

use crate::error::PlanningError;
use crate::resolver::DependencyResolver;
use crate::rules::RuleTable;
use crate::template::{TaskTemplate, TemplateVars};
use crate::types::{Component, DeploymentPlan, Phase, PhaseName, PlanOptions, Task};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use stackenv::Environment;

/// Command templates used to synthesize tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanTemplates {
    /// Client data directory, translated for the environment before use
    pub client_dir: String,
    pub install: TaskTemplate,
    pub test: TaskTemplate,
    pub preparation: Vec<TaskTemplate>,
    pub documentation: Vec<TaskTemplate>,
}

impl Default for PlanTemplates {
    fn default() -> Self {
        Self {
            client_dir: "/opt/agency_stack/clients/${client_id}".to_string(),
            install: TaskTemplate::new(
                "Install ${component}",
                "make ${component} CLIENT_ID=${client_id}",
                "Install ${component} following containerization principles",
            ),
            test: TaskTemplate::new(
                "Test ${component}",
                "make ${component}-test CLIENT_ID=${client_id}",
                "Run the ${component} test suite",
            ),
            preparation: vec![
                TaskTemplate::new(
                    "Validate directory structure",
                    "make env-check",
                    "Ensure all required directories exist",
                ),
                TaskTemplate::new(
                    "Check prerequisites",
                    "make prereq-check",
                    "Validate Docker, Docker Compose and other requirements",
                ),
                TaskTemplate::new(
                    "Backup existing data",
                    "make backup CLIENT_ID=${client_id} BACKUP_DIR=${client_dir}/backups",
                    "Back up any existing client data",
                ),
            ],
            documentation: vec![
                TaskTemplate::new(
                    "Update component registry",
                    "make update-registry",
                    "Record newly installed components in the registry",
                ),
                TaskTemplate::new(
                    "Generate deployment report",
                    "make generate-report CLIENT_ID=${client_id}",
                    "Create a deployment report with configuration details",
                ),
            ],
        }
    }
}

impl PlanTemplates {
    /// Check every template for unknown placeholders
    pub fn validate(&self) -> Result<(), PlanningError> {
        crate::template::validate_placeholders(&self.client_dir)?;
        self.install.validate()?;
        self.test.validate()?;
        for template in self.preparation.iter().chain(&self.documentation) {
            template.validate()?;
        }
        Ok(())
    }
}

/// Builds deployment plans
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    resolver: DependencyResolver,
    environment: Environment,
    templates: PlanTemplates,
    rules: RuleTable,
}

impl PlanBuilder {
    /// Builder with default templates and the built-in rule table
    pub fn new(resolver: DependencyResolver, environment: Environment) -> Self {
        Self {
            resolver,
            environment,
            templates: PlanTemplates::default(),
            rules: RuleTable::builtin(),
        }
    }

    pub fn with_templates(mut self, templates: PlanTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Build a plan for `client_id`
    ///
    /// Fails before producing anything if the client id is empty or a
    /// requested component is unknown or duplicated.
    pub fn build(
        &self,
        client_id: &str,
        requested: &[Component],
        options: &PlanOptions,
    ) -> Result<DeploymentPlan, PlanningError> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(PlanningError::EmptyClientId);
        }

        let ordered = self.resolver.order(requested)?;
        log::debug!("Installation order for {client_id}: {}", ordered.join(", "));
        let vars = self.vars(client_id)?;

        let preparation = fixed_tasks(PhaseName::Preparation, &self.templates.preparation, &vars)?;

        let installation = per_component(
            PhaseName::Installation,
            &self.templates.install,
            &ordered,
            &vars,
        )?;

        let validation = if options.tdd_compliance {
            per_component(PhaseName::Validation, &self.templates.test, requested, &vars)?
        } else {
            Vec::new()
        };

        let integration = if options.mcp_integration {
            self.rules
                .applicable(requested, options)
                .enumerate()
                .map(|(i, rule)| rule.instantiate(task_id(PhaseName::Integration, i), &vars))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        let documentation =
            fixed_tasks(PhaseName::Documentation, &self.templates.documentation, &vars)?;

        Ok(DeploymentPlan {
            name: format!("{client_id}-deployment-plan"),
            client_id: client_id.to_string(),
            components: requested.to_vec(),
            charter_version: options.charter_version.clone(),
            tdd_compliance: options.tdd_compliance,
            phases: vec![
                Phase::new(PhaseName::Preparation, preparation),
                Phase::new(PhaseName::Installation, installation),
                Phase::new(PhaseName::Validation, validation),
                Phase::new(PhaseName::Integration, integration),
                Phase::new(PhaseName::Documentation, documentation),
            ],
            created_at: Utc::now(),
        })
    }

    fn vars(&self, client_id: &str) -> Result<TemplateVars, PlanningError> {
        let mut vars = TemplateVars::new(client_id, self.environment.host_address.clone(), "");
        vars.client_dir = vars.render(&self.templates.client_dir)?;
        Ok(vars.with_paths(self.environment.clone()))
    }
}

fn task_id(phase: PhaseName, index: usize) -> String {
    format!("{phase}-{}", index + 1)
}

fn fixed_tasks(
    phase: PhaseName,
    templates: &[TaskTemplate],
    vars: &TemplateVars,
) -> Result<Vec<Task>, PlanningError> {
    templates
        .iter()
        .enumerate()
        .map(|(i, template)| template.instantiate(task_id(phase, i), vars))
        .collect()
}

fn per_component(
    phase: PhaseName,
    template: &TaskTemplate,
    components: &[Component],
    vars: &TemplateVars,
) -> Result<Vec<Task>, PlanningError> {
    components
        .iter()
        .enumerate()
        .map(|(i, component)| {
            template.instantiate(task_id(phase, i), &vars.for_component(component))
        })
        .collect()
}
