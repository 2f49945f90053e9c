//! Integration rule table
//!
//! Each rule pairs a set of required components with a task template. The
//! integration phase is the ordered list of rules whose required set is a
//! subset of the requested components.

use crate::error::PlanningError;
use crate::resolver::DependencyMap;
use crate::template::{TaskTemplate, TemplateVars};
use crate::types::{Component, PlanOptions, Task};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// What kind of check a rule produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Single component liveness check (shell command)
    HealthCheck,
    /// Network probe of a web-serving component
    ServiceValidation,
    /// Check spanning two or more components
    CrossCheck,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HealthCheck => "health-check",
            Self::ServiceValidation => "service-validation",
            Self::CrossCheck => "cross-check",
        };
        f.write_str(s)
    }
}

/// `(required components, task template)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRule {
    pub required: BTreeSet<Component>,
    #[serde(flatten)]
    pub template: TaskTemplate,
    /// Service validated through the network probe instead of a shell command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,
}

impl IntegrationRule {
    pub fn new(required: &[&str], template: TaskTemplate) -> Self {
        Self {
            required: required.iter().map(|c| (*c).to_string()).collect(),
            template,
            probe: None,
        }
    }

    pub fn with_probe(mut self, service: impl Into<String>) -> Self {
        self.probe = Some(service.into());
        self
    }

    pub fn kind(&self) -> RuleKind {
        if self.probe.is_some() {
            RuleKind::ServiceValidation
        } else if self.required.len() > 1 {
            RuleKind::CrossCheck
        } else {
            RuleKind::HealthCheck
        }
    }

    /// Whether every required component was requested
    pub fn matches(&self, requested: &HashSet<&str>) -> bool {
        self.required.iter().all(|c| requested.contains(c.as_str()))
    }

    /// Whether the rule is switched on by `options`
    pub fn enabled(&self, options: &PlanOptions) -> bool {
        self.kind() != RuleKind::ServiceValidation || options.validate_web_service
    }

    /// Build the task for this rule
    ///
    /// Rules with a single required component expose it as `${component}`.
    pub fn instantiate(&self, id: String, vars: &TemplateVars) -> Result<Task, PlanningError> {
        let task = match self.single_component() {
            Some(component) => self.template.instantiate(id, &vars.for_component(component))?,
            None => self.template.instantiate(id, vars)?,
        };
        Ok(match &self.probe {
            Some(service) => task.with_probe(service.clone()),
            None => task,
        })
    }

    fn single_component(&self) -> Option<&str> {
        match self.required.len() {
            1 => self.required.iter().next().map(String::as_str),
            _ => None,
        }
    }
}

/// Ordered list of integration rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<IntegrationRule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rules shipped with stackpilot
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.push(IntegrationRule::new(
            &["mcp_server"],
            TaskTemplate::new(
                "Verify MCP server health",
                "curl -sf http://${host}:3000/health",
                "Verify MCP server is healthy and responsive",
            ),
        ));
        table.push(
            IntegrationRule::new(
                &["wordpress"],
                TaskTemplate::new(
                    "Validate wordpress reachability",
                    "stackpilot probe wordpress",
                    "Probe every wordpress network path and confirm the site answers",
                ),
            )
            .with_probe("wordpress"),
        );
        table.push(IntegrationRule::new(
            &["traefik", "keycloak"],
            TaskTemplate::new(
                "Verify traefik-keycloak integration",
                "make verify-traefik-keycloak CLIENT_ID=${client_id}",
                "Verify Traefik is properly routing to Keycloak",
            ),
        ));
        table
    }

    pub fn push(&mut self, rule: IntegrationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[IntegrationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules that apply to `requested` under `options`, in table order
    pub fn applicable<'a>(
        &'a self,
        requested: &'a [Component],
        options: &'a PlanOptions,
    ) -> impl Iterator<Item = &'a IntegrationRule> + 'a {
        let set: HashSet<&str> = requested.iter().map(String::as_str).collect();
        self.rules
            .iter()
            .filter(move |rule| rule.enabled(options) && rule.matches(&set))
    }

    /// Check templates and that required components exist in `map`
    pub fn validate(&self, map: &DependencyMap) -> Result<(), PlanningError> {
        for rule in &self.rules {
            rule.template.validate()?;
            if let Some(unknown) = rule.required.iter().find(|c| !map.contains(c)) {
                return Err(PlanningError::UnknownComponent(unknown.clone()));
            }
        }
        Ok(())
    }
}

impl Extend<IntegrationRule> for RuleTable {
    fn extend<I: IntoIterator<Item = IntegrationRule>>(&mut self, iter: I) {
        self.rules.extend(iter);
    }
}

impl FromIterator<IntegrationRule> for RuleTable {
    fn from_iter<I: IntoIterator<Item = IntegrationRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested(items: &[&str]) -> Vec<Component> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn names<'a>(rules: impl Iterator<Item = &'a IntegrationRule>) -> Vec<&'a str> {
        rules.map(|r| r.template.name.as_str()).collect()
    }

    #[test]
    fn builtin_kinds() {
        let table = RuleTable::builtin();
        let kinds: Vec<_> = table.rules().iter().map(IntegrationRule::kind).collect();
        assert_eq!(
            kinds,
            [RuleKind::HealthCheck, RuleKind::ServiceValidation, RuleKind::CrossCheck]
        );
    }

    #[test]
    fn cross_check_needs_both_components() {
        let table = RuleTable::builtin();
        let options = PlanOptions::default();

        let only_keycloak = requested(&["keycloak"]);
        assert!(names(table.applicable(&only_keycloak, &options)).is_empty());

        let both = requested(&["keycloak", "traefik"]);
        assert_eq!(
            names(table.applicable(&both, &options)),
            ["Verify traefik-keycloak integration"]
        );
    }

    #[test]
    fn rules_apply_in_table_order() {
        let table = RuleTable::builtin();
        let all = requested(&["keycloak", "wordpress", "traefik", "mcp_server"]);
        assert_eq!(
            names(table.applicable(&all, &PlanOptions::default())),
            [
                "Verify MCP server health",
                "Validate wordpress reachability",
                "Verify traefik-keycloak integration",
            ]
        );
    }

    #[test]
    fn service_validation_respects_option() {
        let table = RuleTable::builtin();
        let options = PlanOptions {
            validate_web_service: false,
            ..PlanOptions::default()
        };
        let wp = requested(&["wordpress"]);
        assert!(names(table.applicable(&wp, &options)).is_empty());
    }

    #[test]
    fn instantiate_sets_probe_and_component() {
        let table = RuleTable::builtin();
        let rule = &table.rules()[1];
        let vars = TemplateVars::new("acme", "127.0.0.1", "/srv/acme");
        let task = rule.instantiate("integration-1".into(), &vars).unwrap();
        assert_eq!(task.probe.as_deref(), Some("wordpress"));
        assert_eq!(task.component.as_deref(), Some("wordpress"));
    }

    #[test]
    fn validate_rejects_unknown_required_component() {
        let mut table = RuleTable::builtin();
        table.push(IntegrationRule::new(
            &["nextcloud"],
            TaskTemplate::new("Check nextcloud", "true", ""),
        ));
        assert_eq!(
            table.validate(&DependencyMap::builtin()),
            Err(PlanningError::UnknownComponent("nextcloud".into()))
        );
        assert!(RuleTable::builtin().validate(&DependencyMap::builtin()).is_ok());
    }

    #[test]
    fn rule_deserializes_flat() {
        let rule: IntegrationRule = serde_json::from_str(
            r#"{"required": ["wordpress"], "name": "Check wp", "probe": "wordpress"}"#,
        )
        .unwrap();
        assert_eq!(rule.kind(), RuleKind::ServiceValidation);
        assert_eq!(rule.template.command, "");
    }
}
