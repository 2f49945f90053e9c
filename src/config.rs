//! stackpilot configuration (`~/.config/stackpilot/config.toml`)
//!
//! Every section is optional. A missing file, or a missing section, yields
//! the built-in behavior.

use anyhow::{Context, Result};
use deployplan::{
    DEFAULT_CHARTER_VERSION, DependencyMap, DependencyResolver, IntegrationRule, PlanBuilder,
    PlanOptions, PlanTemplates, RuleTable,
};
use netprobe::{CandidateUrl, HostMap, HostRule, ProbeSettings, SecondaryCheck, ServiceTarget};
use serde::{Deserialize, Serialize};
use stackenv::Environment;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub defaults: DefaultsConfig,
    /// component -> components it depends on
    pub dependencies: DependencyMap,
    pub templates: PlanTemplates,
    /// Extra integration rules, appended to the built-in table
    pub integration: Vec<IntegrationRule>,
    pub execution: ExecutionConfig,
    pub probe: ProbeConfig,
    pub services: BTreeMap<String, ServiceConfig>,
}

impl Default for StackConfig {
    fn default() -> Self {
        let wordpress = ServiceTarget::wordpress();
        Self {
            defaults: DefaultsConfig::default(),
            dependencies: DependencyMap::builtin(),
            templates: PlanTemplates::default(),
            integration: Vec::new(),
            execution: ExecutionConfig::default(),
            probe: ProbeConfig::default(),
            services: BTreeMap::from([(wordpress.name.clone(), ServiceConfig::from(wordpress))]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub charter_version: String,
    /// Components deployed when none are given on the command line
    pub components: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            charter_version: DEFAULT_CHARTER_VERSION.to_string(),
            components: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Per-task timeout for shell commands
    pub timeout_secs: u64,
    /// Working directory for shell commands (default: current directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            workdir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Additional container host mappings
    pub hosts: Vec<HostEntry>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let settings = ProbeSettings::default();
        Self {
            timeout_secs: settings.timeout.as_secs(),
            max_redirects: settings.max_redirects,
            user_agent: None,
            hosts: Vec::new(),
        }
    }
}

/// `[[probe.hosts]]` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub keep_as_is: bool,
    #[serde(default)]
    pub ignore_redirects: bool,
}

impl HostEntry {
    pub fn to_rule(&self) -> Result<HostRule> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Host mapping name cannot be empty");
        }
        let rule = match (&self.host, self.keep_as_is) {
            (_, true) => HostRule::keep(),
            (Some(host), false) if !host.trim().is_empty() => {
                HostRule::remap(host.trim(), self.port)
            }
            _ => anyhow::bail!(
                "Host mapping '{}' needs a host or keep_as_is = true",
                self.name
            ),
        };
        Ok(if self.ignore_redirects {
            rule.ignoring_redirects()
        } else {
            rule
        })
    }
}

/// `[services.<name>]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_path")]
    pub path: String,
    #[serde(default)]
    pub markers: Vec<String>,
    #[serde(default)]
    pub candidates: Vec<CandidateUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<SecondaryCheck>,
}

fn default_service_path() -> String {
    "/".to_string()
}

impl ServiceConfig {
    pub fn to_target(&self, name: &str) -> ServiceTarget {
        ServiceTarget {
            name: name.to_string(),
            path: self.path.clone(),
            markers: self.markers.clone(),
            candidates: self.candidates.clone(),
            secondary: self.secondary.clone(),
        }
    }
}

impl From<ServiceTarget> for ServiceConfig {
    fn from(target: ServiceTarget) -> Self {
        Self {
            path: target.path,
            markers: target.markers,
            candidates: target.candidates,
            secondary: target.secondary,
        }
    }
}

impl StackConfig {
    /// `~/.config/stackpilot/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("stackpilot").join("config.toml"))
    }

    /// The explicit path (tilde expanded) or the default one
    pub fn resolve_path(explicit: Option<&str>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).as_ref())),
            None => Self::default_path(),
        }
    }

    pub fn load(explicit: Option<&str>) -> Result<Self> {
        Self::load_from(&Self::resolve_path(explicit)?)
    }

    /// Load from `path`, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let resolver = self.resolver()?;

        self.templates
            .validate()
            .context("Invalid [templates]")?;

        let rules = self.rule_table();
        rules
            .validate(resolver.map())
            .context("Invalid [[integration]] rule")?;

        for service in rules.rules().iter().filter_map(|r| r.probe.as_deref()) {
            if self.service(service).is_none() {
                anyhow::bail!("Integration rule probes unknown service '{service}'");
            }
        }

        if !self.defaults.components.is_empty() {
            resolver
                .check(&self.defaults.components)
                .context("Invalid [defaults] components")?;
        }

        for entry in &self.probe.hosts {
            entry.to_rule()?;
        }

        for (name, service) in &self.services {
            if service.candidates.is_empty() {
                anyhow::bail!("Service '{name}' has no candidate URLs");
            }
        }

        if self.execution.timeout_secs == 0 {
            anyhow::bail!("[execution] timeout_secs must be positive");
        }
        if self.probe.timeout_secs == 0 {
            anyhow::bail!("[probe] timeout_secs must be positive");
        }

        Ok(())
    }

    pub fn resolver(&self) -> Result<DependencyResolver> {
        DependencyResolver::new(self.dependencies.clone()).context("Invalid [dependencies]")
    }

    /// Built-in rules whose components are all known, then the configured ones
    pub fn rule_table(&self) -> RuleTable {
        let mut rules: RuleTable = RuleTable::builtin()
            .rules()
            .iter()
            .filter(|rule| rule.required.iter().all(|c| self.dependencies.contains(c)))
            .cloned()
            .collect();
        rules.extend(self.integration.iter().cloned());
        rules
    }

    pub fn plan_builder(&self, env: Environment) -> Result<PlanBuilder> {
        Ok(PlanBuilder::new(self.resolver()?, env)
            .with_templates(self.templates.clone())
            .with_rules(self.rule_table()))
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            charter_version: self.defaults.charter_version.clone(),
            ..PlanOptions::default()
        }
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        let defaults = ProbeSettings::default();
        ProbeSettings {
            timeout: Duration::from_secs(self.probe.timeout_secs),
            max_redirects: self.probe.max_redirects,
            user_agent: self.probe.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    /// Built-in mappings, configured overrides, then the environment's
    /// loopback rewrite
    pub fn host_map(&self, env: &Environment) -> Result<HostMap> {
        let mut hosts = HostMap::builtin();
        for entry in &self.probe.hosts {
            hosts.insert(entry.name.clone(), entry.to_rule()?);
        }
        Ok(hosts.for_environment(env))
    }

    /// Configured target, or the built-in one of that name
    pub fn service(&self, name: &str) -> Option<ServiceTarget> {
        match self.services.get(name) {
            Some(service) => Some(service.to_target(name)),
            None if name == "wordpress" => Some(ServiceTarget::wordpress()),
            None => None,
        }
    }

    /// Every known service target
    pub fn services(&self) -> Vec<ServiceTarget> {
        let mut targets: Vec<ServiceTarget> =
            self.services.iter().map(|(name, s)| s.to_target(name)).collect();
        if !self.services.contains_key("wordpress") {
            targets.push(ServiceTarget::wordpress());
        }
        targets
    }
}
