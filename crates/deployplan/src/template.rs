//! `${name}` placeholder templates for task commands.

use crate::error::PlanningError;
use crate::types::Task;
use serde::{Deserialize, Serialize};
use stackenv::Environment;

/// Values substituted into task templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    pub client_id: String,
    /// Set while expanding per-component templates
    pub component: Option<String>,
    /// Address of the deployment host as seen from this environment
    pub host: String,
    /// Client working directory as a POSIX path
    pub client_dir: String,
    /// When set, `${client_dir}` and the path that follows it are rendered
    /// in this environment's native form
    pub paths: Option<Environment>,
}

impl TemplateVars {
    /// Placeholder names understood by [`TemplateVars::render`].
    pub const NAMES: [&'static str; 4] = ["client_id", "component", "host", "client_dir"];

    pub fn new(
        client_id: impl Into<String>,
        host: impl Into<String>,
        client_dir: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            component: None,
            host: host.into(),
            client_dir: client_dir.into(),
            paths: None,
        }
    }

    /// Translate rendered client paths for `env`.
    pub fn with_paths(mut self, env: Environment) -> Self {
        self.paths = Some(env);
        self
    }

    /// Copy with `component` set.
    pub fn for_component(&self, component: &str) -> Self {
        Self {
            component: Some(component.to_string()),
            ..self.clone()
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "client_id" => Some(&self.client_id),
            "component" => self.component.as_deref(),
            "host" => Some(&self.host),
            "client_dir" => Some(&self.client_dir),
            _ => None,
        }
    }

    /// Expand every `${name}` in `template`.
    ///
    /// A `$` not followed by `{`, or a `${` without a closing brace, is
    /// copied through unchanged so shell syntax such as `$HOME` survives.
    /// With [`TemplateVars::with_paths`], `${client_dir}/backups` is
    /// translated as one path, up to the next space, quote or shell operator.
    pub fn render(&self, template: &str) -> Result<String, PlanningError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };

            let name = &after[..end];
            let value = self.lookup(name).ok_or_else(|| PlanningError::UnknownPlaceholder {
                template: template.to_string(),
                name: name.to_string(),
            })?;
            rest = &after[end + 1..];

            match &self.paths {
                Some(env) if name == "client_dir" => {
                    let len = rest.find(ends_path).unwrap_or(rest.len());
                    out.push_str(&env.translate_path(&format!("{value}{}", &rest[..len])));
                    rest = &rest[len..];
                }
                _ => out.push_str(value),
            }
        }

        out.push_str(rest);
        Ok(out)
    }
}

fn ends_path(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | '$' | ';' | '&' | '|' | '`' | ')' | '<' | '>')
}

/// Check a template against the known placeholder names without rendering it.
pub fn validate_placeholders(template: &str) -> Result<(), PlanningError> {
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if !TemplateVars::NAMES.contains(&name) {
            return Err(PlanningError::UnknownPlaceholder {
                template: template.to_string(),
                name: name.to_string(),
            });
        }
        rest = &after[end + 1..];
    }
    Ok(())
}

/// Factory for one task: name, command and description templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub description: String,
}

impl TaskTemplate {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: description.into(),
        }
    }

    /// Verify that every placeholder is known.
    pub fn validate(&self) -> Result<(), PlanningError> {
        validate_placeholders(&self.name)?;
        validate_placeholders(&self.command)?;
        validate_placeholders(&self.description)
    }

    /// Render into a pending task with the given id.
    pub fn instantiate(&self, id: String, vars: &TemplateVars) -> Result<Task, PlanningError> {
        let task = Task::new(
            id,
            vars.render(&self.name)?,
            vars.render(&self.command)?,
            vars.render(&self.description)?,
        );
        Ok(match &vars.component {
            Some(component) => task.with_component(component.clone()),
            None => task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackenv::DockerProvider;

    fn vars() -> TemplateVars {
        TemplateVars::new("acme", "127.0.0.1", "/opt/agency_stack/clients/acme")
    }

    #[test]
    fn renders_all_placeholders() {
        let v = vars().for_component("wordpress");
        let out = v
            .render("make ${component} CLIENT_ID=${client_id} HOST=${host} DIR=${client_dir}")
            .unwrap();
        assert_eq!(
            out,
            "make wordpress CLIENT_ID=acme HOST=127.0.0.1 DIR=/opt/agency_stack/clients/acme"
        );
    }

    #[test]
    fn client_dir_suffix_is_translated_with_it() {
        let env = Environment::wsl("172.28.0.1", DockerProvider::Windows).with_distro("Debian");
        let v = vars().with_paths(env);

        let out = v.render(r#"tar -C "${client_dir}/data" . && echo ${client_id}"#).unwrap();
        assert_eq!(
            out,
            r#"tar -C "\\wsl$\Debian\opt\agency_stack\clients\acme\data" . && echo acme"#
        );

        let out = v.render("cp x ${client_dir}/backups/x.tgz;ls").unwrap();
        assert_eq!(
            out,
            r"cp x \\wsl$\Debian\opt\agency_stack\clients\acme\backups\x.tgz;ls"
        );
    }

    #[test]
    fn client_dir_without_paths_is_posix() {
        let out = vars().render("ls ${client_dir}/logs").unwrap();
        assert_eq!(out, "ls /opt/agency_stack/clients/acme/logs");
    }

    #[test]
    fn native_paths_are_unchanged() {
        let out = vars()
            .with_paths(Environment::native())
            .render("ls ${client_dir}/logs;true")
            .unwrap();
        assert_eq!(out, "ls /opt/agency_stack/clients/acme/logs;true");
    }

    #[test]
    fn plain_dollar_is_kept() {
        let out = vars().render("echo $HOME ${client_id} $").unwrap();
        assert_eq!(out, "echo $HOME acme $");
    }

    #[test]
    fn unterminated_placeholder_is_kept() {
        let out = vars().render("echo ${client_id} ${oops").unwrap();
        assert_eq!(out, "echo acme ${oops");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let err = vars().render("make ${target}").unwrap_err();
        assert_eq!(
            err,
            PlanningError::UnknownPlaceholder {
                template: "make ${target}".into(),
                name: "target".into(),
            }
        );
    }

    #[test]
    fn component_placeholder_requires_component() {
        assert!(vars().render("make ${component}").is_err());
    }

    #[test]
    fn validate_accepts_known_names() {
        let template = TaskTemplate::new("Install ${component}", "make ${component}", "");
        assert!(template.validate().is_ok());
        let template = TaskTemplate::new("x", "make ${nope}", "");
        assert!(template.validate().is_err());
    }

    #[test]
    fn instantiate_sets_component() {
        let template =
            TaskTemplate::new("Install ${component}", "make ${component}", "Install ${component}");
        let task = template
            .instantiate("installation-1".into(), &vars().for_component("traefik"))
            .unwrap();
        assert_eq!(task.id, "installation-1");
        assert_eq!(task.name, "Install traefik");
        assert_eq!(task.command, "make traefik");
        assert_eq!(task.component.as_deref(), Some("traefik"));
    }
}
