//! Plan request documents
//!
//! ```json
//! { "client_id": "acme", "components": ["keycloak", "traefik"],
//!   "options": { "dryRun": true, "stopOnError": false } }
//! ```

use crate::types::{Component, ExecuteOptions, PlanOptions};
use serde::{Deserialize, Serialize};

/// A request to plan (and possibly execute) a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub client_id: String,
    pub components: Vec<Component>,
    #[serde(default)]
    pub options: RequestOptions,
}

/// Optional overrides; unset fields fall back to the caller's defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_on_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tdd_compliance: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_integration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_web_service: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charter_version: Option<String>,
}

impl PlanRequest {
    pub fn new(client_id: impl Into<String>, components: Vec<Component>) -> Self {
        Self {
            client_id: client_id.into(),
            components,
            options: RequestOptions::default(),
        }
    }

    /// Parse a request from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Plan options: `base` overridden by whatever the request sets
    pub fn plan_options(&self, base: &PlanOptions) -> PlanOptions {
        let o = &self.options;
        PlanOptions {
            tdd_compliance: o.tdd_compliance.unwrap_or(base.tdd_compliance),
            mcp_integration: o.mcp_integration.unwrap_or(base.mcp_integration),
            validate_web_service: o.validate_web_service.unwrap_or(base.validate_web_service),
            charter_version: o
                .charter_version
                .clone()
                .unwrap_or_else(|| base.charter_version.clone()),
        }
    }

    /// Execute options: `base` overridden by whatever the request sets
    pub fn execute_options(&self, base: &ExecuteOptions) -> ExecuteOptions {
        ExecuteOptions {
            dry_run: self.options.dry_run.unwrap_or(base.dry_run),
            stop_on_error: self.options.stop_on_error.unwrap_or(base.stop_on_error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_request() {
        let req =
            PlanRequest::from_json(r#"{"client_id": "acme", "components": ["traefik"]}"#).unwrap();
        assert_eq!(req.client_id, "acme");
        assert_eq!(req.options, RequestOptions::default());
        assert_eq!(req.plan_options(&PlanOptions::default()), PlanOptions::default());
        assert_eq!(req.execute_options(&ExecuteOptions::default()), ExecuteOptions::default());
    }

    #[test]
    fn camel_case_options_override() {
        let req = PlanRequest::from_json(
            r#"{
                "client_id": "acme",
                "components": ["wordpress"],
                "options": {
                    "dryRun": true,
                    "stopOnError": false,
                    "tddCompliance": false,
                    "charterVersion": "2.0"
                }
            }"#,
        )
        .unwrap();

        let plan = req.plan_options(&PlanOptions::default());
        assert!(!plan.tdd_compliance);
        assert!(plan.mcp_integration);
        assert_eq!(plan.charter_version, "2.0");

        let exec = req.execute_options(&ExecuteOptions::default());
        assert!(exec.dry_run);
        assert!(!exec.stop_on_error);
    }

    #[test]
    fn missing_components_is_an_error() {
        assert!(PlanRequest::from_json(r#"{"client_id": "acme"}"#).is_err());
    }

    #[test]
    fn serializes_without_unset_options() {
        let req = PlanRequest::new("acme", vec!["traefik".into()]);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"client_id":"acme","components":["traefik"],"options":{}}"#);
    }
}
