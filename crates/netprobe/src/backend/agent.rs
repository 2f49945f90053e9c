//! Network backend built on a `ureq` agent.

use crate::backend::{HttpBackend, HttpResponse};
use crate::error::{ProbeError, Result};
use crate::validator::ProbeSettings;
use std::time::Duration;

/// Largest body the validator will read (pages are only sniffed for markers).
const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

/// Blocking HTTP backend.
///
/// Redirects are never followed by the agent and non-2xx statuses are
/// returned as responses; the validator owns both policies.
pub struct UreqBackend {
    agent: ureq::Agent,
    user_agent: String,
    timeout: Duration,
}

impl UreqBackend {
    #[must_use]
    pub fn new(settings: &ProbeSettings) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(settings.timeout))
            .max_redirects(0)
            .max_redirects_will_error(false)
            .http_status_as_error(false)
            .build();

        Self {
            agent: config.into(),
            user_agent: settings.user_agent.clone(),
            timeout: settings.timeout,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for UreqBackend {
    fn default() -> Self {
        Self::new(&ProbeSettings::default())
    }
}

impl HttpBackend for UreqBackend {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Connection", "close")
            .call()
            .map_err(|e| match ProbeError::from(e) {
                ProbeError::InvalidUrl { message, .. } => ProbeError::invalid_url(url, message),
                other => other,
            })?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .lossy_utf8(true)
            .read_to_string()
            .map_err(|e| ProbeError::Body(e.to_string()))?;

        Ok(HttpResponse {
            status,
            location,
            body,
        })
    }
}
