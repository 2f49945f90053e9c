//! Service targets and candidate URLs

use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// One network path by which a service might be reachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CandidateSpec", into = "CandidateSpec")]
pub struct CandidateUrl {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    /// Rewrite redirects to keep this host and port
    pub ignore_redirects: bool,
}

impl CandidateUrl {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            ignore_redirects: false,
        }
    }

    /// Parse `scheme://host[:port]`; any path is dropped
    pub fn parse(s: &str) -> Result<Self, ProbeError> {
        let url = Url::parse(s).map_err(|e| ProbeError::invalid_url(s, e))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProbeError::invalid_url(s, "missing host"))?;
        Ok(Self::new(url.scheme(), host, url.port()))
    }

    pub fn ignoring_redirects(mut self, ignore: bool) -> Self {
        self.ignore_redirects = ignore;
        self
    }

    /// `scheme://host[:port]`
    pub fn base(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{port}", self.scheme, self.host),
            None => format!("{}://{}", self.scheme, self.host),
        }
    }

    /// Absolute URL for `path` on this candidate
    pub fn url_for(&self, path: &str) -> Result<Url, ProbeError> {
        let raw = if path.starts_with('/') {
            format!("{}{path}", self.base())
        } else {
            format!("{}/{path}", self.base())
        };
        Url::parse(&raw).map_err(|e| ProbeError::invalid_url(raw.clone(), e))
    }
}

impl fmt::Display for CandidateUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base())?;
        if self.ignore_redirects {
            f.write_str(" (ignore redirects)")?;
        }
        Ok(())
    }
}

/// Config form: `{ url = "http://wordpress", ignore_redirects = true }`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CandidateSpec {
    url: String,
    #[serde(default)]
    ignore_redirects: bool,
}

impl TryFrom<CandidateSpec> for CandidateUrl {
    type Error = ProbeError;

    fn try_from(spec: CandidateSpec) -> Result<Self, Self::Error> {
        Ok(Self::parse(&spec.url)?.ignoring_redirects(spec.ignore_redirects))
    }
}

impl From<CandidateUrl> for CandidateSpec {
    fn from(c: CandidateUrl) -> Self {
        Self {
            url: c.base(),
            ignore_redirects: c.ignore_redirects,
        }
    }
}

/// Path and body markers of an additional page checked after the primary one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryCheck {
    pub path: String,
    #[serde(default)]
    pub markers: Vec<String>,
}

/// A logical service and how to recognise it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub name: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Body substrings; any one identifies the service. Empty accepts any body.
    #[serde(default)]
    pub markers: Vec<String>,
    /// Candidates in priority order
    #[serde(default)]
    pub candidates: Vec<CandidateUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<SecondaryCheck>,
}

fn default_path() -> String {
    "/".to_string()
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: default_path(),
            markers: Vec::new(),
            candidates: Vec::new(),
            secondary: None,
        }
    }

    /// WordPress: external port first, then service name, container IP and alias
    pub fn wordpress() -> Self {
        Self {
            name: "wordpress".to_string(),
            path: default_path(),
            markers: strings(&["wp-content", "wp-includes", "wp-admin"]),
            candidates: vec![
                CandidateUrl::new("http", "localhost", Some(8082)),
                CandidateUrl::new("http", "pfusa_rebuilt_wordpress", None),
                CandidateUrl::new("http", "172.20.0.3", None),
                CandidateUrl::new("http", "wordpress", None),
            ],
            secondary: Some(SecondaryCheck {
                path: "/wp-admin/".to_string(),
                markers: strings(&["loginform", "user_login", "wp-login"]),
            }),
        }
    }

    /// Whether `body` belongs to this service
    pub fn matches(&self, body: &str) -> bool {
        matches_any(&self.markers, body)
    }
}

pub(crate) fn matches_any(markers: &[String], body: &str) -> bool {
    markers.is_empty() || markers.iter().any(|m| body.contains(m.as_str()))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
