//! Container network host mapping
//!
//! Maps hostnames that are only meaningful from some vantage point (Docker
//! service names, `localhost` under WSL) to addresses reachable from here.

use serde::{Deserialize, Serialize};
use stackenv::{Environment, EnvironmentKind};
use std::collections::BTreeMap;
use url::Url;

/// What to do with a mapped host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostAction {
    /// Replace the host (and the port, if given)
    Remap { host: String, port: Option<u16> },
    /// Leave the URL untouched
    KeepAsIs,
}

/// One host-mapping entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRule {
    pub action: HostAction,
    /// Redirects from this host point at unreachable addresses; keep the
    /// host and port and only take the redirect's path
    pub ignore_redirects: bool,
}

impl HostRule {
    pub fn remap(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            action: HostAction::Remap {
                host: host.into(),
                port,
            },
            ignore_redirects: false,
        }
    }

    pub fn keep() -> Self {
        Self {
            action: HostAction::KeepAsIs,
            ignore_redirects: false,
        }
    }

    pub fn ignoring_redirects(mut self) -> Self {
        self.ignore_redirects = true;
        self
    }
}

/// A URL after host mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub url: Url,
    /// Redirect rewriting applies to this URL
    pub ignore_redirects: bool,
}

/// Host name -> mapping rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostMap {
    rules: BTreeMap<String, HostRule>,
}

impl HostMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default container network mapping
    pub fn builtin() -> Self {
        let mut map = Self::new();
        map.insert(
            "pfusa_rebuilt_wordpress",
            HostRule::remap("172.20.0.3", Some(80)).ignoring_redirects(),
        );
        map.insert("wordpress", HostRule::remap("172.20.0.3", Some(80)).ignoring_redirects());
        map.insert("172.20.0.3", HostRule::keep().ignoring_redirects());
        map.insert("host.docker.internal", HostRule::keep());
        map.insert("localhost", HostRule::keep());
        map
    }

    /// Overlay the loopback rewrites needed in `env`
    ///
    /// Under WSL, `localhost` and `127.0.0.1` become the Windows host;
    /// in a container, `localhost` becomes `host.docker.internal`.
    pub fn for_environment(mut self, env: &Environment) -> Self {
        let Some(replacement) = env.loopback_replacement() else {
            return self;
        };
        let replacement = replacement.to_string();

        self.insert("localhost", HostRule::remap(replacement.clone(), None));
        if env.kind == EnvironmentKind::Wsl {
            self.insert("127.0.0.1", HostRule::remap(replacement, None));
        }
        self
    }

    pub fn insert(&mut self, host: impl Into<String>, rule: HostRule) {
        self.rules.insert(host.into().to_ascii_lowercase(), rule);
    }

    pub fn get(&self, host: &str) -> Option<&HostRule> {
        self.rules.get(&host.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HostRule)> {
        self.rules.iter()
    }

    /// Whether redirects from `host` should be rewritten instead of followed
    pub fn ignores_redirects(&self, host: &str) -> bool {
        self.get(host).is_some_and(|r| r.ignore_redirects)
    }

    /// Apply the mapping to `url`
    ///
    /// Scheme, path and query are always kept. The result ignores redirects
    /// if either the original or the mapped host is flagged.
    pub fn normalize(&self, url: &Url) -> Normalized {
        let Some(host) = url.host_str() else {
            return Normalized {
                url: url.clone(),
                ignore_redirects: false,
            };
        };

        let mut ignore_redirects = self.ignores_redirects(host);
        let mut mapped = url.clone();

        if let Some(HostRule {
            action: HostAction::Remap { host: to, port },
            ..
        }) = self.get(host)
        {
            match remap(url, to, *port) {
                Some(remapped) => {
                    log::info!("Mapped URL {url} to container network URL {remapped}");
                    ignore_redirects |= self.ignores_redirects(to);
                    mapped = remapped;
                }
                None => {
                    log::warn!("Cannot remap {url} to '{to}' (port {port:?}), keeping original");
                }
            }
        }

        Normalized {
            url: mapped,
            ignore_redirects,
        }
    }
}

/// `url` with host and port replaced, or `None` if the scheme forbids either
fn remap(url: &Url, host: &str, port: Option<u16>) -> Option<Url> {
    let mut mapped = url.clone();
    mapped.set_host(Some(host)).ok()?;
    if let Some(port) = port {
        mapped.set_port(Some(port)).ok()?;
    }
    Some(mapped)
}
