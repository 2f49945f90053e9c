//! Network diagnostics for a single URL.

use crate::error::ProbeError;
use crate::hostmap::HostMap;
use serde::{Deserialize, Serialize};
use stackenv::Environment;
use std::net::ToSocketAddrs;
use url::Url;

/// Outcome of resolving the mapped host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsResolution {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the probe would see for a URL from this environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub url: String,
    pub normalized_url: String,
    pub environment: Environment,
    pub ignore_redirects: bool,
    pub dns_resolution: DnsResolution,
}

/// Map `url` for `env` and resolve its host.
///
/// Only a malformed URL is an error; resolution failures are reported in
/// [`Diagnostics::dns_resolution`].
pub fn diagnose(url: &str, env: &Environment, hosts: &HostMap) -> Result<Diagnostics, ProbeError> {
    let parsed = Url::parse(url).map_err(|e| ProbeError::invalid_url(url, e))?;
    let normalized = hosts.normalize(&parsed);

    let host = normalized
        .url
        .host_str()
        .ok_or_else(|| ProbeError::invalid_url(url, "missing host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = normalized.url.port_or_known_default().unwrap_or(80);

    Ok(Diagnostics {
        url: parsed.to_string(),
        normalized_url: normalized.url.to_string(),
        environment: env.clone(),
        ignore_redirects: normalized.ignore_redirects,
        dns_resolution: resolve(&host, port),
    })
}

fn resolve(host: &str, port: u16) -> DnsResolution {
    match (host, port).to_socket_addrs() {
        Ok(addrs) => {
            let mut addresses: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
            addresses.dedup();
            DnsResolution {
                success: !addresses.is_empty(),
                addresses,
                error: None,
            }
        }
        Err(err) => DnsResolution {
            success: false,
            addresses: Vec::new(),
            error: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_literal_resolves_without_dns() {
        let d = diagnose("http://172.20.0.3/wp-admin/", &Environment::native(), &HostMap::builtin())
            .unwrap();
        assert!(d.dns_resolution.success);
        assert_eq!(d.dns_resolution.addresses, ["172.20.0.3"]);
        assert!(d.ignore_redirects);
    }

    #[test]
    fn reports_mapped_url() {
        let d = diagnose("http://wordpress:8082/", &Environment::native(), &HostMap::builtin())
            .unwrap();
        assert_eq!(d.normalized_url, "http://172.20.0.3/");
        assert_eq!(d.dns_resolution.addresses, ["172.20.0.3"]);
    }

    #[test]
    fn malformed_url_is_an_error() {
        assert!(matches!(
            diagnose("not a url", &Environment::native(), &HostMap::builtin()),
            Err(ProbeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn ipv6_literal() {
        let d = diagnose("http://[::1]:8080/", &Environment::native(), &HostMap::new()).unwrap();
        assert_eq!(d.dns_resolution.addresses, ["::1"]);
    }
}
