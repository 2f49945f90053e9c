//! Multi-candidate service validation
//!
//! Candidates are tried in order until one answers 2xx with a body that
//! identifies the service. Every attempt is recorded, and network failures
//! become data in the report instead of errors.
//!
//! Redirects are handled here, not by the HTTP client. For hosts flagged
//! `ignore_redirects` the redirect's path is kept but the current host and
//! port are reused. A URL that redirects a second time within one probe
//! call ends the chain with the response in hand and resets the tracker.

use crate::backend::{HttpBackend, HttpResponse};
use crate::error::ProbeError;
use crate::hostmap::HostMap;
use crate::target::{matches_any, CandidateUrl, SecondaryCheck, ServiceTarget};
use crate::tracker::RedirectTracker;
use regex::Regex;
use serde::{Deserialize, Serialize};
use stackenv::EventSink;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Characters of body kept in a result.
const CONTENT_SAMPLE_CHARS: usize = 200;

static TITLE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>([^<]+)</title>").ok());

/// Request settings shared by the backend and the validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub timeout: Duration,
    /// Hop limit for redirect chains that never repeat a URL
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_redirects: 10,
            user_agent: format!("stackpilot-probe/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Outcome of the secondary page check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryResult {
    pub url: String,
    pub status_code: Option<u16>,
    pub ok: bool,
    pub markers_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One attempted candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    /// URL before host mapping
    pub url: String,
    pub normalized_url: String,
    pub status_code: Option<u16>,
    /// 2xx response
    pub ok: bool,
    pub content_sample: String,
    /// 2xx response whose body carries the service's markers
    pub is_target_service: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<SecondaryResult>,
}

impl ProbeResult {
    fn failed(url: String, normalized_url: String, error: &ProbeError) -> Self {
        Self {
            url,
            normalized_url,
            status_code: None,
            ok: false,
            content_sample: String::new(),
            is_target_service: false,
            title: None,
            error: Some(error.to_string()),
            secondary: None,
        }
    }

    /// The candidate reached the service
    pub fn succeeded(&self) -> bool {
        self.ok && self.is_target_service
    }
}

/// All attempts of one probe call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub target: String,
    pub success: bool,
    pub attempts: Vec<ProbeResult>,
}

impl ValidationReport {
    /// The attempt that reached the service
    pub fn successful_attempt(&self) -> Option<&ProbeResult> {
        self.attempts.iter().find(|a| a.succeeded())
    }

    /// One line per attempt, for error messages
    pub fn failure_summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                let detail = match (&a.error, a.status_code) {
                    (Some(err), _) => err.clone(),
                    (None, Some(code)) if a.ok => format!("HTTP {code}, not {}", self.target),
                    (None, Some(code)) => format!("HTTP {code}"),
                    (None, None) => "no response".to_string(),
                };
                format!("{}: {detail}", a.url)
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Response (or error) at the end of a redirect chain
struct Fetched {
    normalized: Url,
    outcome: Result<HttpResponse, ProbeError>,
}

/// Probes service targets over an [`HttpBackend`]
pub struct ServiceValidator<B, S> {
    backend: B,
    hosts: HostMap,
    settings: ProbeSettings,
    sink: S,
}

impl<B: HttpBackend, S: EventSink> ServiceValidator<B, S> {
    pub fn new(backend: B, hosts: HostMap, settings: ProbeSettings, sink: S) -> Self {
        Self {
            backend,
            hosts,
            settings,
            sink,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn hosts(&self) -> &HostMap {
        &self.hosts
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Probe `target` over its own candidate list
    pub fn probe_target(&mut self, target: &ServiceTarget) -> ValidationReport {
        self.probe(target, &target.candidates)
    }

    /// Try `candidates` in order, stopping at the first that reaches `target`
    pub fn probe(
        &mut self,
        target: &ServiceTarget,
        candidates: &[CandidateUrl],
    ) -> ValidationReport {
        let listed: Vec<String> = candidates.iter().map(CandidateUrl::base).collect();
        self.sink.info(&format!(
            "Validating {} with candidates: {}",
            target.name,
            listed.join(", ")
        ));

        let mut tracker = RedirectTracker::new();
        let mut attempts = Vec::new();

        for candidate in candidates {
            self.sink.info(&format!("Attempting {} validation with URL: {candidate}", target.name));
            let mut result = self.attempt(target, candidate, &mut tracker);

            if result.succeeded() {
                self.sink.info(&format!(
                    "{} accessible at {}: {}",
                    target.name,
                    result.url,
                    result.title.as_deref().unwrap_or("Unknown")
                ));
                if let Some(check) = &target.secondary {
                    result.secondary = Some(self.secondary(check, candidate, &mut tracker));
                }
                attempts.push(result);
                break;
            }

            match (&result.error, result.status_code) {
                (Some(err), _) => {
                    self.sink.error(&format!("Error accessing {}: {err}", result.url));
                }
                (None, Some(code)) if result.ok => self.sink.warn(&format!(
                    "Response from {} doesn't look like {} (HTTP {code})",
                    result.url, target.name
                )),
                (None, code) => self.sink.warn(&format!(
                    "Response from {} not OK: {}",
                    result.url,
                    code.map_or_else(|| "none".to_string(), |c| c.to_string())
                )),
            }
            attempts.push(result);
        }

        let success = attempts.iter().any(ProbeResult::succeeded);
        if !success {
            self.sink
                .error(&format!("{} not accessible via any network path", target.name));
        }

        ValidationReport {
            target: target.name.clone(),
            success,
            attempts,
        }
    }

    fn attempt(
        &mut self,
        target: &ServiceTarget,
        candidate: &CandidateUrl,
        tracker: &mut RedirectTracker,
    ) -> ProbeResult {
        let url = match candidate.url_for(&target.path) {
            Ok(url) => url,
            Err(err) => {
                let raw = format!("{}{}", candidate.base(), target.path);
                return ProbeResult::failed(raw.clone(), raw, &err);
            }
        };

        let fetched = self.fetch(&url, candidate, tracker);
        match fetched.outcome {
            Ok(response) => {
                let ok = response.is_success();
                ProbeResult {
                    url: url.to_string(),
                    normalized_url: fetched.normalized.to_string(),
                    status_code: Some(response.status),
                    ok,
                    content_sample: sample(&response.body),
                    is_target_service: ok && target.matches(&response.body),
                    title: extract_title(&response.body),
                    error: None,
                    secondary: None,
                }
            }
            Err(err) => ProbeResult::failed(url.to_string(), fetched.normalized.to_string(), &err),
        }
    }

    fn secondary(
        &mut self,
        check: &SecondaryCheck,
        candidate: &CandidateUrl,
        tracker: &mut RedirectTracker,
    ) -> SecondaryResult {
        let url = match candidate.url_for(&check.path) {
            Ok(url) => url,
            Err(err) => {
                return SecondaryResult {
                    url: format!("{}{}", candidate.base(), check.path),
                    status_code: None,
                    ok: false,
                    markers_found: false,
                    error: Some(err.to_string()),
                };
            }
        };

        self.sink.info(&format!("Checking secondary path at {url}"));
        let fetched = self.fetch(&url, candidate, tracker);
        let result = match fetched.outcome {
            Ok(response) => SecondaryResult {
                url: url.to_string(),
                status_code: Some(response.status),
                ok: response.is_success(),
                markers_found: matches_any(&check.markers, &response.body),
                error: None,
            },
            Err(err) => SecondaryResult {
                url: url.to_string(),
                status_code: None,
                ok: false,
                markers_found: false,
                error: Some(err.to_string()),
            },
        };

        match &result.error {
            Some(err) => self.sink.error(&format!("Error accessing {url}: {err}")),
            None => self.sink.info(&format!(
                "Secondary path {url}: HTTP {} (markers found: {})",
                result.status_code.unwrap_or_default(),
                result.markers_found
            )),
        }
        result
    }

    /// GET `url` after host mapping, applying the redirect policy
    fn fetch(
        &mut self,
        url: &Url,
        candidate: &CandidateUrl,
        tracker: &mut RedirectTracker,
    ) -> Fetched {
        let first = self.hosts.normalize(url);
        let origin_host = first.url.host_str().map(str::to_string);
        let mut current = first.url.clone();
        let mut ignore = first.ignore_redirects || candidate.ignore_redirects;
        let mut hops = 0;

        let outcome = loop {
            self.sink.info(&format!("Making request to: {current} (normalized from {url})"));
            let response = match self.backend.get(current.as_str()) {
                Ok(response) => response,
                Err(err) => break Err(err),
            };

            let Some(location) = response.redirect_location().map(str::to_string) else {
                break Ok(response);
            };

            if !tracker.visit(&current) {
                self.sink.info(&format!("Avoiding redirect loop for {current}"));
                tracker.clear();
                break Ok(response);
            }

            if hops == self.settings.max_redirects {
                break Err(ProbeError::TooManyRedirects {
                    limit: self.settings.max_redirects,
                });
            }
            hops += 1;

            let next = match resolve_redirect(&current, &location, ignore) {
                Ok(next) => next,
                Err(err) => break Err(err),
            };
            if ignore {
                self.sink.info(&format!("Remapping redirect {location} to: {next}"));
            } else {
                self.sink.info(&format!("Following redirect to: {next}"));
            }

            let normalized = self.hosts.normalize(&next);
            let same_origin = normalized.url.host_str() == origin_host.as_deref();
            ignore = normalized.ignore_redirects || (candidate.ignore_redirects && same_origin);
            current = normalized.url;
        };

        Fetched {
            normalized: first.url,
            outcome,
        }
    }
}

/// Next URL of a redirect chain
///
/// With `keep_origin`, only the path and query of `location` are used.
fn resolve_redirect(current: &Url, location: &str, keep_origin: bool) -> Result<Url, ProbeError> {
    let target = current
        .join(location)
        .map_err(|e| ProbeError::invalid_url(location, e))?;

    if !keep_origin {
        return Ok(target);
    }

    let mut rewritten = current.clone();
    rewritten.set_path(target.path());
    rewritten.set_query(target.query());
    rewritten.set_fragment(None);
    Ok(rewritten)
}

fn sample(body: &str) -> String {
    body.chars().take(CONTENT_SAMPLE_CHARS).collect()
}

fn extract_title(body: &str) -> Option<String> {
    TITLE_RE
        .as_ref()?
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use log::Level;
    use stackenv::{Environment, MemorySink, NullSink};

    const WP_HOME: &str = "<html><head><title>Peace Festival USA</title>\
        <link rel='stylesheet' href='/wp-content/themes/x/style.css'></head></html>";
    const WP_LOGIN: &str = "<form name=\"loginform\" id=\"loginform\"><input id=\"user_login\"></form>";

    fn validator(mock: &MockBackend) -> ServiceValidator<MockBackend, MemorySink> {
        ServiceValidator::new(
            mock.clone(),
            HostMap::builtin(),
            ProbeSettings::default(),
            MemorySink::new(),
        )
    }

    fn candidates(urls: &[&str]) -> Vec<CandidateUrl> {
        urls.iter().map(|u| CandidateUrl::parse(u).unwrap()).collect()
    }

    #[test]
    fn stops_at_first_success() {
        let mock = MockBackend::new();
        mock.fail("http://u1.test/", ProbeError::Connection("refused".into()));
        mock.respond("http://u2.test/", HttpResponse::ok(WP_HOME));
        mock.respond("http://u3.test/", HttpResponse::ok(WP_HOME));

        let target = ServiceTarget {
            secondary: None,
            ..ServiceTarget::wordpress()
        };
        let report = validator(&mock).probe(
            &target,
            &candidates(&["http://u1.test", "http://u2.test", "http://u3.test"]),
        );

        assert!(report.success);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].url, "http://u1.test/");
        assert!(!report.attempts[0].ok);
        assert_eq!(report.attempts[1].url, "http://u2.test/");
        assert!(report.attempts[1].succeeded());
        assert_eq!(mock.request_count("http://u3.test/"), 0);
    }

    #[test]
    fn network_errors_are_recorded() {
        let mock = MockBackend::new();
        mock.fail("http://u1.test/", ProbeError::Timeout("10s".into()));

        let report = validator(&mock).probe(
            &ServiceTarget::wordpress(),
            &candidates(&["http://u1.test", "http://u2.test"]),
        );

        assert!(!report.success);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].error.as_deref(), Some("request timed out: 10s"));
        assert!(report.attempts[1].error.as_deref().unwrap().contains("connection refused"));
        assert!(report.failure_summary().contains("http://u1.test/: request timed out"));
    }

    #[test]
    fn non_target_body_moves_on() {
        let mock = MockBackend::new();
        mock.respond("http://localhost:8082/", HttpResponse::ok("<h1>It works!</h1>"));
        mock.respond("http://172.20.0.3/", HttpResponse::ok(WP_HOME));

        let mut v = validator(&mock);
        let report = v.probe(
            &ServiceTarget::wordpress(),
            &candidates(&["http://localhost:8082", "http://172.20.0.3"]),
        );

        assert!(report.success);
        assert!(report.attempts[0].ok);
        assert!(!report.attempts[0].is_target_service);
        assert_eq!(report.attempts[1].title.as_deref(), Some("Peace Festival USA"));
        assert!(v.sink().contains("doesn't look like wordpress"));
    }

    #[test]
    fn redirect_loop_terminates_with_last_response() {
        let mock = MockBackend::new();
        mock.respond("http://172.20.0.3/", HttpResponse::redirect("http://localhost:8082/"));

        let target = ServiceTarget {
            secondary: None,
            ..ServiceTarget::wordpress()
        };
        let mut v = validator(&mock);
        let report = v.probe(&target, &candidates(&["http://172.20.0.3"]));

        assert_eq!(mock.request_count("http://172.20.0.3/"), 2);
        assert_eq!(mock.requests().len(), 2);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].status_code, Some(302));
        assert!(!report.success);
        assert!(v.sink().contains("Avoiding redirect loop for http://172.20.0.3/"));
    }

    #[test]
    fn ignore_redirects_keeps_host_and_port() {
        let mock = MockBackend::new();
        mock.respond(
            "http://wp.test:8080/",
            HttpResponse::redirect("http://localhost:8082/home/?lang=en"),
        );
        mock.respond("http://wp.test:8080/home/?lang=en", HttpResponse::ok(WP_HOME));

        let candidate = CandidateUrl::parse("http://wp.test:8080")
            .unwrap()
            .ignoring_redirects(true);
        let target = ServiceTarget {
            secondary: None,
            ..ServiceTarget::wordpress()
        };
        let report = validator(&mock).probe(&target, &[candidate]);

        assert!(report.success);
        assert_eq!(
            mock.requests(),
            ["http://wp.test:8080/", "http://wp.test:8080/home/?lang=en"]
        );
        assert_eq!(mock.request_count("http://localhost:8082/home/?lang=en"), 0);
    }

    #[test]
    fn mapped_host_rewrites_redirects() {
        let mock = MockBackend::new();
        mock.respond("http://172.20.0.3/", HttpResponse::redirect("http://localhost:8082/wp/"));
        mock.respond("http://172.20.0.3/wp/", HttpResponse::ok(WP_HOME));

        let target = ServiceTarget {
            secondary: None,
            ..ServiceTarget::wordpress()
        };
        let report =
            validator(&mock).probe(&target, &candidates(&["http://pfusa_rebuilt_wordpress"]));

        assert!(report.success);
        assert_eq!(report.attempts[0].url, "http://pfusa_rebuilt_wordpress/");
        assert_eq!(report.attempts[0].normalized_url, "http://172.20.0.3/");
    }

    #[test]
    fn plain_redirects_are_followed_verbatim() {
        let mock = MockBackend::new();
        mock.respond("http://site.test/", HttpResponse::redirect("https://site.test/"));
        mock.respond("https://site.test/", HttpResponse::ok(WP_HOME));

        let target = ServiceTarget {
            secondary: None,
            ..ServiceTarget::wordpress()
        };
        let report = validator(&mock).probe(&target, &candidates(&["http://site.test"]));

        assert!(report.success);
        assert_eq!(mock.requests(), ["http://site.test/", "https://site.test/"]);
    }

    #[test]
    fn plain_redirect_loop_is_guarded() {
        let mock = MockBackend::new();
        mock.respond("http://a.test/", HttpResponse::redirect("http://b.test/"));
        mock.respond("http://b.test/", HttpResponse::redirect("http://a.test/"));

        let report =
            validator(&mock).probe(&ServiceTarget::new("api"), &candidates(&["http://a.test"]));

        assert!(!report.success);
        assert_eq!(mock.requests().len(), 3);
        assert_eq!(report.attempts[0].status_code, Some(302));
    }

    #[test]
    fn hop_limit_stops_long_chains() {
        let mock = MockBackend::new();
        for i in 0..5 {
            mock.respond(
                &format!("http://chain.test/{i}"),
                HttpResponse::redirect(format!("/{}", i + 1)),
            );
        }

        let settings = ProbeSettings {
            max_redirects: 2,
            ..ProbeSettings::default()
        };
        let mut v = ServiceValidator::new(mock.clone(), HostMap::new(), settings, NullSink);
        let target = ServiceTarget {
            path: "/0".into(),
            ..ServiceTarget::new("api")
        };
        let report = v.probe(&target, &candidates(&["http://chain.test"]));

        assert_eq!(mock.requests().len(), 3);
        assert_eq!(report.attempts[0].error.as_deref(), Some("too many redirects (limit 2)"));
    }

    #[test]
    fn secondary_runs_after_primary_success() {
        let mock = MockBackend::new();
        mock.respond("http://localhost:8082/", HttpResponse::ok(WP_HOME));
        mock.respond("http://localhost:8082/wp-admin/", HttpResponse::redirect("/wp-login.php"));
        mock.respond("http://localhost:8082/wp-login.php", HttpResponse::ok(WP_LOGIN));

        let report = validator(&mock)
            .probe(&ServiceTarget::wordpress(), &candidates(&["http://localhost:8082"]));

        let secondary = report.attempts[0].secondary.as_ref().unwrap();
        assert!(secondary.ok);
        assert!(secondary.markers_found);
        assert_eq!(secondary.url, "http://localhost:8082/wp-admin/");
    }

    #[test]
    fn secondary_skipped_for_failed_candidates() {
        let mock = MockBackend::new();
        mock.respond("http://localhost:8082/", HttpResponse::new(502, "Bad Gateway"));

        let report = validator(&mock)
            .probe(&ServiceTarget::wordpress(), &candidates(&["http://localhost:8082"]));

        assert!(report.attempts[0].secondary.is_none());
        assert_eq!(mock.request_count("http://localhost:8082/wp-admin/"), 0);
    }

    #[test]
    fn secondary_failure_does_not_fail_probe() {
        let mock = MockBackend::new();
        mock.respond("http://localhost:8082/", HttpResponse::ok(WP_HOME));

        let report = validator(&mock)
            .probe(&ServiceTarget::wordpress(), &candidates(&["http://localhost:8082"]));

        assert!(report.success);
        let secondary = report.attempts[0].secondary.as_ref().unwrap();
        assert!(!secondary.ok);
        assert!(secondary.error.is_some());
    }

    #[test]
    fn wsl_candidates_use_windows_host() {
        let mock = MockBackend::new();
        mock.respond("http://172.28.16.1:8082/", HttpResponse::ok(WP_HOME));

        let env = Environment::wsl("172.28.16.1", stackenv::DockerProvider::Windows);
        let mut v = ServiceValidator::new(
            mock.clone(),
            HostMap::builtin().for_environment(&env),
            ProbeSettings::default(),
            NullSink,
        );
        let target = ServiceTarget {
            secondary: None,
            ..ServiceTarget::wordpress()
        };
        let report = v.probe_target(&target);

        assert!(report.success);
        assert_eq!(report.attempts[0].url, "http://localhost:8082/");
        assert_eq!(report.attempts[0].normalized_url, "http://172.28.16.1:8082/");
    }

    #[test]
    fn failure_is_logged_as_error() {
        let mock = MockBackend::new();
        let mut v = validator(&mock);
        v.probe(&ServiceTarget::wordpress(), &candidates(&["http://u1.test"]));
        assert!(
            v.sink()
                .at_level(Level::Error)
                .contains(&"wordpress not accessible via any network path")
        );
    }

    #[test]
    fn report_json_is_camel_case() {
        let report = ValidationReport {
            target: "wordpress".into(),
            success: false,
            attempts: vec![ProbeResult::failed(
                "http://u1.test/".into(),
                "http://u1.test/".into(),
                &ProbeError::Connection("refused".into()),
            )],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["attempts"][0]["normalizedUrl"], "http://u1.test/");
        assert_eq!(value["attempts"][0]["isTargetService"], false);
        assert!(value["attempts"][0]["statusCode"].is_null());
    }

    #[test]
    fn title_and_sample() {
        assert_eq!(extract_title("<TITLE> Home </TITLE>").as_deref(), Some("Home"));
        assert_eq!(extract_title("<p>none</p>"), None);
        let long = "é".repeat(300);
        assert_eq!(sample(&long).chars().count(), CONTENT_SAMPLE_CHARS);
    }
}
