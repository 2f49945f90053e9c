//! # netprobe
//!
//! Validates that a just-deployed web service is reachable, trying several
//! network paths (published port, Docker service name, container IP,
//! service alias) in priority order.
//!
//! - Candidate URLs are rewritten through a [`HostMap`] that knows which
//!   hostnames only resolve inside the container network, and which
//!   loopback addresses must cross the WSL/Windows boundary.
//! - Redirects are never followed by the HTTP client. The validator follows
//!   them itself, with a per-probe [`RedirectTracker`] that breaks loops.
//! - Every attempt ends up in the [`ValidationReport`]; no network error
//!   escapes [`ServiceValidator::probe`].
//!
//! ## Example
//!
//! ```
//! use netprobe::{HostMap, ProbeSettings, ServiceTarget, ServiceValidator};
//! use netprobe::backend::{HttpResponse, MockBackend};
//! use stackenv::{Environment, NullSink};
//!
//! let mock = MockBackend::new();
//! mock.respond("http://172.20.0.3/", HttpResponse::ok("<script src='/wp-includes/js/x.js'>"));
//!
//! let hosts = HostMap::builtin().for_environment(&Environment::native());
//! let mut validator = ServiceValidator::new(mock, hosts, ProbeSettings::default(), NullSink);
//! let target = ServiceTarget { secondary: None, ..ServiceTarget::wordpress() };
//!
//! let report = validator.probe_target(&target);
//! assert!(report.success);
//! // localhost:8082 refused, pfusa_rebuilt_wordpress -> 172.20.0.3 answered
//! assert_eq!(report.attempts.len(), 2);
//! ```

pub mod backend;
pub mod diagnose;
pub mod error;
pub mod hostmap;
pub mod target;
pub mod tracker;
pub mod validator;

pub use backend::agent::UreqBackend;
pub use backend::{HttpBackend, HttpResponse, MockBackend};
pub use diagnose::{diagnose, Diagnostics, DnsResolution};
pub use error::{ErrorCategory, ProbeError};
pub use hostmap::{HostAction, HostMap, HostRule, Normalized};
pub use target::{CandidateUrl, SecondaryCheck, ServiceTarget};
pub use tracker::RedirectTracker;
pub use validator::{
    ProbeResult, ProbeSettings, SecondaryResult, ServiceValidator, ValidationReport,
};
