//! # stackenv
//!
//! Host environment detection for deployment tooling.
//!
//! Deployments run in one of three contexts and each one reaches
//! "the host" differently:
//!
//! | Kind        | Marker                               | Host address             |
//! |-------------|--------------------------------------|--------------------------|
//! | `container` | `/.dockerenv` or docker/lxc cgroup   | `host.docker.internal`   |
//! | `wsl`       | `microsoft` in `/proc/version`       | nameserver from resolver |
//! | `native`    | none of the above                    | `127.0.0.1`              |
//!
//! ## Example
//!
//! ```no_run
//! let env = stackenv::detect();
//! println!("running on {} (host {})", env.kind, env.host_address);
//! println!("{}", env.translate_path("/opt/agency_stack/clients/acme"));
//! ```
//!
//! The crate also hosts [`EventSink`], the append-only log stream shared
//! by the planner, the executor and the network validator. Components take
//! a sink explicitly so tests can inject a [`MemorySink`].

pub mod environment;
pub mod error;
pub mod sink;
pub mod system;

pub use environment::{DockerProvider, Environment, EnvironmentKind, detect, detect_with};
pub use error::{EnvError, Result};
pub use sink::{EventSink, LogSink, MemorySink, NullSink};
pub use system::{FakeSystem, LocalSystem, SystemProbe};
