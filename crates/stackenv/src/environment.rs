//! Environment detection and host/path translation.
//!
//! Detection order is fixed: container marker first, then the WSL kernel
//! signature, otherwise native.

use crate::system::{LocalSystem, SystemProbe};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Docker writes this file into every container it starts.
pub const DOCKERENV_MARKER: &str = "/.dockerenv";
/// Control groups of PID 1; names the runtime inside containers.
pub const INIT_CGROUP: &str = "/proc/1/cgroup";
/// Kernel version string; carries "microsoft" under WSL.
pub const KERNEL_VERSION: &str = "/proc/version";
/// Resolver configuration; under WSL the nameserver is the Windows host.
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

const LOOPBACK_ADDRESS: &str = "127.0.0.1";
const CONTAINER_HOST_ADDRESS: &str = "host.docker.internal";
const DEFAULT_WSL_DISTRO: &str = "Ubuntu";
const CGROUP_RUNTIMES: [&str; 4] = ["docker", "lxc", "kubepods", "containerd"];

/// Where the engine is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    /// Bare-metal or VM Linux/macOS host.
    Native,
    /// Inside a container.
    Container,
    /// Windows Subsystem for Linux.
    Wsl,
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Container => write!(f, "container"),
            Self::Wsl => write!(f, "wsl"),
        }
    }
}

/// Where the Docker daemon lives relative to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DockerProvider {
    /// Same kernel as the engine.
    Native,
    /// Docker Engine running inside the WSL distribution.
    Wsl,
    /// Docker Desktop on the Windows side; volume paths must be Windows paths.
    Windows,
    /// Not determined (no docker CLI, or inside a container).
    Unknown,
}

impl fmt::Display for DockerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Wsl => write!(f, "wsl"),
            Self::Windows => write!(f, "windows"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The detected execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Execution context kind.
    pub kind: EnvironmentKind,
    /// Address at which the host (or Windows host, under WSL) is reachable.
    pub host_address: String,
    /// Docker daemon placement.
    pub docker: DockerProvider,
    /// WSL distribution name, used for `\\wsl$\<distro>` paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distro: Option<String>,
}

impl Environment {
    /// A native host.
    pub fn native() -> Self {
        Self {
            kind: EnvironmentKind::Native,
            host_address: LOOPBACK_ADDRESS.to_string(),
            docker: DockerProvider::Native,
            distro: None,
        }
    }

    /// Inside a container.
    pub fn container() -> Self {
        Self {
            kind: EnvironmentKind::Container,
            host_address: CONTAINER_HOST_ADDRESS.to_string(),
            docker: DockerProvider::Unknown,
            distro: None,
        }
    }

    /// Under WSL with the given Windows host address.
    pub fn wsl(host_address: impl Into<String>, docker: DockerProvider) -> Self {
        Self {
            kind: EnvironmentKind::Wsl,
            host_address: host_address.into(),
            docker,
            distro: None,
        }
    }

    /// Set the WSL distribution name.
    pub fn with_distro(mut self, distro: impl Into<String>) -> Self {
        self.distro = Some(distro.into());
        self
    }

    /// Whether volume-mount paths must be expressed as Windows paths.
    pub fn uses_windows_paths(&self) -> bool {
        self.kind == EnvironmentKind::Wsl && self.docker == DockerProvider::Windows
    }

    /// The address that should replace `localhost` when reaching the host.
    ///
    /// `None` on native hosts, where loopback already is the host.
    pub fn loopback_replacement(&self) -> Option<&str> {
        match self.kind {
            EnvironmentKind::Native => None,
            EnvironmentKind::Container | EnvironmentKind::Wsl => Some(&self.host_address),
        }
    }

    /// Translate a path for use in volume-mount style commands.
    ///
    /// Identity unless Docker runs on the Windows side of WSL, in which
    /// case `/mnt/c/x` becomes `C:\x` and other absolute paths become
    /// `\\wsl$\<distro>\...`.
    pub fn translate_path(&self, path: &str) -> String {
        if !self.uses_windows_paths() || !path.starts_with('/') {
            return path.to_string();
        }

        if let Some(rest) = path.strip_prefix("/mnt/") {
            let mut parts = rest.splitn(2, '/');
            let drive = parts.next().unwrap_or_default();
            if drive.len() == 1 && drive.chars().all(|c| c.is_ascii_alphabetic()) {
                let tail = parts.next().unwrap_or_default().replace('/', "\\");
                return format!("{}:\\{}", drive.to_ascii_uppercase(), tail);
            }
        }

        let distro = self.distro.as_deref().unwrap_or(DEFAULT_WSL_DISTRO);
        format!(r"\\wsl$\{}{}", distro, path.replace('/', "\\"))
    }

    /// One-line description for logs.
    pub fn describe(&self) -> String {
        match self.kind {
            EnvironmentKind::Wsl => format!(
                "wsl (windows host {}, docker {})",
                self.host_address, self.docker
            ),
            _ => format!("{} (host {})", self.kind, self.host_address),
        }
    }
}

/// Detect the environment of the current process.
pub fn detect() -> Environment {
    detect_with(&LocalSystem)
}

/// Detect the environment using the given host facts.
pub fn detect_with(sys: &dyn SystemProbe) -> Environment {
    if in_container(sys) {
        log::debug!("container marker found");
        return Environment::container();
    }

    if !is_wsl(sys) {
        log::debug!("no container marker or WSL signature, assuming native host");
        return Environment::native();
    }

    let host = windows_host_address(sys).unwrap_or_else(|| LOOPBACK_ADDRESS.to_string());
    let docker = docker_provider(sys);
    log::debug!("WSL detected: windows host {host}, docker {docker}");

    let mut env = Environment::wsl(host, docker);
    env.distro = sys.env_var("WSL_DISTRO_NAME");
    env
}

fn in_container(sys: &dyn SystemProbe) -> bool {
    if sys.file_exists(Path::new(DOCKERENV_MARKER)) {
        return true;
    }

    sys.read_file(Path::new(INIT_CGROUP))
        .map(|cgroup| CGROUP_RUNTIMES.iter().any(|rt| cgroup.contains(rt)))
        .unwrap_or(false)
}

fn is_wsl(sys: &dyn SystemProbe) -> bool {
    sys.read_file(Path::new(KERNEL_VERSION))
        .map(|version| version.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

fn windows_host_address(sys: &dyn SystemProbe) -> Option<String> {
    let resolv = sys.read_file(Path::new(RESOLV_CONF)).ok()?;
    parse_nameserver(&resolv)
}

/// First `nameserver` entry of a resolver configuration.
pub fn parse_nameserver(resolv: &str) -> Option<String> {
    resolv
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(addr)) => Some(addr.to_string()),
                _ => None,
            }
        })
}

fn docker_provider(sys: &dyn SystemProbe) -> DockerProvider {
    match sys.command_stdout("docker", &["info", "--format", "{{.OSType}}"]) {
        None => DockerProvider::Unknown,
        Some(out) if out.to_lowercase().contains("linux") => DockerProvider::Wsl,
        Some(_) => DockerProvider::Windows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::FakeSystem;

    const WSL_KERNEL: &str = "Linux version 5.15.90.1-microsoft-standard-WSL2";

    #[test]
    fn empty_host_is_native() {
        let env = detect_with(&FakeSystem::new());
        assert_eq!(env, Environment::native());
    }

    #[test]
    fn dockerenv_marker_means_container() {
        let sys = FakeSystem::new().with_file(DOCKERENV_MARKER, "");
        assert_eq!(detect_with(&sys).kind, EnvironmentKind::Container);
    }

    #[test]
    fn cgroup_runtime_means_container() {
        let sys = FakeSystem::new().with_file(INIT_CGROUP, "0::/system.slice/docker-abc.scope");
        assert_eq!(detect_with(&sys).kind, EnvironmentKind::Container);
    }

    #[test]
    fn container_marker_wins_over_wsl_signature() {
        let sys = FakeSystem::new()
            .with_file(DOCKERENV_MARKER, "")
            .with_file(KERNEL_VERSION, WSL_KERNEL);
        assert_eq!(detect_with(&sys).kind, EnvironmentKind::Container);
    }

    #[test]
    fn wsl_resolves_windows_host_from_resolver() {
        let sys = FakeSystem::new()
            .with_file(KERNEL_VERSION, WSL_KERNEL)
            .with_file(RESOLV_CONF, "# generated by WSL\nnameserver 172.29.96.1\n")
            .with_command("docker", "linux\n")
            .with_env("WSL_DISTRO_NAME", "Debian");

        let env = detect_with(&sys);
        assert_eq!(env.kind, EnvironmentKind::Wsl);
        assert_eq!(env.host_address, "172.29.96.1");
        assert_eq!(env.docker, DockerProvider::Wsl);
        assert_eq!(env.distro.as_deref(), Some("Debian"));
    }

    #[test]
    fn wsl_without_resolver_falls_back_to_loopback() {
        let sys = FakeSystem::new().with_file(KERNEL_VERSION, WSL_KERNEL);
        let env = detect_with(&sys);
        assert_eq!(env.host_address, "127.0.0.1");
        assert_eq!(env.docker, DockerProvider::Unknown);
    }

    #[test]
    fn wsl_with_windows_docker() {
        let sys = FakeSystem::new()
            .with_file(KERNEL_VERSION, WSL_KERNEL)
            .with_command("docker", "windows");
        assert_eq!(detect_with(&sys).docker, DockerProvider::Windows);
    }

    #[test]
    fn parse_nameserver_skips_comments() {
        let resolv = "# nameserver 1.1.1.1\nsearch lan\nnameserver 10.0.0.1\nnameserver 10.0.0.2";
        assert_eq!(parse_nameserver(resolv).as_deref(), Some("10.0.0.1"));
        assert_eq!(parse_nameserver("search lan"), None);
    }

    #[test]
    fn translate_path_is_identity_on_native_and_wsl_docker() {
        let path = "/opt/agency_stack/clients/acme";
        assert_eq!(Environment::native().translate_path(path), path);
        assert_eq!(
            Environment::wsl("10.0.0.1", DockerProvider::Wsl).translate_path(path),
            path
        );
    }

    #[test]
    fn translate_path_for_windows_docker() {
        let env = Environment::wsl("10.0.0.1", DockerProvider::Windows).with_distro("Ubuntu-22.04");
        assert_eq!(env.translate_path("/mnt/c/Users/dev/data"), r"C:\Users\dev\data");
        assert_eq!(env.translate_path("/mnt/d"), r"D:\");
        assert_eq!(
            env.translate_path("/opt/agency_stack/clients/acme"),
            r"\\wsl$\Ubuntu-22.04\opt\agency_stack\clients\acme"
        );
        assert_eq!(env.translate_path("relative/dir"), "relative/dir");
    }

    #[test]
    fn loopback_replacement_per_kind() {
        assert_eq!(Environment::native().loopback_replacement(), None);
        assert_eq!(
            Environment::container().loopback_replacement(),
            Some("host.docker.internal")
        );
        assert_eq!(
            Environment::wsl("172.29.96.1", DockerProvider::Wsl).loopback_replacement(),
            Some("172.29.96.1")
        );
    }
}
