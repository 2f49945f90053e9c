//! Access to the host facts environment detection depends on.
//!
//! Detection reads a handful of marker files and runs `docker info`.
//! [`SystemProbe`] puts those reads behind a trait so detection can be
//! exercised against a [`FakeSystem`].

use crate::error::{EnvError, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Source of host facts.
pub trait SystemProbe {
    /// Whether a file exists.
    fn file_exists(&self, path: &Path) -> bool;

    /// Read a file to a string.
    fn read_file(&self, path: &Path) -> Result<String>;

    /// Read an environment variable.
    fn env_var(&self, name: &str) -> Option<String>;

    /// Run a command and return its stdout if it exited successfully.
    fn command_stdout(&self, cmd: &str, args: &[&str]) -> Option<String>;
}

/// The real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSystem;

impl SystemProbe for LocalSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| EnvError::io(path, e))
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn command_stdout(&self, cmd: &str, args: &[&str]) -> Option<String> {
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;

        if output.status.success() {
            Some(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            None
        }
    }
}

/// In-memory host used by tests.
///
/// ```
/// use stackenv::{FakeSystem, EnvironmentKind};
///
/// let sys = FakeSystem::new().with_file("/.dockerenv", "");
/// assert_eq!(stackenv::detect_with(&sys).kind, EnvironmentKind::Container);
/// ```
#[derive(Debug, Default, Clone)]
pub struct FakeSystem {
    files: HashMap<PathBuf, String>,
    env: HashMap<String, String>,
    commands: HashMap<String, String>,
    failing: HashSet<String>,
}

impl FakeSystem {
    /// Create an empty fake host (detects as native).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file with content.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Set an environment variable.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Script the stdout of a command, keyed by program name.
    pub fn with_command(mut self, cmd: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.commands.insert(cmd.into(), stdout.into());
        self
    }

    /// Make a command exit unsuccessfully.
    pub fn with_failing_command(mut self, cmd: impl Into<String>) -> Self {
        self.failing.insert(cmd.into());
        self
    }
}

impl SystemProbe for FakeSystem {
    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| EnvError::Missing(path.to_path_buf()))
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }

    fn command_stdout(&self, cmd: &str, _args: &[&str]) -> Option<String> {
        if self.failing.contains(cmd) {
            return None;
        }
        self.commands.get(cmd).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_system_reads_scripted_files() {
        let sys = FakeSystem::new().with_file("/proc/version", "Linux 6.1");
        assert!(sys.file_exists(Path::new("/proc/version")));
        assert_eq!(sys.read_file(Path::new("/proc/version")).unwrap(), "Linux 6.1");
    }

    #[test]
    fn fake_system_missing_file_is_an_error() {
        let sys = FakeSystem::new();
        let err = sys.read_file(Path::new("/etc/resolv.conf")).unwrap_err();
        assert!(matches!(err, EnvError::Missing(_)));
    }

    #[test]
    fn fake_system_failing_command_returns_none() {
        let sys = FakeSystem::new()
            .with_command("docker", "linux")
            .with_failing_command("docker");
        assert!(sys.command_stdout("docker", &["info"]).is_none());
    }

    #[test]
    fn local_system_reports_missing_file() {
        let path = Path::new("/definitely/not/a/real/marker");
        assert!(!LocalSystem.file_exists(path));
        assert!(LocalSystem.read_file(path).is_err());
    }
}
