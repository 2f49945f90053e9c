//! Task runner used by `apply`: shell commands and service probes

use deployplan::{Task, TaskExecutionError, TaskRunner};
use netprobe::{HttpBackend, ServiceTarget, ServiceValidator};
use stackenv::EventSink;
use std::collections::HashMap;
use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to keep reading output after the shell exited. Background
/// processes it started may hold the pipes open indefinitely.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// Runs task commands with `sh -c`, and probe tasks through a validator
pub struct ShellRunner<B, S> {
    timeout: Duration,
    workdir: Option<PathBuf>,
    validator: ServiceValidator<B, S>,
    services: HashMap<String, ServiceTarget>,
}

impl<B: HttpBackend, S: EventSink> ShellRunner<B, S> {
    pub fn new(validator: ServiceValidator<B, S>, services: Vec<ServiceTarget>) -> Self {
        Self {
            timeout: Duration::from_secs(600),
            workdir: None,
            validator,
            services: services.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workdir(mut self, workdir: Option<PathBuf>) -> Self {
        self.workdir = workdir;
        self
    }

    fn validate(&mut self, service: &str) -> Result<(), TaskExecutionError> {
        let target = self.services.get(service).ok_or_else(|| {
            TaskExecutionError::ValidationFailed(format!("unknown service '{service}'"))
        })?;

        let report = self.validator.probe_target(target);
        if report.success {
            Ok(())
        } else {
            Err(TaskExecutionError::ValidationFailed(report.failure_summary()))
        }
    }

    fn run_shell(&self, command: &str) -> Result<(), TaskExecutionError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        // own process group, so a timeout takes down everything the task started
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| TaskExecutionError::Spawn(format!("{command}: {e}")))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = match wait_until(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                return Err(TaskExecutionError::TimedOut {
                    seconds: self.timeout.as_secs(),
                });
            }
            Err(e) => return Err(TaskExecutionError::Spawn(format!("{command}: {e}"))),
        };

        let output_deadline = Instant::now() + OUTPUT_GRACE;
        let stdout = collect(stdout, output_deadline);
        let stderr = collect(stderr, output_deadline);
        if stdout.is_none() || stderr.is_none() {
            log::debug!("`{command}` left a background process holding its output");
        }
        let stdout = stdout.unwrap_or_default();
        let stderr = stderr.unwrap_or_default();
        if !stdout.is_empty() {
            log::debug!("stdout of `{command}`:\n{}", stdout.trim_end());
        }
        if !stderr.is_empty() {
            log::debug!("stderr of `{command}`:\n{}", stderr.trim_end());
        }

        exit_result(status, stderr)
    }
}

impl<B: HttpBackend, S: EventSink> TaskRunner for ShellRunner<B, S> {
    fn run(&mut self, task: &Task) -> Result<(), TaskExecutionError> {
        match &task.probe {
            Some(service) => self.validate(service),
            None => self.run_shell(&task.command),
        }
    }
}

/// Poll until the child exits; `Ok(None)` means its process group was
/// killed at `deadline`
fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            kill_group(child);
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_group(child: &mut Child) {
    match libc::pid_t::try_from(child.id()) {
        // SAFETY: killpg only sends a signal; the group id is the child's
        // pid because it was spawned with process_group(0).
        Ok(pgid) => unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        },
        Err(_) => {
            let _ = child.kill();
        }
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn exit_result(status: ExitStatus, stderr: String) -> Result<(), TaskExecutionError> {
    if status.success() {
        return Ok(());
    }
    let stderr = stderr.trim().to_string();
    match status.code() {
        Some(code) => Err(TaskExecutionError::Exited { code, stderr }),
        None => Err(TaskExecutionError::Killed { stderr }),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// Output of a drained pipe, or `None` if it is still open at `deadline`
fn collect(rx: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    match rx {
        Some(rx) => rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .ok(),
        None => Some(String::new()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use netprobe::{CandidateUrl, HostMap, HttpResponse, MockBackend, ProbeSettings};
    use stackenv::NullSink;

    fn runner(mock: MockBackend) -> ShellRunner<MockBackend, NullSink> {
        let validator =
            ServiceValidator::new(mock, HostMap::new(), ProbeSettings::default(), NullSink);
        let mut api = ServiceTarget::new("api");
        api.markers = vec!["healthy".to_string()];
        api.candidates = vec![CandidateUrl::new("http", "api.internal", None)];
        ShellRunner::new(validator, vec![api])
    }

    fn shell_task(command: &str) -> Task {
        Task::new("installation-1", "Run", command, "")
    }

    #[test]
    fn successful_command() {
        let mut r = runner(MockBackend::new());
        assert!(r.run(&shell_task("true")).is_ok());
    }

    #[test]
    fn exit_code_and_stderr_are_captured() {
        let mut r = runner(MockBackend::new());
        let err = r.run(&shell_task("echo boom >&2; exit 3")).unwrap_err();
        assert_eq!(
            err,
            TaskExecutionError::Exited {
                code: 3,
                stderr: "boom".to_string()
            }
        );
    }

    #[test]
    fn slow_command_times_out() {
        let mut r = runner(MockBackend::new()).with_timeout(Duration::from_millis(300));
        let started = Instant::now();
        let err = r.run(&shell_task("sleep 5")).unwrap_err();
        assert!(matches!(err, TaskExecutionError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn timeout_stops_the_whole_task() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut r = runner(MockBackend::new())
            .with_timeout(Duration::from_millis(300))
            .with_workdir(Some(dir.path().to_path_buf()));

        let err = r.run(&shell_task("(sleep 1; touch late) & sleep 5")).unwrap_err();
        assert!(matches!(err, TaskExecutionError::TimedOut { .. }));

        thread::sleep(Duration::from_millis(1500));
        assert!(!dir.path().join("late").exists());
    }

    #[test]
    fn background_process_does_not_hold_the_runner() {
        let mut r = runner(MockBackend::new()).with_timeout(Duration::from_millis(300));
        let started = Instant::now();
        assert!(r.run(&shell_task("sleep 4 & exit 0")).is_ok());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn background_process_with_long_timeout_returns_promptly() {
        let mut r = runner(MockBackend::new());
        let started = Instant::now();
        let err = r.run(&shell_task("sleep 4 & echo done >&2; exit 2")).unwrap_err();
        assert!(matches!(err, TaskExecutionError::Exited { code: 2, .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn runs_in_workdir() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut r = runner(MockBackend::new()).with_workdir(Some(dir.path().to_path_buf()));
        r.run(&shell_task("touch marker")).unwrap();
        assert!(dir.path().join("marker").exists());
    }

    #[test]
    fn probe_task_uses_validator() {
        let mock = MockBackend::new();
        mock.respond("http://api.internal/", HttpResponse::ok("healthy"));
        let mut r = runner(mock.clone());

        let task = Task::new("integration-1", "Check api", "", "").with_probe("api");
        assert!(r.run(&task).is_ok());
        assert_eq!(mock.request_count("http://api.internal/"), 1);
    }

    #[test]
    fn failed_probe_is_validation_error() {
        let mut r = runner(MockBackend::new());
        let task = Task::new("integration-1", "Check api", "", "").with_probe("api");
        let err = r.run(&task).unwrap_err();
        assert!(
            matches!(err, TaskExecutionError::ValidationFailed(msg) if msg.contains("api.internal"))
        );
    }

    #[test]
    fn unknown_service_fails_without_network() {
        let mock = MockBackend::new();
        let mut r = runner(mock.clone());
        let task = Task::new("integration-1", "Check", "", "").with_probe("dashboard");
        assert!(matches!(r.run(&task), Err(TaskExecutionError::ValidationFailed(_))));
        assert!(mock.requests().is_empty());
    }
}
