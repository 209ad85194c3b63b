//! Runner that launches the test command as a child process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use super::{RunOutcome, RunRequest, TestRunner};

/// Launches test commands with `tokio::process`.
///
/// The child inherits the current environment with the profile's variables
/// overlaid. Its stdout and stderr go straight to per-profile log files when
/// `logs_dir` is configured and to the null device otherwise, so the outcome
/// only ever depends on the child's exit status.
///
/// On Unix the child leads its own process group, and a timeout kills the
/// whole group rather than just the direct child.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// Kill the child and record a timeout after this long.
    timeout: Option<Duration>,
    /// Directory for captured stdout/stderr.
    logs_dir: Option<PathBuf>,
}

impl ProcessRunner {
    /// Creates a runner with no timeout and no output capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-run timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the directory captured output is written to.
    pub fn with_logs_dir(mut self, logs_dir: Option<PathBuf>) -> Self {
        self.logs_dir = logs_dir;
        self
    }

    /// Opens `<logs_dir>/<package>/<profile>.{stdout,stderr}.log` for the child.
    ///
    /// Falls back to discarding output if the files cannot be created.
    async fn output_streams(&self, request: &RunRequest) -> (Stdio, Stdio) {
        let Some(logs_dir) = &self.logs_dir else {
            return (Stdio::null(), Stdio::null());
        };
        let dir = logs_dir.join(request.package.slug());
        let profile = &request.profile.name;

        let opened = async {
            tokio::fs::create_dir_all(&dir).await?;
            let stdout = tokio::fs::File::create(dir.join(format!("{}.stdout.log", profile))).await?;
            let stderr = tokio::fs::File::create(dir.join(format!("{}.stderr.log", profile))).await?;
            Ok::<_, std::io::Error>((stdout.into_std().await, stderr.into_std().await))
        }
        .await;

        match opened {
            Ok((stdout, stderr)) => (Stdio::from(stdout), Stdio::from(stderr)),
            Err(e) => {
                tracing::warn!(
                    package = %request.package,
                    profile = %profile,
                    error = %e,
                    "failed to open captured output files, discarding output"
                );
                (Stdio::null(), Stdio::null())
            }
        }
    }
}

/// Kills the child's process group, then reaps the child.
async fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: killpg only sends a signal. The group id is the child's pid
        // because the child was spawned with process_group(0) and not yet reaped.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "failed to kill timed out child");
    }
}

#[async_trait]
impl TestRunner for ProcessRunner {
    async fn run(&self, request: RunRequest) -> RunOutcome {
        let invocation = &request.invocation;

        tracing::debug!(
            package = %request.package,
            profile = %request.profile.name,
            command = %invocation,
            "launching test command"
        );

        let (stdout, stderr) = self.output_streams(&request).await;

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(&request.profile.vars)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    package = %request.package,
                    program = %invocation.program,
                    error = %e,
                    "failed to launch test command"
                );
                return RunOutcome::LaunchFailed(e.to_string());
            }
        };

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    tracing::warn!(
                        package = %request.package,
                        profile = %request.profile.name,
                        timeout = ?limit,
                        "test command timed out, killed"
                    );
                    kill_tree(&mut child).await;
                    return RunOutcome::TimedOut(limit);
                }
            },
            None => child.wait().await,
        };

        match status {
            Ok(status) => match status.code() {
                Some(code) => RunOutcome::Exited(code),
                None => RunOutcome::Signalled,
            },
            Err(e) => RunOutcome::LaunchFailed(format!("failed to wait for child: {}", e)),
        }
    }

    fn name(&self) -> &str {
        "process"
    }
}
