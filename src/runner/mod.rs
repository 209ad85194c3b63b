//! Test command runners.
//!
//! A runner executes one rendered test command under one environment profile
//! and reports how it ended. Everything that can go wrong with a single run
//! is folded into [`RunOutcome`]; runners never fail the whole run.

mod process;

pub use process::ProcessRunner;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::Invocation;
use crate::package::PackageId;
use crate::profile::EnvironmentProfile;

/// Report value written when the command could not be started.
pub const LAUNCH_ERROR_SENTINEL: &str = "launch-error";

/// Report value written when the command was killed after its timeout.
pub const TIMED_OUT_SENTINEL: &str = "timed-out";

/// Report value written when the command was terminated by a signal.
pub const SIGNAL_SENTINEL: &str = "signal";

/// How a single test run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The command ran and exited with this code.
    Exited(i32),
    /// The command was terminated by a signal and has no exit code.
    Signalled,
    /// The command could not be started or waited on.
    LaunchFailed(String),
    /// The command exceeded its time limit and was killed.
    TimedOut(Duration),
}

impl RunOutcome {
    /// Returns true only for a zero exit code.
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Exited(0))
    }

    /// Returns the exit code, if the command produced one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunOutcome::Exited(code) => Some(*code),
            _ => None,
        }
    }

    /// Value written to the report column: the exit code, or a sentinel.
    pub fn report_value(&self) -> String {
        match self {
            RunOutcome::Exited(code) => code.to_string(),
            RunOutcome::Signalled => SIGNAL_SENTINEL.to_string(),
            RunOutcome::LaunchFailed(_) => LAUNCH_ERROR_SENTINEL.to_string(),
            RunOutcome::TimedOut(_) => TIMED_OUT_SENTINEL.to_string(),
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Exited(code) => write!(f, "exited with code {}", code),
            RunOutcome::Signalled => write!(f, "terminated by signal"),
            RunOutcome::LaunchFailed(reason) => write!(f, "failed to launch: {}", reason),
            RunOutcome::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
        }
    }
}

/// Everything a runner needs to execute one package under one profile.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Package under test.
    pub package: PackageId,
    /// Profile whose variables are overlaid on the inherited environment.
    pub profile: EnvironmentProfile,
    /// Rendered command.
    pub invocation: Invocation,
}

/// Trait for test runners.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Runs the request to completion and reports how it ended.
    async fn run(&self, request: RunRequest) -> RunOutcome;

    /// Returns the name of this runner.
    fn name(&self) -> &str;
}
