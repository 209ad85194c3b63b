//! env-comparison - run each package's tests against several backend environments
//!
//! Discovers packages under a root directory, runs each package's test command
//! once per environment profile (production and integration by default), and
//! writes the exit codes side by side to a CSV report.

pub mod command;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod package;
pub mod profile;
pub mod report;
pub mod result;
pub mod runner;
pub mod status;

pub use command::{CommandTemplate, Invocation};
pub use config::{RunConfig, Validate, ValidationResult};
pub use error::{Error, Result};
pub use orchestrator::{Discipline, Orchestrator};
pub use package::{discover, discover_all, PackageId, Shard, SkipList};
pub use profile::{EnvironmentProfile, ProfileOverride, ProfileSet};
pub use report::{write_summary_json, ReportWriter};
pub use result::{ProfileOutcome, RunSummary, TestResult};
pub use runner::{ProcessRunner, RunOutcome, RunRequest, TestRunner};
pub use status::{ConsoleSink, NullSink, StatusEvent, StatusKind, StatusSink};
