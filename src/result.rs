//! Per-package results and run summaries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::package::PackageId;
use crate::runner::RunOutcome;

/// Outcome of one package under one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileOutcome {
    /// Profile name.
    pub profile: String,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Wall time of the run.
    pub duration: Duration,
}

/// Outcomes for one package across every configured profile, in profile order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub package: PackageId,
    pub outcomes: Vec<ProfileOutcome>,
}

impl TestResult {
    /// Returns the outcome for a profile by exact name.
    pub fn outcome(&self, profile: &str) -> Option<&RunOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.profile == profile)
            .map(|o| &o.outcome)
    }

    /// Returns true if every profile exited with code zero.
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.outcome.is_success())
    }

    /// Returns true if profiles disagree on success.
    pub fn is_divergent(&self) -> bool {
        let mut successes = self.outcomes.iter().map(|o| o.outcome.is_success());
        match successes.next() {
            Some(first) => successes.any(|s| s != first),
            None => false,
        }
    }
}

/// Summary of a complete run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique identifier for this run.
    pub run_id: Uuid,
    /// Profile names in column order.
    pub profiles: Vec<String>,
    /// One result per package, in completion order.
    pub results: Vec<TestResult>,
    /// Total wall time.
    pub duration: Duration,
}

impl RunSummary {
    /// Number of packages tested.
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Number of packages that passed under every profile.
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.all_passed()).count()
    }

    /// Packages with at least one failing profile.
    pub fn failed_packages(&self) -> Vec<&PackageId> {
        self.results
            .iter()
            .filter(|r| !r.all_passed())
            .map(|r| &r.package)
            .collect()
    }

    /// Packages that pass under some profiles and fail under others.
    pub fn divergent_packages(&self) -> Vec<&PackageId> {
        self.results
            .iter()
            .filter(|r| r.is_divergent())
            .map(|r| &r.package)
            .collect()
    }

    /// Returns true if no package failed under any profile.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.all_passed())
    }
}
