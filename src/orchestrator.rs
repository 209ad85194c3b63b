//! Test orchestrator.
//!
//! Runs every package once per profile and streams each finished package into
//! the report. Packages are independent: a failing test command is recorded,
//! never escalated. Only report IO errors stop a run.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::command::CommandTemplate;
use crate::error::{Error, Result};
use crate::package::PackageId;
use crate::profile::ProfileSet;
use crate::report::ReportWriter;
use crate::result::{ProfileOutcome, RunSummary, TestResult};
use crate::runner::{RunRequest, TestRunner};
use crate::status::{NullSink, StatusEvent, StatusSink};

/// How packages are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    /// One package at a time, in discovery order.
    Sequential,
    /// Packages run as independent tasks, bounded by `max_parallel`.
    #[default]
    Concurrent,
}

/// Drives test runs for a list of packages.
pub struct Orchestrator<R: TestRunner> {
    runner: Arc<R>,
    profiles: Arc<ProfileSet>,
    template: Arc<CommandTemplate>,
    discipline: Discipline,
    max_parallel: usize,
    status: Arc<dyn StatusSink>,
}

impl<R: TestRunner + 'static> Orchestrator<R> {
    /// Creates an orchestrator with the default (concurrent) discipline.
    pub fn new(runner: R, profiles: ProfileSet, template: CommandTemplate) -> Self {
        Self {
            runner: Arc::new(runner),
            profiles: Arc::new(profiles),
            template: Arc::new(template),
            discipline: Discipline::default(),
            max_parallel: default_max_parallel(),
            status: Arc::new(NullSink),
        }
    }

    /// Sets the scheduling discipline.
    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Bounds the number of packages tested at once in concurrent mode.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Sets where start/finish notices go.
    pub fn with_status_sink(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    /// Returns the profiles in column order.
    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    /// Tests every package and appends one report row per package.
    ///
    /// Returns once every package has finished. Results are in completion
    /// order, which equals discovery order for the sequential discipline.
    pub async fn run(
        &self,
        packages: Vec<PackageId>,
        report: Arc<ReportWriter>,
    ) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();

        tracing::info!(
            run_id = %run_id,
            packages = packages.len(),
            profiles = ?self.profiles.names(),
            discipline = ?self.discipline,
            runner = self.runner.name(),
            "starting test run"
        );

        let results = match self.discipline {
            Discipline::Sequential => self.run_sequential(packages, &report).await?,
            Discipline::Concurrent => self.run_concurrent(packages, &report).await?,
        };

        let summary = RunSummary {
            run_id,
            profiles: self.profiles.names().iter().map(|s| s.to_string()).collect(),
            results,
            duration: start.elapsed(),
        };

        tracing::info!(
            run_id = %run_id,
            total = summary.total(),
            passed = summary.passed(),
            duration = ?summary.duration,
            "test run complete"
        );

        Ok(summary)
    }

    async fn run_sequential(
        &self,
        packages: Vec<PackageId>,
        report: &Arc<ReportWriter>,
    ) -> Result<Vec<TestResult>> {
        let mut results = Vec::with_capacity(packages.len());
        for package in packages {
            let result = test_package(
                self.runner.as_ref(),
                &self.profiles,
                &self.template,
                self.status.as_ref(),
                package,
            )
            .await;
            results.push(record(report, result).await?);
        }
        Ok(results)
    }

    async fn run_concurrent(
        &self,
        packages: Vec<PackageId>,
        report: &Arc<ReportWriter>,
    ) -> Result<Vec<TestResult>> {
        let total = packages.len();
        let sem = Arc::new(Semaphore::new(self.max_parallel));
        let mut join_set = JoinSet::new();

        for package in packages {
            let runner = Arc::clone(&self.runner);
            let profiles = Arc::clone(&self.profiles);
            let template = Arc::clone(&self.template);
            let status = Arc::clone(&self.status);
            let report = Arc::clone(report);
            let sem = Arc::clone(&sem);

            join_set.spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Task(format!("worker pool closed: {}", e)))?;
                let result = test_package(
                    runner.as_ref(),
                    &profiles,
                    &template,
                    status.as_ref(),
                    package,
                )
                .await;
                record(&report, result).await
            });
        }

        let mut results = Vec::with_capacity(total);
        // Returning early drops the JoinSet, which aborts the remaining units.
        while let Some(joined) = join_set.join_next().await {
            let result = joined.map_err(|e| Error::Task(format!("package task failed: {}", e)))?;
            results.push(result?);
        }
        Ok(results)
    }
}

/// Runs one package under every profile, in profile order.
async fn test_package<R: TestRunner + ?Sized>(
    runner: &R,
    profiles: &ProfileSet,
    template: &CommandTemplate,
    status: &dyn StatusSink,
    package: PackageId,
) -> TestResult {
    let mut outcomes = Vec::with_capacity(profiles.len());

    for profile in profiles {
        status.emit(&StatusEvent::Started {
            package: package.clone(),
            profile: profile.name.clone(),
        });
        tracing::debug!(package = %package, profile = %profile.name, "running tests");

        let request = RunRequest {
            package: package.clone(),
            profile: profile.clone(),
            invocation: template.render(&package, &profile.name),
        };
        let started = Instant::now();
        let outcome = runner.run(request).await;
        let duration = started.elapsed();

        tracing::debug!(
            package = %package,
            profile = %profile.name,
            outcome = %outcome,
            duration = ?duration,
            "tests finished"
        );
        status.emit(&StatusEvent::Finished {
            package: package.clone(),
            profile: profile.name.clone(),
            outcome: outcome.clone(),
        });

        outcomes.push(ProfileOutcome {
            profile: profile.name.clone(),
            outcome,
            duration,
        });
    }

    TestResult { package, outcomes }
}

/// Appends a finished package to the report on the blocking pool, since each
/// row is synced to disk.
async fn record(report: &Arc<ReportWriter>, result: TestResult) -> Result<TestResult> {
    let report = Arc::clone(report);
    tokio::task::spawn_blocking(move || report.append(&result).map(|()| result))
        .await
        .map_err(|e| Error::Task(format!("report write task failed: {}", e)))?
}

/// Worker bound used when none is configured.
pub fn default_max_parallel() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
