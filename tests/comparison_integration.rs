//! End-to-end comparison runs without network access.
//!
//! Packages are temp directories and the test command is `sh`, so these run
//! anywhere a POSIX shell is available.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use env_comparison::{
    discover, CommandTemplate, Discipline, EnvironmentProfile, Orchestrator, PackageId,
    ProcessRunner, ProfileSet, ReportWriter, RunOutcome, RunRequest, SkipList, TestRunner,
};

/// Helper to create a root with one empty directory per package.
fn create_package_root(names: &[&str]) -> TempDir {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    for name in names {
        std::fs::create_dir(temp_dir.path().join(name)).expect("failed to create package dir");
    }
    std::fs::write(temp_dir.path().join("package.json"), "{}").expect("failed to write file");
    temp_dir
}

fn profiles() -> ProfileSet {
    ProfileSet::new(vec![
        EnvironmentProfile::new("prod").with_var("ENVCMP_TARGET", "prod"),
        EnvironmentProfile::new("int").with_var("ENVCMP_TARGET", "int"),
    ])
}

fn read_report(path: &Path) -> (String, Vec<String>) {
    let content = std::fs::read_to_string(path).expect("failed to read report");
    let mut lines = content.lines().map(|l| l.to_string());
    let header = lines.next().expect("report has no header");
    (header, lines.collect())
}

/// Returns 0 except for package `b` under `int`.
struct MockRunner;

#[async_trait]
impl TestRunner for MockRunner {
    async fn run(&self, request: RunRequest) -> RunOutcome {
        match (request.package.name(), request.profile.name.as_str()) {
            ("b", "int") => RunOutcome::Exited(1),
            _ => RunOutcome::Exited(0),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

async fn run_scenario<R: TestRunner + 'static>(
    runner: R,
    template: CommandTemplate,
    discipline: Discipline,
) -> (String, Vec<String>) {
    let root = create_package_root(&["a", "b", "c"]);
    let out = TempDir::new().expect("failed to create output dir");
    let skip: SkipList = [PackageId::new("", "c")].into_iter().collect();

    let packages = discover(root.path(), "", &skip).expect("discovery failed");
    let report_path = out.path().join("output").join("test-comparison.csv");
    let set = profiles();
    let report = Arc::new(ReportWriter::create(&report_path, &set.names()).expect("report failed"));

    Orchestrator::new(runner, set, template)
        .with_discipline(discipline)
        .run(packages, report)
        .await
        .expect("run failed");

    read_report(&report_path)
}

#[tokio::test]
async fn scenario_with_mock_runner_sequential() {
    let (header, rows) =
        run_scenario(MockRunner, CommandTemplate::default(), Discipline::Sequential).await;

    assert_eq!(header, "Package,Prod exit code,Int exit code");
    assert_eq!(rows, vec!["a,0,0", "b,0,1"]);
}

#[tokio::test]
async fn scenario_with_mock_runner_concurrent() {
    let (_, mut rows) =
        run_scenario(MockRunner, CommandTemplate::default(), Discipline::Concurrent).await;

    rows.sort();
    assert_eq!(rows, vec!["a,0,0", "b,0,1"]);
}

#[tokio::test]
async fn scenario_with_real_processes() {
    // $1 is the package id, ENVCMP_TARGET comes from the profile.
    let template = CommandTemplate::from_argv(
        [
            "sh",
            "-c",
            r#"if [ "$1" = b ] && [ "$ENVCMP_TARGET" = int ]; then exit 1; fi; exit 0"#,
            "sh",
            "{package}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    )
    .expect("invalid template");

    let (_, mut rows) = run_scenario(ProcessRunner::new(), template, Discipline::Concurrent).await;

    rows.sort();
    assert_eq!(rows, vec!["a,0,0", "b,0,1"]);
}

#[tokio::test]
async fn unlaunchable_command_is_recorded_as_sentinel() {
    let template = CommandTemplate::from_argv(vec![
        "env-comparison-no-such-test-binary".to_string(),
        "{package}".to_string(),
    ])
    .expect("invalid template");

    let (_, rows) = run_scenario(ProcessRunner::new(), template, Discipline::Sequential).await;

    assert_eq!(rows, vec!["a,launch-error,launch-error", "b,launch-error,launch-error"]);
}

#[tokio::test]
async fn every_discovered_package_appears_once_with_every_profile() {
    let names: Vec<String> = (0..20).map(|i| format!("pkg-{:02}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let root = create_package_root(&name_refs);
    let out = TempDir::new().expect("failed to create output dir");

    let set = ProfileSet::new(vec![
        EnvironmentProfile::new("a"),
        EnvironmentProfile::new("b"),
        EnvironmentProfile::new("c"),
    ]);
    let packages = discover(root.path(), "", &SkipList::new()).expect("discovery failed");
    let report_path = out.path().join("r.csv");
    let report = Arc::new(ReportWriter::create(&report_path, &set.names()).expect("report failed"));

    let summary = Orchestrator::new(MockRunner, set, CommandTemplate::default())
        .with_max_parallel(3)
        .run(packages, report)
        .await
        .expect("run failed");

    let (_, rows) = read_report(&report_path);
    assert_eq!(rows.len(), 20);
    assert_eq!(summary.total(), 20);

    let mut seen: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 4, "row {:?} should have one column per profile", row);
        *seen.entry(fields[0].to_string()).or_default() += 1;
    }
    assert!(seen.values().all(|&count| count == 1));
    assert_eq!(seen.len(), 20);
}

#[test]
fn rows_are_durable_before_the_writer_is_dropped() {
    let out = TempDir::new().expect("failed to create output dir");
    let report_path = out.path().join("r.csv");
    let set = profiles();
    let report = ReportWriter::create(&report_path, &set.names()).expect("report failed");

    let runner = MockRunner;
    for name in ["a", "b", "c"] {
        let package = PackageId::new("", name);
        let mut outcomes = Vec::new();
        for profile in &set {
            let request = RunRequest {
                package: package.clone(),
                profile: profile.clone(),
                invocation: CommandTemplate::default().render(&package, &profile.name),
            };
            outcomes.push(env_comparison::ProfileOutcome {
                profile: profile.name.clone(),
                outcome: tokio_test::block_on(runner.run(request)),
                duration: std::time::Duration::ZERO,
            });
        }
        report
            .append(&env_comparison::TestResult { package, outcomes })
            .expect("append failed");
    }

    // Read while the writer still holds the file open.
    let (_, rows) = read_report(&report_path);
    assert_eq!(rows, vec!["a,0,0", "b,0,1", "c,0,0"]);
    drop(report);
}
