//! env-comparison CLI
//!
//! Runs every package's tests against each environment profile and writes a
//! CSV comparing the exit codes.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use env_comparison::{
    discover_all, write_summary_json, CommandTemplate, ConsoleSink, Discipline, Orchestrator,
    PackageId, ProcessRunner, ProfileOverride, ReportWriter, RunConfig, RunSummary, Shard,
    Validate,
};

/// Exit code for configuration, discovery and report failures.
const EXIT_INFRASTRUCTURE: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "env-comparison", version, about)]
struct Cli {
    /// Config file (.toml, .yaml or .yml)
    #[arg(short, long, env = "ENV_COMPARISON_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing the namespace directories
    #[arg(long)]
    root: Option<PathBuf>,

    /// Namespace directory to scan (repeatable; "" scans the root itself)
    #[arg(long = "namespace")]
    namespaces: Vec<String>,

    /// Package to skip, e.g. @webex/test-helper-chai (repeatable)
    #[arg(long = "skip")]
    skip: Vec<PackageId>,

    /// Override a profile variable: PROFILE.VAR=VALUE (repeatable)
    #[arg(long = "profile")]
    overrides: Vec<ProfileOverride>,

    /// Only run these profiles, matched by exact name (repeatable)
    #[arg(long = "only-profile")]
    only_profiles: Vec<String>,

    /// Test one package at a time
    #[arg(long, conflicts_with = "concurrent")]
    sequential: bool,

    /// Test packages concurrently
    #[arg(long)]
    concurrent: bool,

    /// Maximum packages tested at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Per-run timeout in seconds (0 disables)
    #[arg(long)]
    timeout: Option<u64>,

    /// CSV report path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write a JSON summary here
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Write each run's stdout/stderr under this directory
    #[arg(long)]
    logs_dir: Option<PathBuf>,

    /// Only test slice INDEX of TOTAL, e.g. 0/4
    #[arg(long)]
    shard: Option<Shard>,

    /// Exit 1 if any package failed under any profile
    #[arg(long)]
    fail_on_error: bool,

    /// Treat missing namespace directories as empty
    #[arg(long)]
    allow_missing_namespaces: bool,

    /// Print the commands that would run, without running them
    #[arg(long)]
    dry_run: bool,

    /// Disable coloured status lines
    #[arg(long)]
    no_color: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Test command argv; {package} and {profile} are substituted
    #[arg(last = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("env-comparison failed: {}", e);
            std::process::exit(EXIT_INFRASTRUCTURE);
        }
    }
}

async fn run(cli: Cli) -> env_comparison::Result<i32> {
    let dry_run = cli.dry_run;
    let color = !cli.no_color;
    let config = resolve_config(cli)?;

    for warning in config.validate().into_result()? {
        tracing::warn!("{}", warning);
    }

    let mut packages = discover_all(
        &config.root,
        &config.namespaces,
        &config.skip,
        config.allow_missing_namespaces,
    )?;
    if let Some(shard) = config.shard {
        packages = shard.select(packages);
        tracing::info!(index = shard.index, total = shard.total, count = packages.len(), "selected shard");
    }

    if dry_run {
        for package in &packages {
            for profile in &config.profiles {
                println!("[{}] {}", profile.name, config.command.render(package, &profile.name));
            }
        }
        return Ok(0);
    }

    let report = Arc::new(ReportWriter::create(&config.output, &config.profiles.names())?);

    let runner = ProcessRunner::new()
        .with_timeout(config.timeout())
        .with_logs_dir(config.logs_dir.clone());
    let orchestrator = Orchestrator::new(runner, config.profiles.clone(), config.command.clone())
        .with_discipline(config.discipline)
        .with_max_parallel(config.max_parallel)
        .with_status_sink(Arc::new(ConsoleSink::stderr(color)));

    let summary = orchestrator.run(packages, Arc::clone(&report)).await?;

    if let Some(path) = &config.summary_json {
        write_summary_json(path, &summary)?;
    }

    print_summary(&summary, &config);

    if config.fail_on_error && !summary.all_passed() {
        return Ok(1);
    }
    Ok(0)
}

/// Layers CLI flags over the config file over built-in defaults.
fn resolve_config(cli: Cli) -> env_comparison::Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    if let Some(root) = cli.root {
        config.root = root;
    }
    if !cli.namespaces.is_empty() {
        config.namespaces = cli.namespaces;
    }
    config.skip.extend(cli.skip);
    for override_ in &cli.overrides {
        config.profiles.apply(override_)?;
    }
    if !cli.only_profiles.is_empty() {
        config.profiles.retain_named(&cli.only_profiles)?;
    }
    if cli.sequential {
        config.discipline = Discipline::Sequential;
    } else if cli.concurrent {
        config.discipline = Discipline::Concurrent;
    }
    if let Some(jobs) = cli.jobs {
        config.max_parallel = jobs;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(output) = cli.output {
        config.output = output;
    }
    if cli.summary_json.is_some() {
        config.summary_json = cli.summary_json;
    }
    if cli.logs_dir.is_some() {
        config.logs_dir = cli.logs_dir;
    }
    if cli.shard.is_some() {
        config.shard = cli.shard;
    }
    if !cli.command.is_empty() {
        config.command = CommandTemplate::from_argv(cli.command)?;
    }
    config.fail_on_error |= cli.fail_on_error;
    config.allow_missing_namespaces |= cli.allow_missing_namespaces;

    Ok(config)
}

fn print_summary(summary: &RunSummary, config: &RunConfig) {
    println!("\n{}", "=".repeat(60));
    println!("Comparison Complete: {}", summary.run_id);
    println!("{}", "=".repeat(60));
    println!();
    println!("Packages: {}", summary.total());
    println!("Passed everywhere: {}", summary.passed());
    println!("Duration: {:?}", summary.duration);

    let divergent = summary.divergent_packages();
    if !divergent.is_empty() {
        println!();
        println!("Results differ between profiles:");
        for package in divergent {
            println!("  {}", package);
        }
    }

    println!();
    println!("Report: {}", config.output.display());
    if let Some(path) = &config.summary_json {
        println!("Summary: {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "env-comparison",
            "--root",
            "/repo",
            "--namespace",
            "",
            "--skip",
            "c",
            "--profile",
            "integration.WDM_SERVICE_URL=http://localhost:3020",
            "--sequential",
            "--timeout",
            "0",
            "--",
            "sh",
            "-c",
            "exit 0",
        ]);

        let config = resolve_config(cli).unwrap();

        assert_eq!(config.root, PathBuf::from("/repo"));
        assert_eq!(config.namespaces, vec!["".to_string()]);
        assert!(config.skip.contains(&PackageId::new("", "c")));
        assert_eq!(
            config.profiles.get("integration").unwrap().vars["WDM_SERVICE_URL"],
            "http://localhost:3020"
        );
        assert_eq!(config.discipline, Discipline::Sequential);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.command.program(), "sh");
    }

    #[test]
    fn only_profile_filters_by_exact_name() {
        let cli = Cli::parse_from(["env-comparison", "--only-profile", "integration"]);
        let config = resolve_config(cli).unwrap();
        assert_eq!(config.profiles.names(), vec!["integration"]);

        let cli = Cli::parse_from(["env-comparison", "--only-profile", "Integration"]);
        assert!(resolve_config(cli).is_err());
    }

    #[test]
    fn sequential_and_concurrent_conflict() {
        assert!(Cli::try_parse_from(["env-comparison", "--sequential", "--concurrent"]).is_err());
    }
}
