//! Run configuration.
//!
//! Settings come from built-in defaults, an optional TOML or YAML file, and
//! finally command-line overrides applied by the binary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::CommandTemplate;
use crate::error::{Error, Result};
use crate::orchestrator::{default_max_parallel, Discipline};
use crate::package::{PackageId, Shard, SkipList};
use crate::profile::ProfileSet;
use crate::report::DEFAULT_REPORT_PATH;

/// Configuration for one comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Directory holding the namespace directories.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Namespace directories to scan. An empty string scans `root` itself.
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,

    /// Packages excluded from discovery.
    #[serde(default)]
    pub skip: SkipList,

    /// Treat a missing namespace directory as empty instead of failing.
    #[serde(default)]
    pub allow_missing_namespaces: bool,

    /// Profiles in run order.
    #[serde(default)]
    pub profiles: ProfileSet,

    /// Test command argv with `{package}` / `{profile}` placeholders.
    #[serde(default)]
    pub command: CommandTemplate,

    /// Scheduling discipline.
    #[serde(default)]
    pub discipline: Discipline,

    /// Maximum packages tested at once in concurrent mode.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Per-run timeout in seconds; 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// CSV report path.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Optional JSON summary path.
    #[serde(default)]
    pub summary_json: Option<PathBuf>,

    /// Directory for captured child output.
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,

    /// Only test this slice of the package list.
    #[serde(default)]
    pub shard: Option<Shard>,

    /// Exit non-zero if any package failed under any profile.
    #[serde(default)]
    pub fail_on_error: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("packages/node_modules")
}

fn default_namespaces() -> Vec<String> {
    vec!["@webex".to_string()]
}

fn default_timeout_secs() -> u64 {
    1800
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_REPORT_PATH)
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            namespaces: default_namespaces(),
            skip: SkipList::default(),
            allow_missing_namespaces: false,
            profiles: ProfileSet::default(),
            command: CommandTemplate::default(),
            discipline: Discipline::default(),
            max_parallel: default_max_parallel(),
            timeout_secs: default_timeout_secs(),
            output: default_output(),
            summary_json: None,
            logs_dir: None,
            shard: None,
            fail_on_error: false,
        }
    }
}

impl RunConfig {
    /// Loads a config file; the format is chosen by extension (`.toml`,
    /// `.yaml` or `.yml`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse {}: {}", path.display(), e))
            }),
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse {}: {}", path.display(), e))
            }),
            _ => Err(Error::Config(format!(
                "unsupported config format for {} (expected .toml, .yaml or .yml)",
                path.display()
            ))),
        }
    }

    /// Sets the discovery root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the namespaces to scan.
    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Adds packages to the skip list.
    pub fn with_skipped(mut self, ids: impl IntoIterator<Item = PackageId>) -> Self {
        self.skip.extend(ids);
        self
    }

    /// Sets the discipline.
    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Sets the report path.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Returns the per-run timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

impl Validate for RunConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.profiles.is_empty() {
            result.add_error("at least one profile is required");
        }

        let mut seen = HashSet::new();
        for name in self.profiles.names() {
            if name.trim().is_empty() {
                result.add_error("profile names cannot be empty");
            } else if !seen.insert(name) {
                result.add_error(format!("duplicate profile '{}'", name));
            }
        }

        if self.namespaces.is_empty() {
            result.add_error("at least one namespace is required (use \"\" for the root itself)");
        }

        if self.max_parallel == 0 {
            result.add_error("max_parallel must be at least 1");
        }

        if let Some(shard) = &self.shard {
            if !shard.is_valid() {
                result.add_error(format!(
                    "shard index {} must be less than total {}",
                    shard.index, shard.total
                ));
            }
        }

        if !self.command.mentions_package() {
            result.add_warning(
                "command has no {package} placeholder; every package will run the same command",
            );
        }

        if self.timeout_secs == 0 {
            result.add_warning("timeout disabled; a hung test command will stall the run");
        }

        if self.discipline == Discipline::Sequential && self.max_parallel > 1 {
            result.add_warning("max_parallel has no effect in sequential mode");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::EnvironmentProfile;
    use tempfile::TempDir;

    #[test]
    fn run_config_has_sensible_defaults() {
        let config = RunConfig::default();

        assert_eq!(config.root, PathBuf::from("packages/node_modules"));
        assert_eq!(config.namespaces, vec!["@webex".to_string()]);
        assert!(config.skip.is_empty());
        assert_eq!(config.profiles.names(), vec!["production", "integration"]);
        assert_eq!(config.discipline, Discipline::Concurrent);
        assert_eq!(config.timeout(), Some(Duration::from_secs(1800)));
        assert_eq!(config.output, PathBuf::from("output/test-comparison.csv"));
        assert!(!config.fail_on_error);
        assert!(config.validate().is_valid());
    }

    #[test]
    fn run_config_builder_works() {
        let config = RunConfig::default()
            .with_root("/repo/packages")
            .with_namespaces(vec!["".to_string()])
            .with_skipped(vec![PackageId::new("", "c")])
            .with_discipline(Discipline::Sequential)
            .with_output("/tmp/report.csv");

        assert_eq!(config.root, PathBuf::from("/repo/packages"));
        assert!(config.skip.contains(&PackageId::new("", "c")));
        assert_eq!(config.discipline, Discipline::Sequential);
        assert_eq!(config.output, PathBuf::from("/tmp/report.csv"));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = RunConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.timeout(), None);
        assert!(!config.validate().warnings.is_empty());
    }

    #[test]
    fn parses_minimal_toml() {
        let config: RunConfig = toml::from_str("root = \"pkgs\"").unwrap();
        assert_eq!(config.root, PathBuf::from("pkgs"));
        assert_eq!(config.profiles.len(), 2);
    }

    #[test]
    fn parses_full_yaml() {
        let yaml = r#"
root: packages/node_modules
namespaces: ["@webex", ""]
skip: ["@webex/test-helper-chai", "@webex/test-users"]
profiles:
  - name: production
    vars:
      WDM_SERVICE_URL: https://wdm-a.wbx2.com/wdm/api/v1
  - name: integration
    vars:
      WDM_SERVICE_URL: https://wdm-intb.ciscospark.com/wdm/api/v1
command: ["npm", "test", "--", "--packages", "{package}"]
discipline: sequential
timeout_secs: 600
shard: { index: 0, total: 2 }
fail_on_error: true
"#;
        let config: RunConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.namespaces, vec!["@webex".to_string(), "".to_string()]);
        assert!(config.skip.contains(&"@webex/test-users".parse().unwrap()));
        assert_eq!(config.command.args()[2], "--packages");
        assert_eq!(config.discipline, Discipline::Sequential);
        assert_eq!(config.shard, Some(Shard { index: 0, total: 2 }));
        assert!(config.fail_on_error);
    }

    #[test]
    fn sample_config_matches_builtin_profiles() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("env-comparison.toml");

        let config = RunConfig::load(&path).unwrap();

        assert_eq!(config.profiles, ProfileSet::default());
        assert_eq!(config.skip.len(), 4);
        assert_eq!(config.command, CommandTemplate::default());
        assert!(config.validate().is_valid());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<RunConfig>("rooot = \"x\"").is_err());
    }

    #[test]
    fn load_picks_format_by_extension() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let toml_path = temp.path().join("run.toml");
        std::fs::write(&toml_path, "discipline = \"sequential\"\n").unwrap();
        let other_path = temp.path().join("run.ini");
        std::fs::write(&other_path, "").unwrap();

        let config = RunConfig::load(&toml_path).unwrap();
        assert_eq!(config.discipline, Discipline::Sequential);
        assert!(RunConfig::load(&other_path).is_err());
        assert!(RunConfig::load(temp.path().join("missing.toml")).is_err());
    }

    #[test]
    fn validate_reports_fatal_problems() {
        let config = RunConfig {
            profiles: ProfileSet::new(vec![
                EnvironmentProfile::new("prod"),
                EnvironmentProfile::new("prod"),
            ]),
            max_parallel: 0,
            namespaces: vec![],
            shard: Some(Shard { index: 4, total: 2 }),
            ..Default::default()
        };

        let result = config.validate();

        assert!(!result.is_valid());
        assert_eq!(result.errors.len(), 4);
        assert!(result.into_result().is_err());
    }

    #[test]
    fn validate_rejects_empty_profiles() {
        let config = RunConfig {
            profiles: ProfileSet::new(vec![]),
            ..Default::default()
        };
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn validate_warns_without_package_placeholder() {
        let config = RunConfig {
            command: CommandTemplate::new("npm", vec!["test".to_string()]),
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("{package}")));
    }
}
