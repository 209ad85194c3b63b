//! CSV report writer.
//!
//! The report is truncated and given a header when a run starts, then gets one
//! row per package. Every row is written with a single `write_all` and synced
//! to disk under a lock, so concurrent workers never interleave and a crash
//! loses at most the rows still in flight.

use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::result::{RunSummary, TestResult};

/// Default report location, relative to the working directory.
pub const DEFAULT_REPORT_PATH: &str = "output/test-comparison.csv";

/// Appends test results to a CSV file.
pub struct ReportWriter {
    path: PathBuf,
    profiles: Vec<String>,
    file: Mutex<File>,
}

impl ReportWriter {
    /// Creates (or truncates) the report and writes the header row.
    ///
    /// Missing parent directories are created. Any failure here is fatal to
    /// the run.
    pub fn create(path: impl AsRef<Path>, profiles: &[&str]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let report_err = |source| Error::Report {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            // create_dir_all already succeeds when the directory exists.
            std::fs::create_dir_all(parent).map_err(report_err)?;
        }

        let mut file = File::create(&path).map_err(report_err)?;
        let header = header_row(profiles);
        file.write_all(header.as_bytes()).map_err(report_err)?;
        file.sync_data().map_err(report_err)?;

        tracing::info!(path = %path.display(), "created report");

        Ok(Self {
            path,
            profiles: profiles.iter().map(|p| p.to_string()).collect(),
            file: Mutex::new(file),
        })
    }

    /// Returns the report path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the profile names in column order.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// Appends one row and syncs it to disk.
    ///
    /// The result must carry an outcome for every report column.
    pub fn append(&self, result: &TestResult) -> Result<()> {
        let row = self.encode_row(result)?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| Error::Task("report writer lock poisoned".to_string()))?;
        let report_err = |source| Error::Report {
            path: self.path.clone(),
            source,
        };
        file.write_all(row.as_bytes()).map_err(report_err)?;
        file.flush().map_err(report_err)?;
        file.sync_data().map_err(report_err)?;

        tracing::debug!(package = %result.package, "appended report row");
        Ok(())
    }

    fn encode_row(&self, result: &TestResult) -> Result<String> {
        let package = result.package.to_string();
        let mut fields: Vec<Cow<'_, str>> = vec![escape_field(&package)];
        for profile in &self.profiles {
            let outcome = result.outcome(profile).ok_or_else(|| Error::Report {
                path: self.path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("result for {} has no '{}' outcome", result.package, profile),
                ),
            })?;
            fields.push(Cow::Owned(outcome.report_value()));
        }
        Ok(format!("{}\n", fields.join(",")))
    }
}

/// Builds the header: `Package,Production exit code,Integration exit code,...`.
pub fn header_row(profiles: &[&str]) -> String {
    let mut fields = vec![Cow::Borrowed("Package")];
    for profile in profiles {
        let column = format!("{} exit code", capitalize(profile));
        fields.push(Cow::Owned(escape_field(&column).into_owned()));
    }
    format!("{}\n", fields.join(","))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Quotes a field when it contains a separator, quote or line break.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Writes the run summary as pretty JSON.
pub fn write_summary_json(path: impl AsRef<Path>, summary: &RunSummary) -> Result<()> {
    let path = path.as_ref();
    let report_err = |source| Error::Report {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(report_err)?;
    }
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| Error::Config(format!("failed to serialize summary: {}", e)))?;
    std::fs::write(path, json).map_err(report_err)?;
    Ok(())
}
