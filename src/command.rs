//! Test command templates.
//!
//! The command is kept as an argument vector, never a shell string. Each
//! argument may contain `{package}` and `{profile}` placeholders which are
//! substituted per run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::package::PackageId;

/// Placeholder replaced by the package id.
pub const PACKAGE_PLACEHOLDER: &str = "{package}";

/// Placeholder replaced by the profile name.
pub const PROFILE_PLACEHOLDER: &str = "{profile}";

/// An argument vector template for the per-package test command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: ["test", "--", "--package", PACKAGE_PLACEHOLDER]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CommandTemplate {
    /// Creates a template from a program and its arguments.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Builds a template from a full argv; the first element is the program.
    pub fn from_argv(argv: Vec<String>) -> Result<Self> {
        let mut iter = argv.into_iter();
        let program = iter
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| Error::Template("command cannot be empty".to_string()))?;
        Ok(Self {
            program,
            args: iter.collect(),
        })
    }

    /// Returns the program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the argument templates.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns true if any argument mentions the package placeholder.
    pub fn mentions_package(&self) -> bool {
        self.program.contains(PACKAGE_PLACEHOLDER)
            || self.args.iter().any(|a| a.contains(PACKAGE_PLACEHOLDER))
    }

    /// Substitutes placeholders for one package and profile.
    pub fn render(&self, package: &PackageId, profile: &str) -> Invocation {
        let package = package.to_string();
        let subst = |s: &str| {
            s.replace(PACKAGE_PLACEHOLDER, &package)
                .replace(PROFILE_PLACEHOLDER, profile)
        };
        Invocation {
            program: subst(self.program.as_str()),
            args: self.args.iter().map(|a| subst(a.as_str())).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for CommandTemplate {
    type Error = Error;

    fn try_from(argv: Vec<String>) -> Result<Self> {
        Self::from_argv(argv)
    }
}

impl From<CommandTemplate> for Vec<String> {
    fn from(template: CommandTemplate) -> Self {
        let mut argv = Vec::with_capacity(template.args.len() + 1);
        argv.push(template.program);
        argv.extend(template.args);
        argv
    }
}

/// A fully rendered command ready to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
