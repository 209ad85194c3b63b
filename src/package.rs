//! Package discovery.
//!
//! Lists the immediate subdirectories of `<root>/<namespace>` and turns each
//! into a [`PackageId`], minus anything on the [`SkipList`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of a testable package, `namespace/name`.
///
/// An empty namespace yields a bare `name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PackageId {
    namespace: String,
    name: String,
}

impl PackageId {
    /// Creates a package id from a namespace and a local name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns the namespace, which may be empty.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the local name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a filesystem-safe form of the id, used for log directories.
    pub fn slug(&self) -> String {
        self.to_string()
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect()
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

impl FromStr for PackageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Config("package id cannot be empty".to_string()));
        }
        match s.rsplit_once('/') {
            Some((namespace, name)) if !name.is_empty() => Ok(Self::new(namespace, name)),
            Some(_) => Err(Error::Config(format!("invalid package id '{}'", s))),
            None => Ok(Self::new("", s)),
        }
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for PackageId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Set of packages excluded from discovery. Fixed for the lifetime of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkipList(BTreeSet<PackageId>);

impl SkipList {
    /// Creates an empty skip list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the given package is skipped.
    pub fn contains(&self, id: &PackageId) -> bool {
        self.0.contains(id)
    }

    /// Number of skipped ids.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is skipped.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PackageId> for SkipList {
    fn from_iter<I: IntoIterator<Item = PackageId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<PackageId> for SkipList {
    fn extend<I: IntoIterator<Item = PackageId>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Lists packages in one namespace directory.
///
/// Only immediate subdirectories are considered; files are ignored. The
/// result is sorted so reports are reproducible. A missing directory fails
/// with [`Error::Discovery`] whose source kind is `NotFound`.
pub fn discover(root: &Path, namespace: &str, skip: &SkipList) -> Result<Vec<PackageId>> {
    let dir = if namespace.is_empty() {
        root.to_path_buf()
    } else {
        root.join(namespace)
    };

    let discovery_err = |source| Error::Discovery {
        path: dir.clone(),
        source,
    };

    let mut packages = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(discovery_err)? {
        let entry = entry.map_err(discovery_err)?;
        // file_type() does not follow symlinks; metadata() does, so linked
        // workspace packages are still picked up.
        let is_dir = match entry.file_type() {
            Ok(ft) if ft.is_symlink() => entry.path().is_dir(),
            Ok(ft) => ft.is_dir(),
            Err(e) => return Err(discovery_err(e)),
        };
        if !is_dir {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let id = PackageId::new(namespace, name);
        if skip.contains(&id) {
            tracing::debug!(package = %id, "skipping package");
            continue;
        }
        packages.push(id);
    }

    packages.sort();
    Ok(packages)
}

/// Lists packages across several namespaces under one root.
///
/// With `allow_missing` set, a namespace directory that does not exist is
/// logged and contributes no packages; any other failure is still fatal.
/// The root itself must always exist.
pub fn discover_all(
    root: &Path,
    namespaces: &[String],
    skip: &SkipList,
    allow_missing: bool,
) -> Result<Vec<PackageId>> {
    let metadata = std::fs::metadata(root).map_err(|source| Error::Discovery {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(Error::Discovery {
            path: root.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "package root is not a directory",
            ),
        });
    }

    let mut packages = Vec::new();
    for namespace in namespaces {
        match discover(root, namespace, skip) {
            Ok(found) => {
                tracing::info!(
                    namespace = %namespace,
                    count = found.len(),
                    "discovered packages"
                );
                packages.extend(found);
            }
            Err(e) if allow_missing && e.is_not_found() => {
                tracing::warn!(namespace = %namespace, error = %e, "namespace not found, skipping");
            }
            Err(e) => return Err(e),
        }
    }
    packages.sort();
    Ok(packages)
}

/// A `index/total` slice of the package list, for splitting a run across machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub index: usize,
    pub total: usize,
}

impl Shard {
    /// Keeps the packages whose position satisfies `position % total == index`.
    pub fn select(&self, packages: Vec<PackageId>) -> Vec<PackageId> {
        packages
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % self.total == self.index)
            .map(|(_, id)| id)
            .collect()
    }

    /// Returns true if `index < total` and `total > 0`.
    pub fn is_valid(&self) -> bool {
        self.total > 0 && self.index < self.total
    }
}

impl FromStr for Shard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (index, total) = s
            .split_once('/')
            .ok_or_else(|| Error::Config(format!("shard '{}' must look like INDEX/TOTAL", s)))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|e| Error::Config(format!("invalid shard '{}': {}", s, e)))
        };
        let shard = Shard {
            index: parse(index)?,
            total: parse(total)?,
        };
        if !shard.is_valid() {
            return Err(Error::Config(format!(
                "invalid shard '{}': index must be less than total",
                s
            )));
        }
        Ok(shard)
    }
}
