//! Environment profiles.
//!
//! A profile is a named set of environment variables that points a test run at
//! one deployment of the backend services. Profiles are applied on top of the
//! inherited process environment when a test command is launched.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the built-in production profile.
pub const PRODUCTION: &str = "production";

/// Name of the built-in integration profile.
pub const INTEGRATION: &str = "integration";

const PRODUCTION_VARS: &[(&str, &str)] = &[
    ("CONVERSATION_SERVICE", "https://conv-a.wbx2.com/conversation/api/v1"),
    ("ENCRYPTION_SERVICE_URL", "https://encryption-a.wbx2.com"),
    ("HYDRA_SERVICE_URL", "https://webexapis.com/v1"),
    ("IDBROKER_BASE_URL", "https://idbroker.webex.com"),
    ("IDENTITY_BASE_URL", "https://identity.webex.com"),
    ("U2C_SERVICE_URL", "https://u2c.wbx2.com/u2c/api/v1"),
    ("WDM_SERVICE_URL", "https://wdm-a.wbx2.com/wdm/api/v1"),
    ("WHISTLER_API_SERVICE_URL", "https://whistler-prod.allnint.ciscospark.com/api/v1"),
    ("ENABLE_VERBOSE_NETWORK_LOGGING", "true"),
];

const INTEGRATION_VARS: &[(&str, &str)] = &[
    ("CONVERSATION_SERVICE", "https://conversation-intb.ciscospark.com/conversation/api/v1"),
    ("ENCRYPTION_SERVICE_URL", "https://encryption-intb.ciscospark.com/encryption/api/v1"),
    ("HYDRA_SERVICE_URL", "https://apialpha.ciscospark.com/v1"),
    ("IDBROKER_BASE_URL", "https://idbrokerbts.webex.com"),
    ("IDENTITY_BASE_URL", "https://identitybts.webex.com"),
    ("U2C_SERVICE_URL", "https://u2c-intb.ciscospark.com/u2c/api/v1"),
    ("WDM_SERVICE_URL", "https://wdm-intb.ciscospark.com/wdm/api/v1"),
    ("WHISTLER_API_SERVICE_URL", "https://calendar-whistler.allnint.ciscospark.com/api/v1"),
    ("ENABLE_VERBOSE_NETWORK_LOGGING", "true"),
];

/// A named mapping of environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    /// Profile name, used in report headers and logs.
    pub name: String,
    /// Variables overlaid onto the inherited environment.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

impl EnvironmentProfile {
    /// Creates an empty profile.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: BTreeMap::new(),
        }
    }

    /// Adds or replaces a variable.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// The built-in production profile.
    pub fn production() -> Self {
        Self::from_table(PRODUCTION, PRODUCTION_VARS)
    }

    /// The built-in integration profile.
    pub fn integration() -> Self {
        Self::from_table(INTEGRATION, INTEGRATION_VARS)
    }

    fn from_table(name: &str, table: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            vars: table
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// An ordered list of profiles. Every package is run once per profile, in
/// this order, so report columns line up across packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileSet(Vec<EnvironmentProfile>);

impl Default for ProfileSet {
    fn default() -> Self {
        Self(vec![
            EnvironmentProfile::production(),
            EnvironmentProfile::integration(),
        ])
    }
}

impl ProfileSet {
    /// Creates a profile set from an explicit list.
    pub fn new(profiles: Vec<EnvironmentProfile>) -> Self {
        Self(profiles)
    }

    /// Iterates profiles in run order.
    pub fn iter(&self) -> std::slice::Iter<'_, EnvironmentProfile> {
        self.0.iter()
    }

    /// Returns the profile names in run order.
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.name.as_str()).collect()
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no profiles.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up a profile by exact name.
    pub fn get(&self, name: &str) -> Option<&EnvironmentProfile> {
        self.0.iter().find(|p| p.name == name)
    }

    /// Applies a variable override. Unknown profile names are an error.
    pub fn apply(&mut self, override_: &ProfileOverride) -> Result<()> {
        let profile = self
            .0
            .iter_mut()
            .find(|p| p.name == override_.profile)
            .ok_or_else(|| {
                Error::Config(format!("unknown profile '{}' in override", override_.profile))
            })?;
        profile
            .vars
            .insert(override_.key.clone(), override_.value.clone());
        Ok(())
    }

    /// Keeps only the named profiles, preserving the original run order.
    ///
    /// Names are matched exactly; an unknown name is an error.
    pub fn retain_named(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            if self.get(name).is_none() {
                return Err(Error::Config(format!(
                    "unknown profile '{}' (available: {})",
                    name,
                    self.names().join(", ")
                )));
            }
        }
        self.0.retain(|p| names.contains(&p.name));
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ProfileSet {
    type Item = &'a EnvironmentProfile;
    type IntoIter = std::slice::Iter<'a, EnvironmentProfile>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A single `profile.VAR=value` override from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileOverride {
    pub profile: String,
    pub key: String,
    pub value: String,
}

impl FromStr for ProfileOverride {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            Error::Config(format!(
                "profile override '{}' must look like PROFILE.VAR=VALUE",
                s
            ))
        };
        let (target, value) = s.split_once('=').ok_or_else(invalid)?;
        let (profile, key) = target.split_once('.').ok_or_else(invalid)?;
        if profile.is_empty() || key.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            profile: profile.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}
