//! Host runtime compatibility gate
//!
//! The interception hook binds to an engine extension point whose shape
//! changes between engine releases. The gate refuses to initialize against a
//! host outside the validated range; it runs once, before anything else is
//! constructed.
//!
//! The default table lists the release lines this crate has been validated
//! against. Add an entry (or widen one) only after validating a new release.

use std::{fmt, str::FromStr};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};

/// Engine name and version as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRuntime {
    /// Engine name, matched case-insensitively against the table
    pub engine: String,
    /// Version string, e.g. `12.4.254.21` or `0.20.0`
    pub version: String,
}

impl HostRuntime {
    /// Describe a host runtime
    pub fn new(engine: impl Into<String>, version: impl Into<String>) -> Self {
        HostRuntime {
            engine: engine.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for HostRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.engine, self.version)
    }
}

const MAX_COMPONENTS: usize = 4;

/// Parsed host version
///
/// Engines report anything from one to four dotted numeric components, with
/// optional suffixes (`12.4.254.21-node.33`). The leading three numeric
/// components are read into a semver [`Version`]; missing ones are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostVersion {
    raw: String,
    version: Version,
}

impl HostVersion {
    /// Major component
    pub fn major(&self) -> u64 {
        self.version.major
    }

    /// Normalized semver view
    pub fn semver(&self) -> &Version {
        &self.version
    }

    /// Version string as reported
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl FromStr for HostVersion {
    type Err = GuardError;

    fn from_str(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| GuardError::InvalidHostVersion {
            version: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim().trim_start_matches('v');
        let numeric = trimmed
            .split(|c: char| c == '-' || c == '+' || c.is_whitespace())
            .next()
            .unwrap_or_default();
        if numeric.is_empty() {
            return Err(invalid("empty version"));
        }

        if numeric.split('.').count() > MAX_COMPONENTS {
            return Err(invalid("too many components"));
        }

        let mut parts = [0u64; 3];
        for (idx, component) in numeric.split('.').enumerate() {
            if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("non-numeric component"));
            }
            if idx < parts.len() {
                parts[idx] = component
                    .parse()
                    .map_err(|_| invalid("component out of range"))?;
            }
        }

        let version = Version::parse(&format!("{}.{}.{}", parts[0], parts[1], parts[2]))
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(HostVersion {
            raw: raw.to_string(),
            version,
        })
    }
}

/// Inclusive major-version range validated for one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityEntry {
    /// Engine name
    pub engine: String,
    /// Lowest supported major
    pub min_major: u64,
    /// Highest supported major
    pub max_major: u64,
}

impl CompatibilityEntry {
    /// Whether `version` falls inside this entry
    pub fn admits(&self, version: &HostVersion) -> bool {
        (self.min_major..=self.max_major).contains(&version.major())
    }
}

/// Table of validated engine release lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityTable {
    /// One entry per engine
    pub entries: Vec<CompatibilityEntry>,
}

impl CompatibilityTable {
    /// Table with the given entries
    pub fn new(entries: Vec<CompatibilityEntry>) -> Self {
        CompatibilityTable { entries }
    }

    /// Entry for `engine`, if listed
    pub fn entry(&self, engine: &str) -> Option<&CompatibilityEntry> {
        self.entries
            .iter()
            .find(|entry| entry.engine.eq_ignore_ascii_case(engine))
    }

    /// Check `host` against the table
    pub fn check(&self, host: &HostRuntime) -> Result<HostVersion> {
        let entry = self
            .entry(&host.engine)
            .ok_or_else(|| GuardError::UnknownEngine(host.engine.clone()))?;
        let version: HostVersion = host.version.parse()?;

        if !entry.admits(&version) {
            tracing::error!(
                host = %host,
                min_major = entry.min_major,
                max_major = entry.max_major,
                "host runtime outside supported range"
            );
            return Err(GuardError::UnsupportedHostVersion {
                engine: host.engine.clone(),
                found: host.version.clone(),
                min_major: entry.min_major,
                max_major: entry.max_major,
            });
        }

        tracing::debug!(host = %host, "host runtime compatible");
        Ok(version)
    }

    /// Sanity-check the table itself
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(GuardError::settings("compatibility table is empty"));
        }
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.engine.trim().is_empty() {
                return Err(GuardError::settings("compatibility entry has no engine name"));
            }
            if entry.min_major > entry.max_major {
                return Err(GuardError::settings(format!(
                    "compatibility entry for {} has min_major {} above max_major {}",
                    entry.engine, entry.min_major, entry.max_major
                )));
            }
            if self.entries[..idx]
                .iter()
                .any(|other| other.engine.eq_ignore_ascii_case(&entry.engine))
            {
                return Err(GuardError::settings(format!(
                    "duplicate compatibility entry for {}",
                    entry.engine
                )));
            }
        }
        Ok(())
    }
}

impl Default for CompatibilityTable {
    fn default() -> Self {
        CompatibilityTable::new(vec![
            // V8 lines exposing the (context, source, is_code_like) hook shape.
            CompatibilityEntry {
                engine: "v8".to_string(),
                min_major: 9,
                max_major: 13,
            },
            // Pre-1.0 boa; the backend pins the exact release.
            CompatibilityEntry {
                engine: "boa".to_string(),
                min_major: 0,
                max_major: 0,
            },
        ])
    }
}
