//! Configuration system for codegen-guard
//!
//! A configuration document carries the guard settings, an optional
//! compatibility table override and the log level for the embedding host.
//!
//! ```yaml
//! version: "1.0"
//! guard:
//!   failure_mode: closed
//!   blocked_message: "eval is disabled"
//!   rules:
//!     - pattern: "*require(*"
//!       message: "module loading is disabled"
//! compatibility:
//!   entries:
//!     - engine: v8
//!       min_major: 11
//!       max_major: 12
//! logging:
//!   level: debug
//! ```

use std::path::Path;

use codegen_guard::{CodegenGuard, CompatibilityTable, GuardSettings, HostRuntime};
use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod error;
pub mod loader;
pub mod validation;

pub use error::{ConfigError, Result};
pub use loader::{ConfigFormat, ConfigLoader};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Configuration format version
    pub version: String,

    /// Metadata about this configuration
    pub metadata: Option<Metadata>,

    /// Guard behavior
    #[serde(default)]
    pub guard: GuardSettings,

    /// Replacement for the built-in compatibility table
    pub compatibility: Option<CompatibilityTable>,

    /// Logging configuration
    #[serde(default = "defaults::default_logging_config")]
    pub logging: LoggingConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

/// Logging configuration
///
/// Advisory: the guard only emits `tracing` events and never installs a
/// subscriber. The embedding host reads the level when it sets up its own
/// subscriber, e.g. through [`LoggingConfig::filter_directive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

impl LoggingConfig {
    /// Filter directive scoping the level to the guard's events
    ///
    /// Suitable for `EnvFilter::new` or as one entry of a larger filter.
    pub fn filter_directive(&self) -> Option<String> {
        self.level
            .as_deref()
            .map(|level| format!("{}={}", GUARD_LOG_TARGET, level))
    }
}

/// Target prefix of every event the guard crate logs
pub const GUARD_LOG_TARGET: &str = "codegen_guard";


impl Config {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml(&read(path.as_ref())?)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&read(path.as_ref())?)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        write(path.as_ref(), yaml)
    }

    /// Save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write(path.as_ref(), json)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Merge with another configuration (other takes precedence)
    pub fn merge(&mut self, other: Config) -> Result<()> {
        if other.version != self.version {
            return Err(ConfigError::VersionMismatch {
                expected: self.version.clone(),
                found: other.version,
            });
        }

        if let Some(metadata) = other.metadata {
            self.metadata = Some(metadata);
        }

        self.guard = other.guard;

        if let Some(compatibility) = other.compatibility {
            self.compatibility = Some(compatibility);
        }

        if let Some(level) = other.logging.level {
            self.logging.level = Some(level);
        }

        Ok(())
    }

    /// Compatibility table in effect: the override, or the built-in one
    pub fn compatibility_table(&self) -> CompatibilityTable {
        self.compatibility.clone().unwrap_or_default()
    }

    /// Initialize a guard for `host` from this configuration
    pub fn initialize_guard<Cx: ?Sized>(&self, host: &HostRuntime) -> Result<CodegenGuard<Cx>> {
        let guard =
            CodegenGuard::initialize(host, self.guard.clone(), &self.compatibility_table())?;
        Ok(guard)
    }
}

impl Default for Config {
    fn default() -> Self {
        defaults::default_config()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        defaults::default_logging_config()
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| ConfigError::io(path, err))
}

fn write(path: &Path, contents: String) -> Result<()> {
    std::fs::write(path, contents).map_err(|err| ConfigError::io(path, err))
}
