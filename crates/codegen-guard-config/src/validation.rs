//! Configuration validation

use semver::Version;

use crate::{Config, ConfigError, LoggingConfig, Result};

/// Validate a configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_version(&config.version)?;
    validate_logging_config(&config.logging)?;

    config.guard.validate()?;

    if let Some(ref table) = config.compatibility {
        table.validate()?;
    }

    Ok(())
}

fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(ConfigError::Invalid(
            "Version cannot be empty".to_string(),
        ));
    }

    let parsed = parse_format_version(version).ok_or_else(|| ConfigError::InvalidValue {
        field: "version".to_string(),
        value: version.to_string(),
    })?;

    if parsed.major != 1 {
        return Err(ConfigError::Invalid(format!(
            "Unsupported configuration version: {}",
            version
        )));
    }

    Ok(())
}

/// Read `1`, `1.2` or `1.2.3` as a semver version
fn parse_format_version(version: &str) -> Option<Version> {
    let components = version.split('.').count();
    let padded = match components {
        1 => format!("{}.0.0", version),
        2 => format!("{}.0", version),
        _ => version.to_string(),
    };
    Version::parse(&padded).ok()
}

fn validate_logging_config(logging: &LoggingConfig) -> Result<()> {
    if let Some(ref level) = logging.level {
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Invalid log level: {}",
                    level
                )));
            }
        }
    }

    Ok(())
}
