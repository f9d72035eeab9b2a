//! Default configuration values

use codegen_guard::GuardSettings;

use crate::*;

/// Configuration format version written by this crate
pub const CONFIG_VERSION: &str = "1.0";

/// File names looked for in each search directory, in order
pub const CONFIG_FILE_NAMES: [&str; 6] = [
    "codegen-guard.yaml",
    "codegen-guard.yml",
    "codegen-guard.json",
    ".codegen-guard.yaml",
    ".codegen-guard.yml",
    ".codegen-guard.json",
];

/// Create a default configuration
pub fn default_config() -> Config {
    Config {
        version: CONFIG_VERSION.to_string(),
        metadata: None,
        guard: GuardSettings::default(),
        compatibility: None,
        logging: default_logging_config(),
    }
}

pub fn default_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: Some("info".to_string()),
    }
}
