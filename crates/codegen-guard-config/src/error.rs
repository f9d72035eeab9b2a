//! Failures while reading, checking or applying a configuration document

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document parsed but breaks a rule of the format
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Two documents of different format versions were merged
    #[error("configuration version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// The file extension names no format this crate reads
    #[error("unsupported configuration format '{extension}' (expected yaml, yml or json)")]
    UnsupportedFormat { extension: String },

    #[error("no configuration file at {}", .0.display())]
    NotFound(PathBuf),

    /// Guard settings or the compatibility table were rejected by the guard
    #[error(transparent)]
    Guard(#[from] codegen_guard::GuardError),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}
