//! Error types for the code generation guard

use thiserror::Error;

/// Result type alias for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;

/// Message used when a blocked attempt has no policy-supplied text
pub const DEFAULT_BLOCKED_MESSAGE: &str = "Code generation from strings disallowed for this context";

/// Main error type for guard operations
#[derive(Error, Debug)]
pub enum GuardError {
    /// Registration called with a missing or non-callable argument
    #[error("{0}")]
    Argument(String),

    /// The host runtime version is outside the supported range
    #[error(
        "Unsupported {engine} version {found} (supported majors: {min_major}..={max_major})"
    )]
    UnsupportedHostVersion {
        /// Engine name as reported by the host
        engine: String,
        /// Version string as reported by the host
        found: String,
        /// Lowest supported major version
        min_major: u64,
        /// Highest supported major version
        max_major: u64,
    },

    /// The host runtime is not listed in the compatibility table
    #[error("No compatibility entry for engine {0}")]
    UnknownEngine(String),

    /// The host runtime version string could not be read
    #[error("Invalid host version '{version}': {reason}")]
    InvalidHostVersion {
        /// Raw version string
        version: String,
        /// Why it was rejected
        reason: String,
    },

    /// The policy raised or failed while evaluating a candidate source
    #[error("Policy invocation failed: {0}")]
    PolicyInvocation(String),

    /// The policy blocked code generation
    #[error("{message}")]
    GenerationBlocked {
        /// Text surfaced to the attempting script
        message: String,
    },

    /// A host string could not be converted without loss
    #[error("Transcoding error: {0}")]
    Transcoding(String),

    /// The engine refused to install the interceptor
    #[error("Failed to install interceptor: {0}")]
    Install(String),

    /// Guard settings are invalid
    #[error("Invalid guard settings: {0}")]
    Settings(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Glob pattern error
    #[error("Glob pattern error: {0}")]
    GlobError(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<globset::Error> for GuardError {
    fn from(err: globset::Error) -> Self {
        GuardError::GlobError(err.to_string())
    }
}

impl GuardError {
    /// Create an argument error with context
    pub fn argument<S: Into<String>>(msg: S) -> Self {
        GuardError::Argument(msg.into())
    }

    /// Create a policy invocation error with context
    pub fn invocation<S: Into<String>>(msg: S) -> Self {
        GuardError::PolicyInvocation(msg.into())
    }

    /// Create a settings error with context
    pub fn settings<S: Into<String>>(msg: S) -> Self {
        GuardError::Settings(msg.into())
    }

    /// True for the errors the gate raises at initialization
    pub fn is_compatibility_error(&self) -> bool {
        matches!(
            self,
            GuardError::UnsupportedHostVersion { .. }
                | GuardError::UnknownEngine(_)
                | GuardError::InvalidHostVersion { .. }
        )
    }
}
