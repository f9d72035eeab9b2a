//! Guard settings

use serde::{Deserialize, Serialize};

use crate::{
    core::FailureMode,
    error::{DEFAULT_BLOCKED_MESSAGE, GuardError, Result},
    invoker::PolicyInvoker,
    rules::{RulePolicy, SourceRule},
};

/// Behavior knobs for the guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Decision when the policy itself fails
    #[serde(default)]
    pub failure_mode: FailureMode,

    /// Message used when failing closed
    #[serde(default)]
    pub blocked_message: Option<String>,

    /// Declarative rules, registered as a policy when present
    #[serde(default)]
    pub rules: Option<Vec<SourceRule>>,

    /// Include a short source preview in debug logs
    #[serde(default)]
    pub log_candidates: bool,
}

impl GuardSettings {
    /// Parse settings from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: GuardSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: GuardSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Fail closed instead of open
    pub fn fail_closed(mut self) -> Self {
        self.failure_mode = FailureMode::Closed;
        self
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if let Some(rules) = &self.rules {
            if rules.iter().any(|rule| rule.pattern.trim().is_empty()) {
                return Err(GuardError::settings("rule pattern cannot be empty"));
            }
            RulePolicy::compile(rules)?;
        }
        Ok(())
    }

    /// Message used when failing closed
    pub fn blocked_message(&self) -> &str {
        self.blocked_message
            .as_deref()
            .unwrap_or(DEFAULT_BLOCKED_MESSAGE)
    }

    /// Build the invoker these settings describe
    pub fn invoker(&self) -> PolicyInvoker {
        PolicyInvoker::new(self.failure_mode)
            .with_fallback_message(self.blocked_message())
            .with_candidate_logging(self.log_candidates)
    }

    /// Compile the configured rules, if any
    pub fn rule_policy(&self) -> Result<Option<RulePolicy>> {
        self.rules
            .as_deref()
            .map(RulePolicy::compile)
            .transpose()
    }
}

impl Default for GuardSettings {
    fn default() -> Self {
        GuardSettings {
            failure_mode: FailureMode::Open,
            blocked_message: None,
            rules: None,
            log_candidates: false,
        }
    }
}
