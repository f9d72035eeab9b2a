//! Declarative source-matching policy

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    core::{CandidateSource, PolicyCallable, PolicyReturn},
    error::{GuardError, Result},
};

/// One blocking rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRule {
    /// Glob matched against the whole candidate source
    pub pattern: String,
    /// Error text surfaced when the rule matches
    pub message: String,
}

/// Policy that blocks on the first matching rule, in declaration order
#[derive(Clone, Debug)]
pub struct RulePolicy {
    rules: Vec<SourceRule>,
    patterns: GlobSet,
}

impl RulePolicy {
    /// Compile `rules`
    pub fn compile(rules: &[SourceRule]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for rule in rules {
            if rule.pattern.is_empty() {
                return Err(GuardError::settings("rule pattern cannot be empty"));
            }
            builder.add(compile_glob(&rule.pattern)?);
        }

        Ok(RulePolicy {
            rules: rules.to_vec(),
            patterns: builder.build()?,
        })
    }

    /// Message of the first rule matching `source`
    pub fn first_match(&self, source: &str) -> Option<&str> {
        self.patterns
            .matches(source)
            .into_iter()
            .min()
            .map(|idx| self.rules[idx].message.as_str())
    }

    /// Number of compiled rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules were given
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// Sources contain `/`, so `*` must match across it.
fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map_err(|e| {
            GuardError::GlobError(format!("Invalid glob pattern '{}': {}", pattern, e))
        })
}

impl<Cx: ?Sized> PolicyCallable<Cx> for RulePolicy {
    fn call(&self, _cx: &mut Cx, source: &CandidateSource) -> Result<PolicyReturn> {
        // Matching only needs a view of the text; unpaired surrogates are
        // escaped instead of failing so a rule still sees the rest of it.
        let text = source.to_utf8_escaped();
        Ok(match self.first_match(&text) {
            Some(message) => PolicyReturn::Text(message.into()),
            None => PolicyReturn::Nothing,
        })
    }

    fn describe(&self) -> &str {
        "rules"
    }
}
