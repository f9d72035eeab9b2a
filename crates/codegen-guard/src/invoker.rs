//! Calls a stored policy and classifies what it returns

use std::panic::{self, AssertUnwindSafe};

use crate::{
    core::{CandidateSource, FailureMode, PolicyCallable, PolicyDecision, PolicyReturn},
    error::{DEFAULT_BLOCKED_MESSAGE, GuardError},
    text::HostString,
};

/// Runs a policy on a candidate source and turns the result into a decision
///
/// Failures never leave the invoker: a policy error or panic resolves to the
/// configured [`FailureMode`].
#[derive(Clone, Debug)]
pub struct PolicyInvoker {
    failure_mode: FailureMode,
    fallback_message: HostString,
    log_candidates: bool,
}

impl PolicyInvoker {
    /// Invoker with the given failure mode and the default fallback message
    pub fn new(failure_mode: FailureMode) -> Self {
        PolicyInvoker {
            failure_mode,
            fallback_message: HostString::from(DEFAULT_BLOCKED_MESSAGE),
            log_candidates: false,
        }
    }

    /// Message used when failing closed
    pub fn with_fallback_message(mut self, message: impl Into<HostString>) -> Self {
        self.fallback_message = message.into();
        self
    }

    /// Include a short source preview in debug logs
    pub fn with_candidate_logging(mut self, enabled: bool) -> Self {
        self.log_candidates = enabled;
        self
    }

    /// Configured failure mode
    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Evaluate `policy` for `source`
    pub fn invoke<Cx: ?Sized>(
        &self,
        policy: &dyn PolicyCallable<Cx>,
        cx: &mut Cx,
        source: &CandidateSource,
    ) -> PolicyDecision {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| policy.call(cx, source)));

        let decision = match outcome {
            Ok(Ok(returned)) => Self::classify(returned),
            Ok(Err(err)) => self.on_failure(policy.describe(), err),
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                self.on_failure(policy.describe(), GuardError::invocation(reason))
            }
        };

        if let PolicyDecision::Block { message } = &decision {
            if self.log_candidates {
                tracing::debug!(
                    policy = policy.describe(),
                    source_units = source.len_utf16(),
                    preview = %source.preview(64),
                    message = %message,
                    "code generation blocked"
                );
            } else {
                tracing::debug!(
                    policy = policy.describe(),
                    source_units = source.len_utf16(),
                    "code generation blocked"
                );
            }
        }

        decision
    }

    /// Map a policy's return value to a decision
    ///
    /// Strings block with that exact text; everything else allows.
    pub fn classify(returned: PolicyReturn) -> PolicyDecision {
        match returned {
            PolicyReturn::Text(message) => PolicyDecision::Block { message },
            PolicyReturn::Nothing | PolicyReturn::AllowSentinel => PolicyDecision::Allow,
            PolicyReturn::Other(type_name) => {
                tracing::trace!(%type_name, "non-string policy result treated as allow");
                PolicyDecision::Allow
            }
        }
    }

    fn on_failure(&self, policy: &str, err: GuardError) -> PolicyDecision {
        tracing::warn!(
            policy,
            error = %err,
            mode = %self.failure_mode,
            "policy invocation failed"
        );
        match self.failure_mode {
            FailureMode::Open => PolicyDecision::Allow,
            FailureMode::Closed => PolicyDecision::Block {
                message: self.fallback_message.clone(),
            },
        }
    }
}

impl Default for PolicyInvoker {
    fn default() -> Self {
        Self::new(FailureMode::default())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("policy panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("policy panicked: {}", s)
    } else {
        "policy panicked".to_string()
    }
}
