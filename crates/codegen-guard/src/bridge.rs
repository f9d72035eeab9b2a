//! The function the engine calls on every code generation attempt

use std::sync::Arc;

use crate::{
    core::{GenerationAttempt, PolicyDecision},
    environment::EnvironmentGuard,
    invoker::PolicyInvoker,
    registry::HookRegistry,
};

/// Interception bridge between the engine hook and the stored policies
///
/// Runs synchronously on the engine's control flow path and always returns a
/// decision; no error or panic from a policy reaches the engine.
///
/// Attempts made while the environment's policy is running are nested inside
/// that policy call and resolve to [`PolicyDecision::Allow`] without
/// consulting it again. The outer attempt still waits on the policy's answer.
pub struct InterceptionBridge<Cx: ?Sized> {
    registry: Arc<HookRegistry<Cx>>,
    invoker: PolicyInvoker,
}

impl<Cx: ?Sized> InterceptionBridge<Cx> {
    /// Create a bridge reading from `registry`
    pub fn new(registry: Arc<HookRegistry<Cx>>, invoker: PolicyInvoker) -> Self {
        InterceptionBridge { registry, invoker }
    }

    /// Decide one attempt
    pub fn intercept(&self, cx: &mut Cx, attempt: &GenerationAttempt) -> PolicyDecision {
        let Some(registration) = EnvironmentGuard::admit(&self.registry, attempt.environment)
        else {
            return PolicyDecision::Allow;
        };

        // Code generated by the policy itself (a syntax check via
        // `new Function`, say) is not judged again by the same policy.
        let Some(_call) = registration.enter() else {
            tracing::debug!(
                environment = %attempt.environment,
                source_units = attempt.source.len_utf16(),
                "nested code generation inside running policy allowed"
            );
            return PolicyDecision::Allow;
        };

        tracing::trace!(
            environment = %attempt.environment,
            generation = registration.generation(),
            code_like = attempt.is_code_like,
            source_units = attempt.source.len_utf16(),
            "consulting code generation policy"
        );

        // `registration` pins this policy for the whole call even if it is
        // replaced from inside the policy itself.
        self.invoker
            .invoke(registration.policy(), cx, &attempt.source)
    }

    /// Invoker used for policy calls
    pub fn invoker(&self) -> &PolicyInvoker {
        &self.invoker
    }

    /// Registry consulted by this bridge
    pub fn registry(&self) -> &Arc<HookRegistry<Cx>> {
        &self.registry
    }
}

impl<Cx: ?Sized> Clone for InterceptionBridge<Cx> {
    fn clone(&self) -> Self {
        InterceptionBridge {
            registry: Arc::clone(&self.registry),
            invoker: self.invoker.clone(),
        }
    }
}
