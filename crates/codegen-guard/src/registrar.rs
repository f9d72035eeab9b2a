//! The single exposed registration operation

use std::sync::Arc;

use crate::{
    core::{InterceptorSlot, PolicyArgument},
    environment::EnvironmentId,
    error::{GuardError, Result},
    registry::HookRegistry,
};

/// Name of the registration operation at the script surface
pub const REGISTRATION_EXPORT: &str = "setCodeGenerationCallback";

/// Error text for a missing or non-callable registration argument
pub const EXPECTED_CALLBACK: &str = "Expected a callback function";

/// Validates and stores policies, arming the engine hook once per environment
pub struct HookRegistrar<Cx: ?Sized> {
    registry: Arc<HookRegistry<Cx>>,
}

impl<Cx: ?Sized> HookRegistrar<Cx> {
    /// Create a registrar writing into `registry`
    pub fn new(registry: Arc<HookRegistry<Cx>>) -> Self {
        HookRegistrar { registry }
    }

    /// Register a policy for `environment`
    ///
    /// A missing or non-callable argument fails with [`GuardError::Argument`]
    /// and changes nothing. Otherwise the hook is armed (first time only) and
    /// the policy replaces whatever was active for the environment.
    pub fn register(
        &self,
        environment: EnvironmentId,
        argument: PolicyArgument<Cx>,
        slot: &dyn InterceptorSlot,
    ) -> Result<()> {
        let policy = match argument {
            PolicyArgument::Callable(policy) => policy,
            PolicyArgument::Missing => {
                return Err(GuardError::argument(EXPECTED_CALLBACK));
            }
            PolicyArgument::NotCallable { type_name } => {
                tracing::debug!(%type_name, "rejected non-callable policy");
                return Err(GuardError::argument(EXPECTED_CALLBACK));
            }
        };

        if !self.registry.is_installed(environment) {
            slot.install(environment)?;
            self.registry.mark_installed(environment);
            tracing::debug!(%environment, "code generation interceptor installed");
        }

        let label = policy.describe().to_string();
        match self.registry.replace(environment, policy) {
            Some(previous) => tracing::debug!(
                %environment,
                policy = %label,
                replaced_generation = previous.generation(),
                "code generation policy replaced"
            ),
            None => tracing::info!(
                %environment,
                policy = %label,
                "code generation policy registered"
            ),
        }

        Ok(())
    }

    /// Remove the policy for `environment`
    pub fn unregister(&self, environment: EnvironmentId) -> bool {
        let removed = self.registry.remove(environment).is_some();
        if removed {
            tracing::info!(%environment, "code generation policy removed");
        }
        removed
    }
}

impl<Cx: ?Sized> Clone for HookRegistrar<Cx> {
    fn clone(&self) -> Self {
        HookRegistrar {
            registry: Arc::clone(&self.registry),
        }
    }
}
