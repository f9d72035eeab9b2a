//! Initialized guard: the object owning policies for one runtime instance

use std::sync::Arc;

use crate::{
    bridge::InterceptionBridge,
    compat::{CompatibilityTable, HostRuntime, HostVersion},
    core::{GenerationAttempt, InterceptorSlot, PolicyArgument, PolicyDecision},
    environment::EnvironmentId,
    error::Result,
    registrar::HookRegistrar,
    registry::HookRegistry,
    settings::GuardSettings,
};

/// Code generation guard bound to one host runtime
///
/// Only [`CodegenGuard::initialize`] constructs one, and it runs the
/// compatibility gate first: against an unsupported host there is no guard and
/// therefore no operation to call. Dropping the guard releases every policy
/// it holds, including ones still referenced by an installed bridge.
pub struct CodegenGuard<Cx: ?Sized> {
    host: HostRuntime,
    version: HostVersion,
    settings: GuardSettings,
    registry: Arc<HookRegistry<Cx>>,
    registrar: HookRegistrar<Cx>,
    bridge: InterceptionBridge<Cx>,
}

impl<Cx: ?Sized> CodegenGuard<Cx> {
    /// Check `host` against `table` and build the guard
    pub fn initialize(
        host: &HostRuntime,
        settings: GuardSettings,
        table: &CompatibilityTable,
    ) -> Result<Self> {
        let version = table.check(host)?;
        settings.validate()?;

        let registry = Arc::new(HookRegistry::new());
        let registrar = HookRegistrar::new(Arc::clone(&registry));
        let bridge = InterceptionBridge::new(Arc::clone(&registry), settings.invoker());

        tracing::info!(
            host = %host,
            failure_mode = %settings.failure_mode,
            "code generation guard initialized"
        );

        Ok(CodegenGuard {
            host: host.clone(),
            version,
            settings,
            registry,
            registrar,
            bridge,
        })
    }

    /// Register `argument` as the policy for `environment`
    pub fn register(
        &self,
        environment: EnvironmentId,
        argument: PolicyArgument<Cx>,
        slot: &dyn InterceptorSlot,
    ) -> Result<()> {
        self.registrar.register(environment, argument, slot)
    }

    /// Register the configured rule policy for `environment`
    ///
    /// Returns `false` when the settings carry no rules.
    pub fn register_configured_rules(
        &self,
        environment: EnvironmentId,
        slot: &dyn InterceptorSlot,
    ) -> Result<bool> {
        match self.settings.rule_policy()? {
            Some(rules) => {
                self.register(environment, PolicyArgument::callable(rules), slot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Decide one attempt
    #[inline]
    pub fn intercept(&self, cx: &mut Cx, attempt: &GenerationAttempt) -> PolicyDecision {
        self.bridge.intercept(cx, attempt)
    }

    /// Remove the policy for `environment`
    pub fn unregister(&self, environment: EnvironmentId) -> bool {
        self.registrar.unregister(environment)
    }

    /// Forget `environment` when its engine instance goes away
    pub fn retire_environment(&self, environment: EnvironmentId) {
        if self.registry.retire(environment).is_some() {
            tracing::debug!(%environment, "environment retired with active policy");
        }
    }

    /// Whether a policy is active for `environment`
    pub fn is_registered(&self, environment: EnvironmentId) -> bool {
        self.registry.lookup(environment).is_some()
    }

    /// Whether the hook has been armed for `environment`
    pub fn is_installed(&self, environment: EnvironmentId) -> bool {
        self.registry.is_installed(environment)
    }

    /// Bridge handle for wiring into an engine hook
    pub fn bridge(&self) -> InterceptionBridge<Cx> {
        self.bridge.clone()
    }

    /// Registrar handle for wiring into a script-visible function
    pub fn registrar(&self) -> HookRegistrar<Cx> {
        self.registrar.clone()
    }

    /// Settings in effect
    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// Host runtime this guard was initialized against
    pub fn host(&self) -> &HostRuntime {
        &self.host
    }

    /// Parsed host version
    pub fn host_version(&self) -> &HostVersion {
        &self.version
    }
}

impl<Cx: ?Sized> Drop for CodegenGuard<Cx> {
    fn drop(&mut self) {
        self.registry.clear();
    }
}
