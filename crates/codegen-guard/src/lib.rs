//! # Code generation guard
//!
//! An interception point for script engines that can compile and run code
//! from strings at runtime (`eval`, `new Function`, and friends). A host
//! registers a policy; the engine consults it on every attempt and either
//! proceeds or raises the policy's message back into the attempting script.
//!
//! ## Features
//! - One active policy per execution environment, replaced atomically
//! - Policies never apply outside the environment that registered them
//! - Policy errors and panics never reach the engine (fail-open by default,
//!   fail-closed on request)
//! - Compatibility gate refusing to initialize against untested engines
//! - Engine agnostic core; the Boa backend sits behind `boa-backend`

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod compat;
pub mod core;
pub mod environment;
pub mod error;
pub mod guard;
pub mod invoker;
pub mod native;
pub mod registrar;
pub mod registry;
pub mod rules;
pub mod runtime;
pub mod settings;
pub mod text;

// Re-export main types
pub use crate::core::{
    CandidateSource, FailureMode, GenerationAttempt, InterceptorSlot, IntoPolicyReturn,
    PolicyArgument, PolicyCallable, PolicyDecision, PolicyReturn,
};

pub use bridge::InterceptionBridge;
pub use compat::{CompatibilityEntry, CompatibilityTable, HostRuntime, HostVersion};
pub use environment::{EnvironmentGuard, EnvironmentId};
pub use error::{DEFAULT_BLOCKED_MESSAGE, GuardError, Result};
pub use guard::CodegenGuard;
pub use invoker::PolicyInvoker;
pub use native::NativePolicy;
pub use registrar::{EXPECTED_CALLBACK, HookRegistrar, REGISTRATION_EXPORT};
pub use registry::{HookRegistry, Registration};
pub use rules::{RulePolicy, SourceRule};
#[cfg(feature = "boa-backend")]
pub use runtime::boa::BoaGuardedContext;
pub use settings::GuardSettings;
pub use text::HostString;

#[cfg(test)]
mod tests;
