//! Core trait definitions and decision types
//!
//! Everything engine specific sits behind two seams: [`PolicyCallable`] calls a
//! stored policy with the engine's per-call context, and [`InterceptorSlot`]
//! arms the engine's code generation hook for one environment. The rest of the
//! crate (argument validation, classification, error formatting) is portable.

use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Serialize};

use crate::{
    environment::EnvironmentId,
    error::{GuardError, Result},
    text::HostString,
};

/// The string proposed for compilation, built per attempt and never stored
pub type CandidateSource = HostString;

/// A stored policy, callable under the engine's calling convention
///
/// `Cx` is whatever the engine hands the hook for the duration of one call,
/// e.g. a script context. Engines that need nothing use `()`.
pub trait PolicyCallable<Cx: ?Sized> {
    /// Evaluate the policy for one candidate source
    fn call(&self, cx: &mut Cx, source: &CandidateSource) -> Result<PolicyReturn>;

    /// Short label for log lines
    fn describe(&self) -> &str {
        "policy"
    }
}

/// Engine extension point that accepts the interception bridge
pub trait InterceptorSlot {
    /// Arm the code generation hook for `environment`
    fn install(&self, environment: EnvironmentId) -> Result<()>;
}

/// Portable view of what a policy handed back, before classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyReturn {
    /// No value at all (`undefined`, unit)
    Nothing,
    /// The explicit allow sentinel (`null`)
    AllowSentinel,
    /// A string; blocks with this text
    Text(HostString),
    /// Anything else, tagged with its type name
    Other(String),
}

/// Outcome handed back to the engine for one attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Let code generation proceed
    Allow,
    /// Refuse code generation and surface `message` to the script
    Block {
        /// Error text for the attempting script
        message: HostString,
    },
}

impl PolicyDecision {
    /// Block with the given message
    pub fn block(message: impl Into<HostString>) -> Self {
        PolicyDecision::Block {
            message: message.into(),
        }
    }

    /// True for [`PolicyDecision::Allow`]
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }

    /// Block message, if any
    pub fn message(&self) -> Option<&HostString> {
        match self {
            PolicyDecision::Allow => None,
            PolicyDecision::Block { message } => Some(message),
        }
    }

    /// Convert into the error an engine surfaces to the attempting script
    pub fn into_result(self) -> Result<()> {
        match self {
            PolicyDecision::Allow => Ok(()),
            PolicyDecision::Block { message } => Err(GuardError::GenerationBlocked {
                message: message.to_utf8_escaped().into_owned(),
            }),
        }
    }
}

impl Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyDecision::Allow => f.write_str("allow"),
            PolicyDecision::Block { .. } => f.write_str("block"),
        }
    }
}

/// Decision taken when evaluating the policy itself fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Allow the attempt
    #[default]
    Open,
    /// Block the attempt with the fallback message
    Closed,
}

impl Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureMode::Open => f.write_str("fail-open"),
            FailureMode::Closed => f.write_str("fail-closed"),
        }
    }
}

/// One code-generation-from-string attempt as reported by the engine
#[derive(Clone, Debug)]
pub struct GenerationAttempt {
    /// Environment the attempt runs under
    pub environment: EnvironmentId,
    /// Proposed source text
    pub source: CandidateSource,
    /// Whether the call site treats the value as executable code
    pub is_code_like: bool,
}

impl GenerationAttempt {
    /// A code-like attempt under `environment`
    pub fn new(environment: EnvironmentId, source: impl Into<CandidateSource>) -> Self {
        GenerationAttempt {
            environment,
            source: source.into(),
            is_code_like: true,
        }
    }

    /// Override the code-like flag
    pub fn code_like(mut self, is_code_like: bool) -> Self {
        self.is_code_like = is_code_like;
        self
    }
}

/// Argument handed to the registration operation, classified by the engine
pub enum PolicyArgument<Cx: ?Sized> {
    /// No argument was supplied
    Missing,
    /// A value that cannot be called
    NotCallable {
        /// Type name of the offending value
        type_name: String,
    },
    /// A callable policy
    Callable(std::sync::Arc<dyn PolicyCallable<Cx>>),
}

impl<Cx: ?Sized> PolicyArgument<Cx> {
    /// Wrap a callable policy
    pub fn callable<P>(policy: P) -> Self
    where
        P: PolicyCallable<Cx> + 'static,
    {
        PolicyArgument::Callable(std::sync::Arc::new(policy))
    }

    /// A non-callable value of the given type
    pub fn not_callable(type_name: impl Into<String>) -> Self {
        PolicyArgument::NotCallable {
            type_name: type_name.into(),
        }
    }
}

impl<Cx: ?Sized> Debug for PolicyArgument<Cx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyArgument::Missing => f.write_str("Missing"),
            PolicyArgument::NotCallable { type_name } => f
                .debug_struct("NotCallable")
                .field("type_name", type_name)
                .finish(),
            PolicyArgument::Callable(policy) => {
                f.debug_tuple("Callable").field(&policy.describe()).finish()
            }
        }
    }
}

/// Conversion of a policy's native return value into [`PolicyReturn`]
pub trait IntoPolicyReturn {
    /// Convert, reporting policy failures as errors
    fn into_policy_return(self) -> Result<PolicyReturn>;
}

impl IntoPolicyReturn for PolicyReturn {
    fn into_policy_return(self) -> Result<PolicyReturn> {
        Ok(self)
    }
}

impl IntoPolicyReturn for () {
    fn into_policy_return(self) -> Result<PolicyReturn> {
        Ok(PolicyReturn::Nothing)
    }
}

impl IntoPolicyReturn for String {
    fn into_policy_return(self) -> Result<PolicyReturn> {
        Ok(PolicyReturn::Text(self.into()))
    }
}

impl IntoPolicyReturn for &str {
    fn into_policy_return(self) -> Result<PolicyReturn> {
        Ok(PolicyReturn::Text(self.into()))
    }
}

impl IntoPolicyReturn for bool {
    fn into_policy_return(self) -> Result<PolicyReturn> {
        Ok(PolicyReturn::Other("boolean".to_string()))
    }
}

impl<T: IntoPolicyReturn> IntoPolicyReturn for Option<T> {
    fn into_policy_return(self) -> Result<PolicyReturn> {
        match self {
            Some(value) => value.into_policy_return(),
            None => Ok(PolicyReturn::Nothing),
        }
    }
}

impl<T: IntoPolicyReturn, E: Display> IntoPolicyReturn for std::result::Result<T, E> {
    fn into_policy_return(self) -> Result<PolicyReturn> {
        match self {
            Ok(value) => value.into_policy_return(),
            Err(e) => Err(GuardError::invocation(e.to_string())),
        }
    }
}
