//! Policies written as Rust closures

use std::fmt;

use crate::{
    core::{CandidateSource, IntoPolicyReturn, PolicyCallable, PolicyReturn},
    error::Result,
};

/// A Rust closure used as a code generation policy
///
/// The closure sees the candidate source as `&str`. A source that cannot be
/// represented exactly as UTF-8 is reported as an invocation failure rather
/// than handed over with substitutions.
pub struct NativePolicy<F> {
    name: String,
    f: F,
}

impl<F> NativePolicy<F> {
    /// Wrap `f`
    pub fn new<R>(f: F) -> Self
    where
        F: Fn(&str) -> R,
        R: IntoPolicyReturn,
    {
        NativePolicy {
            name: "native".to_string(),
            f,
        }
    }

    /// Label used in log lines
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<Cx: ?Sized, F, R> PolicyCallable<Cx> for NativePolicy<F>
where
    F: Fn(&str) -> R,
    R: IntoPolicyReturn,
{
    fn call(&self, _cx: &mut Cx, source: &CandidateSource) -> Result<PolicyReturn> {
        let text = source.to_utf8()?;
        (self.f)(&*text).into_policy_return()
    }

    fn describe(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for NativePolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativePolicy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
