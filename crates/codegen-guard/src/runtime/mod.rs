//! Script engine backend implementations
//!
//! A backend wires the portable guard into one engine: it turns the engine's
//! code generation hook into [`GenerationAttempt`](crate::GenerationAttempt)s,
//! exposes the registration function to scripts and maps decisions back into
//! engine errors.

#[cfg(feature = "boa-backend")]
pub mod boa;

use crate::{core::InterceptorSlot, environment::EnvironmentId, error::Result};

/// Slot for engines whose hook is wired once at construction
///
/// Such engines consult the guard on every attempt already; arming an
/// environment only needs to be recorded, which the registry does.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrewiredSlot;

impl InterceptorSlot for PrewiredSlot {
    fn install(&self, environment: EnvironmentId) -> Result<()> {
        tracing::trace!(%environment, "hook pre-wired at engine construction");
        Ok(())
    }
}

impl<F> InterceptorSlot for F
where
    F: Fn(EnvironmentId) -> Result<()>,
{
    fn install(&self, environment: EnvironmentId) -> Result<()> {
        self(environment)
    }
}
