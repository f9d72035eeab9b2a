//! Execution environment identity and the guard that scopes policies to it

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::registry::{HookRegistry, Registration};

static NEXT_ENVIRONMENT: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one engine instance (realm, context, isolate)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentId(u64);

impl EnvironmentId {
    /// Mint a process-unique identity
    pub fn next() -> Self {
        EnvironmentId(NEXT_ENVIRONMENT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logs
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env#{}", self.0)
    }
}

/// Admits an attempt only under the environment its policy was registered for
///
/// The registry is keyed by environment, so the lookup for the invoking
/// environment is the whole check: a policy registered elsewhere is never
/// found. Finding nothing is never an error; the attempt proceeds as if no
/// policy were registered.
pub struct EnvironmentGuard;

impl EnvironmentGuard {
    /// Registration applicable to `invoking`, if any
    pub fn admit<Cx: ?Sized>(
        registry: &HookRegistry<Cx>,
        invoking: EnvironmentId,
    ) -> Option<Arc<Registration<Cx>>> {
        let registration = registry.lookup(invoking);
        if registration.is_none() {
            tracing::trace!(environment = %invoking, "no policy registered");
        }
        registration
    }
}
