//! Per-environment policy registry
//!
//! The registry is a copy-on-write map published through one atomic pointer.
//! Replacing a policy publishes a new map; an interception already in flight
//! keeps the `Arc<Registration>` it loaded until it finishes.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use arc_swap::ArcSwap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{core::PolicyCallable, environment::EnvironmentId};

/// A policy paired with the environment it was registered under
pub struct Registration<Cx: ?Sized> {
    environment: EnvironmentId,
    policy: Arc<dyn PolicyCallable<Cx>>,
    generation: u64,
    // Shared by every registration of the same environment.
    running: Arc<AtomicBool>,
}

impl<Cx: ?Sized> Registration<Cx> {
    /// Environment this policy applies to
    pub fn environment(&self) -> EnvironmentId {
        self.environment
    }

    /// The stored policy
    pub fn policy(&self) -> &dyn PolicyCallable<Cx> {
        self.policy.as_ref()
    }

    /// Registry-wide sequence number of this registration
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a policy for this environment is currently being evaluated
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Mark the policy as running until the returned call is dropped
    ///
    /// Returns `None` if a policy for the environment is already running,
    /// i.e. the policy itself triggered another code generation attempt.
    pub(crate) fn enter(&self) -> Option<PolicyCall<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PolicyCall {
                running: &self.running,
            })
    }
}

/// An evaluation in progress; clears the running flag on drop, unwinding included
pub(crate) struct PolicyCall<'a> {
    running: &'a AtomicBool,
}

impl Drop for PolicyCall<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl<Cx: ?Sized> fmt::Debug for Registration<Cx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("environment", &self.environment)
            .field("policy", &self.policy.describe())
            .field("generation", &self.generation)
            .field("running", &self.is_running())
            .finish()
    }
}

type Entries<Cx> = FxHashMap<EnvironmentId, Arc<Registration<Cx>>>;

/// Registry of active policies, one per environment
pub struct HookRegistry<Cx: ?Sized> {
    entries: ArcSwap<Entries<Cx>>,
    installed: ArcSwap<FxHashSet<EnvironmentId>>,
    generation: AtomicU64,
}

impl<Cx: ?Sized> HookRegistry<Cx> {
    /// Create an empty registry
    pub fn new() -> Self {
        HookRegistry {
            entries: ArcSwap::from_pointee(FxHashMap::default()),
            installed: ArcSwap::from_pointee(FxHashSet::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Active registration for `environment`
    #[inline]
    pub fn lookup(&self, environment: EnvironmentId) -> Option<Arc<Registration<Cx>>> {
        self.entries.load().get(&environment).cloned()
    }

    /// Publish `policy` for `environment`, returning the registration it replaced
    pub fn replace(
        &self,
        environment: EnvironmentId,
        policy: Arc<dyn PolicyCallable<Cx>>,
    ) -> Option<Arc<Registration<Cx>>> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = self.entries.rcu(|current| {
            let running = current
                .get(&environment)
                .map(|active| Arc::clone(&active.running))
                .unwrap_or_default();
            let mut next = Entries::clone(current);
            next.insert(
                environment,
                Arc::new(Registration {
                    environment,
                    policy: Arc::clone(&policy),
                    generation,
                    running,
                }),
            );
            next
        });
        previous.get(&environment).cloned()
    }

    /// Drop the registration for `environment`; the hook stays armed
    pub fn remove(&self, environment: EnvironmentId) -> Option<Arc<Registration<Cx>>> {
        let previous = self.entries.rcu(|current| {
            let mut next = Entries::clone(current);
            next.remove(&environment);
            next
        });
        previous.get(&environment).cloned()
    }

    /// Forget `environment` entirely, e.g. when its engine instance is torn down
    pub fn retire(&self, environment: EnvironmentId) -> Option<Arc<Registration<Cx>>> {
        let removed = self.remove(environment);
        self.installed.rcu(|current| {
            let mut next = FxHashSet::clone(current);
            next.remove(&environment);
            next
        });
        removed
    }

    /// Forget every environment
    pub fn clear(&self) {
        self.entries.store(Arc::new(FxHashMap::default()));
        self.installed.store(Arc::new(FxHashSet::default()));
    }

    /// Record that the interceptor is armed for `environment`
    ///
    /// Returns `true` only the first time for a given environment.
    pub fn mark_installed(&self, environment: EnvironmentId) -> bool {
        let previous = self.installed.rcu(|current| {
            let mut next = FxHashSet::clone(current);
            next.insert(environment);
            next
        });
        !previous.contains(&environment)
    }

    /// Whether the interceptor is armed for `environment`
    pub fn is_installed(&self, environment: EnvironmentId) -> bool {
        self.installed.load().contains(&environment)
    }

    /// Number of environments with an active policy
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// True when no policy is registered anywhere
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

impl<Cx: ?Sized> Default for HookRegistry<Cx> {
    fn default() -> Self {
        Self::new()
    }
}
