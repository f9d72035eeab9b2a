//! A small in-process script engine driving the guard through its seams
//!
//! Every `eval` is a code-generation-from-string attempt. Allowed sources are
//! "executed" by summing `+`-separated integers, which is enough to tell a
//! successful evaluation from a blocked one.

use std::{cell::RefCell, rc::Rc};

use codegen_guard::{
    CandidateSource, CodegenGuard, CompatibilityTable, EnvironmentId, GenerationAttempt,
    GuardSettings, HostRuntime, HostString, PolicyArgument, PolicyCallable, PolicyDecision,
    PolicyReturn, Result,
};

/// Per-call context handed to policies
#[allow(dead_code)]
pub struct Scope {
    pub environment: EnvironmentId,
    pub depth: usize,
}

/// Policy with direct access to the engine scope and raw code units
#[allow(dead_code)]
pub struct ScriptFunction<F> {
    f: F,
}

impl<F> PolicyCallable<Scope> for ScriptFunction<F>
where
    F: Fn(&mut Scope, &CandidateSource) -> Result<PolicyReturn>,
{
    fn call(&self, cx: &mut Scope, source: &CandidateSource) -> Result<PolicyReturn> {
        cx.depth += 1;
        (self.f)(cx, source)
    }

    fn describe(&self) -> &str {
        "script"
    }
}

/// Wrap a closure as a script-level function argument
#[allow(dead_code)]
pub fn script<F>(f: F) -> PolicyArgument<Scope>
where
    F: Fn(&mut Scope, &CandidateSource) -> Result<PolicyReturn> + 'static,
{
    PolicyArgument::callable(ScriptFunction { f })
}

#[allow(dead_code)]
pub struct SimulatedEngine {
    guard: CodegenGuard<Scope>,
    installs: Rc<RefCell<Vec<EnvironmentId>>>,
}

#[allow(dead_code)]
impl SimulatedEngine {
    pub fn new() -> Self {
        Self::with_settings(GuardSettings::default())
    }

    pub fn with_settings(settings: GuardSettings) -> Self {
        Self::start(HostRuntime::new("v8", "12.4.254.21"), settings)
            .expect("supported host must initialize")
    }

    pub fn start(host: HostRuntime, settings: GuardSettings) -> Result<Self> {
        let guard = CodegenGuard::initialize(&host, settings, &CompatibilityTable::default())?;
        Ok(SimulatedEngine {
            guard,
            installs: Rc::new(RefCell::new(Vec::new())),
        })
    }

    pub fn create_environment(&self) -> EnvironmentId {
        EnvironmentId::next()
    }

    /// The script-visible registration function
    pub fn set_code_generation_callback(
        &self,
        environment: EnvironmentId,
        argument: PolicyArgument<Scope>,
    ) -> Result<()> {
        let installs = Rc::clone(&self.installs);
        let slot = move |environment: EnvironmentId| -> Result<()> {
            installs.borrow_mut().push(environment);
            Ok(())
        };
        self.guard.register(environment, argument, &slot)
    }

    /// Decision the engine would receive for `source`
    pub fn decide(
        &self,
        environment: EnvironmentId,
        source: impl Into<HostString>,
    ) -> PolicyDecision {
        let attempt = GenerationAttempt::new(environment, source);
        let mut scope = Scope {
            environment,
            depth: 0,
        };
        self.guard.intercept(&mut scope, &attempt)
    }

    /// Evaluate `source`, surfacing a block as the script-visible error
    pub fn eval(&self, environment: EnvironmentId, source: &str) -> Result<i64> {
        self.decide(environment, source).into_result()?;
        Ok(evaluate(source))
    }

    pub fn install_count(&self, environment: EnvironmentId) -> usize {
        self.installs
            .borrow()
            .iter()
            .filter(|installed| **installed == environment)
            .count()
    }

    pub fn guard(&self) -> &CodegenGuard<Scope> {
        &self.guard
    }
}

fn evaluate(source: &str) -> i64 {
    source
        .split('+')
        .map(|term| term.trim().parse::<i64>())
        .sum::<std::result::Result<i64, _>>()
        .unwrap_or(0)
}
