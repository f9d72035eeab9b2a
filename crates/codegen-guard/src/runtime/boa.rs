//! Boa script engine backend
//!
//! The guard is wired into Boa's `HostEnsureCanCompileStrings` hook when the
//! context is built, and scripts get a global `setCodeGenerationCallback`.
//! Realms are the execution environments: a policy registered from one realm
//! is never consulted for code generated in another.
//!
//! Boa takes its host hooks by `'static` reference, so one stateless hook
//! object serves every context. Each guarded context publishes its state in
//! a per-thread table and the hook finds it through the realm being compiled
//! in. Dropping the context retires its realms and unpublishes the state.

// `derive(Trace)` expands to an unsafe impl.
#![allow(unsafe_code)]

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use boa_engine::{
    Context, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue, NativeFunction,
    Source,
    context::HostHooks,
    js_string,
    realm::Realm,
    string::CodePoint,
};
use boa_gc::{Finalize, Trace};

use crate::{
    compat::{CompatibilityTable, HostRuntime},
    core::{
        CandidateSource, GenerationAttempt, PolicyArgument, PolicyCallable, PolicyDecision,
        PolicyReturn,
    },
    environment::EnvironmentId,
    error::{GuardError, Result},
    guard::CodegenGuard,
    registrar::REGISTRATION_EXPORT,
    runtime::PrewiredSlot,
    settings::GuardSettings,
    text::HostString,
};

/// Engine name reported to the compatibility gate
pub const ENGINE_NAME: &str = "boa";

/// Release of `boa_engine` this backend is built against
pub const ENGINE_VERSION: &str = "0.20.0";

/// A script function registered as the policy
struct ScriptPolicy {
    function: JsObject,
}

impl PolicyCallable<Context> for ScriptPolicy {
    fn call(&self, cx: &mut Context, source: &CandidateSource) -> Result<PolicyReturn> {
        let argument = JsValue::from(JsString::from(&*source.to_utf16()));
        self.function
            .call(&JsValue::undefined(), &[argument], cx)
            .map(|value| classify_value(&value))
            .map_err(|err| GuardError::invocation(err.to_string()))
    }

    fn describe(&self) -> &str {
        "script"
    }
}

fn classify_value(value: &JsValue) -> PolicyReturn {
    if value.is_undefined() {
        PolicyReturn::Nothing
    } else if value.is_null() {
        PolicyReturn::AllowSentinel
    } else if let Some(text) = value.as_string() {
        PolicyReturn::Text(HostString::from_utf16(code_units(text)))
    } else {
        PolicyReturn::Other(type_name(value).to_string())
    }
}

fn type_name(value: &JsValue) -> &'static str {
    if value.is_undefined() {
        "undefined"
    } else if value.is_null() {
        "null"
    } else if value.is_boolean() {
        "boolean"
    } else if value.is_number() {
        "number"
    } else if value.is_string() {
        "string"
    } else if value.is_symbol() {
        "symbol"
    } else if value.is_bigint() {
        "bigint"
    } else {
        "object"
    }
}

fn code_units(text: &JsString) -> Vec<u16> {
    let mut units = Vec::with_capacity(text.len());
    let mut buf = [0u16; 2];
    for point in text.code_points() {
        match point {
            CodePoint::Unicode(c) => units.extend_from_slice(c.encode_utf16(&mut buf)),
            CodePoint::UnpairedSurrogate(unit) => units.push(unit),
        }
    }
    units
}

// `Function(p1, p2, body)` is presented the way V8 synthesizes it, so a
// policy sees parameter defaults as well as the body.
fn candidate_source(parameters: &[JsString], body: &JsString) -> CandidateSource {
    if parameters.is_empty() {
        return HostString::from_utf16(code_units(body));
    }

    let mut units: Vec<u16> = "(function anonymous(".encode_utf16().collect();
    for (idx, parameter) in parameters.iter().enumerate() {
        if idx > 0 {
            units.push(u16::from(b','));
        }
        units.extend(code_units(parameter));
    }
    units.extend("\n) {\n".encode_utf16());
    units.extend(code_units(body));
    units.extend("\n})".encode_utf16());
    HostString::from_utf16(units)
}

fn blocked_error(message: &HostString, context: &mut Context) -> JsError {
    if let Ok(text) = message.to_utf8() {
        return JsNativeError::eval().with_message(text.into_owned()).into();
    }

    // Unpaired surrogates: set the code units on the error object directly.
    let error = JsNativeError::eval().to_opaque(context);
    let text = JsString::from(&*message.to_utf16());
    if let Err(err) = error.set(js_string!("message"), text, false, context) {
        return err;
    }
    JsError::from_opaque(error.into())
}

/// Realm to environment identity table
#[derive(Default)]
struct RealmTable {
    realms: RefCell<Vec<(Realm, EnvironmentId)>>,
}

impl RealmTable {
    fn lookup(&self, realm: &Realm) -> Option<EnvironmentId> {
        self.realms
            .borrow()
            .iter()
            .find(|(known, _)| known == realm)
            .map(|(_, id)| *id)
    }

    fn take(&self) -> Vec<EnvironmentId> {
        self.realms
            .borrow_mut()
            .drain(..)
            .map(|(_, id)| id)
            .collect()
    }

    fn id_for(&self, realm: &Realm) -> EnvironmentId {
        if let Some(id) = self.lookup(realm) {
            return id;
        }
        let id = EnvironmentId::next();
        self.realms.borrow_mut().push((realm.clone(), id));
        id
    }
}

struct BackendState {
    guard: CodegenGuard<Context>,
    realms: RealmTable,
}

thread_local! {
    static BACKENDS: RefCell<Vec<Weak<BackendState>>> = const { RefCell::new(Vec::new()) };
}

/// Backend owning `realm`, with the realm's environment identity
fn backend_for(realm: &Realm) -> Option<(Rc<BackendState>, EnvironmentId)> {
    BACKENDS
        .try_with(|backends| {
            backends
                .borrow()
                .iter()
                .filter_map(Weak::upgrade)
                .find_map(|state| {
                    let environment = state.realms.lookup(realm)?;
                    Some((state, environment))
                })
        })
        .ok()
        .flatten()
}

fn publish(state: &Rc<BackendState>) {
    BACKENDS.with(|backends| backends.borrow_mut().push(Rc::downgrade(state)));
}

fn unpublish(state: &Rc<BackendState>) {
    let _ = BACKENDS.try_with(|backends| {
        if let Ok(mut backends) = backends.try_borrow_mut() {
            backends.retain(|known| {
                known.strong_count() > 0 && !std::ptr::eq(known.as_ptr(), Rc::as_ptr(state))
            });
        }
    });
}

/// Host hooks routing compilation checks to the owning backend
struct GuardHooks;

static GUARD_HOOKS: GuardHooks = GuardHooks;

impl HostHooks for GuardHooks {
    fn ensure_can_compile_strings(
        &self,
        realm: Realm,
        parameters: &[JsString],
        body: &JsString,
        _direct: bool,
        context: &mut Context,
    ) -> JsResult<()> {
        // Realms that never registered a policy have no entry.
        let Some((state, environment)) = backend_for(&realm) else {
            return Ok(());
        };

        let attempt = GenerationAttempt {
            environment,
            source: candidate_source(parameters, body),
            is_code_like: true,
        };

        match state.guard.intercept(context, &attempt) {
            PolicyDecision::Allow => Ok(()),
            PolicyDecision::Block { message } => Err(blocked_error(&message, context)),
        }
    }
}

// The state holds no GC pointers that need tracing.
#[derive(Trace, Finalize)]
struct RegistrationCaptures {
    #[unsafe_ignore_trace]
    state: Rc<BackendState>,
}

fn set_code_generation_callback(
    _this: &JsValue,
    args: &[JsValue],
    captures: &RegistrationCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let argument = match args.first() {
        None => PolicyArgument::Missing,
        Some(value) => match value.as_callable() {
            Some(function) => PolicyArgument::callable(ScriptPolicy {
                function: function.clone(),
            }),
            None => PolicyArgument::not_callable(type_name(value)),
        },
    };

    let environment = captures.state.realms.id_for(context.realm());
    captures
        .state
        .guard
        .register(environment, argument, &PrewiredSlot)
        .map_err(|err| match err {
            GuardError::Argument(message) => JsNativeError::typ().with_message(message),
            other => JsNativeError::error().with_message(other.to_string()),
        })?;

    Ok(JsValue::undefined())
}

/// A Boa context with the code generation guard wired in
pub struct BoaGuardedContext {
    context: Context,
    state: Rc<BackendState>,
}

impl BoaGuardedContext {
    /// Build a guarded context with the default compatibility table
    pub fn new(settings: GuardSettings) -> Result<Self> {
        Self::with_table(settings, &CompatibilityTable::default())
    }

    /// Build a guarded context, gating on `table`
    pub fn with_table(settings: GuardSettings, table: &CompatibilityTable) -> Result<Self> {
        let host = HostRuntime::new(ENGINE_NAME, ENGINE_VERSION);
        let guard = CodegenGuard::initialize(&host, settings, table)?;

        let state = Rc::new(BackendState {
            guard,
            realms: RealmTable::default(),
        });

        let mut context = Context::builder()
            .host_hooks(&GUARD_HOOKS)
            .build()
            .map_err(|err| GuardError::Other(anyhow::anyhow!(err.to_string())))?;

        let captures = RegistrationCaptures {
            state: Rc::clone(&state),
        };
        context
            .register_global_callable(
                JsString::from(REGISTRATION_EXPORT),
                1,
                NativeFunction::from_copy_closure_with_captures(
                    set_code_generation_callback,
                    captures,
                ),
            )
            .map_err(|err| GuardError::Other(anyhow::anyhow!(err.to_string())))?;

        publish(&state);
        let guarded = BoaGuardedContext { context, state };
        if guarded.state.guard.settings().rules.is_some() {
            let environment = guarded.environment();
            guarded
                .state
                .guard
                .register_configured_rules(environment, &PrewiredSlot)?;
        }
        Ok(guarded)
    }

    /// Evaluate a script in the guarded context
    pub fn eval(&mut self, source: &str) -> JsResult<JsValue> {
        self.context.eval(Source::from_bytes(source))
    }

    /// Register a Rust-side policy for the current realm
    pub fn register<P>(&self, policy: P) -> Result<()>
    where
        P: PolicyCallable<Context> + 'static,
    {
        let environment = self.environment();
        self.state
            .guard
            .register(environment, PolicyArgument::callable(policy), &PrewiredSlot)
    }

    /// Environment identity of the current realm
    pub fn environment(&self) -> EnvironmentId {
        self.state.realms.id_for(self.context.realm())
    }

    /// The guard owning this context's policies
    pub fn guard(&self) -> &CodegenGuard<Context> {
        &self.state.guard
    }

    /// Underlying Boa context
    pub fn context(&mut self) -> &mut Context {
        &mut self.context
    }
}

impl Drop for BoaGuardedContext {
    fn drop(&mut self) {
        // Releases the script policies, which otherwise keep the state alive
        // through the registration function they can reach.
        for environment in self.state.realms.take() {
            self.state.guard.retire_environment(environment);
        }
        unpublish(&self.state);
        tracing::debug!("guarded boa context dropped");
    }
}
