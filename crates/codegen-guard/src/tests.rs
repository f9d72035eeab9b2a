#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc, sync::Arc};

    use super::*;
    use crate::{runtime::PrewiredSlot, *};

    fn policy_from<F, R>(f: F) -> Arc<dyn PolicyCallable<()>>
    where
        F: Fn(&str) -> R + 'static,
        R: IntoPolicyReturn,
    {
        Arc::new(NativePolicy::new(f))
    }

    fn v8_host() -> HostRuntime {
        HostRuntime::new("v8", "12.4.254.21")
    }

    #[test]
    fn test_host_string_utf16_round_trip() {
        let text = HostString::from("héllo ✓ 𝄞");
        let units = text.to_utf16().into_owned();
        let back = HostString::from_utf16(units);

        assert_eq!(back, text);
        assert_eq!(back.to_utf8().unwrap(), "héllo ✓ 𝄞");
        assert_eq!(back.len_utf16(), text.len_utf16());
    }

    #[test]
    fn test_host_string_lone_surrogate_is_not_substituted() {
        let units = vec![0x0061, 0xD800, 0x0062];
        let text = HostString::from_utf16(units.clone());

        assert!(matches!(text.to_utf8(), Err(GuardError::Transcoding(_))));
        assert_eq!(text.to_utf8_escaped(), "a\\uD800b");
        assert_eq!(&*text.to_utf16(), units.as_slice());
    }

    #[test]
    fn test_host_string_preview_truncates() {
        let text = HostString::from("abcdefgh");
        assert_eq!(text.preview(3), "abc…");
        assert_eq!(text.preview(8), "abcdefgh");
        assert!(HostString::from("").is_empty());
    }

    #[test]
    fn test_classify_policy_returns() {
        assert_eq!(
            PolicyInvoker::classify(PolicyReturn::Nothing),
            PolicyDecision::Allow
        );
        assert_eq!(
            PolicyInvoker::classify(PolicyReturn::AllowSentinel),
            PolicyDecision::Allow
        );
        assert_eq!(
            PolicyInvoker::classify(PolicyReturn::Other("number".to_string())),
            PolicyDecision::Allow
        );
        assert_eq!(
            PolicyInvoker::classify(PolicyReturn::Text("no".into())),
            PolicyDecision::block("no")
        );
        assert_eq!(
            PolicyInvoker::classify(PolicyReturn::Text("".into())),
            PolicyDecision::block("")
        );
    }

    #[test]
    fn test_into_policy_return_conversions() {
        assert_eq!(().into_policy_return().unwrap(), PolicyReturn::Nothing);
        assert_eq!(
            None::<String>.into_policy_return().unwrap(),
            PolicyReturn::Nothing
        );
        assert_eq!(
            Some("x").into_policy_return().unwrap(),
            PolicyReturn::Text("x".into())
        );
        assert_eq!(
            true.into_policy_return().unwrap(),
            PolicyReturn::Other("boolean".to_string())
        );

        let failed: std::result::Result<(), &str> = Err("boom");
        assert!(matches!(
            failed.into_policy_return(),
            Err(GuardError::PolicyInvocation(msg)) if msg == "boom"
        ));
    }

    #[test]
    fn test_invoker_fail_open_on_error() {
        let invoker = PolicyInvoker::new(FailureMode::Open);
        let policy = NativePolicy::new(|_src: &str| -> std::result::Result<(), String> {
            Err("policy exploded".to_string())
        });

        let decision = invoker.invoke::<()>(&policy, &mut (), &"eval()".into());
        assert_eq!(decision, PolicyDecision::Allow);
    }

    #[test]
    fn test_invoker_fail_closed_on_error() {
        let invoker = PolicyInvoker::new(FailureMode::Closed).with_fallback_message("denied");
        let policy = NativePolicy::new(|_src: &str| -> std::result::Result<(), String> {
            Err("policy exploded".to_string())
        });

        let decision = invoker.invoke::<()>(&policy, &mut (), &"eval()".into());
        assert_eq!(decision, PolicyDecision::block("denied"));
    }

    #[test]
    fn test_invoker_contains_panics() {
        let policy = NativePolicy::new(|_src: &str| -> Option<String> { panic!("policy bug") });

        let open = PolicyInvoker::new(FailureMode::Open);
        assert_eq!(open.invoke::<()>(&policy, &mut (), &"x".into()), PolicyDecision::Allow);

        let closed = PolicyInvoker::new(FailureMode::Closed);
        assert_eq!(
            closed.invoke::<()>(&policy, &mut (), &"x".into()),
            PolicyDecision::block(DEFAULT_BLOCKED_MESSAGE)
        );
    }

    #[test]
    fn test_native_policy_rejects_untranscodable_source() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let policy = NativePolicy::new(move |_src: &str| {
            seen.set(seen.get() + 1);
            Some("blocked")
        });

        let source = HostString::from_utf16(vec![0xDC00]);
        let closed = PolicyInvoker::new(FailureMode::Closed).with_fallback_message("unreadable");

        assert_eq!(
            closed.invoke::<()>(&policy, &mut (), &source),
            PolicyDecision::block("unreadable")
        );
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_registry_replace_returns_previous() {
        let registry: HookRegistry<()> = HookRegistry::new();
        let env = EnvironmentId::next();

        assert!(registry.replace(env, policy_from(|_: &str| ())).is_none());
        let previous = registry
            .replace(env, policy_from(|_: &str| Some("b")))
            .expect("first registration is replaced");

        assert_eq!(previous.generation(), 1);
        assert_eq!(registry.lookup(env).unwrap().generation(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_in_flight_handle_survives_replacement() {
        let registry: HookRegistry<()> = HookRegistry::new();
        let env = EnvironmentId::next();
        registry.replace(env, policy_from(|_: &str| Some("old")));

        let in_flight = registry.lookup(env).unwrap();
        registry.replace(env, policy_from(|_: &str| Some("new")));

        let old = in_flight.policy().call(&mut (), &"x".into()).unwrap();
        assert_eq!(old, PolicyReturn::Text("old".into()));

        let current = registry.lookup(env).unwrap();
        let new = current.policy().call(&mut (), &"x".into()).unwrap();
        assert_eq!(new, PolicyReturn::Text("new".into()));
    }

    #[test]
    fn test_registry_remove_keeps_hook_armed() {
        let registry: HookRegistry<()> = HookRegistry::new();
        let env = EnvironmentId::next();

        assert!(registry.mark_installed(env));
        assert!(!registry.mark_installed(env));
        registry.replace(env, policy_from(|_: &str| ()));

        registry.remove(env);
        assert!(registry.lookup(env).is_none());
        assert!(registry.is_installed(env));

        registry.retire(env);
        assert!(!registry.is_installed(env));
    }

    #[test]
    fn test_registry_running_marker_spans_replacement() {
        let registry: HookRegistry<()> = HookRegistry::new();
        let env = EnvironmentId::next();
        let other = EnvironmentId::next();
        registry.replace(env, policy_from(|_: &str| ()));
        registry.replace(other, policy_from(|_: &str| ()));

        let outer = registry.lookup(env).unwrap();
        let call = outer.enter().expect("nothing running yet");
        assert!(outer.is_running());
        assert!(outer.enter().is_none());

        // A policy registered while the old one runs is still nested.
        registry.replace(env, policy_from(|_: &str| Some("new")));
        let current = registry.lookup(env).unwrap();
        assert!(current.is_running());
        assert!(current.enter().is_none());

        assert!(registry.lookup(other).unwrap().enter().is_some());

        drop(call);
        assert!(!current.is_running());
        assert!(current.enter().is_some());
    }

    #[test]
    fn test_environment_guard_scopes_lookup() {
        let registry: HookRegistry<()> = HookRegistry::new();
        let e1 = EnvironmentId::next();
        let e2 = EnvironmentId::next();
        registry.replace(e1, policy_from(|_: &str| Some("blocked")));

        let admitted = EnvironmentGuard::admit(&registry, e1).unwrap();
        assert_eq!(admitted.environment(), e1);
        assert!(EnvironmentGuard::admit(&registry, e2).is_none());
    }

    #[test]
    fn test_environment_ids_are_unique() {
        let a = EnvironmentId::next();
        let b = EnvironmentId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("env#"));
    }

    #[test]
    fn test_registrar_rejects_missing_and_non_callable() {
        let registry = Arc::new(HookRegistry::<()>::new());
        let registrar = HookRegistrar::new(Arc::clone(&registry));
        let env = EnvironmentId::next();
        let installs = Cell::new(0);
        let slot = |_: EnvironmentId| -> Result<()> {
            installs.set(installs.get() + 1);
            Ok(())
        };

        let err = registrar
            .register(env, PolicyArgument::Missing, &slot)
            .unwrap_err();
        assert!(matches!(&err, GuardError::Argument(msg) if msg == EXPECTED_CALLBACK));

        for type_name in ["number", "string", "object", "undefined"] {
            let err = registrar
                .register(env, PolicyArgument::not_callable(type_name), &slot)
                .unwrap_err();
            assert!(matches!(err, GuardError::Argument(_)));
        }

        assert_eq!(installs.get(), 0);
        assert!(!registry.is_installed(env));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registrar_installs_once_per_environment() {
        let registry = Arc::new(HookRegistry::<()>::new());
        let registrar = HookRegistrar::new(Arc::clone(&registry));
        let installs = Cell::new(0);
        let slot = |_: EnvironmentId| -> Result<()> {
            installs.set(installs.get() + 1);
            Ok(())
        };

        let e1 = EnvironmentId::next();
        let e2 = EnvironmentId::next();
        for _ in 0..3 {
            registrar
                .register(e1, PolicyArgument::Callable(policy_from(|_: &str| ())), &slot)
                .unwrap();
        }
        registrar
            .register(e2, PolicyArgument::Callable(policy_from(|_: &str| ())), &slot)
            .unwrap();

        assert_eq!(installs.get(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registrar_install_failure_stores_nothing() {
        let registry = Arc::new(HookRegistry::<()>::new());
        let registrar = HookRegistrar::new(Arc::clone(&registry));
        let env = EnvironmentId::next();
        let slot = |_: EnvironmentId| -> Result<()> {
            Err(GuardError::Install("extension point unavailable".to_string()))
        };

        let err = registrar
            .register(env, PolicyArgument::Callable(policy_from(|_: &str| ())), &slot)
            .unwrap_err();

        assert!(matches!(err, GuardError::Install(_)));
        assert!(registry.lookup(env).is_none());
        assert!(!registry.is_installed(env));
    }

    #[test]
    fn test_host_version_parsing() {
        let v: HostVersion = "12.4.254.21".parse().unwrap();
        assert_eq!(v.major(), 12);
        assert_eq!(v.semver().to_string(), "12.4.254");
        assert_eq!(v.raw(), "12.4.254.21");

        let v: HostVersion = "v11.3.244.8-node.16".parse().unwrap();
        assert_eq!(v.major(), 11);

        let v: HostVersion = "13".parse().unwrap();
        assert_eq!(v.semver().to_string(), "13.0.0");

        assert!("".parse::<HostVersion>().is_err());
        assert!("twelve.1".parse::<HostVersion>().is_err());
        assert!("12..1".parse::<HostVersion>().is_err());

        let err = "1.2.3.4.5.6".parse::<HostVersion>().unwrap_err();
        assert!(err.to_string().contains("too many components"));
        assert!("1.2.3.4.5".parse::<HostVersion>().is_err());
        assert!("1.2.3.4".parse::<HostVersion>().is_ok());
    }

    #[test]
    fn test_compatibility_gate() {
        let table = CompatibilityTable::default();

        assert!(table.check(&v8_host()).is_ok());
        assert!(table.check(&HostRuntime::new("V8", "9.0.257")).is_ok());

        let err = table
            .check(&HostRuntime::new("v8", "8.4.371.23"))
            .unwrap_err();
        assert!(matches!(
            err,
            GuardError::UnsupportedHostVersion { min_major: 9, max_major: 13, .. }
        ));
        assert!(err.is_compatibility_error());

        assert!(matches!(
            table.check(&HostRuntime::new("v8", "14.0.1")),
            Err(GuardError::UnsupportedHostVersion { .. })
        ));
        assert!(matches!(
            table.check(&HostRuntime::new("spidermonkey", "115.0")),
            Err(GuardError::UnknownEngine(_))
        ));
        assert!(matches!(
            table.check(&HostRuntime::new("v8", "latest")),
            Err(GuardError::InvalidHostVersion { .. })
        ));
    }

    #[test]
    fn test_compatibility_table_validation() {
        assert!(CompatibilityTable::default().validate().is_ok());
        assert!(CompatibilityTable::new(vec![]).validate().is_err());

        let inverted = CompatibilityTable::new(vec![CompatibilityEntry {
            engine: "v8".to_string(),
            min_major: 13,
            max_major: 9,
        }]);
        assert!(inverted.validate().is_err());

        let duplicate = CompatibilityTable::new(vec![
            CompatibilityEntry {
                engine: "v8".to_string(),
                min_major: 9,
                max_major: 13,
            },
            CompatibilityEntry {
                engine: "V8".to_string(),
                min_major: 10,
                max_major: 11,
            },
        ]);
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn test_rule_policy_first_match_wins() {
        let rules = vec![
            SourceRule {
                pattern: "*danger*".to_string(),
                message: "blocked: dangerous".to_string(),
            },
            SourceRule {
                pattern: "*fetch(*".to_string(),
                message: "blocked: network".to_string(),
            },
        ];
        let policy = RulePolicy::compile(&rules).unwrap();

        assert_eq!(policy.len(), 2);
        assert_eq!(policy.first_match("danger()"), Some("blocked: dangerous"));
        assert_eq!(
            policy.first_match("fetch('/a/b', danger)"),
            Some("blocked: dangerous")
        );
        assert_eq!(policy.first_match("fetch('/x')"), Some("blocked: network"));
        assert_eq!(policy.first_match("1+1"), None);

        let decision = PolicyInvoker::default().invoke::<()>(&policy, &mut (), &"danger()".into());
        assert_eq!(decision, PolicyDecision::block("blocked: dangerous"));
    }

    #[test]
    fn test_rule_policy_rejects_bad_patterns() {
        let empty = vec![SourceRule {
            pattern: String::new(),
            message: "x".to_string(),
        }];
        assert!(RulePolicy::compile(&empty).is_err());

        let unclosed = vec![SourceRule {
            pattern: "[abc".to_string(),
            message: "x".to_string(),
        }];
        assert!(matches!(
            RulePolicy::compile(&unclosed),
            Err(GuardError::GlobError(_))
        ));
    }

    #[test]
    fn test_settings_parsing_yaml() {
        let yaml = r#"
failure_mode: closed
blocked_message: "eval is disabled here"
rules:
  - pattern: "*danger*"
    message: "blocked: dangerous"
"#;

        let settings = GuardSettings::from_yaml(yaml).unwrap();
        assert_eq!(settings.failure_mode, FailureMode::Closed);
        assert_eq!(settings.blocked_message(), "eval is disabled here");
        assert_eq!(settings.rule_policy().unwrap().unwrap().len(), 1);
        assert!(!settings.log_candidates);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = GuardSettings::from_json("{}").unwrap();
        assert_eq!(settings, GuardSettings::default());
        assert_eq!(settings.failure_mode, FailureMode::Open);
        assert_eq!(settings.blocked_message(), DEFAULT_BLOCKED_MESSAGE);
        assert!(settings.rule_policy().unwrap().is_none());
        assert_eq!(
            GuardSettings::default().fail_closed().invoker().failure_mode(),
            FailureMode::Closed
        );
    }

    #[test]
    fn test_settings_reject_unknown_failure_mode() {
        assert!(GuardSettings::from_yaml("failure_mode: sometimes").is_err());
    }

    #[test]
    fn test_guard_initialize_rejects_unsupported_host() {
        let result = CodegenGuard::<()>::initialize(
            &HostRuntime::new("v8", "7.0.0"),
            GuardSettings::default(),
            &CompatibilityTable::default(),
        );
        assert!(matches!(
            result,
            Err(GuardError::UnsupportedHostVersion { .. })
        ));
    }

    #[test]
    fn test_guard_register_and_intercept() {
        let guard = CodegenGuard::<()>::initialize(
            &v8_host(),
            GuardSettings::default(),
            &CompatibilityTable::default(),
        )
        .unwrap();
        let env = EnvironmentId::next();

        let attempt = GenerationAttempt::new(env, "danger()");
        assert!(guard.intercept(&mut (), &attempt).is_allowed());

        guard
            .register(
                env,
                PolicyArgument::callable(NativePolicy::new(|src: &str| {
                    src.contains("danger").then_some("blocked: dangerous")
                })),
                &PrewiredSlot,
            )
            .unwrap();

        assert!(guard.is_registered(env));
        assert!(guard.is_installed(env));
        assert_eq!(
            guard.intercept(&mut (), &attempt),
            PolicyDecision::block("blocked: dangerous")
        );
        assert!(guard
            .intercept(&mut (), &GenerationAttempt::new(env, "1+1"))
            .is_allowed());

        assert!(guard.unregister(env));
        assert!(guard.intercept(&mut (), &attempt).is_allowed());
        assert!(guard.is_installed(env));
    }

    #[test]
    fn test_guard_registers_configured_rules() {
        let settings = GuardSettings {
            rules: Some(vec![SourceRule {
                pattern: "*process*".to_string(),
                message: "no process access".to_string(),
            }]),
            ..Default::default()
        };
        let guard =
            CodegenGuard::<()>::initialize(&v8_host(), settings, &CompatibilityTable::default())
                .unwrap();
        let env = EnvironmentId::next();

        assert!(guard.register_configured_rules(env, &PrewiredSlot).unwrap());
        assert_eq!(
            guard.intercept(&mut (), &GenerationAttempt::new(env, "process.exit()")),
            PolicyDecision::block("no process access")
        );
    }

    #[test]
    fn test_decision_into_result() {
        assert!(PolicyDecision::Allow.into_result().is_ok());

        let err = PolicyDecision::block("nope").into_result().unwrap_err();
        assert!(matches!(&err, GuardError::GenerationBlocked { message } if message == "nope"));
        assert_eq!(err.to_string(), "nope");
    }
}
