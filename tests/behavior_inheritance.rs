use ferrous_resolve::graph;
use ferrous_resolve::{Behavior, DiError, EngineConfig, ErrorKind, Key, Resolver, ServiceCollection, ServiceDescriptor};

fn node(name: &str, behavior: Behavior, deps: &[&str]) -> ServiceDescriptor {
    ServiceDescriptor::from_fn(
        Key::name(name),
        behavior,
        deps.iter().map(|d| Key::name(*d)),
        |_| anyhow::Ok(()),
    )
}

fn behaviors(descriptors: Vec<ServiceDescriptor>) -> Vec<(String, Behavior)> {
    graph::prepare(descriptors, &EngineConfig::default())
        .unwrap()
        .into_iter()
        .map(|d| (d.key().display_name().to_string(), d.behavior()))
        .collect()
}

fn behavior_of(prepared: &[(String, Behavior)], name: &str) -> Behavior {
    prepared
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, behavior)| *behavior)
        .unwrap()
}

#[test]
fn test_inherited_without_dependencies_becomes_singleton() {
    let prepared = behaviors(vec![node("leaf", Behavior::Inherited, &[])]);
    assert_eq!(behavior_of(&prepared, "leaf"), Behavior::Singleton);
}

#[test]
fn test_inherited_over_scoped_becomes_scoped() {
    let prepared = behaviors(vec![
        node("request", Behavior::Scoped, &[]),
        node("logger", Behavior::Singleton, &[]),
        node("handler", Behavior::Inherited, &["logger", "request"]),
    ]);
    assert_eq!(behavior_of(&prepared, "handler"), Behavior::Scoped);
}

#[test]
fn test_inheritance_follows_chains_in_any_order() {
    // Registered before the services they depend on.
    let prepared = behaviors(vec![
        node("controller", Behavior::Inherited, &["service"]),
        node("service", Behavior::Inherited, &["repository"]),
        node("repository", Behavior::Inherited, &["session"]),
        node("session", Behavior::Scoped, &[]),
        node("metrics", Behavior::Inherited, &["clock"]),
        node("clock", Behavior::Inherited, &[]),
    ]);
    assert_eq!(behavior_of(&prepared, "controller"), Behavior::Scoped);
    assert_eq!(behavior_of(&prepared, "service"), Behavior::Scoped);
    assert_eq!(behavior_of(&prepared, "repository"), Behavior::Scoped);
    assert_eq!(behavior_of(&prepared, "metrics"), Behavior::Singleton);
    assert_eq!(behavior_of(&prepared, "clock"), Behavior::Singleton);
    assert!(prepared.iter().all(|(_, behavior)| behavior.is_concrete()));
}

#[test]
fn test_prototypes_pass_scope_requirements_through() {
    let prepared = behaviors(vec![
        node("session", Behavior::Scoped, &[]),
        node("query", Behavior::Prototype, &["session"]),
        node("report", Behavior::Inherited, &["query"]),
        node("formatter", Behavior::Prototype, &[]),
        node("printer", Behavior::Inherited, &["formatter"]),
    ]);
    assert_eq!(behavior_of(&prepared, "query"), Behavior::Prototype);
    assert_eq!(behavior_of(&prepared, "report"), Behavior::Scoped);
    assert_eq!(behavior_of(&prepared, "printer"), Behavior::Singleton);
}

#[test]
fn test_inherited_behind_prototype_is_resolved_first() {
    let prepared = behaviors(vec![
        node("top", Behavior::Inherited, &["middle"]),
        node("middle", Behavior::Prototype, &["bottom"]),
        node("bottom", Behavior::Inherited, &["session"]),
        node("session", Behavior::Scoped, &[]),
    ]);
    assert_eq!(behavior_of(&prepared, "bottom"), Behavior::Scoped);
    assert_eq!(behavior_of(&prepared, "top"), Behavior::Scoped);
}

#[test]
fn test_resolved_descriptors_remember_their_origin() {
    let mut services = ServiceCollection::new();
    services.add(node("plain", Behavior::Singleton, &[]));
    services.add(node("derived", Behavior::Inherited, &["plain"]));
    let provider = services.build().unwrap();

    assert!(provider.descriptor(&Key::name("plain")).unwrap().origin().is_none());
    let derived = provider.descriptor(&Key::name("derived")).unwrap();
    assert_eq!(derived.behavior(), Behavior::Singleton);
    assert_eq!(derived.origin().unwrap().behavior(), Behavior::Inherited);
    assert_eq!(derived.origin().unwrap().key(), derived.key());
}

#[test]
fn test_singleton_over_scoped_is_rejected() {
    let mut services = ServiceCollection::new();
    services.add(node("session", Behavior::Scoped, &[]));
    services.add(node("cache", Behavior::Singleton, &["session"]));

    let err = services.build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BehaviorIncompatibility);
    match err {
        DiError::IncompatibleBehavior {
            service,
            service_behavior,
            dependency,
            dependency_behavior,
        } => {
            assert_eq!(service, Key::name("cache"));
            assert_eq!(service_behavior, Behavior::Singleton);
            assert_eq!(dependency, Key::name("session"));
            assert_eq!(dependency_behavior, Behavior::Scoped);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_singleton_over_prototype_over_scoped_is_rejected() {
    let mut services = ServiceCollection::new();
    services.add(node("session", Behavior::Scoped, &[]));
    services.add(node("query", Behavior::Prototype, &["session"]));
    services.add(node("cache", Behavior::Singleton, &["query"]));
    assert!(matches!(services.build(), Err(DiError::IncompatibleBehavior { .. })));
}

#[test]
fn test_allowed_behavior_pairs() {
    let mut services = ServiceCollection::new();
    services.add(node("config", Behavior::Singleton, &[]));
    services.add(node("session", Behavior::Scoped, &["config"]));
    services.add(node("unit", Behavior::Scoped, &["session"]));
    services.add(node("any", Behavior::Prototype, &["config", "session", "unit"]));
    services.add(node("fresh", Behavior::Prototype, &["any"]));
    services.add(node("holder", Behavior::Singleton, &["config"]));

    let provider = services.build().unwrap();
    let scoped = provider.create_scope(|_| {}).unwrap();
    assert!(scoped.get::<()>(&Key::name("fresh")).is_ok());
}

#[test]
fn test_unresolved_inheritance_is_reported_by_validation() {
    let descriptors = vec![node("a", Behavior::Singleton, &["b"]), node("b", Behavior::Inherited, &[])];
    match graph::validate_behaviors(&descriptors) {
        Err(DiError::UnresolvedInheritance { service, dependency }) => {
            assert_eq!(service, Key::name("a"));
            assert_eq!(dependency, Key::name("b"));
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_missing_dependency_is_reported_at_build() {
    let mut services = ServiceCollection::new();
    services.add(node("a", Behavior::Singleton, &["nowhere"]));
    match services.build() {
        Err(DiError::MissingDependency { service, dependency }) => {
            assert_eq!(service, Key::name("a"));
            assert_eq!(dependency, Key::name("nowhere"));
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_relaxed_mode_defers_missing_dependencies_to_resolution() {
    let mut services = ServiceCollection::new();
    services.add(node("a", Behavior::Inherited, &["nowhere"]));
    let provider = services
        .build_with(EngineConfig {
            strict_dependencies: false,
            ..EngineConfig::default()
        })
        .unwrap();

    assert_eq!(provider.descriptor(&Key::name("a")).unwrap().behavior(), Behavior::Singleton);
    let err = provider.get::<()>(&Key::name("a")).unwrap_err();
    assert!(matches!(err, DiError::NotFound(ref key) if *key == Key::name("nowhere")));
}
