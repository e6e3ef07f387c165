use ferrous_resolve::{
    Behavior, Completion, DiError, Key, Resolver, ResolverCore, ServiceCollection, ServiceDescriptor,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct RequestContext {
    id: String,
}

fn counting_scoped() -> (ServiceCollection, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let builds = counter.clone();
    let mut services = ServiceCollection::new();
    services
        .add_factory(Key::name("ctx"), Behavior::Scoped, [], move || {
            let n = builds.fetch_add(1, Ordering::SeqCst) + 1;
            anyhow::Ok(RequestContext { id: format!("req-{n}") })
        })
        .unwrap();
    (services, counter)
}

#[test]
fn test_scoped_lifetime() {
    let (services, counter) = counting_scoped();
    let provider = services.build().unwrap();

    let scope1 = provider.create_scope(|_| {}).unwrap();
    let scope2 = provider.create_scope(|_| {}).unwrap();

    let ctx1a = scope1.get::<RequestContext>(&Key::name("ctx")).unwrap();
    let ctx1b = scope1.get::<RequestContext>(&Key::name("ctx")).unwrap();
    let ctx2a = scope2.get::<RequestContext>(&Key::name("ctx")).unwrap();

    assert!(Arc::ptr_eq(&ctx1a, &ctx1b));
    assert!(!Arc::ptr_eq(&ctx1a, &ctx2a));
    assert_eq!(ctx1a.id, "req-1");
    assert_eq!(ctx2a.id, "req-2");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cannot_resolve_scoped_from_root() {
    let (services, counter) = counting_scoped();
    let provider = services.build().unwrap();

    let err = provider.get::<RequestContext>(&Key::name("ctx")).unwrap_err();
    assert!(matches!(err, DiError::ScopeNotDefined(_)));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_scope_on_scope_is_rejected() {
    let provider = ServiceCollection::new().build().unwrap();
    let scoped = provider.create_scope(|_| {}).unwrap();
    assert!(matches!(scoped.create_scope(|_| {}), Err(DiError::ScopeAlreadyDefined)));

    // The root view can still open more scopes.
    assert!(provider.create_scope(|_| {}).is_ok());
}

#[test]
fn test_destroy_without_scope_fails() {
    let provider = ServiceCollection::new().build().unwrap();
    assert!(matches!(provider.destroy_scope(), Err(DiError::ScopeNotCreated)));

    let scoped = provider.create_scope(|_| {}).unwrap();
    scoped.destroy_scope().unwrap();
    assert!(matches!(scoped.destroy_scope(), Err(DiError::ScopeNotCreated)));
}

#[test]
fn test_destroyed_scope_is_gone_for_every_clone() {
    let (services, _) = counting_scoped();
    let provider = services.build().unwrap();
    let scoped = provider.create_scope(|_| {}).unwrap();
    let clone = scoped.clone();

    clone.get::<RequestContext>(&Key::name("ctx")).unwrap();
    let scope = scoped.scope().unwrap();
    assert_eq!(scope.len(), 1);

    scoped.destroy_scope().unwrap();
    assert!(scope.is_destroyed());
    assert!(scope.is_empty());
    assert!(!clone.has_scope());
    assert!(matches!(
        clone.get::<RequestContext>(&Key::name("ctx")),
        Err(DiError::ScopeNotDefined(_))
    ));
}

#[test]
fn test_seeded_values_are_resolved_from_the_scope() {
    struct Request {
        path: &'static str,
    }
    struct Route {
        request: Arc<Request>,
    }

    let mut services = ServiceCollection::new();
    services.add_seeded(Key::name("request"));
    services
        .add_factory(Key::name("route"), Behavior::Inherited, [Key::name("request")], |request: Arc<Request>| {
            anyhow::Ok(Route { request })
        })
        .unwrap();
    let provider = services.build().unwrap();

    let scoped = provider
        .create_scope(|seed| {
            seed.insert(Key::name("request"), Request { path: "/a" });
        })
        .unwrap();
    assert_eq!(scoped.get::<Route>(&Key::name("route")).unwrap().request.path, "/a");

    // A scope opened without the seed cannot build the key.
    let unseeded = provider.create_scope(|_| {}).unwrap();
    let err = unseeded.get::<Route>(&Key::name("route")).err().unwrap();
    assert!(err.to_string().contains("was not seeded"));
}

#[test]
fn test_singletons_never_capture_scoped_state() {
    let mut services = ServiceCollection::new();
    services.add_value(Key::name("base"), 1u32);
    services
        .add_factory(Key::name("cache"), Behavior::Inherited, [Key::name("base")], |base: Arc<u32>| {
            anyhow::Ok(*base * 10)
        })
        .unwrap();
    let provider = services.build().unwrap();
    assert_eq!(provider.descriptor(&Key::name("cache")).unwrap().behavior(), Behavior::Singleton);

    let scope1 = provider.create_scope(|_| {}).unwrap();
    let scope2 = provider.create_scope(|_| {}).unwrap();
    let a = scope1.get::<u32>(&Key::name("cache")).unwrap();
    let b = scope2.get::<u32>(&Key::name("cache")).unwrap();
    let c = provider.get::<u32>(&Key::name("cache")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));

    // Singletons are not cached in scopes.
    assert!(scope1.scope().unwrap().is_empty());
}

#[test]
fn test_prototype_over_scoped_dependency() {
    let (mut services, _) = counting_scoped();
    services
        .add_factory(Key::name("view"), Behavior::Prototype, [Key::name("ctx")], |ctx: Arc<RequestContext>| {
            anyhow::Ok(format!("view of {}", ctx.id))
        })
        .unwrap();
    let provider = services.build().unwrap();

    assert!(matches!(provider.get::<String>(&Key::name("view")), Err(DiError::ScopeNotDefined(_))));

    let scoped = provider.create_scope(|_| {}).unwrap();
    let a = scoped.get::<String>(&Key::name("view")).unwrap();
    let b = scoped.get::<String>(&Key::name("view")).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(*a, "view of req-1");
    assert_eq!(*b, "view of req-1");
}

#[test]
fn test_failed_scoped_build_is_not_cached() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let mut services = ServiceCollection::new();
    services.add_fn(Key::name("flaky"), Behavior::Scoped, [], move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("first attempt fails");
        }
        Ok(5u8)
    });
    let provider = services.build().unwrap();
    let scoped = provider.create_scope(|_| {}).unwrap();

    assert!(matches!(scoped.get::<u8>(&Key::name("flaky")), Err(DiError::Build { .. })));
    assert_eq!(*scoped.get::<u8>(&Key::name("flaky")).unwrap(), 5);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_value_arriving_after_destroy_is_delivered_but_not_cached() {
    let parked: Arc<Mutex<Option<Completion>>> = Arc::new(Mutex::new(None));
    let slot = parked.clone();
    let mut services = ServiceCollection::new();
    services.add(ServiceDescriptor::new(Key::name("slow"), Behavior::Scoped, [], move |_, completion| {
        *slot.lock() = Some(completion);
    }));
    let provider = services.build().unwrap();
    let scoped = provider.create_scope(|_| {}).unwrap();
    let scope = scoped.scope().unwrap();

    let got = Arc::new(Mutex::new(None));
    let sink = got.clone();
    scoped
        .provide(&Key::name("slow"), Box::new(move |result| *sink.lock() = Some(result.is_ok())))
        .unwrap();
    scoped.destroy_scope().unwrap();

    let completion = parked.lock().take().unwrap();
    completion.resolve(3u8);
    assert_eq!(*got.lock(), Some(true));
    assert!(!scope.contains(&Key::name("slow")));
}
