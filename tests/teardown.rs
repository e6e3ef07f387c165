use ferrous_resolve::{Behavior, Completion, Key, OnScopeDestroy, Resolver, ResolverCore, ServiceCollection, ServiceDescriptor};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

struct Connection {
    name: &'static str,
    log: Log,
}

impl OnScopeDestroy for Connection {
    fn on_scope_destroy(&self) {
        self.log.lock().push(format!("closed {}", self.name));
    }
}

fn connection(name: &'static str, log: &Log, deps: &[&str]) -> ServiceDescriptor {
    let log = log.clone();
    ServiceDescriptor::from_fn(Key::name(name), Behavior::Scoped, deps.iter().map(|d| Key::name(*d)), move |_| {
        anyhow::Ok(Connection { name, log: log.clone() })
    })
    .with_teardown::<Connection>()
}

#[test]
fn test_teardown_runs_in_reverse_cache_order() {
    let log: Log = Arc::default();
    let mut services = ServiceCollection::new();
    services.add(connection("db", &log, &[]));
    services.add(connection("cache", &log, &["db"]));
    services.add(connection("session", &log, &["cache"]));
    let provider = services.build().unwrap();

    let scoped = provider.create_scope(|_| {}).unwrap();
    scoped.get::<Connection>(&Key::name("session")).unwrap();
    assert_eq!(scoped.scope().unwrap().len(), 3);
    assert!(log.lock().is_empty());

    scoped.destroy_scope().unwrap();
    assert_eq!(*log.lock(), vec!["closed session", "closed cache", "closed db"]);
}

#[test]
fn test_only_cached_values_are_torn_down() {
    let log: Log = Arc::default();
    let mut services = ServiceCollection::new();
    services.add(connection("used", &log, &[]));
    services.add(connection("unused", &log, &[]));
    let provider = services.build().unwrap();

    let scoped = provider.create_scope(|_| {}).unwrap();
    scoped.get::<Connection>(&Key::name("used")).unwrap();
    scoped.destroy_scope().unwrap();
    assert_eq!(*log.lock(), vec!["closed used"]);
}

#[test]
fn test_each_scope_tears_down_its_own_values() {
    let log: Log = Arc::default();
    let mut services = ServiceCollection::new();
    services.add(connection("db", &log, &[]));
    let provider = services.build().unwrap();

    let first = provider.create_scope(|_| {}).unwrap();
    let second = provider.create_scope(|_| {}).unwrap();
    first.get::<Connection>(&Key::name("db")).unwrap();
    second.get::<Connection>(&Key::name("db")).unwrap();

    first.destroy_scope().unwrap();
    assert_eq!(log.lock().len(), 1);
    assert!(second.scope().unwrap().contains(&Key::name("db")));
    second.destroy_scope().unwrap();
    assert_eq!(log.lock().len(), 2);
}

#[test]
fn test_seeded_values_can_carry_teardown() {
    let log: Log = Arc::default();
    let mut services = ServiceCollection::new();
    services.add_seeded(Key::name("request"));
    services.add_seeded(Key::name("user"));
    let provider = services.build().unwrap();

    let seed_log = log.clone();
    let scoped = provider
        .create_scope(move |seed| {
            seed.insert_with_teardown(Key::name("request"), Connection { name: "request", log: seed_log.clone() })
                .insert(Key::name("user"), "alice".to_string());
        })
        .unwrap();
    assert_eq!(*scoped.get::<String>(&Key::name("user")).unwrap(), "alice");

    scoped.destroy_scope().unwrap();
    assert_eq!(*log.lock(), vec!["closed request"]);
}

#[test]
fn test_teardown_hook_may_resolve_from_the_provider() {
    let log: Log = Arc::default();
    let hook_log = log.clone();
    let mut services = ServiceCollection::new();
    services.add_value(Key::name("label"), "audit".to_string());
    // Hooks run without any lock held, so they may re-enter the provider.
    let root_label = Arc::new(Mutex::new(None::<ferrous_resolve::ServiceProvider>));
    let lookup = root_label.clone();
    services.add(
        ServiceDescriptor::from_fn(Key::name("audited"), Behavior::Scoped, [], |_| anyhow::Ok(11u8)).with_teardown_fn(
            move |value| {
                let n = value.downcast_ref::<u8>().copied().unwrap_or_default();
                let label = lookup
                    .lock()
                    .as_ref()
                    .map(|p| p.get::<String>(&Key::name("label")).unwrap().to_string())
                    .unwrap_or_default();
                hook_log.lock().push(format!("{label} {n}"));
            },
        ),
    );
    let provider = services.build().unwrap();
    *root_label.lock() = Some(provider.clone());

    let scoped = provider.create_scope(|_| {}).unwrap();
    scoped.get::<u8>(&Key::name("audited")).unwrap();
    scoped.destroy_scope().unwrap();
    assert_eq!(*log.lock(), vec!["audit 11"]);

    root_label.lock().take();
}

#[test]
fn test_build_finished_by_a_hook_does_not_extend_the_drain() {
    let parked: Arc<Mutex<Option<Completion>>> = Arc::new(Mutex::new(None));
    let closer_runs = Arc::new(AtomicUsize::new(0));
    let slow_runs = Arc::new(AtomicUsize::new(0));

    let mut services = ServiceCollection::new();
    let slot = parked.clone();
    let slow_count = slow_runs.clone();
    services.add(
        ServiceDescriptor::new(Key::name("slow"), Behavior::Scoped, [], move |_, completion| {
            *slot.lock() = Some(completion);
        })
        .with_teardown_fn(move |_| {
            slow_count.fetch_add(1, Ordering::SeqCst);
        }),
    );
    let release = parked.clone();
    let closer_count = closer_runs.clone();
    services.add(
        ServiceDescriptor::from_fn(Key::name("closer"), Behavior::Scoped, [], |_| anyhow::Ok(1u8)).with_teardown_fn(
            move |_| {
                closer_count.fetch_add(1, Ordering::SeqCst);
                let completion = release.lock().take();
                if let Some(completion) = completion {
                    completion.resolve(5u8);
                }
            },
        ),
    );
    let provider = services.build().unwrap();

    let scoped = provider.create_scope(|_| {}).unwrap();
    let scope = scoped.scope().unwrap();
    scoped.get::<u8>(&Key::name("closer")).unwrap();

    let delivered = Arc::new(Mutex::new(None));
    let sink = delivered.clone();
    scoped
        .provide(
            &Key::name("slow"),
            Box::new(move |result| *sink.lock() = Some(result.ok().and_then(|v| v.downcast_ref::<u8>().copied()))),
        )
        .unwrap();
    assert!(parked.lock().is_some());

    scoped.destroy_scope().unwrap();

    assert_eq!(closer_runs.load(Ordering::SeqCst), 1);
    assert_eq!(*delivered.lock(), Some(Some(5)));
    assert_eq!(slow_runs.load(Ordering::SeqCst), 0);
    assert!(scope.is_empty());
    assert!(scope.is_destroyed());
}
