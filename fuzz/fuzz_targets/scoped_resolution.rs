#![no_main]

use ferrous_resolve::{Behavior, DiError, Key, Resolver, ServiceCollection};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

// Builds a chain of services with fuzzed behaviors, then resolves fuzzed keys
// from the root and from a scope. Every outcome must be a value or a
// scope error, never a panic.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let (shape, requests) = data.split_at(data.len().min(8));

    let mut services = ServiceCollection::new();
    for (i, byte) in shape.iter().enumerate() {
        let behavior = match byte % 3 {
            0 => Behavior::Inherited,
            1 => Behavior::Prototype,
            _ => Behavior::Scoped,
        };
        let deps: Vec<Key> = if i == 0 { vec![] } else { vec![Key::name(format!("n{}", i - 1))] };
        services.add_fn(Key::name(format!("n{i}")), behavior, deps, move |_| anyhow::Ok(i));
    }
    let provider = services.build().unwrap();
    let scoped = provider.create_scope(|_| {}).unwrap();

    for byte in requests {
        let key = Key::name(format!("n{}", *byte as usize % shape.len()));
        let in_scope: Arc<usize> = scoped.get(&key).unwrap();
        match provider.get::<usize>(&key) {
            Ok(value) => assert_eq!(value, in_scope),
            Err(DiError::ScopeNotDefined(_)) => {}
            Err(other) => panic!("unexpected resolution error: {other}"),
        }
    }
    scoped.destroy_scope().unwrap();
});
