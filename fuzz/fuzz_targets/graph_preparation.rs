#![no_main]

use ferrous_resolve::graph;
use ferrous_resolve::{Behavior, DiError, EngineConfig, Key, ServiceDescriptor};
use libfuzzer_sys::fuzz_target;

fn behavior(byte: u8) -> Behavior {
    match byte % 4 {
        0 => Behavior::Inherited,
        1 => Behavior::Singleton,
        2 => Behavior::Prototype,
        _ => Behavior::Scoped,
    }
}

// Each pair of bytes is one node: its behavior and a bitmask of up to eight
// dependencies among the first eight nodes. Edges may point anywhere, so
// cycles, self edges and missing keys all show up.
fuzz_target!(|data: &[u8]| {
    let nodes: Vec<(Behavior, u8)> = data.chunks_exact(2).take(16).map(|c| (behavior(c[0]), c[1])).collect();
    if nodes.is_empty() {
        return;
    }

    let descriptors: Vec<ServiceDescriptor> = nodes
        .iter()
        .enumerate()
        .map(|(i, (behavior, mask))| {
            let deps = (0..8).filter(|bit| mask & (1 << bit) != 0).map(|j| Key::name(format!("n{j}")));
            ServiceDescriptor::from_fn(Key::name(format!("n{i}")), *behavior, deps, |_| anyhow::Ok(()))
        })
        .collect();

    // The standalone passes must terminate on cyclic input too.
    let _ = graph::validate_behaviors(&descriptors);
    match graph::propagate_behaviors(descriptors.clone()) {
        Ok(propagated) => assert!(propagated.iter().all(|d| d.behavior().is_concrete())),
        Err(DiError::Circular { path, .. }) => assert_eq!(path.first(), path.last()),
        Err(other) => panic!("unexpected propagation error: {other}"),
    }

    let relaxed = EngineConfig {
        strict_dependencies: false,
        ..EngineConfig::default()
    };
    match graph::prepare(descriptors, &relaxed) {
        Ok(prepared) => {
            assert_eq!(prepared.len(), nodes.len());
            assert!(prepared.iter().all(|d| d.behavior().is_concrete()));
            graph::validate_behaviors(&prepared).unwrap();
        }
        Err(DiError::Circular { path, .. }) => {
            assert!(path.len() >= 2);
            assert_eq!(path.first(), path.last());
        }
        Err(DiError::IncompatibleBehavior { .. }) => {}
        Err(other) => panic!("unexpected preparation error: {other}"),
    }
});
