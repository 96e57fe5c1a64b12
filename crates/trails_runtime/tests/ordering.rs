//! Property tests for construction ordering.
//!
//! Random acyclic graphs are registered in random order; construction must
//! instantiate every service exactly once and never before its dependencies.
//! Closing a random chain into a ring must always be reported as a cycle.

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use trails_runtime::prelude::*;

struct Node;
impl Service for Node {}

fn interface(node: usize) -> String {
    format!("n{node}.Node")
}

/// `edges[i * n + j]` with `j < i` means node `i` references node `j`.
fn descriptor(node: usize, n: usize, edges: &[bool], journal: &Arc<Mutex<Vec<usize>>>) -> ServiceDescriptor {
    let journal = Arc::clone(journal);
    let mut descriptor = ServiceDescriptor::new(format!("N{node}"), move |_| {
        journal.lock().push(node);
        Ok(Node)
    })
    .provides(interface(node));

    for dep in 0..node {
        if edges[node * n + dep] {
            descriptor = descriptor.reference(format!("dep{dep}"), interface(dep).as_str());
        }
    }
    descriptor
}

fn arb_dag() -> impl Strategy<Value = (usize, Vec<bool>, Vec<usize>)> {
    (1..12usize).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec(any::<bool>(), n * n),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_dependencies_are_constructed_first((n, edges, order) in arb_dag()) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry
            .register(order.iter().map(|&node| descriptor(node, n, &edges, &journal)))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let container = registry.build().map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(container.len(), n);

        let constructed = journal.lock().clone();
        prop_assert_eq!(constructed.len(), n);

        let mut position = vec![usize::MAX; n];
        for (at, &node) in constructed.iter().enumerate() {
            prop_assert_eq!(position[node], usize::MAX, "N{} constructed twice", node);
            position[node] = at;
        }
        for node in 0..n {
            for dep in 0..node {
                if edges[node * n + dep] {
                    prop_assert!(position[dep] < position[node], "N{} before its dependency N{}", node, dep);
                }
            }
        }
    }

    #[test]
    fn prop_rings_are_cycles(len in 1..8usize, extra in 0..4usize) {
        let mut registry = ServiceRegistry::new();
        let ring = (0..len).map(|node| {
            ServiceDescriptor::new(format!("R{node}"), |_| Ok(Node))
                .provides(interface(node))
                .reference("next", interface((node + 1) % len).as_str())
        });
        let leaves = (0..extra).map(|leaf| {
            ServiceDescriptor::new(format!("L{leaf}"), |_| Ok(Node))
                .reference("ring", interface(0).as_str())
        });
        registry
            .register(leaves.chain(ring))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        match registry.build() {
            Err(ContainerError::CyclicDependency { cycle }) => {
                prop_assert_eq!(cycle.len(), len + 1);
                prop_assert_eq!(cycle.first(), cycle.last());
                for node in 0..len {
                    let id = ServiceId::from(format!("R{node}"));
                    prop_assert!(cycle.contains(&id));
                }
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other.map(|c| c.len())),
        }
    }
}
