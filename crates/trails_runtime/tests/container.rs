//! Registry and container behavior: ordering, injection, lookup and teardown.

use std::sync::Arc;

use parking_lot::Mutex;
use trails_runtime::prelude::*;

/// Shared log of lifecycle events.
type Journal = Arc<Mutex<Vec<String>>>;

struct Recorded {
    id: &'static str,
    journal: Journal,
    fail_teardown: bool,
}

impl Service for Recorded {
    fn destroy(&self) -> Result<(), ServiceError> {
        self.journal.lock().push(format!("destroy {}", self.id));
        if self.fail_teardown {
            return Err(format!("{} refused to stop", self.id).into());
        }
        Ok(())
    }
}

fn recorded(id: &'static str, journal: &Journal) -> ServiceDescriptor {
    let journal = Arc::clone(journal);
    ServiceDescriptor::new(id, move |_| {
        journal.lock().push(format!("construct {id}"));
        Ok(Recorded {
            id,
            journal: Arc::clone(&journal),
            fail_teardown: false,
        })
    })
}

#[derive(Debug)]
struct A;
impl Service for A {}

struct B {
    b: Arc<A>,
}
impl Service for B {}

#[test]
fn dependency_is_constructed_and_injected_first() {
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            ServiceDescriptor::new("A", |_| Ok(A)).provides("a.A"),
            ServiceDescriptor::new("B", |options| {
                Ok(B {
                    b: options.references.get_as::<A>("b")?,
                })
            })
            .provides("b.B")
            .reference("b", "a.A"),
        ])
        .unwrap();

    let container = registry.build().unwrap();
    assert_eq!(
        container.construction_order(),
        vec![&ServiceId::from("A"), &ServiceId::from("B")]
    );

    let a = container.get_as::<A>("a.A").unwrap();
    let b = container.get_as::<B>("b.B").unwrap();
    assert!(Arc::ptr_eq(&b.b, &a));
}

#[test]
fn registration_order_does_not_matter() {
    let journal = Journal::default();
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            recorded("Top", &journal)
                .provides("t.Top")
                .reference("mid", "m.Mid"),
            recorded("Mid", &journal)
                .provides("m.Mid")
                .reference("base", "b.Base"),
            recorded("Base", &journal).provides("b.Base"),
        ])
        .unwrap();

    let _container = registry.build().unwrap();
    assert_eq!(
        *journal.lock(),
        ["construct Base", "construct Mid", "construct Top"]
    );
}

#[test]
fn every_service_is_constructed_once() {
    let journal = Journal::default();
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            recorded("Shared", &journal).provides("s.Shared"),
            recorded("Left", &journal)
                .provides("l.Left")
                .reference("shared", "s.Shared"),
            recorded("Right", &journal)
                .provides("r.Right")
                .reference("shared", "s.Shared")
                .reference("left", "l.Left"),
        ])
        .unwrap();

    let container = registry.build().unwrap();
    assert_eq!(container.len(), 3);
    let constructed = journal
        .lock()
        .iter()
        .filter(|e| e.as_str() == "construct Shared")
        .count();
    assert_eq!(constructed, 1);
}

/// `S0 -> S1 -> ... -> S(len-1)`, optionally closed back to `S0`.
fn chain(len: usize, closed: bool) -> Vec<ServiceDescriptor> {
    (0..len)
        .map(|i| {
            let next = if i + 1 < len {
                Some(i + 1)
            } else if closed {
                Some(0)
            } else {
                None
            };
            let descriptor =
                ServiceDescriptor::new(format!("S{i}"), |_| Ok(A)).provides(format!("chain.S{i}"));
            match next {
                Some(next) => descriptor.reference("next", ReferenceSpec::single(format!("chain.S{next}"))),
                None => descriptor,
            }
        })
        .collect()
}

#[test]
fn long_dependency_chain_is_built() {
    const LEN: usize = 20_000;
    let mut registry = ServiceRegistry::new();
    registry.register(chain(LEN, false)).unwrap();

    let container = registry.build().unwrap();
    let order = container.construction_order();
    assert_eq!(order.len(), LEN);
    assert_eq!(order[0].as_str(), format!("S{}", LEN - 1));
    assert_eq!(order[LEN - 1].as_str(), "S0");
}

#[test]
fn long_cycle_is_reported() {
    const LEN: usize = 20_000;
    let mut registry = ServiceRegistry::new();
    registry.register(chain(LEN, true)).unwrap();

    let err = registry.build().unwrap_err();
    let ContainerError::CyclicDependency { cycle } = &err else {
        panic!("expected a cycle, got {err:?}");
    };
    assert_eq!(cycle.len(), LEN + 1);
    assert_eq!(cycle.first(), cycle.last());
    assert_eq!(cycle[1].as_str(), "S1");
}

#[test]
fn cycle_is_reported_with_both_services() {
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            ServiceDescriptor::new("A", |_| Ok(A))
                .provides("a.A")
                .reference("b", "b.B"),
            ServiceDescriptor::new("B", |_| Ok(A))
                .provides("b.B")
                .reference("a", "a.A"),
        ])
        .unwrap();

    let err = registry.build().unwrap_err();
    let ContainerError::CyclicDependency { cycle } = &err else {
        panic!("expected a cycle, got {err:?}");
    };
    assert_eq!(
        cycle,
        &[ServiceId::from("A"), ServiceId::from("B"), ServiceId::from("A")]
    );
    assert_eq!(
        err.to_string(),
        "cyclic dependency between services: A -> B -> A"
    );
}

#[test]
fn duplicate_unqualified_interface_is_rejected() {
    let mut registry = ServiceRegistry::new();
    registry
        .register([ServiceDescriptor::new("First", |_| Ok(A)).provides("x.Y")])
        .unwrap();

    let err = registry
        .register([ServiceDescriptor::new("Second", |_| Ok(A)).provides("x.Y")])
        .unwrap_err();
    assert!(matches!(
        err,
        ContainerError::DuplicateInterface { ref interface, qualifier: None, .. } if interface == "x.Y"
    ));
    assert_eq!(registry.len(), 1);
}

#[test]
fn rejected_batch_registers_nothing() {
    let mut registry = ServiceRegistry::new();
    let err = registry
        .register([
            ServiceDescriptor::new("Fine", |_| Ok(A)).provides("f.Fine"),
            ServiceDescriptor::new("Clash1", |_| Ok(A)).provides("x.Y"),
            ServiceDescriptor::new("Clash2", |_| Ok(A)).provides("x.Y"),
        ])
        .unwrap_err();

    assert!(matches!(err, ContainerError::DuplicateInterface { .. }));
    assert!(registry.is_empty());
    assert!(!registry.contains_service(&"Fine".into()));
}

#[test]
fn duplicate_service_id_is_rejected() {
    let mut registry = ServiceRegistry::new();
    let err = registry
        .register([
            ServiceDescriptor::new("Same", |_| Ok(A)),
            ServiceDescriptor::new("Same", |_| Ok(A)),
        ])
        .unwrap_err();
    assert!(matches!(err, ContainerError::DuplicateService(id) if id.as_str() == "Same"));
}

#[test]
fn missing_interface_lookups() {
    let container = ServiceRegistry::new().build().unwrap();

    assert!(container.get_all("x.Y").unwrap().is_empty());
    assert!(matches!(
        container.get("x.Y", LookupOptions::default()),
        Err(ContainerError::NotFound { ref interface, qualifier: None }) if interface == "x.Y"
    ));
}

#[test]
fn unresolved_reference_names_the_interface() {
    let mut registry = ServiceRegistry::new();
    registry
        .register([ServiceDescriptor::new("Needy", |_| Ok(A)).reference("dep", "missing.Dep")])
        .unwrap();

    let err = registry.build().unwrap_err();
    assert!(matches!(
        err,
        ContainerError::UnresolvedReference { ref interface, ref reference, .. }
            if interface == "missing.Dep" && reference == "dep"
    ));
}

struct Variant(&'static str);
impl Service for Variant {}

fn variants() -> Container {
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            ServiceDescriptor::new("Fast", |_| Ok(Variant("fast"))).provides_qualified("x.Y", "a"),
            ServiceDescriptor::new("Safe", |_| Ok(Variant("safe"))).provides_qualified("x.Y", "b"),
        ])
        .unwrap();
    registry.build().unwrap()
}

#[test]
fn qualified_lookup() {
    let container = variants();

    let a = container.get_qualified("x.Y", "a").unwrap();
    assert_eq!(a.id().as_str(), "Fast");
    assert_eq!(a.downcast::<Variant>().unwrap().0, "fast");

    assert!(matches!(
        container.get("x.Y", LookupOptions::qualified("c")),
        Err(ContainerError::NotFound { qualifier: Some(ref q), .. }) if q == "c"
    ));
}

#[test]
fn unqualified_lookup_among_variants_is_ambiguous() {
    let container = variants();
    let err = container.get("x.Y", LookupOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ContainerError::AmbiguousInterface { ref candidates, .. } if candidates.len() == 2
    ));
}

#[test]
fn get_all_returns_every_variant_in_registration_order() {
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            ServiceDescriptor::new("Q1", |_| Ok(Variant("q1"))).provides_qualified("x.Y", "one"),
            ServiceDescriptor::new("Default", |_| Ok(Variant("default"))).provides("x.Y"),
            ServiceDescriptor::new("Q2", |_| Ok(Variant("q2")))
                .provides_qualified("x.Y", "two")
                .provides_qualified("x.Y", "deux"),
        ])
        .unwrap();
    let container = registry.build().unwrap();

    let all: Vec<String> = container
        .get_all("x.Y")
        .unwrap()
        .iter()
        .map(|s| s.id().to_string())
        .collect();
    assert_eq!(all, ["Q1", "Default", "Q2"]);

    // The unqualified provider is the default.
    assert_eq!(container.get_as::<Variant>("x.Y").unwrap().0, "default");
}

struct Aggregator {
    parts: Vec<Arc<Variant>>,
}
impl Service for Aggregator {}

#[test]
fn all_reference_injects_every_provider() {
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            ServiceDescriptor::new("Aggregator", |options| {
                let parts = options
                    .references
                    .get_all("parts")?
                    .iter()
                    .map(ServiceRef::downcast::<Variant>)
                    .collect::<Result<_, _>>()?;
                Ok(Aggregator { parts })
            })
            .provides("agg.Aggregator")
            .reference("parts", ReferenceSpec::all("x.Part")),
            ServiceDescriptor::new("P1", |_| Ok(Variant("p1"))).provides_qualified("x.Part", "1"),
            ServiceDescriptor::new("P2", |_| Ok(Variant("p2"))).provides_qualified("x.Part", "2"),
        ])
        .unwrap();

    let container = registry.build().unwrap();
    let aggregator = container.get_as::<Aggregator>("agg.Aggregator").unwrap();
    let names: Vec<_> = aggregator.parts.iter().map(|p| p.0).collect();
    assert_eq!(names, ["p1", "p2"]);
    assert_eq!(
        container.construction_order().last().map(|id| id.as_str()),
        Some("Aggregator")
    );
}

#[test]
fn all_reference_may_be_empty() {
    let mut registry = ServiceRegistry::new();
    registry
        .register([ServiceDescriptor::new("Aggregator", |options| {
            assert!(options.references.get_all("parts")?.is_empty());
            Ok(Aggregator { parts: Vec::new() })
        })
        .reference("parts", ReferenceSpec::all("x.Part"))])
        .unwrap();
    assert!(registry.build().is_ok());
}

#[test]
fn qualified_reference_picks_the_variant() {
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            ServiceDescriptor::new("Fast", |_| Ok(Variant("fast"))).provides_qualified("x.Y", "a"),
            ServiceDescriptor::new("Safe", |_| Ok(Variant("safe"))).provides_qualified("x.Y", "b"),
            ServiceDescriptor::new("User", |options| {
                let picked = options.references.get_as::<Variant>("y")?;
                assert_eq!(picked.0, "safe");
                Ok(A)
            })
            .reference("y", ReferenceSpec::qualified("x.Y", "b")),
        ])
        .unwrap();
    assert!(registry.build().is_ok());
}

#[test]
fn dispose_runs_teardown_in_reverse_construction_order() {
    let journal = Journal::default();
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            recorded("A", &journal).provides("a.A"),
            recorded("B", &journal).provides("b.B").reference("a", "a.A"),
        ])
        .unwrap();

    let mut container = registry.build().unwrap();
    journal.lock().clear();
    container.dispose().unwrap();

    assert_eq!(*journal.lock(), ["destroy B", "destroy A"]);
    assert!(container.is_disposed());
    assert!(matches!(
        container.get("a.A", LookupOptions::default()),
        Err(ContainerError::Disposed)
    ));

    // Idempotent.
    container.dispose().unwrap();
    assert_eq!(journal.lock().len(), 2);
}

#[test]
fn teardown_failures_are_collected() {
    let journal = Journal::default();
    let mut registry = ServiceRegistry::new();
    let failing = |id: &'static str, journal: &Journal| {
        let journal = Arc::clone(journal);
        ServiceDescriptor::new(id, move |_| {
            Ok(Recorded {
                id,
                journal: Arc::clone(&journal),
                fail_teardown: true,
            })
        })
    };
    registry
        .register([
            failing("A", &journal).provides("a.A"),
            recorded("B", &journal).provides("b.B"),
            failing("C", &journal).provides("c.C"),
        ])
        .unwrap();

    let mut container = registry.build().unwrap();
    journal.lock().clear();
    let err = container.dispose().unwrap_err();

    assert_eq!(*journal.lock(), ["destroy C", "destroy B", "destroy A"]);
    let failed: Vec<_> = err.failures().iter().map(|f| f.service.as_str()).collect();
    assert_eq!(failed, ["C", "A"]);
}

#[test]
fn dropping_the_container_disposes_it() {
    let journal = Journal::default();
    let mut registry = ServiceRegistry::new();
    registry
        .register([recorded("Only", &journal)])
        .unwrap();

    drop(registry.build().unwrap());
    assert_eq!(*journal.lock(), ["construct Only", "destroy Only"]);
}

#[test]
fn factory_failure_rolls_back_constructed_services() {
    let journal = Journal::default();
    let mut registry = ServiceRegistry::new();
    registry
        .register([
            recorded("A", &journal).provides("a.A"),
            recorded("B", &journal).provides("b.B").reference("a", "a.A"),
            ServiceDescriptor::new("Broken", |_| -> Result<A, ServiceError> {
                Err("no backend".into())
            })
            .reference("b", "b.B"),
        ])
        .unwrap();

    let err = registry.build().unwrap_err();
    assert!(matches!(
        err,
        ContainerError::Construction { ref service, .. } if service.as_str() == "Broken"
    ));
    assert_eq!(
        *journal.lock(),
        ["construct A", "construct B", "destroy B", "destroy A"]
    );
}

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;
impl Service for English {}
impl Greeter for English {
    fn greet(&self) -> String {
        "hello".into()
    }
}

struct GreeterInterface;
impl Interface for GreeterInterface {
    const NAME: &'static str = "i18n.Greeter";
    type Api = dyn Greeter;
}

#[test]
fn views_and_interface_markers() {
    let mut registry = ServiceRegistry::new();
    registry
        .register([ServiceDescriptor::with_factory(
            "English",
            Arc::new(|_: ServiceOptions| -> Result<ServiceInstance, ServiceError> {
                let service = Arc::new(English);
                Ok(ServiceInstance::from_arc(Arc::clone(&service))
                    .with_view::<dyn Greeter>(service))
            }),
        )
        .provides(GreeterInterface::NAME)])
        .unwrap();
    let container = registry.build().unwrap();

    assert_eq!(container.resolve::<GreeterInterface>().unwrap().greet(), "hello");
    assert_eq!(container.resolve_all::<GreeterInterface>().unwrap().len(), 1);
    assert!(container.get_as::<English>(GreeterInterface::NAME).is_ok());

    let err = container.get_as::<A>(GreeterInterface::NAME).unwrap_err();
    assert!(matches!(err, ContainerError::TypeMismatch { .. }));
}
