//! Benchmarks for member path observation and binding updates.
//!
//! Run with: `cargo bench --package fbind-runtime --bench observer_bench`
//!
//! # Performance Baselines
//!
//! - Cold walk of a path of increasing depth (no subscriptions)
//! - Re-resolution after replacing an intermediate object
//! - Last-member change delivered through a two-way binding

use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use fbind_core::{MemberPath, MemberProvider, MemberRegistry, PropertyBag, Value};
use fbind_runtime::binding::{Binding, BindingMode, BindingSource, DataBinding};
use fbind_runtime::observer::{
    MemberPathObserver, MemberPathObserverListener, ObserverRequest, create_observer,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Build `root.Child.Child...Name` with `depth` segments; returns every bag
/// along the chain.
fn chain(depth: usize) -> (Vec<Rc<PropertyBag>>, String) {
    let leaf = PropertyBag::from_pairs([("Name", "leaf")]);
    let mut bags = vec![leaf];
    for _ in 1..depth {
        let child = bags[bags.len() - 1].to_value();
        bags.push(PropertyBag::from_pairs([("Child", child)]));
    }
    bags.reverse();
    let mut path = vec!["Child"; depth - 1];
    path.push("Name");
    (bags, path.join("."))
}

fn path(raw: &str) -> MemberPath {
    MemberPath::parse(raw).unwrap_or_else(|_| MemberPath::empty())
}

fn provider() -> Rc<dyn MemberProvider> {
    Rc::new(MemberRegistry::new())
}

struct Quiet;
impl MemberPathObserverListener for Quiet {}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_cold_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("observer/cold_walk");
    let provider = provider();
    for depth in [1usize, 3, 8] {
        let (bags, raw) = chain(depth);
        let observer = create_observer(
            ObserverRequest::new(bags[0].to_value(), path(&raw)),
            Rc::clone(&provider),
        );
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| black_box(observer.get_last_member(None)));
        });
    }
    group.finish();
}

fn bench_reresolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("observer/reresolve");
    let provider = provider();
    for depth in [3usize, 8] {
        let (bags, raw) = chain(depth);
        let observer: Rc<dyn MemberPathObserver> = create_observer(
            ObserverRequest::new(bags[0].to_value(), path(&raw)),
            Rc::clone(&provider),
        );
        let listener: Rc<dyn MemberPathObserverListener> = Rc::new(Quiet);
        observer.add_listener(&listener);
        let original = bags[1].to_value();
        let replacement = {
            let (copy, _) = chain(depth - 1);
            copy[0].to_value()
        };
        let mut flip = false;
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                flip = !flip;
                let next = if flip { &replacement } else { &original };
                bags[0].set("Child", next.clone());
            });
        });
    }
    group.finish();
}

fn bench_binding_update(c: &mut Criterion) {
    let provider = provider();
    let model = PropertyBag::from_pairs([("Count", 0)]);
    let view = PropertyBag::new();
    let target = create_observer(
        ObserverRequest::new(view.to_value(), path("Text")),
        Rc::clone(&provider),
    );
    let source = create_observer(
        ObserverRequest::new(model.to_value(), path("Count")),
        provider,
    );
    let binding = DataBinding::new(target, BindingSource::observer(source));
    binding.add_component(BindingMode::TwoWay.component());
    binding.attach();

    let mut n = 0i64;
    c.bench_function("binding/source_change", |b| {
        b.iter(|| {
            n += 1;
            model.set("Count", Value::Int(n));
        });
    });
    binding.dispose();
}

criterion_group!(benches, bench_cold_walk, bench_reresolve, bench_binding_update);
criterion_main!(benches);
