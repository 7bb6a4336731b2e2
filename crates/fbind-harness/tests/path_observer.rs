#![forbid(unsafe_code)]

//! Integration tests: path observers over counted object graphs.

use std::rc::Rc;

use fbind_core::{BindingError, MemberProvider, PropertyBag, Value};
use fbind_harness::{
    CountingNode, CountingProvider, ObserverEvent, Probe, RecordingListener, capture,
    observe, observe_with,
};
use fbind_runtime::{MemberPathLastMember, MemberPathMembers, ObserverFlags};
use proptest::prelude::*;

fn provider() -> Rc<dyn MemberProvider> {
    CountingProvider::new()
}

/// `root.A.B.C` where every object is a counting node.
fn abc(probe: &Rc<Probe>, leaf: &str) -> (Rc<CountingNode>, Rc<CountingNode>, Rc<CountingNode>) {
    let b = CountingNode::with(probe, [("C", leaf)]);
    let a = CountingNode::with(probe, [("B", b.to_value())]);
    let root = CountingNode::with(probe, [("A", a.to_value())]);
    (root, a, b)
}

fn last_value(last: &MemberPathLastMember) -> Option<Value> {
    last.get_value().ok().flatten()
}

// ============================================================================
// Re-subscription
// ============================================================================

#[test]
fn walk_subscribes_once_per_segment() {
    let probe = Probe::new();
    let provider = provider();
    let (root, a, b) = abc(&probe, "x");
    let observer = observe(&root.to_value(), "A.B.C", &provider).unwrap();
    let listener = RecordingListener::new();
    observer.add_listener(&listener.shared());

    assert_eq!(probe.counts().subscribes, 3);
    assert_eq!((root.listener_count(), a.listener_count(), b.listener_count()), (1, 1, 1));

    // Asking again reuses the walked chain.
    let _ = observer.get_members(None);
    let _ = observer.get_last_member(None);
    assert_eq!(probe.counts().subscribes, 3);
}

#[test]
fn replacing_an_intermediate_moves_one_subscription() {
    let probe = Probe::new();
    let provider = provider();
    let (root, a, b) = abc(&probe, "x");
    let observer = observe(&root.to_value(), "A.B.C", &provider).unwrap();
    let listener = RecordingListener::new();
    observer.add_listener(&listener.shared());
    probe.reset();

    let replacement = CountingNode::with(&probe, [("C", "y")]);
    a.set("B", replacement.to_value());

    let counts = probe.counts();
    assert_eq!((counts.subscribes, counts.unsubscribes, counts.writes), (1, 1, 0));
    assert_eq!(b.listener_count(), 0);
    assert_eq!(replacement.listener_count(), 1);
    assert_eq!(listener.events(), vec![ObserverEvent::PathMembersChanged]);
    assert_eq!(last_value(&observer.get_last_member(None)), Some(Value::from("y")));
}

#[test]
fn replacing_near_the_root_rebuilds_the_whole_tail() {
    let probe = Probe::new();
    let provider = provider();
    let (root, a, b) = abc(&probe, "x");
    let observer = observe(&root.to_value(), "A.B.C", &provider).unwrap();
    let listener = RecordingListener::new();
    observer.add_listener(&listener.shared());
    probe.reset();

    let (_, a2, b2) = abc(&probe, "z");
    root.set("A", a2.to_value());

    let counts = probe.counts();
    assert_eq!((counts.subscribes, counts.unsubscribes), (2, 2));
    assert_eq!((a.listener_count(), b.listener_count()), (0, 0));
    assert_eq!((a2.listener_count(), b2.listener_count()), (1, 1));
    assert_eq!(root.listener_count(), 1);
}

proptest! {
    #[test]
    fn n_replacements_cost_n_subscriptions(n in 1usize..24) {
        let probe = Probe::new();
        let provider = provider();
        let (root, a, _b) = abc(&probe, "x");
        let observer = observe(&root.to_value(), "A.B.C", &provider).unwrap();
        let listener = RecordingListener::new();
        observer.add_listener(&listener.shared());
        probe.reset();

        for i in 0..n {
            let next = CountingNode::with(&probe, [("C", Value::Int(i as i64))]);
            a.set("B", next.to_value());
        }

        let counts = probe.counts();
        prop_assert_eq!(counts.subscribes, n as u64);
        prop_assert_eq!(counts.unsubscribes, n as u64);
        prop_assert_eq!(listener.count(&ObserverEvent::PathMembersChanged), n);
        prop_assert_eq!(
            last_value(&observer.get_last_member(None)),
            Some(Value::Int(n as i64 - 1))
        );
    }
}

#[test]
fn disposal_releases_every_subscription_once() {
    let probe = Probe::new();
    let provider = provider();
    let (root, a, _b) = abc(&probe, "x");
    let observer = observe(&root.to_value(), "A.B.C", &provider).unwrap();
    let listener = RecordingListener::new();
    observer.add_listener(&listener.shared());
    a.set("B", CountingNode::with(&probe, [("C", "y")]).to_value());

    observer.dispose();
    observer.dispose();
    let counts = probe.counts();
    assert_eq!(counts.live(), 0);
    assert_eq!(counts.subscribes, 4);
    assert!(matches!(
        observer.get_last_member(None),
        MemberPathLastMember::Error(BindingError::Disposed(_))
    ));
}

#[test]
fn subscriptions_follow_listener_presence() {
    let probe = Probe::new();
    let provider = provider();
    let (root, _a, _b) = abc(&probe, "x");
    let observer = observe(&root.to_value(), "A.B.C", &provider).unwrap();

    // Polling without listeners never subscribes.
    assert_eq!(last_value(&observer.get_last_member(None)), Some(Value::from("x")));
    assert_eq!(probe.counts().subscribes, 0);

    let listener = RecordingListener::new().shared();
    observer.add_listener(&listener);
    assert_eq!(probe.counts().live(), 3);
    observer.remove_listener(&listener);
    assert_eq!(probe.counts().live(), 0);
}

#[test]
fn intermediates_only_when_last_is_not_observed() {
    let probe = Probe::new();
    let provider = provider();
    let (root, _a, b) = abc(&probe, "x");
    let observer =
        observe_with(&root.to_value(), "A.B.C", ObserverFlags::OBSERVABLE, &provider).unwrap();
    let listener = RecordingListener::new();
    observer.add_listener(&listener.shared());

    assert_eq!(probe.counts().subscribes, 2);
    b.set("C", "y");
    assert!(listener.events().is_empty());
    assert_eq!(last_value(&observer.get_last_member(None)), Some(Value::from("y")));
}

// ============================================================================
// Scenario and sentinels
// ============================================================================

#[test]
fn owner_name_scenario() {
    let provider = provider();
    let owner = PropertyBag::from_pairs([("Name", "Ann")]);
    let root = PropertyBag::from_pairs([("Owner", owner.to_value())]);
    let observer = observe(&root.to_value(), "Owner.Name", &provider).unwrap();
    let listener = RecordingListener::new();
    observer.add_listener(&listener.shared());

    owner.set("Name", "Bea");
    assert_eq!(listener.events(), vec![ObserverEvent::LastMemberChanged]);

    listener.clear();
    root.set("Owner", PropertyBag::from_pairs([("Name", "Cid")]).to_value());
    assert_eq!(listener.events(), vec![ObserverEvent::PathMembersChanged]);
    assert_eq!(last_value(&observer.get_last_member(None)), Some(Value::from("Cid")));

    // The replaced owner is no longer observed.
    listener.clear();
    owner.set("Name", "Dee");
    assert!(listener.events().is_empty());
}

#[test]
fn null_root_is_unresolved_for_every_path_shape() {
    let provider = provider();
    for path in ["A", "A.B", "A.B.C", "Items[0].Name"] {
        let observer = observe(&Value::Null, path, &provider).unwrap();
        let listener = RecordingListener::new();
        observer.add_listener(&listener.shared());
        assert!(
            matches!(observer.get_last_member(None), MemberPathLastMember::Unresolved),
            "{path}"
        );
        assert!(matches!(observer.get_members(None), MemberPathMembers::Unresolved), "{path}");
        assert!(listener.events().is_empty(), "{path}");
    }
}

#[test]
fn missing_members_are_reported_once_per_walk() {
    let provider: Rc<dyn MemberProvider> = Rc::new(fbind_core::MemberRegistry::new());
    let list = fbind_core::ObservableList::from_vec(vec![Value::Int(1)]);
    let root = PropertyBag::from_pairs([("Items", list.to_value())]);
    let observer = observe(&root.to_value(), "Items.Missing", &provider).unwrap();
    let listener = RecordingListener::new();

    let ((), events) = capture(|| {
        observer.add_listener(&listener.shared());
    });
    let errors: Vec<_> = listener
        .events()
        .into_iter()
        .filter(|e| matches!(e, ObserverEvent::Error(BindingError::MemberNotFound { .. })))
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(events.iter().any(|e| e.message == "member path walk failed"
        && e.field("path") == Some("Items.Missing")));
    // Resolution misses are traced by the registry itself.
    assert!(events.iter().any(|e| e.message == "member not resolved"
        && e.field("member") == Some("Missing")));
    assert!(matches!(
        observer.get_last_member(None),
        MemberPathLastMember::Error(BindingError::MemberNotFound { .. })
    ));
}

// ============================================================================
// Listeners
// ============================================================================

#[test]
fn dead_listeners_are_skipped_and_pruned() {
    let probe = Probe::new();
    let provider = provider();
    let (root, _a, b) = abc(&probe, "x");
    let observer = observe(&root.to_value(), "A.B.C", &provider).unwrap();
    let keep = RecordingListener::new();
    let killed = RecordingListener::new();
    observer.add_listener(&keep.shared());
    observer.add_listener(&killed.shared());
    assert_eq!(observer.get_listeners().len(), 2);

    killed.kill();
    b.set("C", "y");

    assert_eq!(keep.events(), vec![ObserverEvent::LastMemberChanged]);
    assert!(killed.events().is_empty());
    assert_eq!(observer.get_listeners().len(), 1);
}

#[test]
fn dropped_listeners_disappear() {
    let probe = Probe::new();
    let provider = provider();
    let (root, _a, b) = abc(&probe, "x");
    let observer = observe(&root.to_value(), "A.B.C", &provider).unwrap();
    {
        let transient = RecordingListener::new();
        observer.add_listener(&transient.shared());
    }
    assert!(observer.get_listeners().is_empty());
    b.set("C", "y");
    assert!(observer.get_listeners().is_empty());
}

#[test]
fn duplicate_listeners_are_ignored() {
    let provider = provider();
    let bag = PropertyBag::from_pairs([("Name", "Ann")]);
    let observer = observe(&bag.to_value(), "Name", &provider).unwrap();
    let listener = RecordingListener::new().shared();
    assert!(observer.add_listener(&listener));
    assert!(!observer.add_listener(&listener));
    bag.set("Name", "Bea");
    assert_eq!(observer.get_listeners().len(), 1);
    assert!(observer.remove_listener(&listener));
    assert!(!observer.remove_listener(&listener));
}
