#![forbid(unsafe_code)]

//! Integration tests: bindings built, held, and released by the manager.

use std::rc::Rc;

use fbind_core::{MemberPath, MemberProvider, Metadata, PropertyBag, Value};
use fbind_harness::{CountingNode, CountingProvider, Probe, capture};
use fbind_runtime::manager::WeakTargetBindingHolder;
use fbind_runtime::{
    Binding, BindingBuilder, BindingConfig, BindingManager, BindingMode, BindingScope,
    BindingState,
};

fn manager() -> Rc<BindingManager> {
    let provider: Rc<dyn MemberProvider> = CountingProvider::new();
    BindingManager::new(provider)
}

fn holder(manager: &BindingManager) -> Rc<WeakTargetBindingHolder> {
    manager
        .components()
        .find::<WeakTargetBindingHolder>()
        .expect("default holder installed")
}

// ============================================================================
// Build and lookup
// ============================================================================

#[test]
fn text_bindings_sync_and_are_held() {
    let probe = Probe::new();
    let manager = manager();
    let owner = CountingNode::with(&probe, [("Name", "Ann")]);
    let model = CountingNode::with(&probe, [("Owner", owner.to_value())]);
    let view = PropertyBag::new();

    let bindings = manager
        .bind(
            &"Text = Owner.Name, Mode=TwoWay; Title = 'Profile'",
            &view.to_value(),
            &model.to_value(),
            None,
        )
        .unwrap();
    assert_eq!(bindings.len(), 2);
    assert_eq!(view.get("Text"), Some(Value::from("Ann")));
    assert_eq!(view.get("Title"), Some(Value::from("Profile")));

    view.set("Text", "Bea");
    assert_eq!(owner.get("Name"), Some(Value::from("Bea")));

    assert_eq!(manager.get_bindings(&view.to_value(), None, None).len(), 2);
    let text = manager.get_bindings(&view.to_value(), Some("Text"), None);
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].target().path().path(), "Text");
    assert!(manager.get_bindings(&model.to_value(), None, None).is_empty());
}

#[test]
fn disposing_a_held_binding_releases_everything() {
    let probe = Probe::new();
    let manager = manager();
    let owner = CountingNode::with(&probe, [("Name", "Ann")]);
    let model = CountingNode::with(&probe, [("Owner", owner.to_value())]);
    let view = PropertyBag::new();
    let bindings = manager
        .bind(&"Text = Owner.Name", &view.to_value(), &model.to_value(), None)
        .unwrap();
    assert_eq!(probe.counts().live(), 2);

    bindings[0].dispose();
    assert_eq!(bindings[0].state(), BindingState::Disposed);
    assert_eq!(probe.counts().live(), 0);
    assert!(manager.get_bindings(&view.to_value(), None, None).is_empty());
}

#[test]
fn rebinding_a_path_replaces_the_old_binding() {
    let probe = Probe::new();
    let manager = manager();
    let first = CountingNode::with(&probe, [("Name", "Ann")]);
    let second = CountingNode::with(&probe, [("Name", "Bea")]);
    let view = PropertyBag::new();

    let old = manager.bind(&"Text = Name", &view.to_value(), &first.to_value(), None).unwrap();
    let new = manager.bind(&"Text = Name", &view.to_value(), &second.to_value(), None).unwrap();

    assert_eq!(old[0].state(), BindingState::Disposed);
    assert_eq!(first.listener_count(), 0);
    assert_eq!(view.get("Text"), Some(Value::from("Bea")));
    let held = manager.get_bindings(&view.to_value(), Some("Text"), None);
    assert_eq!(held.len(), 1);
    assert!(std::ptr::addr_eq(Rc::as_ptr(&held[0]), Rc::as_ptr(&new[0])));
}

#[test]
fn dropped_views_release_their_sources() {
    let probe = Probe::new();
    let manager = manager();
    let model = CountingNode::with(&probe, [("Name", "Ann")]);
    {
        let view = PropertyBag::new();
        let bindings = manager
            .bind(&"Text = Name", &view.to_value(), &model.to_value(), None)
            .unwrap();
        drop(bindings);
        assert_eq!(model.listener_count(), 1);
    }

    // The holder keeps the binding but not the view.
    assert_eq!(model.listener_count(), 1);
    assert_eq!(holder(&manager).purge(), 1);
    assert_eq!(model.listener_count(), 0);
    assert_eq!(probe.counts().live(), 0);
}

// ============================================================================
// Build failures
// ============================================================================

#[test]
fn invalid_bindings_repeat_the_construction_error() {
    let manager = manager();
    let view = PropertyBag::new();
    let model = PropertyBag::new();
    let expected = MemberPath::parse("Owner..Name").unwrap_err();

    let bindings = manager
        .bind(&"Text = Owner..Name", &view.to_value(), &model.to_value(), None)
        .unwrap();
    let binding = &bindings[0];
    for _ in 0..3 {
        assert_eq!(binding.update_target().unwrap_err(), expected);
        assert_eq!(binding.update_source().unwrap_err(), expected);
    }
    assert_eq!(manager.get_bindings(&view.to_value(), Some("Text"), None).len(), 1);

    binding.dispose();
    assert_eq!(binding.update_target().unwrap_err(), expected);
    assert!(manager.get_bindings(&view.to_value(), None, None).is_empty());
}

#[test]
fn malformed_expressions_fail_up_front() {
    let manager = manager();
    let view = PropertyBag::new();
    assert!(
        manager
            .bind(&"Text = Name, Mode=Sideways", &view.to_value(), &Value::Null, None)
            .is_err()
    );
    assert!(manager.get_bindings(&view.to_value(), None, None).is_empty());
}

// ============================================================================
// Scope, config, logging
// ============================================================================

#[test]
fn scope_disposes_what_the_manager_built() {
    let probe = Probe::new();
    let manager = manager();
    let model = CountingNode::with(&probe, [("First", "Ann"), ("Last", "Lee")]);
    let view = PropertyBag::new();
    {
        let mut scope = BindingScope::new();
        for binding in manager
            .bind(&"First = First; Last = Last", &view.to_value(), &model.to_value(), None)
            .unwrap()
        {
            scope.hold(binding);
        }
        assert_eq!(scope.binding_count(), 2);
        assert_eq!(probe.counts().live(), 2);
    }
    assert_eq!(probe.counts().live(), 0);
    assert!(manager.get_bindings(&view.to_value(), None, None).is_empty());
}

#[test]
fn config_applies_unless_the_builder_overrides() {
    let provider: Rc<dyn MemberProvider> = CountingProvider::new();
    let manager = BindingManager::with_config(
        provider,
        BindingConfig::default().with_default_mode(BindingMode::TwoWay),
    );
    let model = PropertyBag::from_pairs([("A", 1), ("B", 2)]);
    let view = PropertyBag::new();
    manager
        .bind(&"A = A; B = B, Mode=OneWay", &view.to_value(), &model.to_value(), None)
        .unwrap();

    view.set("A", 10);
    view.set("B", 20);
    assert_eq!(model.get("A"), Some(Value::Int(10)));
    assert_eq!(model.get("B"), Some(Value::Int(2)));
}

#[cfg(feature = "policy-config")]
#[test]
fn config_can_come_from_toml() {
    let config = BindingConfig::from_toml_str("mode = \"OneTime\"\nreplace_existing = false\n").unwrap();
    let provider: Rc<dyn MemberProvider> = CountingProvider::new();
    let manager = BindingManager::with_config(provider, config);
    let model = PropertyBag::from_pairs([("A", 1)]);
    let view = PropertyBag::new();
    manager.bind(&"A = A", &view.to_value(), &model.to_value(), None).unwrap();
    manager.bind(&"A = A", &view.to_value(), &model.to_value(), None).unwrap();

    model.set("A", 2);
    assert_eq!(view.get("A"), Some(Value::Int(1)));
    assert_eq!(manager.get_bindings(&view.to_value(), Some("A"), None).len(), 2);
}

#[test]
fn lifecycle_is_logged_with_metadata_passthrough() {
    let manager = manager();
    let model = PropertyBag::from_pairs([("Name", "Ann")]);
    let view = PropertyBag::new();
    let metadata = Metadata::new().with("origin", "test");

    let (bindings, events) = capture(|| {
        let bindings = manager
            .bind(&"Text = Name", &view.to_value(), &model.to_value(), Some(&metadata))
            .unwrap();
        bindings[0].dispose();
        bindings
    });
    assert_eq!(bindings.len(), 1);

    let states: Vec<_> = events
        .iter()
        .filter(|e| e.message == "binding lifecycle changed")
        .filter_map(|e| e.field("state"))
        .collect();
    assert_eq!(states, vec!["Initialized", "Disposed"]);
}

#[test]
fn builders_carry_modes_through_the_manager() {
    let manager = manager();
    let model = PropertyBag::from_pairs([("Name", "Ann")]);
    let view = PropertyBag::from_pairs([("Text", "typed")]);
    let builder = BindingBuilder::new("Text")
        .source_path("Name")
        .mode(BindingMode::OneWayToSource);
    let binding = manager.build(&builder, &view.to_value(), &model.to_value(), None);

    assert_eq!(model.get("Name"), Some(Value::from("typed")));
    model.set("Name", "Bea");
    assert_eq!(view.get("Text"), Some(Value::from("typed")));
    assert_eq!(binding.state(), BindingState::Attached);
}
