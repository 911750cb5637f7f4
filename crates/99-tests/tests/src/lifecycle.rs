use std::sync::Arc;

use attribute_abi::{AttributeError, ComponentEvent};
use couplings::CouplingEvent;
use mock::{make_workspace, FailureMode, Faulty, Recorder, Source, World};
use update_actions::{ActionEvent, ActionTarget};
use updater::UpdaterEvent;
use workspace::WorkspaceError;

use crate::init_logging;

#[test]
fn removing_component_drops_its_couplings_and_actions() {
    init_logging();
    let workspace = make_workspace(2).expect("workspace");
    let a = Source::constant("a", 1.0);
    let b = Recorder::new("b");
    let c = Recorder::new("c");
    let a_id = workspace.add_component(a.clone()).expect("add").id();
    workspace.add_component(b.clone()).expect("add");
    workspace.add_component(c.clone()).expect("add");
    workspace.couple_keys(&a.output(), &b.input()).expect("a>b");
    workspace.couple_keys(&a.output(), &c.input()).expect("a>c");
    workspace.couple_keys(&b.last(), &c.input()).expect("b>c");

    let actions = workspace.update_action_manager();
    let generated = actions.component_action(a_id).expect("generated");
    actions.add_action(generated);
    let action_events = actions.subscribe();
    let component_events = workspace.component_registry().subscribe();

    let removed = workspace.remove_component(a_id).expect("removed");
    assert_eq!(removed.id(), a_id);

    let couplings = workspace.couplings();
    assert_eq!(couplings.len(), 1);
    let owners: Vec<_> = couplings
        .iter()
        .flat_map(|c| [c.producer().owner().clone(), c.consumer().owner().clone()])
        .collect();
    assert!(owners.iter().all(|owner| owner.as_str() != "a"));

    let scheduled = actions.snapshot();
    assert_eq!(scheduled.len(), 2);
    assert!(scheduled
        .iter()
        .all(|action| action.target() != ActionTarget::Component(a_id)));
    assert!(actions.component_action(a_id).is_none());

    assert!(matches!(
        component_events.try_recv(),
        Ok(ComponentEvent::Removed(ref h)) if h.id() == a_id
    ));
    assert!(action_events
        .try_iter()
        .any(|e| matches!(e, ActionEvent::Removed(ref a) if a.target() == ActionTarget::Component(a_id))));

    assert!(workspace.remove_component(a_id).is_none());
    workspace.run_once().expect("tick without a");
}

#[test]
fn failing_component_is_isolated_and_skipped_until_cleared() {
    init_logging();
    let workspace = make_workspace(3).expect("workspace");
    let failing = Faulty::new("failing", 2, FailureMode::Error);
    let healthy = Source::ramp("healthy", 0.0, 1.0);
    let failing_id = workspace.add_component(failing.clone()).expect("add").id();
    workspace.add_component(healthy.clone()).expect("add");
    let events = workspace.updater().subscribe();

    workspace.iterate(2).expect("ticks 1-2");
    assert_eq!(failing.calls(), 2);
    assert_eq!(healthy.value(), 2.0);
    assert!(workspace.updater().is_faulted(failing_id));
    assert_eq!(workspace.updater().ticks(), 2);

    workspace.run_once().expect("tick 3");
    assert_eq!(failing.calls(), 2);
    assert_eq!(healthy.value(), 3.0);

    let faults: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            UpdaterEvent::ComponentFaulted(fault) => Some(fault),
            _ => None,
        })
        .collect();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].tick, 1);
    assert_eq!(faults[0].name, "failing");

    assert!(workspace.updater().clear_fault(failing_id));
    workspace.run_once().expect("tick 4");
    assert_eq!(failing.calls(), 3);
}

#[test]
fn panicking_component_does_not_poison_the_pool() {
    let workspace = make_workspace(1).expect("workspace");
    let panicky = Faulty::new("panicky", 1, FailureMode::Panic);
    let healthy = Source::ramp("healthy", 0.0, 1.0);
    workspace.add_component(panicky.clone()).expect("add");
    workspace.add_component(healthy.clone()).expect("add");

    workspace.iterate(4).expect("ticks");

    assert_eq!(panicky.calls(), 1);
    assert_eq!(healthy.value(), 4.0);
    let faults = workspace.updater().faults();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].message, "panicky panicked on update 1");
}

#[test]
fn removed_faulted_component_leaves_no_fault_behind() {
    let workspace = make_workspace(1).expect("workspace");
    let failing = Faulty::new("failing", 1, FailureMode::Error);
    let id = workspace.add_component(failing).expect("add").id();
    workspace.run_once().expect("tick");
    assert!(workspace.updater().is_faulted(id));

    workspace.remove_component(id);
    workspace.run_once().expect("tick");

    assert!(workspace.updater().faults().is_empty());
}

#[test]
fn defaults_survive_repeated_reset() {
    let workspace = make_workspace(1).expect("workspace");
    let actions = workspace.update_action_manager();
    actions.add_action(Arc::new(update_actions::DelayAction::default()));

    actions.set_default_update_actions();
    actions.set_default_update_actions();

    let descriptions: Vec<_> = actions.snapshot().iter().map(|a| a.description()).collect();
    assert_eq!(
        descriptions,
        vec!["Update all components", "Synchronize all couplings"]
    );
}

#[test]
fn despawned_entity_prunes_its_couplings_on_next_access() {
    init_logging();
    let workspace = make_workspace(2).expect("workspace");
    let world = World::new("world");
    world.spawn("e1", 5.0);
    world.spawn("e2", 0.0);
    let recorder = Recorder::new("recorder");
    workspace.add_component(world.clone()).expect("add");
    workspace.add_component(recorder.clone()).expect("add");
    workspace
        .couple_keys(&world.position("e1"), &recorder.input())
        .expect("couple");
    workspace.run_once().expect("tick");
    assert_eq!(workspace.couplings().len(), 1);

    assert!(world.despawn("e1"));

    assert!(workspace.couplings().is_empty());
    workspace.run_once().expect("tick");
    assert_eq!(recorder.observed(), vec![0.0, 6.0]);
}

#[test]
fn removing_component_drops_couplings_into_withdrawn_containers() {
    let workspace = make_workspace(1).expect("workspace");
    let world = World::new("world");
    world.spawn("e1", 0.0);
    let recorder = Recorder::new("recorder");
    let world_id = workspace.add_component(world.clone()).expect("add").id();
    workspace.add_component(recorder.clone()).expect("add");
    let coupling = workspace
        .couple_keys(&world.position("e1"), &recorder.input())
        .expect("couple");
    let events = workspace.coupling_manager().subscribe();

    world.despawn("e1");
    workspace.remove_component(world_id).expect("removed");

    let dropped: Vec<_> = events
        .try_iter()
        .flat_map(|e| match e {
            CouplingEvent::BulkRemoved(list) => list,
            CouplingEvent::Removed(c) => vec![c],
            CouplingEvent::Added(_) => Vec::new(),
        })
        .map(|c| c.id())
        .collect();
    assert_eq!(dropped, vec![coupling.id()]);
    assert!(workspace.couplings().is_empty());
}

#[test]
fn same_named_components_cannot_share_containers() {
    let workspace = make_workspace(1).expect("workspace");
    let source = Source::constant("source", 1.0);
    let first = Recorder::new("dup");
    workspace.add_component(source.clone()).expect("add");
    let first_id = workspace.add_component(first.clone()).expect("add").id();
    workspace
        .couple_keys(&source.output(), &first.input())
        .expect("couple");

    let err = workspace
        .add_component(Recorder::new("dup"))
        .expect_err("container taken");
    let WorkspaceError::Attribute(AttributeError::DuplicateContainer(id)) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(id.as_str(), "dup");
    assert_eq!(workspace.couplings().len(), 1);

    workspace.remove_component(first_id).expect("removed");
    let second = Recorder::new("dup");
    workspace.add_component(second.clone()).expect("add after removal");
    workspace
        .couple_keys(&source.output(), &second.input())
        .expect("couple");
    assert_eq!(workspace.couplings().len(), 1);
}
