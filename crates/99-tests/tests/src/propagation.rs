use std::sync::Arc;

use mock::{make_workspace, Leaky, Recorder, Source};
use update_actions::SyncCouplingsAction;

use crate::init_logging;

#[test]
fn coupled_value_reaches_consumer_one_tick_later() {
    init_logging();
    let workspace = make_workspace(2).expect("workspace");
    let a = Source::constant("a", 5.0);
    let b = Recorder::new("b");
    workspace.add_component(a.clone()).expect("add");
    workspace.add_component(b.clone()).expect("add");
    workspace
        .couple_keys(&a.output(), &b.input())
        .expect("couple");

    workspace.run_once().expect("tick 1");
    assert_eq!(b.observed(), vec![0.0]);

    workspace.run_once().expect("tick 2");
    assert_eq!(b.observed(), vec![0.0, 5.0]);
}

#[test]
fn update_all_steps_against_previous_tick_values() {
    let workspace = make_workspace(4).expect("workspace");
    let ramp = Source::ramp("ramp", 0.0, 1.0);
    let recorder = Recorder::new("recorder");
    workspace.add_component(ramp.clone()).expect("add");
    workspace.add_component(recorder.clone()).expect("add");
    workspace
        .couple_keys(&ramp.output(), &recorder.input())
        .expect("couple");

    workspace.iterate(3).expect("ticks");

    assert_eq!(ramp.value(), 3.0);
    assert_eq!(recorder.observed(), vec![0.0, 1.0, 2.0]);
}

#[test]
fn per_component_actions_run_in_list_order() {
    let workspace = make_workspace(2).expect("workspace");
    let ramp = Source::ramp("ramp", 0.0, 1.0);
    let recorder = Recorder::new("recorder");
    let ramp_id = workspace.add_component(ramp.clone()).expect("add").id();
    let recorder_id = workspace.add_component(recorder.clone()).expect("add").id();
    workspace
        .couple_keys(&ramp.output(), &recorder.input())
        .expect("couple");

    let actions = workspace.update_action_manager();
    actions.clear();
    actions.add_action(actions.component_action(ramp_id).expect("ramp action"));
    actions.add_action(Arc::new(SyncCouplingsAction));
    actions.add_action(actions.component_action(recorder_id).expect("recorder action"));

    workspace.iterate(2).expect("ticks");

    assert_eq!(recorder.observed(), vec![1.0, 2.0]);
}

#[test]
fn one_producer_feeds_many_consumers() {
    let workspace = make_workspace(2).expect("workspace");
    let source = Source::constant("source", 2.5);
    let left = Recorder::new("left");
    let right = Recorder::new("right");
    workspace.add_component(source.clone()).expect("add");
    workspace.add_component(left.clone()).expect("add");
    workspace.add_component(right.clone()).expect("add");
    workspace
        .couple_keys(&source.output(), &left.input())
        .expect("left");
    workspace
        .couple_keys(&source.output(), &right.input())
        .expect("right");

    workspace.iterate(2).expect("ticks");

    assert_eq!(left.observed(), vec![0.0, 2.5]);
    assert_eq!(right.observed(), vec![0.0, 2.5]);
}

#[test]
fn worker_count_does_not_change_uncoupled_results() {
    fn simulate(workers: usize) -> Vec<f64> {
        let workspace = make_workspace(workers).expect("workspace");
        let filters: Vec<_> = (0..12)
            .map(|i| {
                let filter = Leaky::new(&format!("f{i}"), 0.5 + i as f64 * 0.03, 1.0 + i as f64);
                workspace.add_component(filter.clone()).expect("add");
                filter
            })
            .collect();
        workspace.iterate(25).expect("ticks");
        filters.iter().map(|f| f.value()).collect()
    }

    let serial = simulate(1);
    let parallel = simulate(8);
    assert_eq!(serial, parallel);
}

/// Two filters driving each other. Every update reads the partner value
/// synchronized at the end of the previous tick, never one updated
/// earlier in the same tick.
#[test]
fn mutually_coupled_filters_follow_previous_tick_values() {
    fn simulate(workers: usize) -> Vec<(f64, f64)> {
        let workspace = make_workspace(workers).expect("workspace");
        let a = Leaky::new("a", 0.5, 1.0);
        let b = Leaky::new("b", 0.25, 2.0);
        workspace.add_component(a.clone()).expect("add");
        workspace.add_component(b.clone()).expect("add");
        workspace.couple_keys(&a.output(), &b.input()).expect("a>b");
        workspace.couple_keys(&b.output(), &a.input()).expect("b>a");

        (0..3)
            .map(|_| {
                workspace.run_once().expect("tick");
                (a.value(), b.value())
            })
            .collect()
    }

    // a' = 0.5 a + 1 + b_prev, b' = 0.25 b + 2 + a_prev
    let expected = vec![(1.0, 2.0), (3.5, 3.5), (6.25, 6.375)];
    assert_eq!(simulate(1), expected);
    assert_eq!(simulate(8), expected);
}

/// A ring of filters, each fed by its predecessor, ends in the same state
/// regardless of how many workers step it.
#[test]
fn worker_count_does_not_change_coupled_ring() {
    fn simulate(workers: usize) -> Vec<f64> {
        let workspace = make_workspace(workers).expect("workspace");
        let ring: Vec<_> = (0..10)
            .map(|i| {
                let filter = Leaky::new(&format!("r{i}"), 0.4 + i as f64 * 0.05, i as f64);
                workspace.add_component(filter.clone()).expect("add");
                filter
            })
            .collect();
        for (i, filter) in ring.iter().enumerate() {
            let next = &ring[(i + 1) % ring.len()];
            workspace
                .couple_keys(&filter.output(), &next.input())
                .expect("couple");
        }
        workspace.iterate(20).expect("ticks");
        ring.iter().map(|f| f.value()).collect()
    }

    assert_eq!(simulate(1), simulate(8));
}

