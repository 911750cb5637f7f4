use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mock::{make_workspace, Recorder, Source};
use update_actions::{ActionFlow, DelayAction, FnAction};
use updater::{UpdaterError, UpdaterEvent, UpdaterState};
use workspace::WorkspaceError;

use crate::init_logging;

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    check()
}

#[test]
fn stop_during_run_returns_to_idle() {
    init_logging();
    let workspace = make_workspace(2).expect("workspace");
    let ramp = Source::ramp("ramp", 0.0, 1.0);
    workspace.add_component(ramp.clone()).expect("add");
    let events = workspace.updater().subscribe();

    workspace.run().expect("run");
    assert!(wait_until(Duration::from_secs(5), || ramp.value() >= 3.0));
    workspace.stop();
    workspace.updater().join();

    assert_eq!(workspace.updater().state(), UpdaterState::Idle);
    let states: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            UpdaterEvent::StateChanged(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            UpdaterState::Running,
            UpdaterState::Stopping,
            UpdaterState::Idle
        ]
    );
}

#[test]
fn terminate_action_ends_run() {
    let workspace = make_workspace(2).expect("workspace");
    let ramp = Source::ramp("ramp", 0.0, 1.0);
    workspace.add_component(ramp.clone()).expect("add");
    let watched = Arc::clone(&ramp);
    workspace
        .update_action_manager()
        .add_action(Arc::new(FnAction::new("Stop at ten", move |_| {
            if watched.value() >= 10.0 {
                ActionFlow::Terminate
            } else {
                ActionFlow::Continue
            }
        })));

    workspace.run().expect("run");
    workspace.updater().join();

    assert_eq!(ramp.value(), 10.0);
    assert_eq!(workspace.updater().ticks(), 10);
    assert_eq!(workspace.updater().state(), UpdaterState::Idle);
}

#[test]
fn control_calls_are_rejected_while_running() {
    let workspace = make_workspace(1).expect("workspace");
    workspace
        .update_action_manager()
        .add_action(Arc::new(DelayAction::new(Duration::from_millis(2))));
    workspace.run().expect("run");

    assert!(matches!(
        workspace.run_once(),
        Err(WorkspaceError::Updater(UpdaterError::Busy(_)))
    ));
    assert!(matches!(
        workspace.iterate(3),
        Err(WorkspaceError::Updater(UpdaterError::Busy(_)))
    ));

    workspace.stop();
    workspace.updater().join();
    workspace.run_once().expect("idle again");
}

#[test]
fn structure_can_change_while_running() {
    let workspace = make_workspace(2).expect("workspace");
    workspace
        .update_action_manager()
        .add_action(Arc::new(DelayAction::new(Duration::from_millis(1))));
    workspace.run().expect("run");

    let source = Source::constant("late-source", 4.0);
    let recorder = Recorder::new("late-recorder");
    workspace.add_component(source.clone()).expect("add");
    let recorder_id = workspace.add_component(recorder.clone()).expect("add").id();
    workspace
        .couple_keys(&source.output(), &recorder.input())
        .expect("couple while running");

    assert!(wait_until(Duration::from_secs(5), || recorder
        .observed()
        .contains(&4.0)));

    workspace.remove_component(recorder_id);
    assert!(workspace.couplings().is_empty());
    let seen = recorder.observed().len();
    thread::sleep(Duration::from_millis(20));
    // At most the in-flight tick may still step the removed recorder.
    assert!(recorder.observed().len() <= seen + 1);

    workspace.stop();
    workspace.updater().join();
    assert_eq!(workspace.updater().state(), UpdaterState::Idle);
}
