use couplings::{CouplingDescriptor, CouplingError};
use mock::{make_workspace, Recorder, Source};
use workspace::WorkspaceError;

#[test]
fn couplings_round_trip_through_descriptors() {
    let original = make_workspace(1).expect("workspace");
    let source = Source::constant("source", 3.0);
    let recorder = Recorder::new("recorder");
    let echo = Recorder::new("echo");
    original.add_component(source.clone()).expect("add");
    original.add_component(recorder.clone()).expect("add");
    original.add_component(echo.clone()).expect("add");
    original
        .couple_keys(&source.output(), &recorder.input())
        .expect("couple");
    original
        .couple_keys(&recorder.last(), &echo.input())
        .expect("chain");
    let saved = serde_json::to_string_pretty(&original.coupling_descriptors()).expect("save");

    let restored = make_workspace(1).expect("workspace");
    let source2 = Source::constant("source", 3.0);
    let recorder2 = Recorder::new("recorder");
    let echo2 = Recorder::new("echo");
    restored.add_component(source2).expect("add");
    restored.add_component(recorder2.clone()).expect("add");
    restored.add_component(echo2.clone()).expect("add");
    let descriptors: Vec<CouplingDescriptor> = serde_json::from_str(&saved).expect("load");
    let couplings = restored.restore_couplings(&descriptors).expect("restore");

    assert_eq!(couplings.len(), 2);
    assert_eq!(restored.coupling_descriptors(), original.coupling_descriptors());

    restored.iterate(3).expect("ticks");
    assert_eq!(recorder2.observed(), vec![0.0, 3.0, 3.0]);
    assert_eq!(echo2.observed(), vec![0.0, 0.0, 3.0]);
}

#[test]
fn restore_fails_for_missing_component() {
    let original = make_workspace(1).expect("workspace");
    let source = Source::constant("source", 1.0);
    let recorder = Recorder::new("recorder");
    original.add_component(source.clone()).expect("add");
    original.add_component(recorder.clone()).expect("add");
    original
        .couple_keys(&source.output(), &recorder.input())
        .expect("couple");

    let restored = make_workspace(1).expect("workspace");
    restored.add_component(Recorder::new("recorder")).expect("add");

    let err = restored
        .restore_couplings(&original.coupling_descriptors())
        .expect_err("source missing");
    assert!(matches!(
        err,
        WorkspaceError::Coupling(CouplingError::UnresolvedAttribute(ref key)) if key.owner.as_str() == "source"
    ));
}
