//! Stage sequencer tests

use dockmon::pipeline::sequencer::CANCELLED_MESSAGE;
use dockmon::pipeline::stage::{build_stages, deploy_stages};
use dockmon::pipeline::{ProcessExit, SequencerEvent, SequencerState, StageKind, StageSequencer};
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_sequencer_initial_state() {
    let seq = StageSequencer::new(build_stages());
    assert_eq!(seq.state(), &SequencerState::Pending);
    assert!(seq.current_stage().is_none());
    assert!(!seq.state().is_terminal());
}

#[test]
fn test_sequencer_pull_failure_continues() {
    let mut seq = StageSequencer::new(build_stages());

    // Pending -> Running(pull)
    seq.process(SequencerEvent::Start).unwrap();
    assert_eq!(seq.current_stage().unwrap().kind, StageKind::Pull);

    // Pull fails -> Running(build)
    seq.process(SequencerEvent::StageExited(ProcessExit::Code(1))).unwrap();
    assert_eq!(seq.state(), &SequencerState::Running(1));
    assert_eq!(seq.current_stage().unwrap().kind, StageKind::Build);

    // Spawn failures of the pull are tolerated too
    let mut seq = StageSequencer::new(build_stages());
    seq.process(SequencerEvent::Start).unwrap();
    seq.process(SequencerEvent::StageExited(ProcessExit::SpawnFailed("ENOENT".to_string())))
        .unwrap();
    assert_eq!(seq.state(), &SequencerState::Running(1));
}

#[test]
fn test_sequencer_build_failure_is_fatal() {
    let mut seq = StageSequencer::new(build_stages());

    seq.process(SequencerEvent::Start).unwrap();
    seq.process(SequencerEvent::StageExited(ProcessExit::Code(0))).unwrap();
    seq.process(SequencerEvent::StageExited(ProcessExit::Code(1))).unwrap();

    assert_eq!(
        seq.state(),
        &SequencerState::Failed("Build failed with exit code 1".to_string())
    );
    assert!(seq.state().is_terminal());
}

#[test]
fn test_sequencer_create_failure_is_fatal() {
    let mut seq = StageSequencer::new(build_stages());

    seq.process(SequencerEvent::Start).unwrap();
    seq.process(SequencerEvent::StageExited(ProcessExit::Code(0))).unwrap();
    seq.process(SequencerEvent::StageExited(ProcessExit::Code(0))).unwrap();
    seq.process(SequencerEvent::StageExited(ProcessExit::Code(125))).unwrap();

    assert_eq!(
        seq.state(),
        &SequencerState::Failed("Container creation failed with exit code 125".to_string())
    );
}

#[test]
fn test_sequencer_deploy_flow() {
    let mut seq = StageSequencer::new(deploy_stages());

    seq.process(SequencerEvent::Start).unwrap();
    assert_eq!(seq.current_stage().unwrap().kind, StageKind::Up);

    seq.process(SequencerEvent::StageExited(ProcessExit::Code(0))).unwrap();
    assert_eq!(seq.state(), &SequencerState::Succeeded);

    let mut seq = StageSequencer::new(deploy_stages());
    seq.process(SequencerEvent::Start).unwrap();
    seq.process(SequencerEvent::StageExited(ProcessExit::SpawnFailed("spawn docker ENOENT".to_string())))
        .unwrap();
    assert_eq!(
        seq.state(),
        &SequencerState::Failed("Error executing deployment: spawn docker ENOENT".to_string())
    );
}

#[test]
fn test_sequencer_cancel() {
    let mut seq = StageSequencer::new(build_stages());

    seq.process(SequencerEvent::Start).unwrap();
    seq.process(SequencerEvent::StageExited(ProcessExit::Code(0))).unwrap();
    seq.process(SequencerEvent::Cancel).unwrap();

    assert_eq!(
        seq.state(),
        &SequencerState::Failed(CANCELLED_MESSAGE.to_string())
    );
}

#[test]
fn test_sequencer_invalid_transitions() {
    let mut seq = StageSequencer::new(build_stages());

    // Exit before any stage started
    assert_err!(seq.process(SequencerEvent::StageExited(ProcessExit::Code(0))));
    assert_eq!(seq.state(), &SequencerState::Pending);

    assert_ok!(seq.process(SequencerEvent::Start));
    assert_err!(seq.process(SequencerEvent::Start));
}
