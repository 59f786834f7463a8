mod support;

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use handsoff::SessionError;
use handsoff::alert::{GateState, TOUCH_BODY, TOUCH_TITLE};
use handsoff::classifier::{ClassifierOptions, Label};
use handsoff::inference::{InferenceOptions, run_tick};
use handsoff::session::{ActivityKind, Command, Session, SessionOptions};
use handsoff::training::TrainingOptions;
use support::{
    DeniedCamera, Fakes, SharedCamera, hands_off_frame, touching_frame, wait_for_finish,
};

fn fast_options(repetitions: usize) -> SessionOptions {
    SessionOptions {
        classifier: ClassifierOptions::default(),
        training: TrainingOptions {
            repetitions,
            interval: Duration::from_millis(1),
        },
        inference: InferenceOptions {
            interval: Duration::from_millis(5),
            touch_threshold: 0.7,
        },
    }
}

fn ready_session(camera: &SharedCamera, fakes: &Fakes, repetitions: usize) -> Session {
    let mut session =
        Session::start(camera, || fakes.collaborators(), fast_options(repetitions)).unwrap();
    assert_eq!(session.wait_until_ready().unwrap(), 3);
    session
}

fn train_both(camera: &SharedCamera, session: &mut Session) {
    let updates = session.take_training_updates().unwrap();
    camera.source.set_frame(hands_off_frame());
    session.execute(Command::Train(Label::NotTouched)).unwrap();
    let report = wait_for_finish(&updates);
    assert_eq!(report.label, Label::NotTouched);
    assert!(!report.cancelled);

    camera.source.set_frame(touching_frame());
    session.execute(Command::Train(Label::Touched)).unwrap();
    assert_eq!(wait_for_finish(&updates).label, Label::Touched);
}

#[test]
fn denied_camera_stops_startup_before_model_load() {
    let fakes = Fakes::new();
    let mut built = false;
    let result = Session::start(
        &DeniedCamera,
        || {
            built = true;
            fakes.collaborators()
        },
        fast_options(1),
    );
    assert!(matches!(result, Err(SessionError::PermissionDenied(_))));
    assert!(!built);
    assert!(!fakes.loader_called.load(Ordering::SeqCst));
    assert_eq!(fakes.cue.plays(), 0);
}

#[test]
fn untrained_tick_reports_no_touch() {
    let camera = SharedCamera::new(touching_frame());
    let fakes = Fakes::new();
    let session = ready_session(&camera, &fakes, 1);

    let outcome = run_tick(session.context(), 0.7).unwrap();
    assert!(outcome.result.is_none());
    assert!(!outcome.touched);
    assert!(!outcome.alerted);
    assert_eq!(fakes.cue.plays(), 0);
}

#[test]
fn training_stores_one_example_per_repetition() {
    let camera = SharedCamera::new(hands_off_frame());
    let fakes = Fakes::new();
    let mut session = ready_session(&camera, &fakes, 10);
    train_both(&camera, &mut session);

    let status = session.execute(Command::Status).unwrap();
    assert_eq!(status.not_touched_examples, 10);
    assert_eq!(status.touched_examples, 10);
    assert_eq!(status.activity, ActivityKind::Idle);
}

#[test]
fn clustered_touch_alerts_once_per_playback() {
    let camera = SharedCamera::new(hands_off_frame());
    let fakes = Fakes::new();
    let mut session = ready_session(&camera, &fakes, 10);
    train_both(&camera, &mut session);

    camera.source.set_frame(touching_frame());
    let first = run_tick(session.context(), 0.7).unwrap();
    let result = first.result.unwrap();
    assert_eq!(result.label, Label::Touched);
    assert!(result.confidences.get(Label::Touched) > 0.7);
    assert!(first.touched);
    assert!(first.alerted);
    assert!(session.context().touch.get());

    let second = run_tick(session.context(), 0.7).unwrap();
    assert!(second.touched);
    assert!(!second.alerted);
    assert_eq!(session.status().gate, GateState::CoolingDown);
    assert_eq!(fakes.cue.plays(), 1);
    assert_eq!(
        fakes.notifier.sent(),
        vec![(TOUCH_TITLE.to_string(), TOUCH_BODY.to_string())]
    );

    fakes.cue.finish();
    assert_eq!(session.status().gate, GateState::Eligible);
    assert!(run_tick(session.context(), 0.7).unwrap().alerted);
    assert_eq!(fakes.cue.plays(), 2);
}

#[test]
fn hands_off_frame_clears_touch_flag() {
    let camera = SharedCamera::new(hands_off_frame());
    let fakes = Fakes::new();
    let mut session = ready_session(&camera, &fakes, 5);
    train_both(&camera, &mut session);

    camera.source.set_frame(touching_frame());
    assert!(run_tick(session.context(), 0.7).unwrap().touched);
    camera.source.set_frame(hands_off_frame());
    let outcome = run_tick(session.context(), 0.7).unwrap();
    assert_eq!(outcome.result.unwrap().label, Label::NotTouched);
    assert!(!outcome.touched);
    assert!(!session.context().touch.get());
}

#[test]
fn running_loop_keeps_single_cue_until_stopped() {
    let camera = SharedCamera::new(hands_off_frame());
    let fakes = Fakes::new();
    let mut session = ready_session(&camera, &fakes, 5);
    train_both(&camera, &mut session);

    camera.source.set_frame(touching_frame());
    let status = session.execute(Command::Run).unwrap();
    assert_eq!(status.activity, ActivityKind::Running);
    thread::sleep(Duration::from_millis(80));

    let summary = session.stop().unwrap();
    assert!(summary.ticks >= 2);
    assert_eq!(summary.alerts, 1);
    assert_eq!(fakes.cue.plays(), 1);
    assert_eq!(session.status().activity, ActivityKind::Idle);
}

#[test]
fn new_command_winds_down_previous_activity() {
    let camera = SharedCamera::new(hands_off_frame());
    let fakes = Fakes::new();
    let mut session = ready_session(&camera, &fakes, 1_000);

    let status = session.execute(Command::Train(Label::NotTouched)).unwrap();
    assert_eq!(status.activity, ActivityKind::Training(Label::NotTouched));

    let status = session.execute(Command::Run).unwrap();
    assert_eq!(status.activity, ActivityKind::Running);
    let kept = status.not_touched_examples;
    assert!(kept < 1_000);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(session.status().not_touched_examples, kept);
    let status = session.execute(Command::Quit).unwrap();
    assert_eq!(status.activity, ActivityKind::Idle);
}
