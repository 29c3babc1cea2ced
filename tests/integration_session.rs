//! Stage-by-stage session driving against the reference engine.

mod common;

use dynsim::case::CaseConfig;
use dynsim::config::StudyConfig;
use dynsim::io::trajectory::Trajectory;
use dynsim::reference::ReferenceEngine;
use dynsim::sim::session::{Session, SessionError, SessionState};

fn case_in(dir: &std::path::Path) -> CaseConfig {
    StudyConfig::nordic().case.rebase(dir)
}

#[test]
fn staged_continuations_reach_each_target() {
    let dir = common::nordic_workspace();
    let mut session = Session::new(ReferenceEngine::new());

    session.exec_sim(case_in(dir.path()), 0.0).expect("init");
    assert_eq!(session.state(), SessionState::Initialized);

    session.add_disturb(5.0, "BREAKER SYNC_MACH g7 0").expect("schedule trip");
    session.cont_sim(5.0).expect("run to trip");
    assert!((session.time() - 5.0).abs() < 1e-9);

    session.add_disturb(8.0, "BREAKER SYNC_MACH g7 1").expect("schedule reconnection");
    session.cont_sim(12.0).expect("run past reconnection");
    assert!((session.time() - 12.0).abs() < 1e-9);

    let applied = session.engine().applied();
    assert_eq!(applied.len(), 2);
    assert!(applied.iter().all(|e| e.changed));
    assert!((applied[1].time - 8.0).abs() < 1e-9);

    session.end_sim().expect("finalize");
    let ex = session.extractor().expect("trajectory readable");
    let g7 = ex.get_sync("g7").expect("g7 observed");
    assert_eq!(g7.p.value_at(6.0), Some(0.0));
    assert!(g7.p.value_at(11.0).expect("sample") > 0.0);
}

#[test]
fn disturbances_registered_before_init_are_forwarded() {
    let dir = common::nordic_workspace();
    let mut session = Session::new(ReferenceEngine::new());

    session.add_disturb(2.0, "BREAKER SYNC_MACH g7 0").expect("queue");
    session.exec_sim(case_in(dir.path()), 0.0).expect("init");
    session.cont_sim(3.0).expect("run");

    assert_eq!(session.engine().applied().len(), 1);
}

#[test]
fn missing_dynamic_data_fails_initialization() {
    let dir = common::nordic_workspace();
    let mut case = case_in(dir.path());
    case.add_dynamic_data(dir.path().join("no_such_dyn.toml"));

    let mut session = Session::new(ReferenceEngine::new());
    let err = session.exec_sim(case, 0.0).expect_err("init must fail");

    assert!(matches!(err, SessionError::Initialization { .. }));
    assert_eq!(session.state(), SessionState::Failed);
    let detail = session.last_err().expect("diagnostic recorded");
    assert!(detail.contains("no_such_dyn.toml"), "{detail}");

    let err = session.cont_sim(10.0).expect_err("failed session cannot run");
    assert!(matches!(err, SessionError::InvalidState { .. }));
}

#[test]
fn past_events_and_time_reversal_are_rejected() {
    let dir = common::nordic_workspace();
    let mut session = Session::new(ReferenceEngine::new());
    session.exec_sim(case_in(dir.path()), 0.0).expect("init");
    session.cont_sim(4.0).expect("run");

    let err = session
        .add_disturb(1.0, "BREAKER SYNC_MACH g7 0")
        .expect_err("event in the past");
    assert!(matches!(err, SessionError::EventInPast { .. }));

    let err = session.cont_sim(2.0).expect_err("cannot go back");
    assert!(matches!(err, SessionError::TimeReversal { .. }));
    assert_eq!(session.state(), SessionState::Running);
}

#[test]
fn extraction_waits_for_finalization() {
    let dir = common::nordic_workspace();
    let mut session = Session::new(ReferenceEngine::new());
    session.exec_sim(case_in(dir.path()), 0.0).expect("init");
    session.cont_sim(1.0).expect("run");

    let err = session.extractor().expect_err("not finalized yet");
    assert!(matches!(err, SessionError::TrajectoryNotFinalized(SessionState::Running)));
    assert!(!dir.path().join("output.trj").exists());

    session.end_sim().expect("finalize");
    assert!(session.extractor().is_ok());
}

#[test]
fn unknown_breaker_target_reports_engine_diagnostic() {
    let dir = common::nordic_workspace();
    let mut session = Session::new(ReferenceEngine::new());
    session.exec_sim(case_in(dir.path()), 0.0).expect("init");
    session.add_disturb(1.0, "BREAKER SYNC_MACH g99 0").expect("schedule");

    let err = session.cont_sim(2.0).expect_err("unknown machine");
    assert!(matches!(err, SessionError::Continuation { .. }));
    assert!(session.last_err().is_some_and(|m| m.contains("g99")));
}

#[test]
fn non_finite_times_fail_fast() {
    let dir = common::nordic_workspace();

    let mut session = Session::new(ReferenceEngine::new());
    let err = session
        .exec_sim(case_in(dir.path()), f64::NAN)
        .expect_err("NaN start");
    assert!(matches!(err, SessionError::InvalidTime(_)));
    assert_eq!(session.state(), SessionState::Uninitialized);

    session.exec_sim(case_in(dir.path()), 0.0).expect("init");
    for target in [f64::INFINITY, f64::NAN] {
        let err = session.cont_sim(target).expect_err("non-finite target");
        assert!(matches!(err, SessionError::InvalidTime(_)));
    }
    assert_eq!(session.state(), SessionState::Initialized);
    session.cont_sim(1.0).expect("finite target still runs");
    assert!((session.time() - 1.0).abs() < 1e-9);
}

#[test]
fn ending_right_after_init_keeps_only_the_initial_sample() {
    let dir = common::nordic_workspace();
    let mut session = Session::new(ReferenceEngine::new());
    session.exec_sim(case_in(dir.path()), 0.0).expect("init");
    session.end_sim().expect("finalize");

    let trj = Trajectory::load(&dir.path().join("output.trj")).expect("trajectory written");
    assert_eq!(trj.times(), &[0.0]);
    let ex = session.extractor().expect("trajectory readable");
    let g5 = ex.get_sync("g5").expect("g5 observed");
    assert_eq!(g5.s.len(), 1);
}

#[test]
fn repeated_trip_is_logged_as_no_change() {
    let dir = common::nordic_workspace();
    let mut session = Session::new(ReferenceEngine::new());
    session.exec_sim(case_in(dir.path()), 0.0).expect("init");
    session.add_disturb(1.0, "BREAKER SYNC_MACH g7 0").expect("trip");
    session.add_disturb(2.0, "BREAKER SYNC_MACH g7 0").expect("trip again");
    session.cont_sim(3.0).expect("run");
    session.end_sim().expect("finalize");

    let disc = std::fs::read_to_string(dir.path().join("disc.trace")).expect("discrete trace");
    let lines: Vec<&str> = disc.lines().collect();
    assert_eq!(lines.len(), 2, "{disc}");
    assert!(lines[1].ends_with("(no change)"), "{disc}");
}
