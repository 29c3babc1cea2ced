//! Simulation session: the state machine wrapped around an engine.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::case::CaseConfig;
use crate::extract::{ExtractError, Extractor};

use super::command::{CommandError, Disturbance};
use super::engine::{EngineError, SimulationEngine};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Running,
    Ended,
    /// Absorbing state after an engine failure.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initialized => "initialized",
            SessionState::Running => "running",
            SessionState::Ended => "ended",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Errors returned by session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("initialization failed: {source}")]
    Initialization { source: EngineError },

    #[error("continuation to t={target:.4} s failed: {source}")]
    Continuation { target: f64, source: EngineError },

    #[error("finalization failed: {source}")]
    Finalization { source: EngineError },

    #[error("engine rejected event: {source}")]
    Schedule { source: EngineError },

    #[error("invalid disturbance: {0}")]
    Command(#[from] CommandError),

    #[error("event at t={time:.4} s is earlier than current time {now:.4} s")]
    EventInPast { time: f64, now: f64 },

    #[error("target time {target:.4} s is earlier than current time {now:.4} s")]
    TimeReversal { target: f64, now: f64 },

    #[error("time {0} s is not finite")]
    InvalidTime(f64),

    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("trajectory is not finalized (session is {0}); call end_sim first")]
    TrajectoryNotFinalized(SessionState),

    #[error("case has no trajectory file")]
    NoTrajectory,

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// A stateful handle bound to one engine and one case.
///
/// Operations must follow `exec_sim` → `cont_sim`* → `end_sim`; the
/// trajectory can only be extracted once the session has ended. An
/// operation issued in the wrong state is rejected and leaves the state
/// unchanged.
pub struct Session<E: SimulationEngine> {
    engine: E,
    state: SessionState,
    case: Option<CaseConfig>,
    /// Events registered before initialization.
    pending: Vec<Disturbance>,
    time: f64,
    last_error: Option<String>,
}

impl<E: SimulationEngine> Session<E> {
    /// Creates an uninitialized session around `engine`.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: SessionState::Uninitialized,
            case: None,
            pending: Vec::new(),
            time: 0.0,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current simulated time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The case bound by `exec_sim`, if any.
    pub fn case(&self) -> Option<&CaseConfig> {
        self.case.as_ref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Diagnostic text of the most recent failure.
    pub fn last_err(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Binds `case` and initializes the engine at `start_time`.
    ///
    /// Events registered earlier are forwarded to the engine; those
    /// scheduled before `start_time` are dropped with a warning.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless uninitialized, `InvalidTime` for a non-finite
    /// `start_time`; `Initialization` if the engine fails, after which the
    /// session is `Failed`.
    pub fn exec_sim(&mut self, case: CaseConfig, start_time: f64) -> Result<(), SessionError> {
        self.require("initialize", &[SessionState::Uninitialized])?;
        if !start_time.is_finite() {
            return Err(SessionError::InvalidTime(start_time));
        }

        let result = self.engine.initialize(&case, start_time);
        self.case = Some(case);
        if let Err(source) = result {
            self.fail(&source);
            return Err(SessionError::Initialization { source });
        }

        self.time = start_time;
        self.state = SessionState::Initialized;
        info!(time = start_time, "session initialized");

        for event in std::mem::take(&mut self.pending) {
            if event.time < start_time {
                warn!(event = %event, start_time, "dropping event scheduled before start");
                continue;
            }
            if let Err(e) = self.engine.schedule(event) {
                warn!(error = %e, "engine rejected pre-registered event");
                self.last_error = Some(e.to_string());
            }
        }
        Ok(())
    }

    /// Registers `command` to be applied at `time`.
    ///
    /// Has no effect on the system until a `cont_sim` reaches `time`.
    ///
    /// # Errors
    ///
    /// `Command` for a malformed command, `EventInPast` for a time before
    /// the current simulated time, `InvalidState` once ended or failed.
    pub fn add_disturb(&mut self, time: f64, command: &str) -> Result<(), SessionError> {
        self.require(
            "add disturbance",
            &[
                SessionState::Uninitialized,
                SessionState::Initialized,
                SessionState::Running,
            ],
        )?;
        let event = Disturbance::parse(time, command)?;

        if self.state == SessionState::Uninitialized {
            debug!(event = %event, "queued before initialization");
            self.pending.push(event);
            return Ok(());
        }
        if time < self.time {
            return Err(SessionError::EventInPast {
                time,
                now: self.time,
            });
        }
        debug!(event = %event, "scheduled");
        self.engine
            .schedule(event)
            .map_err(|source| SessionError::Schedule { source })
    }

    /// Advances simulated time to `t_final`.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless initialized or running, `InvalidTime` if
    /// `t_final` is not finite, `TimeReversal` if it lies in the past,
    /// `Continuation` if the engine fails, after which the session is
    /// `Failed`.
    pub fn cont_sim(&mut self, t_final: f64) -> Result<(), SessionError> {
        self.require(
            "continue",
            &[SessionState::Initialized, SessionState::Running],
        )?;
        if !t_final.is_finite() {
            return Err(SessionError::InvalidTime(t_final));
        }
        if t_final < self.time {
            return Err(SessionError::TimeReversal {
                target: t_final,
                now: self.time,
            });
        }

        match self.engine.advance(t_final) {
            Ok(reached) => {
                self.time = reached;
                self.state = SessionState::Running;
                if reached < t_final {
                    warn!(reached, target = t_final, "engine stopped before target time");
                }
                info!(time = reached, "continuation complete");
                Ok(())
            }
            Err(source) => {
                self.time = self.engine.current_time();
                self.fail(&source);
                Err(SessionError::Continuation {
                    target: t_final,
                    source,
                })
            }
        }
    }

    /// Finalizes every output artifact.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless initialized or running; `Finalization` if the
    /// engine cannot flush its outputs.
    pub fn end_sim(&mut self) -> Result<(), SessionError> {
        self.require("end", &[SessionState::Initialized, SessionState::Running])?;
        if let Err(source) = self.engine.finalize() {
            self.fail(&source);
            return Err(SessionError::Finalization { source });
        }
        self.state = SessionState::Ended;
        info!(time = self.time, "session ended");
        Ok(())
    }

    /// Opens the finalized trajectory for read-only queries.
    ///
    /// # Errors
    ///
    /// `TrajectoryNotFinalized` unless the session has ended, `NoTrajectory`
    /// if the case names no trajectory file, `Extract` if it cannot be read.
    pub fn extractor(&self) -> Result<Extractor, SessionError> {
        if self.state != SessionState::Ended {
            return Err(SessionError::TrajectoryNotFinalized(self.state));
        }
        let path = self
            .case
            .as_ref()
            .and_then(CaseConfig::get_trj)
            .ok_or(SessionError::NoTrajectory)?;
        Ok(Extractor::open(path)?)
    }

    fn require(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn fail(&mut self, source: &EngineError) {
        let message = self
            .engine
            .last_error()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| source.to_string());
        warn!(error = %message, state = %self.state, "session failed");
        self.last_error = Some(message);
        self.state = SessionState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::CaseConfig;
    use crate::sim::clock::Clock;
    use crate::sim::engine::EngineResult;
    use crate::sim::schedule::EventQueue;

    /// Engine double that steps a clock and records every event firing.
    #[derive(Default)]
    struct ScriptedEngine {
        clock: Option<Clock>,
        queue: EventQueue,
        fired: Vec<(f64, Disturbance)>,
        fail_init: bool,
        reject_schedule: bool,
        diverge_at: Option<f64>,
        last: Option<String>,
        finalized: bool,
    }

    impl SimulationEngine for ScriptedEngine {
        fn initialize(&mut self, _case: &CaseConfig, start_time: f64) -> EngineResult<()> {
            if self.fail_init {
                self.last = Some("cannot open dynamic data file".to_string());
                return Err(EngineError::Data("scripted failure".to_string()));
            }
            self.clock = Some(Clock::new(start_time, 0.5));
            Ok(())
        }

        fn schedule(&mut self, event: Disturbance) -> EngineResult<()> {
            if self.reject_schedule {
                return Err(EngineError::Unsupported(event.command.to_string()));
            }
            self.queue.push(event);
            Ok(())
        }

        fn advance(&mut self, until: f64) -> EngineResult<f64> {
            let clock = self.clock.as_mut().ok_or(EngineError::NotInitialized)?;
            loop {
                let horizon = match self.queue.next_time() {
                    Some(t) if t < until => t.max(clock.now()),
                    _ => until,
                };
                let now = match clock.tick(horizon) {
                    Some(t) => t,
                    None if horizon >= until => break,
                    None => horizon,
                };
                for event in self.queue.pop_due(now) {
                    self.fired.push((now, event));
                }
                if self.diverge_at.is_some_and(|d| now >= d) {
                    self.last = Some(format!("speed diverged at {now}"));
                    return Err(EngineError::Diverged {
                        time: now,
                        what: "speed".to_string(),
                    });
                }
            }
            Ok(clock.now())
        }

        fn finalize(&mut self) -> EngineResult<()> {
            self.finalized = true;
            Ok(())
        }

        fn current_time(&self) -> f64 {
            self.clock.as_ref().map_or(0.0, Clock::now)
        }

        fn last_error(&self) -> Option<String> {
            self.last.clone()
        }
    }

    fn case() -> CaseConfig {
        let mut case = CaseConfig::new();
        case.add_dynamic_data("dyn.toml").add_trj("output.trj");
        case
    }

    #[test]
    fn happy_path_walks_every_state() {
        let mut session = Session::new(ScriptedEngine::default());
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.exec_sim(case(), 0.0).expect("init should succeed");
        assert_eq!(session.state(), SessionState::Initialized);

        session
            .add_disturb(10.0, "BREAKER SYNC_MACH g7 0")
            .expect("event should be accepted");
        session.cont_sim(150.0).expect("run should succeed");
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.time(), 150.0);

        session.end_sim().expect("end should succeed");
        assert_eq!(session.state(), SessionState::Ended);
        assert!(session.engine().finalized);
        assert!(session.last_err().is_none());
    }

    #[test]
    fn event_registered_before_init_fires_once_at_its_time() {
        let mut session = Session::new(ScriptedEngine::default());
        session
            .add_disturb(10.0, "BREAKER SYNC_MACH g7 0")
            .expect("queueing before init is allowed");
        session.exec_sim(case(), 0.0).expect("init should succeed");

        session.cont_sim(9.5).expect("first leg should succeed");
        assert!(session.engine().fired.is_empty(), "fired before 10.0 s");

        session.cont_sim(10.0).expect("second leg should succeed");
        assert_eq!(session.engine().fired.len(), 1);
        assert_eq!(session.engine().fired[0].0, 10.0);

        session.cont_sim(150.0).expect("third leg should succeed");
        assert_eq!(session.engine().fired.len(), 1, "fired more than once");
    }

    #[test]
    fn off_grid_event_time_is_hit_exactly() {
        let mut session = Session::new(ScriptedEngine::default());
        session.exec_sim(case(), 0.0).expect("init should succeed");
        session
            .add_disturb(1.23, "BREAKER LOAD L1 0")
            .expect("event should be accepted");
        session.cont_sim(5.0).expect("run should succeed");
        let fired = &session.engine().fired;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, 1.23);
    }

    #[test]
    fn events_before_start_are_dropped() {
        let mut session = Session::new(ScriptedEngine::default());
        session
            .add_disturb(1.0, "BREAKER SYNC_MACH g7 0")
            .expect("queueing before init is allowed");
        session.exec_sim(case(), 5.0).expect("init should succeed");
        session.cont_sim(10.0).expect("run should succeed");
        assert!(session.engine().fired.is_empty());
    }

    #[test]
    fn malformed_command_is_rejected_without_state_change() {
        let mut session = Session::new(ScriptedEngine::default());
        session.exec_sim(case(), 0.0).expect("init should succeed");
        let err = session.add_disturb(10.0, "BREAKER SYNC_MACH g7");
        assert!(matches!(err, Err(SessionError::Command(_))));
        assert_eq!(session.state(), SessionState::Initialized);
    }

    #[test]
    fn past_event_is_rejected() {
        let mut session = Session::new(ScriptedEngine::default());
        session.exec_sim(case(), 0.0).expect("init should succeed");
        session.cont_sim(20.0).expect("run should succeed");
        let err = session.add_disturb(10.0, "BREAKER SYNC_MACH g7 0");
        assert!(matches!(err, Err(SessionError::EventInPast { .. })));
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn continue_before_init_is_invalid() {
        let mut session = Session::new(ScriptedEngine::default());
        let err = session.cont_sim(10.0);
        assert!(matches!(
            err,
            Err(SessionError::InvalidState {
                state: SessionState::Uninitialized,
                ..
            })
        ));
        assert!(matches!(
            session.end_sim(),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn time_reversal_is_rejected() {
        let mut session = Session::new(ScriptedEngine::default());
        session.exec_sim(case(), 0.0).expect("init should succeed");
        session.cont_sim(20.0).expect("run should succeed");
        assert!(matches!(
            session.cont_sim(10.0),
            Err(SessionError::TimeReversal { .. })
        ));
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn init_failure_is_absorbing_and_reports_last_error() {
        let engine = ScriptedEngine {
            fail_init: true,
            ..ScriptedEngine::default()
        };
        let mut session = Session::new(engine);
        let err = session.exec_sim(case(), 0.0);
        assert!(matches!(err, Err(SessionError::Initialization { .. })));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.last_err(), Some("cannot open dynamic data file"));

        assert!(matches!(
            session.cont_sim(10.0),
            Err(SessionError::InvalidState { .. })
        ));
        assert!(matches!(
            session.add_disturb(10.0, "BREAKER SYNC_MACH g7 0"),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn continuation_failure_is_distinguishable() {
        let engine = ScriptedEngine {
            diverge_at: Some(12.0),
            ..ScriptedEngine::default()
        };
        let mut session = Session::new(engine);
        session.exec_sim(case(), 0.0).expect("init should succeed");
        let err = session.cont_sim(150.0);
        assert!(matches!(err, Err(SessionError::Continuation { .. })));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.time(), 12.0);
        assert!(session.last_err().is_some_and(|m| m.contains("diverged")));
    }

    #[test]
    fn extraction_before_end_is_rejected() {
        let mut session = Session::new(ScriptedEngine::default());
        assert!(matches!(
            session.extractor(),
            Err(SessionError::TrajectoryNotFinalized(SessionState::Uninitialized))
        ));
        session.exec_sim(case(), 0.0).expect("init should succeed");
        session.cont_sim(1.0).expect("run should succeed");
        assert!(matches!(
            session.extractor(),
            Err(SessionError::TrajectoryNotFinalized(SessionState::Running))
        ));
    }

    #[test]
    fn non_finite_times_are_rejected_without_state_change() {
        let mut session = Session::new(ScriptedEngine::default());
        assert!(matches!(
            session.exec_sim(case(), f64::NAN),
            Err(SessionError::InvalidTime(_))
        ));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.engine().clock.is_none());

        session.exec_sim(case(), 0.0).expect("init should succeed");
        for target in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                session.cont_sim(target),
                Err(SessionError::InvalidTime(_))
            ));
        }
        assert_eq!(session.state(), SessionState::Initialized);
        assert_eq!(session.time(), 0.0);
        session.cont_sim(1.0).expect("finite target still runs");
    }

    #[test]
    fn rejected_pre_registered_event_is_recorded_but_init_succeeds() {
        let engine = ScriptedEngine {
            reject_schedule: true,
            ..ScriptedEngine::default()
        };
        let mut session = Session::new(engine);
        session
            .add_disturb(2.0, "BREAKER BUS b1 0")
            .expect("queueing before init is allowed");

        session.exec_sim(case(), 0.0).expect("init should still succeed");
        assert_eq!(session.state(), SessionState::Initialized);
        assert!(session.last_err().is_some_and(|m| m.contains("BREAKER BUS b1 0")));
        session.cont_sim(3.0).expect("run should succeed");
        assert!(session.engine().fired.is_empty());
    }

    #[test]
    fn end_right_after_init_is_allowed() {
        let mut session = Session::new(ScriptedEngine::default());
        session.exec_sim(case(), 0.0).expect("init should succeed");
        session.end_sim().expect("end should succeed");
        assert_eq!(session.state(), SessionState::Ended);
        assert!(session.engine().finalized);
    }
}
