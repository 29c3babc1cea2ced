//! Capability interface of a time-domain simulation engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::case::{CaseConfig, FileRole};

use super::command::Disturbance;

/// Errors reported by a simulation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("missing file role: {0}")]
    MissingRole(FileRole),

    #[error("cannot access \"{}\": {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid data in \"{}\": {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("inconsistent case data: {0}")]
    Data(String),

    #[error("unsupported command: {0}")]
    Unsupported(String),

    #[error("simulation diverged at t={time:.4} s: {what}")]
    Diverged { time: f64, what: String },

    #[error("engine is not initialized")]
    NotInitialized,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// An opaque engine driven through a narrow, blocking interface.
///
/// The session calls these methods in program order: `initialize` once,
/// then any number of `schedule`/`advance` calls, then `finalize`. An
/// implementation owns every numerical concern; callers only observe
/// success or failure.
pub trait SimulationEngine {
    /// Loads the case files and establishes initial conditions at `start_time`.
    fn initialize(&mut self, case: &CaseConfig, start_time: f64) -> EngineResult<()>;

    /// Registers an event to apply once simulated time reaches `event.time`.
    fn schedule(&mut self, event: Disturbance) -> EngineResult<()>;

    /// Advances simulated time to `until`, applying due events in time order.
    ///
    /// Returns the time actually reached, which may be earlier than `until`
    /// when the case caps the horizon.
    fn advance(&mut self, until: f64) -> EngineResult<f64>;

    /// Flushes and finalizes every output artifact.
    fn finalize(&mut self) -> EngineResult<()>;

    /// Current simulated time.
    fn current_time(&self) -> f64;

    /// Diagnostic text of the most recent failure, if any.
    fn last_error(&self) -> Option<String>;
}

impl<E: SimulationEngine + ?Sized> SimulationEngine for Box<E> {
    fn initialize(&mut self, case: &CaseConfig, start_time: f64) -> EngineResult<()> {
        (**self).initialize(case, start_time)
    }

    fn schedule(&mut self, event: Disturbance) -> EngineResult<()> {
        (**self).schedule(event)
    }

    fn advance(&mut self, until: f64) -> EngineResult<f64> {
        (**self).advance(until)
    }

    fn finalize(&mut self) -> EngineResult<()> {
        (**self).finalize()
    }

    fn current_time(&self) -> f64 {
        (**self).current_time()
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }
}
