//! End-to-end study pipeline: clean, initialize, perturb, run, extract, analyze.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, StudyConfig};
use crate::extract::{ExtractError, Extractor, TimeSeries};
use crate::sim::engine::SimulationEngine;
use crate::sim::metrics::ResponseMetrics;
use crate::sim::session::{Session, SessionError};
use crate::workspace::{self, WorkspaceError};

/// Errors that abort a study.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("invalid study:\n{}", list_config_errors(.0))]
    Config(Vec<ConfigError>),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("{source}{}", diagnostic(.detail))]
    Session {
        source: SessionError,
        /// The session's `last_err()` at the time of failure.
        detail: Option<String>,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

fn list_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn diagnostic(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!("\nengine diagnostic: {d}"))
        .unwrap_or_default()
}

/// One plotted signal and its response metrics.
#[derive(Debug, Clone)]
pub struct PlotResult {
    pub series: TimeSeries,
    pub metrics: ResponseMetrics,
}

/// Everything a completed study produced.
#[derive(Debug, Clone)]
pub struct StudyReport {
    /// Stale artifacts removed before the run.
    pub removed: Vec<PathBuf>,
    /// Time reached by the last continuation (s).
    pub final_time: f64,
    /// Finalized trajectory file.
    pub trajectory: PathBuf,
    /// Engine output log, if the case names one.
    pub output_log: Option<PathBuf>,
    /// Plotted series, in study order.
    pub plots: Vec<PlotResult>,
    /// Query handle over the finalized trajectory.
    pub extractor: Extractor,
}

/// Runs `study` on `engine` through every session stage.
///
/// The study is validated first; any stage failure aborts the study and is
/// returned with the engine's diagnostic attached.
///
/// # Errors
///
/// `Config` for an invalid study, `Workspace` if stale outputs cannot be
/// removed, `Session` if initialization, a disturbance, the continuation
/// or finalization fails, `Extract` if a plotted channel is missing.
pub fn run_study<E: SimulationEngine>(
    study: &StudyConfig,
    engine: E,
) -> Result<StudyReport, RunError> {
    let errors = study.validate();
    if !errors.is_empty() {
        return Err(RunError::Config(errors));
    }
    let channels = study
        .plots
        .iter()
        .map(|p| p.channel())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RunError::Config(vec![e]))?;

    let case = study.resolved_case();
    let trajectory = case
        .get_trj()
        .map(PathBuf::from)
        .ok_or_else(|| RunError::Session {
            source: SessionError::NoTrajectory,
            detail: None,
        })?;
    let output_log = case.get_out().map(PathBuf::from);

    info!(stage = "clean", workdir = %study.workdir.display(), "resetting workspace");
    let removed = workspace::reset(&study.workdir, &study.run.clean_extensions)?;

    let mut session = Session::new(engine);
    let start = study.run.start_time;
    let end = study.run.end_time;

    info!(stage = "initialize", time = start, "initializing");
    session
        .exec_sim(case, start)
        .map_err(|e| session_error(&session, e))?;

    for d in &study.disturbances {
        info!(stage = "perturb", time = d.time, command = %d.command, "adding disturbance");
        session
            .add_disturb(d.time, &d.command)
            .map_err(|e| session_error(&session, e))?;
    }

    info!(stage = "run", target = end, "continuing");
    session
        .cont_sim(end)
        .map_err(|e| session_error(&session, e))?;
    session.end_sim().map_err(|e| session_error(&session, e))?;
    let final_time = session.time();

    info!(stage = "extract", path = %trajectory.display(), "opening trajectory");
    let extractor = session
        .extractor()
        .map_err(|e| session_error(&session, e))?;

    let mut plots = Vec::with_capacity(channels.len());
    for channel in channels {
        let series = extractor.series(&channel.component, channel.signal)?;
        let metrics = ResponseMetrics::from_series(&series);
        info!(
            stage = "analyze",
            channel = %channel,
            samples = metrics.samples,
            max_deviation = metrics.max_deviation,
            "signal analyzed"
        );
        plots.push(PlotResult { series, metrics });
    }

    Ok(StudyReport {
        removed,
        final_time,
        trajectory,
        output_log,
        plots,
        extractor,
    })
}

fn session_error<E: SimulationEngine>(session: &Session<E>, source: SessionError) -> RunError {
    RunError::Session {
        source,
        detail: session.last_err().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::CaseConfig;
    use crate::reference::ReferenceEngine;
    use std::fs;

    fn study_in(dir: &std::path::Path) -> StudyConfig {
        let mut study = StudyConfig::nordic();
        study.workdir = dir.to_path_buf();
        study
    }

    #[test]
    fn invalid_study_touches_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("old.trj"), "stale").expect("write stale file");
        let mut study = study_in(dir.path());
        study.run.end_time = -1.0;

        let err = run_study(&study, ReferenceEngine::new());
        assert!(matches!(err, Err(RunError::Config(_))));
        assert!(dir.path().join("old.trj").exists());
    }

    #[test]
    fn init_failure_aborts_with_engine_diagnostic() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("old.trace"), "stale").expect("write stale file");
        let study = study_in(dir.path());

        let err = run_study(&study, ReferenceEngine::new());
        match err {
            Err(RunError::Session {
                source: SessionError::Initialization { .. },
                detail: Some(detail),
            }) => assert!(detail.contains("dyn_B.toml")),
            other => panic!("expected initialization failure, got {other:?}"),
        }
        // cleanup happens before initialization
        assert!(!dir.path().join("old.trace").exists());
    }

    #[test]
    fn config_errors_are_listed_in_message() {
        let mut study = StudyConfig::nordic();
        study.case = CaseConfig::new();
        study.run.end_time = 0.0;
        let err = run_study(&study, ReferenceEngine::new());
        let text = err.map(|_| String::new()).unwrap_or_else(|e| e.to_string());
        assert!(text.contains("run.end_time"));
        assert!(text.contains("case.trajectory"));
    }
}
