//! Case configuration: the file roles describing one simulation run.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// A named file role understood by the simulation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileRole {
    /// Main output log.
    OutputLog,
    /// Dynamic model data (machines, controllers, loads).
    DynamicData,
    /// Power-flow solution used as the initial operating point.
    PowerFlow,
    /// Solver settings.
    Settings,
    /// Initialization log.
    InitLog,
    /// Disturbance file with pre-scheduled events.
    Disturbance,
    /// Continuous-variable trace.
    ContinuousTrace,
    /// Discrete-event trace.
    DiscreteTrace,
    /// Observation selection.
    Observation,
    /// Trajectory artifact read back by the extractor.
    Trajectory,
}

impl FileRole {
    /// Every role, in canonical order.
    pub const ALL: [FileRole; 10] = [
        FileRole::OutputLog,
        FileRole::DynamicData,
        FileRole::PowerFlow,
        FileRole::Settings,
        FileRole::InitLog,
        FileRole::Disturbance,
        FileRole::ContinuousTrace,
        FileRole::DiscreteTrace,
        FileRole::Observation,
        FileRole::Trajectory,
    ];

    /// Role name as used in logs and study files.
    pub fn as_str(self) -> &'static str {
        match self {
            FileRole::OutputLog => "output",
            FileRole::DynamicData => "dynamic_data",
            FileRole::PowerFlow => "power_flow",
            FileRole::Settings => "settings",
            FileRole::InitLog => "init",
            FileRole::Disturbance => "disturbance",
            FileRole::ContinuousTrace => "continuous_trace",
            FileRole::DiscreteTrace => "discrete_trace",
            FileRole::Observation => "observation",
            FileRole::Trajectory => "trajectory",
        }
    }

    /// Whether the engine writes this file (as opposed to reading it).
    pub fn is_output(self) -> bool {
        matches!(
            self,
            FileRole::OutputLog
                | FileRole::InitLog
                | FileRole::ContinuousTrace
                | FileRole::DiscreteTrace
                | FileRole::Trajectory
        )
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered mapping from [`FileRole`] to a path.
///
/// No validation happens here: a missing or malformed file is only
/// discovered when the engine reads it during initialization. Once a
/// `CaseConfig` is handed to a session it is owned there and no longer
/// mutable.
///
/// # Examples
///
/// ```
/// use dynsim::case::CaseConfig;
///
/// let mut case = CaseConfig::new();
/// case.add_dynamic_data("dyn_B.toml").add_trj("output.trj");
/// assert_eq!(case.get_trj().and_then(|p| p.to_str()), Some("output.trj"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "CaseFiles")]
pub struct CaseConfig {
    entries: Vec<(FileRole, PathBuf)>,
}

impl CaseConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `path` with `role`.
    ///
    /// Setting a role again replaces its path but keeps its position.
    pub fn set(&mut self, role: FileRole, path: impl Into<PathBuf>) -> &mut Self {
        let path = path.into();
        match self.entries.iter_mut().find(|(r, _)| *r == role) {
            Some(entry) => entry.1 = path,
            None => self.entries.push((role, path)),
        }
        self
    }

    /// Returns the path set for `role`, if any.
    pub fn get(&self, role: FileRole) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, p)| p.as_path())
    }

    /// Returns `true` if `role` has a path.
    pub fn contains(&self, role: FileRole) -> bool {
        self.get(role).is_some()
    }

    /// Iterates over `(role, path)` entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (FileRole, &Path)> {
        self.entries.iter().map(|(r, p)| (*r, p.as_path()))
    }

    /// Number of configured roles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no role is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a copy with every relative path joined onto `dir`.
    pub fn rebase(&self, dir: &Path) -> CaseConfig {
        let entries = self
            .entries
            .iter()
            .map(|(role, path)| {
                let resolved = if path.is_absolute() {
                    path.clone()
                } else {
                    dir.join(path)
                };
                (*role, resolved)
            })
            .collect();
        CaseConfig { entries }
    }

    pub fn add_out(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::OutputLog, path)
    }

    pub fn add_dynamic_data(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::DynamicData, path)
    }

    pub fn add_power_flow(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::PowerFlow, path)
    }

    pub fn add_settings(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::Settings, path)
    }

    pub fn add_init(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::InitLog, path)
    }

    pub fn add_dst(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::Disturbance, path)
    }

    pub fn add_cont(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::ContinuousTrace, path)
    }

    pub fn add_disc(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::DiscreteTrace, path)
    }

    pub fn add_obs(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::Observation, path)
    }

    pub fn add_trj(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.set(FileRole::Trajectory, path)
    }

    /// Path of the output log.
    pub fn get_out(&self) -> Option<&Path> {
        self.get(FileRole::OutputLog)
    }

    /// Path of the trajectory artifact, used to build an extractor.
    pub fn get_trj(&self) -> Option<&Path> {
        self.get(FileRole::Trajectory)
    }
}

/// Flat `[case]` table of a study file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CaseFiles {
    output: Option<PathBuf>,
    dynamic_data: Option<PathBuf>,
    power_flow: Option<PathBuf>,
    settings: Option<PathBuf>,
    init: Option<PathBuf>,
    disturbance: Option<PathBuf>,
    continuous_trace: Option<PathBuf>,
    discrete_trace: Option<PathBuf>,
    observation: Option<PathBuf>,
    trajectory: Option<PathBuf>,
}

impl From<CaseFiles> for CaseConfig {
    fn from(files: CaseFiles) -> Self {
        let mut case = CaseConfig::new();
        let slots = [
            (FileRole::OutputLog, files.output),
            (FileRole::DynamicData, files.dynamic_data),
            (FileRole::PowerFlow, files.power_flow),
            (FileRole::Settings, files.settings),
            (FileRole::InitLog, files.init),
            (FileRole::Disturbance, files.disturbance),
            (FileRole::ContinuousTrace, files.continuous_trace),
            (FileRole::DiscreteTrace, files.discrete_trace),
            (FileRole::Observation, files.observation),
            (FileRole::Trajectory, files.trajectory),
        ];
        for (role, path) in slots {
            if let Some(path) = path {
                case.set(role, path);
            }
        }
        case
    }
}
