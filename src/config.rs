//! TOML-based study configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::case::{CaseConfig, FileRole};
use crate::extract::{Channel, Signal, SignalGroup};
use crate::sim::command::Disturbance;
use crate::workspace::DEFAULT_EXTENSIONS;

/// Top-level study configuration parsed from TOML.
///
/// A study names the case files, the run horizon, the disturbances to inject
/// and the signals to plot. Load from TOML with
/// [`StudyConfig::from_toml_file`] or use [`StudyConfig::nordic`] for the
/// built-in generator-trip study.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    /// Working directory holding the case files and receiving the outputs.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// File roles, relative to `workdir` unless absolute.
    #[serde(default)]
    pub case: CaseConfig,
    /// Run horizon and workspace cleanup.
    #[serde(default)]
    pub run: RunConfig,
    /// Disturbances injected after initialization.
    #[serde(default, rename = "disturbance")]
    pub disturbances: Vec<DisturbanceConfig>,
    /// Signals extracted and plotted after the run.
    #[serde(default, rename = "plot")]
    pub plots: Vec<PlotConfig>,
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

/// Simulation horizon and cleanup parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Initialization time (s).
    pub start_time: f64,
    /// Final simulated time (s, must be > `start_time`).
    pub end_time: f64,
    /// Extensions of stale artifacts removed before the run.
    pub clean_extensions: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: 150.0,
            clean_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// One scheduled disturbance.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisturbanceConfig {
    /// Scheduled time (s).
    pub time: f64,
    /// Command text, e.g. `"BREAKER SYNC_MACH g7 0"`.
    pub command: String,
}

/// One plotted signal.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlotConfig {
    /// Signal group: `"sync"`, `"tor"` or `"bus"`.
    pub group: SignalGroup,
    /// Component identifier.
    pub component: String,
    /// Signal code within the group (e.g. `"S"`, `"Pm"`, `"mag"`).
    pub signal: String,
}

impl PlotConfig {
    fn new(group: SignalGroup, component: &str, signal: &str) -> Self {
        Self {
            group,
            component: component.to_string(),
            signal: signal.to_string(),
        }
    }

    /// Resolves the plot to a trajectory channel.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the signal code is unknown for the group.
    pub fn channel(&self) -> Result<Channel, ConfigError> {
        Signal::from_code(self.group, &self.signal)
            .map(|s| Channel::new(self.component.clone(), s))
            .ok_or_else(|| ConfigError {
                field: "plot.signal".into(),
                message: format!("unknown {} signal \"{}\"", self.group, self.signal),
            })
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"run.end_time"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl StudyConfig {
    /// Returns the generator-trip study on the bundled Nordic case: machine
    /// `g7` trips at 10 s and six signals of `g5` are plotted up to 150 s.
    pub fn nordic() -> Self {
        let mut case = CaseConfig::new();
        case.add_out("output.trace")
            .add_dynamic_data("dyn_B.toml")
            .add_power_flow("volt_rat_B.toml")
            .add_settings("settings1.toml")
            .add_init("init.trace")
            .add_dst("nothing.dst")
            .add_cont("cont.trace")
            .add_disc("disc.trace")
            .add_obs("obs.toml")
            .add_trj("output.trj");

        Self {
            workdir: PathBuf::from("cases/nordic"),
            case,
            run: RunConfig::default(),
            disturbances: vec![DisturbanceConfig {
                time: 10.0,
                command: "BREAKER SYNC_MACH g7 0".to_string(),
            }],
            plots: vec![
                PlotConfig::new(SignalGroup::Sync, "g5", "S"),
                PlotConfig::new(SignalGroup::Tor, "g5", "z"),
                PlotConfig::new(SignalGroup::Tor, "g5", "Pm"),
                PlotConfig::new(SignalGroup::Sync, "g5", "P"),
                PlotConfig::new(SignalGroup::Bus, "g5", "mag"),
                PlotConfig::new(SignalGroup::Sync, "g5", "Q"),
            ],
        }
    }

    /// Returns the load-rejection preset: load `L1042` is disconnected at
    /// 10 s and the frequency rise is followed on `g5` and `g16`.
    pub fn nordic_load_step() -> Self {
        Self {
            run: RunConfig {
                end_time: 60.0,
                ..RunConfig::default()
            },
            disturbances: vec![DisturbanceConfig {
                time: 10.0,
                command: "BREAKER LOAD L1042 0".to_string(),
            }],
            plots: vec![
                PlotConfig::new(SignalGroup::Sync, "g5", "S"),
                PlotConfig::new(SignalGroup::Tor, "g5", "Pm"),
                PlotConfig::new(SignalGroup::Tor, "g16", "Pm"),
                PlotConfig::new(SignalGroup::Bus, "g16", "mag"),
            ],
            ..Self::nordic()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["nordic", "nordic_load_step"];

    /// Loads a study from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "nordic" => Ok(Self::nordic()),
            "nordic_load_step" => Ok(Self::nordic_load_step()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a study from a TOML file.
    ///
    /// A relative `workdir` is resolved against the directory holding the
    /// study file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "study".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        let mut study = Self::from_toml_str(&content)?;
        if study.workdir.is_relative() {
            if let Some(parent) = path.parent() {
                study.workdir = parent.join(&study.workdir);
            }
        }
        Ok(study)
    }

    /// Parses a study from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Case configuration with every path resolved against `workdir`.
    pub fn resolved_case(&self) -> CaseConfig {
        self.case.rebase(&self.workdir)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let r = &self.run;

        if !r.start_time.is_finite() || r.start_time < 0.0 {
            errors.push(ConfigError {
                field: "run.start_time".into(),
                message: "must be finite and >= 0".into(),
            });
        }
        if !r.end_time.is_finite() || r.end_time <= r.start_time {
            errors.push(ConfigError {
                field: "run.end_time".into(),
                message: "must be > run.start_time".into(),
            });
        }
        for ext in &r.clean_extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                errors.push(ConfigError {
                    field: "run.clean_extensions".into(),
                    message: format!("\"{ext}\" must start with '.' and name an extension"),
                });
            }
        }

        for (role, path) in self.case.iter().filter(|(role, _)| !role.is_output()) {
            let name = path.to_string_lossy();
            if r.clean_extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
                errors.push(ConfigError {
                    field: format!("case.{role}"),
                    message: format!("input \"{name}\" would be removed by the clean stage"),
                });
            }
        }

        if !self.case.contains(FileRole::Trajectory) {
            errors.push(ConfigError {
                field: "case.trajectory".into(),
                message: "a trajectory file is required for extraction".into(),
            });
        }

        for (i, d) in self.disturbances.iter().enumerate() {
            if let Err(e) = Disturbance::parse(d.time, &d.command) {
                errors.push(ConfigError {
                    field: format!("disturbance[{i}].command"),
                    message: e.to_string(),
                });
            } else if d.time < r.start_time {
                errors.push(ConfigError {
                    field: format!("disturbance[{i}].time"),
                    message: "must be >= run.start_time".into(),
                });
            }
        }

        for (i, p) in self.plots.iter().enumerate() {
            if p.component.trim().is_empty() {
                errors.push(ConfigError {
                    field: format!("plot[{i}].component"),
                    message: "must not be empty".into(),
                });
            }
            if let Err(e) = p.channel() {
                errors.push(ConfigError {
                    field: format!("plot[{i}].signal"),
                    message: e.message,
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nordic_preset_valid() {
        let cfg = StudyConfig::nordic();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "nordic should be valid: {errors:?}");
    }

    #[test]
    fn all_presets_valid() {
        for name in StudyConfig::PRESETS {
            let cfg = StudyConfig::from_preset(name).expect("listed preset loads");
            let errors = cfg.validate();
            assert!(errors.is_empty(), "{name} should be valid: {errors:?}");
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = StudyConfig::from_preset("nonexistent");
        assert!(err.is_err_and(|e| e.message.contains("unknown preset")));
    }

    #[test]
    fn nordic_plots_six_g5_signals() {
        let cfg = StudyConfig::nordic();
        let channels: Vec<String> = cfg
            .plots
            .iter()
            .filter_map(|p| p.channel().ok())
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            channels,
            [
                "sync:g5:S",
                "tor:g5:z",
                "tor:g5:Pm",
                "sync:g5:P",
                "bus:g5:mag",
                "sync:g5:Q"
            ]
        );
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
workdir = "cases/nordic"

[case]
output = "output.trace"
dynamic_data = "dyn_B.toml"
power_flow = "volt_rat_B.toml"
trajectory = "output.trj"

[run]
start_time = 0.0
end_time = 30.0

[[disturbance]]
time = 5.0
command = "BREAKER SYNC_MACH g7 0"

[[plot]]
group = "sync"
component = "g5"
signal = "S"
"#;
        let cfg = StudyConfig::from_toml_str(toml).expect("valid study");
        assert_eq!(cfg.run.end_time, 30.0);
        assert_eq!(cfg.run.clean_extensions, [".trace", ".trj"]);
        assert_eq!(cfg.disturbances.len(), 1);
        assert_eq!(cfg.plots[0].group, SignalGroup::Sync);
        assert_eq!(cfg.case.get_trj(), Some(Path::new("output.trj")));
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg = StudyConfig::from_toml_str("").expect("empty study parses");
        assert_eq!(cfg.workdir, PathBuf::from("."));
        assert_eq!(cfg.run.start_time, 0.0);
        assert!(cfg.disturbances.is_empty());
    }

    #[test]
    fn unknown_field_rejected() {
        let toml = "[run]\nend_time = 10.0\nsolver = \"rk4\"\n";
        assert!(StudyConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn invalid_values_caught() {
        let mut cfg = StudyConfig::nordic();
        cfg.run.end_time = 0.0;
        cfg.run.clean_extensions.push("trj".into());
        cfg.disturbances.push(DisturbanceConfig {
            time: 20.0,
            command: "OPEN SYNC_MACH g1".into(),
        });
        cfg.plots.push(PlotConfig::new(SignalGroup::Bus, "g5", "Pm"));
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"run.end_time"));
        assert!(fields.contains(&"run.clean_extensions"));
        assert!(fields.contains(&"disturbance[1].command"));
        assert!(fields.contains(&"plot[6].signal"));
    }

    #[test]
    fn missing_trajectory_role_caught() {
        let mut cfg = StudyConfig::nordic();
        cfg.case = CaseConfig::new();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "case.trajectory"));
    }

    #[test]
    fn disturbance_before_start_caught() {
        let mut cfg = StudyConfig::nordic();
        cfg.run.start_time = 20.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "disturbance[0].time"));
    }

    #[test]
    fn file_workdir_is_relative_to_study() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("study.toml");
        fs::write(&path, "workdir = \"case\"\n").expect("write study");
        let cfg = StudyConfig::from_toml_file(&path).expect("study loads");
        assert_eq!(cfg.workdir, dir.path().join("case"));
    }

    #[test]
    fn resolved_case_joins_workdir() {
        let cfg = StudyConfig::nordic();
        let case = cfg.resolved_case();
        assert_eq!(case.get_trj(), Some(Path::new("cases/nordic/output.trj")));
    }

    #[test]
    fn input_matching_clean_extension_is_rejected() {
        let mut cfg = StudyConfig::nordic();
        cfg.case.add_dst("events.trace");
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].field, "case.disturbance");
    }
}
