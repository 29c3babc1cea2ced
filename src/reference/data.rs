//! Input files read by the reference engine.
//!
//! Dynamic data, power flow, settings and observation files are TOML;
//! the disturbance file is line-oriented text (`<time> <command>`).

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::sim::command::Disturbance;
use crate::sim::engine::{EngineError, EngineResult};

/// Dynamic model data: machines with their controllers, and loads.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DynamicData {
    /// Nominal frequency (Hz).
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,
    /// Load-frequency sensitivity (pu load change per pu frequency change).
    #[serde(default)]
    pub load_damping: f64,
    #[serde(default, rename = "machine")]
    pub machines: Vec<MachineData>,
    #[serde(default, rename = "load")]
    pub loads: Vec<LoadData>,
}

fn default_frequency_hz() -> f64 {
    50.0
}

/// Synchronous machine with speed governor and voltage regulator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineData {
    pub name: String,
    /// Terminal bus name.
    pub bus: String,
    /// Turbine rating (MW).
    pub rating_mw: f64,
    /// Inertia constant on rating (s).
    pub inertia_s: f64,
    /// Governor permanent droop (pu).
    pub droop: f64,
    /// Valve servo time constant (s).
    pub governor_time_s: f64,
    /// Turbine time constant (s).
    pub turbine_time_s: f64,
    /// Reactive response time constant (s).
    #[serde(default = "default_avr_time_s")]
    pub avr_time_s: f64,
    /// Reactive capability limit (Mvar).
    pub q_max_mvar: f64,
    /// Terminal voltage drop per pu of extra reactive output (pu).
    #[serde(default = "default_voltage_sensitivity")]
    pub voltage_sensitivity: f64,
}

fn default_avr_time_s() -> f64 {
    1.0
}

fn default_voltage_sensitivity() -> f64 {
    0.1
}

/// Aggregated load.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadData {
    pub name: String,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Initial operating point from a power-flow solution.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerFlow {
    #[serde(default, rename = "generator")]
    pub generators: Vec<GeneratorPoint>,
    #[serde(default, rename = "bus")]
    pub buses: Vec<BusVoltage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorPoint {
    pub name: String,
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusVoltage {
    pub name: String,
    pub v_pu: f64,
}

/// Solver settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Integration step (s).
    pub time_step: f64,
    /// Speed deviation treated as divergence (pu).
    pub max_frequency_deviation: f64,
    /// Voltage below which the run is declared collapsed (pu).
    pub min_voltage: f64,
    /// Standard deviation of random load fluctuation (MW).
    pub load_noise_std: f64,
    /// Seed for the load fluctuation.
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            max_frequency_deviation: 0.05,
            min_voltage: 0.5,
            load_noise_std: 0.0,
            seed: 0,
        }
    }
}

/// Components recorded into the trajectory; `"*"` selects every component.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Observation {
    pub sync: Vec<String>,
    pub tor: Vec<String>,
    pub bus: Vec<String>,
}

impl Observation {
    /// Observes every component.
    pub fn all() -> Self {
        let all = vec!["*".to_string()];
        Self {
            sync: all.clone(),
            tor: all.clone(),
            bus: all,
        }
    }

    pub fn selects(list: &[String], name: &str) -> bool {
        list.iter().any(|n| n == "*" || n == name)
    }
}

/// Parsed disturbance file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisturbanceFile {
    pub events: Vec<Disturbance>,
    /// Horizon cap set by a `STOP` line.
    pub stop: Option<f64>,
}

impl DisturbanceFile {
    /// Parses `<time> <command>` lines; `#` starts a comment.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first malformed line.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut file = DisturbanceFile::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let (time, rest) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| format!("line {}: expected \"<time> <command>\"", idx + 1))?;
            let time: f64 = time
                .parse()
                .map_err(|e| format!("line {}: invalid time \"{time}\": {e}", idx + 1))?;
            let rest = rest.trim().trim_end_matches(';').trim();
            if rest.eq_ignore_ascii_case("STOP") {
                file.stop = Some(file.stop.map_or(time, |s| s.min(time)));
                continue;
            }
            let event =
                Disturbance::parse(time, rest).map_err(|e| format!("line {}: {e}", idx + 1))?;
            file.events.push(event);
        }
        Ok(file)
    }
}

/// Reads and deserializes a TOML input file.
///
/// # Errors
///
/// `EngineError::Io` if unreadable, `EngineError::Parse` if malformed.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> EngineResult<T> {
    let text = read(path)?;
    toml::from_str(&text).map_err(|e| EngineError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Reads and parses a disturbance file.
///
/// # Errors
///
/// `EngineError::Io` if unreadable, `EngineError::Parse` if malformed.
pub fn load_disturbances(path: &Path) -> EngineResult<DisturbanceFile> {
    let text = read(path)?;
    DisturbanceFile::parse(&text).map_err(|message| EngineError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn read(path: &Path) -> EngineResult<String> {
    fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })
}
