//! Read-only queries over a finalized trajectory.

pub mod series;
/// Signal groups, codes and channel names.
pub mod signal;

use std::path::Path;

use thiserror::Error;

use crate::io::trajectory::{Trajectory, TrajectoryError};

pub use series::TimeSeries;
pub use signal::{Channel, Signal, SignalGroup};

/// Errors raised by extractor queries.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),

    #[error("no channel {0} in trajectory")]
    UnknownChannel(Channel),

    #[error("no {group} component \"{component}\" in trajectory")]
    UnknownComponent {
        group: SignalGroup,
        component: String,
    },
}

/// Synchronous machine signals.
#[derive(Debug, Clone)]
pub struct SyncSignals {
    /// Speed deviation (pu).
    pub s: TimeSeries,
    /// Electrical active power (MW).
    pub p: TimeSeries,
    /// Electrical reactive power (Mvar).
    pub q: TimeSeries,
}

/// Turbine/governor signals.
#[derive(Debug, Clone)]
pub struct TorSignals {
    /// Valve position (pu).
    pub z: TimeSeries,
    /// Mechanical power (MW).
    pub pm: TimeSeries,
}

/// Bus signals.
#[derive(Debug, Clone)]
pub struct BusSignals {
    /// Voltage magnitude (pu).
    pub mag: TimeSeries,
}

/// Query interface over one trajectory, indexed by component and signal.
///
/// The trajectory is immutable once loaded, so queries may be issued in
/// any order.
#[derive(Debug, Clone)]
pub struct Extractor {
    trajectory: Trajectory,
}

impl Extractor {
    /// Loads the trajectory artifact at `path`.
    ///
    /// # Errors
    ///
    /// Returns an `ExtractError` if the file is missing or malformed.
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        Ok(Self::from_trajectory(Trajectory::load(path)?))
    }

    pub fn from_trajectory(trajectory: Trajectory) -> Self {
        Self { trajectory }
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn channels(&self) -> &[Channel] {
        self.trajectory.channels()
    }

    /// Distinct components recorded for `group`, in recording order.
    pub fn components(&self, group: SignalGroup) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for channel in self.channels().iter().filter(|c| c.group() == group) {
            if !names.contains(&channel.component.as_str()) {
                names.push(&channel.component);
            }
        }
        names
    }

    /// Single channel as a time series.
    ///
    /// # Errors
    ///
    /// Returns `UnknownChannel` if the channel was not recorded.
    pub fn series(&self, component: &str, signal: Signal) -> Result<TimeSeries, ExtractError> {
        let channel = Channel::new(component, signal);
        let column = self
            .trajectory
            .position(&channel)
            .and_then(|idx| self.trajectory.column(idx))
            .ok_or_else(|| ExtractError::UnknownChannel(channel.clone()))?;
        let points = self
            .trajectory
            .times()
            .iter()
            .copied()
            .zip(column.iter().copied())
            .collect();
        Ok(TimeSeries::new(channel, points))
    }

    /// Signals of synchronous machine `id`.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if no machine `id` was observed.
    pub fn get_sync(&self, id: &str) -> Result<SyncSignals, ExtractError> {
        self.require(SignalGroup::Sync, id)?;
        Ok(SyncSignals {
            s: self.series(id, Signal::Speed)?,
            p: self.series(id, Signal::ActivePower)?,
            q: self.series(id, Signal::ReactivePower)?,
        })
    }

    /// Turbine/governor signals of machine `id`.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if no governor `id` was observed.
    pub fn get_tor(&self, id: &str) -> Result<TorSignals, ExtractError> {
        self.require(SignalGroup::Tor, id)?;
        Ok(TorSignals {
            z: self.series(id, Signal::ValvePosition)?,
            pm: self.series(id, Signal::MechanicalPower)?,
        })
    }

    /// Signals of bus `id`.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if no bus `id` was observed.
    pub fn get_bus(&self, id: &str) -> Result<BusSignals, ExtractError> {
        self.require(SignalGroup::Bus, id)?;
        Ok(BusSignals {
            mag: self.series(id, Signal::VoltageMagnitude)?,
        })
    }

    fn require(&self, group: SignalGroup, id: &str) -> Result<(), ExtractError> {
        if self
            .channels()
            .iter()
            .any(|c| c.group() == group && c.component == id)
        {
            Ok(())
        } else {
            Err(ExtractError::UnknownComponent {
                group,
                component: id.to_string(),
            })
        }
    }
}
