//! Built-in engine: an aggregated frequency/voltage model driven through
//! [`SimulationEngine`].

pub mod data;
pub mod model;
mod trace;

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::case::{CaseConfig, FileRole};
use crate::extract::{Channel, Signal, SignalGroup};
use crate::io::trajectory::Trajectory;
use crate::sim::clock::Clock;
use crate::sim::command::{Command, Disturbance};
use crate::sim::engine::{EngineError, EngineResult, SimulationEngine};
use crate::sim::schedule::EventQueue;

use self::data::{DynamicData, Observation, PowerFlow, Settings};
use self::model::{Grid, Probe};
use self::trace::Traces;

/// An event as it was applied by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEvent {
    /// Simulated time at which the command took effect.
    pub time: f64,
    pub command: Command,
    /// `false` when the component was already in the requested state.
    pub changed: bool,
}

/// State that exists only after a successful `initialize`.
#[derive(Debug)]
struct Run {
    grid: Grid,
    clock: Clock,
    queue: EventQueue,
    /// Horizon cap from a `STOP` line.
    stop: Option<f64>,
    probes: Vec<Probe>,
    trajectory: Trajectory,
    trajectory_path: Option<PathBuf>,
    traces: Traces,
    applied: Vec<AppliedEvent>,
    row: Vec<f64>,
    finalized: bool,
}

impl Run {
    fn record(&mut self, time: f64) -> EngineResult<()> {
        self.row.clear();
        self.row.extend(self.probes.iter().map(|&p| self.grid.value(p)));
        self.trajectory.push(time, &self.row);
        self.traces.continuous(format_args!(
            "{time:.4} {:.6} {:.3} {:.3}",
            self.grid.omega(),
            self.grid.total_pm(),
            self.grid.total_load()
        ))
    }

    fn apply(&mut self, time: f64, event: Disturbance) -> EngineResult<()> {
        let changed = self.grid.apply(&event.command)?;
        if changed {
            debug!(time, command = %event.command, "applied disturbance");
        } else {
            warn!(time, command = %event.command, "breaker already in requested state");
        }
        self.traces.discrete(format_args!(
            "{time:.4} {}{}",
            event.command,
            if changed { "" } else { " (no change)" }
        ))?;
        self.applied.push(AppliedEvent {
            time,
            command: event.command,
            changed,
        });
        Ok(())
    }

    /// Steps to `target`, landing exactly on every pending event time.
    fn advance(&mut self, target: f64) -> EngineResult<()> {
        loop {
            let horizon = match self.queue.next_time() {
                Some(t) if t < target => t.max(self.clock.now()),
                _ => target,
            };
            let prev = self.clock.now();
            let (now, due) = match self.clock.tick(horizon) {
                Some(t) => (t, t),
                None if horizon >= target => break,
                None => (prev, horizon),
            };

            if now > prev {
                self.grid.step(now - prev, now)?;
            }
            let events = self.queue.pop_due(due);
            let fired = !events.is_empty();
            for event in events {
                self.apply(now, event)?;
            }
            if now > prev || fired {
                self.record(now)?;
            }
        }
        Ok(())
    }
}

/// Reference implementation of [`SimulationEngine`].
///
/// Reads the crate's TOML case files, integrates the aggregated model with
/// a fixed step, writes plain-text traces while running and the CSV
/// trajectory on `finalize`.
#[derive(Debug, Default)]
pub struct ReferenceEngine {
    run: Option<Run>,
    last_error: Option<String>,
}

impl ReferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events applied so far, in application order.
    pub fn applied(&self) -> &[AppliedEvent] {
        self.run.as_ref().map_or(&[], |r| r.applied.as_slice())
    }

    /// In-memory trajectory recorded so far.
    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.run.as_ref().map(|r| &r.trajectory)
    }

    fn remember<T>(&mut self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
        }
        result
    }

    fn run_mut(&mut self) -> EngineResult<&mut Run> {
        match self.run.as_mut() {
            Some(run) if !run.finalized => Ok(run),
            Some(_) => Err(EngineError::Data("run already finalized".to_string())),
            None => Err(EngineError::NotInitialized),
        }
    }

    fn load(case: &CaseConfig, start_time: f64) -> EngineResult<Run> {
        let required = |role| case.get(role).ok_or(EngineError::MissingRole(role));
        let dynamic: DynamicData = data::load_toml(required(FileRole::DynamicData)?)?;
        let flow: PowerFlow = data::load_toml(required(FileRole::PowerFlow)?)?;
        let settings: Settings = match case.get(FileRole::Settings) {
            Some(path) => data::load_toml(path)?,
            None => Settings::default(),
        };
        let observation = match case.get(FileRole::Observation) {
            Some(path) => data::load_toml(path)?,
            None => Observation::all(),
        };
        let disturbances = match case.get(FileRole::Disturbance) {
            Some(path) => data::load_disturbances(path)?,
            None => Default::default(),
        };

        let grid = Grid::build(&dynamic, &flow, &settings)?;
        let channels = observed_channels(&grid, &observation)?;
        let probes = channels
            .iter()
            .map(|c| {
                grid.probe(c)
                    .ok_or_else(|| EngineError::Data(format!("cannot observe {c}")))
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let mut queue = EventQueue::new();
        for event in disturbances.events {
            if event.time < start_time {
                warn!(time = event.time, command = %event.command, "dropping disturbance before start time");
            } else {
                queue.push(event);
            }
        }
        if let Some(stop) = disturbances.stop {
            info!(stop, "disturbance file caps the horizon");
        }

        let mut traces = Traces::open(case)?;
        traces.output(format_args!(
            "initialized at t={start_time:.4} s: {} machines, {} loads, {} buses, {} channels",
            grid.machines().len(),
            grid.loads().len(),
            grid.buses().len(),
            channels.len()
        ))?;
        traces.init(format_args!("# machine bus_v P Q Pm z"))?;
        for m in grid.machines() {
            traces.init(format_args!(
                "{} {:.4} {:.3} {:.3} {:.3} {:.4}",
                m.name, m.v, m.p, m.q, m.pm, m.z
            ))?;
        }

        let mut run = Run {
            clock: Clock::new(start_time, settings.time_step),
            grid,
            queue,
            stop: disturbances.stop,
            row: Vec::with_capacity(probes.len()),
            probes,
            trajectory: Trajectory::new(channels),
            trajectory_path: case.get(FileRole::Trajectory).map(PathBuf::from),
            traces,
            applied: Vec::new(),
            finalized: false,
        };
        run.record(start_time)?;
        Ok(run)
    }
}

/// Channels selected by `observation`, machines first then buses.
fn observed_channels(grid: &Grid, observation: &Observation) -> EngineResult<Vec<Channel>> {
    for (group, list) in [
        (SignalGroup::Sync, &observation.sync),
        (SignalGroup::Tor, &observation.tor),
        (SignalGroup::Bus, &observation.bus),
    ] {
        for name in list.iter().filter(|n| n.as_str() != "*") {
            let known = match group {
                SignalGroup::Bus => grid.buses().iter().any(|b| &b.name == name),
                _ => grid.machines().iter().any(|m| &m.name == name),
            };
            if !known {
                return Err(EngineError::Data(format!(
                    "observed {group} component {name} does not exist"
                )));
            }
        }
    }

    let mut channels = Vec::new();
    for m in grid.machines() {
        for group in [SignalGroup::Sync, SignalGroup::Tor] {
            let list = match group {
                SignalGroup::Sync => &observation.sync,
                _ => &observation.tor,
            };
            if Observation::selects(list, &m.name) {
                channels.extend(
                    Signal::of_group(group)
                        .iter()
                        .map(|&s| Channel::new(m.name.clone(), s)),
                );
            }
        }
    }
    for b in grid.buses() {
        if Observation::selects(&observation.bus, &b.name) {
            channels.push(Channel::new(b.name.clone(), Signal::VoltageMagnitude));
        }
    }
    Ok(channels)
}

impl SimulationEngine for ReferenceEngine {
    fn initialize(&mut self, case: &CaseConfig, start_time: f64) -> EngineResult<()> {
        let result = if self.run.is_some() {
            Err(EngineError::Data("engine already initialized".to_string()))
        } else if !start_time.is_finite() {
            Err(EngineError::Data(format!("start time {start_time} is not finite")))
        } else {
            Self::load(case, start_time)
        };
        let run = self.remember(result)?;
        info!(
            start_time,
            channels = run.trajectory.channels().len(),
            "reference engine initialized"
        );
        self.run = Some(run);
        Ok(())
    }

    fn schedule(&mut self, event: Disturbance) -> EngineResult<()> {
        let result = self.run_mut().and_then(|run| {
            if event.time < run.clock.now() {
                return Err(EngineError::Data(format!(
                    "event at t={} s is before current time {} s",
                    event.time,
                    run.clock.now()
                )));
            }
            debug!(time = event.time, command = %event.command, "scheduled disturbance");
            run.queue.push(event);
            Ok(())
        });
        self.remember(result)
    }

    fn advance(&mut self, until: f64) -> EngineResult<f64> {
        let result = self.run_mut().and_then(|run| {
            if !until.is_finite() {
                return Err(EngineError::Data(format!("target time {until} is not finite")));
            }
            let target = match run.stop {
                Some(stop) if stop < until => {
                    warn!(until, stop, "horizon capped by STOP");
                    stop
                }
                _ => until,
            };
            run.advance(target)?;
            run.traces.output(format_args!(
                "reached t={:.4} s, omega={:.6} pu",
                run.clock.now(),
                run.grid.omega()
            ))?;
            Ok(run.clock.now())
        });
        self.remember(result)
    }

    fn finalize(&mut self) -> EngineResult<()> {
        let result = self.run_mut().and_then(|run| {
            if let Some(path) = &run.trajectory_path {
                run.trajectory.save(path).map_err(|e| EngineError::Data(e.to_string()))?;
                info!(path = %path.display(), samples = run.trajectory.len(), "trajectory written");
            } else {
                warn!("no trajectory file configured; samples kept in memory only");
            }
            run.traces.output(format_args!(
                "finalized at t={:.4} s, {} events applied",
                run.clock.now(),
                run.applied.len()
            ))?;
            run.traces.flush()?;
            run.finalized = true;
            Ok(())
        });
        self.remember(result)
    }

    fn current_time(&self) -> f64 {
        self.run.as_ref().map_or(0.0, |r| r.clock.now())
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}
