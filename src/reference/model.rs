//! Aggregated frequency/voltage response model integrated with explicit Euler.
//!
//! Every machine shares one speed deviation `omega` (pu). Each machine has
//! a droop governor acting on a valve, a first-order turbine, and a lagged
//! reactive response that sets its terminal voltage.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::extract::{Channel, Signal, SignalGroup};
use crate::sim::command::{Command, ComponentType};
use crate::sim::engine::{EngineError, EngineResult};

use super::data::{DynamicData, PowerFlow, Settings};

/// Synchronous machine with its governor and reactive control state.
#[derive(Debug, Clone)]
pub struct Machine {
    pub name: String,
    bus: usize,
    rating: f64,
    inertia: f64,
    droop: f64,
    governor_time: f64,
    turbine_time: f64,
    avr_time: f64,
    q_max: f64,
    voltage_sensitivity: f64,
    /// Valve setpoint from the initial operating point.
    z0: f64,
    q0: f64,
    v0: f64,
    pub online: bool,
    /// Valve position (pu).
    pub z: f64,
    /// Mechanical power (MW).
    pub pm: f64,
    /// Electrical active power (MW).
    pub p: f64,
    /// Reactive output (Mvar).
    pub q: f64,
    q_req: f64,
    /// Terminal voltage (pu).
    pub v: f64,
}

impl Machine {
    fn mws(&self) -> f64 {
        2.0 * self.inertia * self.rating
    }

    fn trip(&mut self) {
        self.online = false;
        self.z = 0.0;
        self.pm = 0.0;
        self.p = 0.0;
        self.q = 0.0;
        self.q_req = 0.0;
    }

    fn reconnect(&mut self) {
        self.online = true;
        self.q_req = self.q0;
        self.q = self.q0;
        self.v = self.v0;
    }
}

#[derive(Debug, Clone)]
pub struct Load {
    pub name: String,
    p: f64,
    q: f64,
    pub online: bool,
}

#[derive(Debug, Clone)]
pub struct Bus {
    pub name: String,
    v0: f64,
    pub v: f64,
}

/// Resolved location of a trajectory channel inside the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Machine(usize, Signal),
    Bus(usize),
}

/// Whole-system dynamic state.
#[derive(Debug, Clone)]
pub struct Grid {
    machines: Vec<Machine>,
    loads: Vec<Load>,
    buses: Vec<Bus>,
    load_damping: f64,
    /// Network losses balancing the initial operating point (MW).
    p_loss: f64,
    /// Reactive losses balancing the initial operating point (Mvar).
    q_loss: f64,
    /// Common speed deviation (pu).
    omega: f64,
    max_deviation: f64,
    min_voltage: f64,
    noise_std: f64,
    rng: StdRng,
}

impl Grid {
    /// Builds the model at the power-flow operating point.
    ///
    /// # Errors
    ///
    /// `EngineError::Data` if the inputs are inconsistent: unknown names,
    /// non-positive constants, or generation not covering the load.
    pub fn build(dynamic: &DynamicData, flow: &PowerFlow, settings: &Settings) -> EngineResult<Self> {
        if dynamic.machines.is_empty() {
            return Err(data("no synchronous machine in dynamic data"));
        }
        if !(settings.time_step.is_finite() && settings.time_step > 0.0) {
            return Err(data(format!("time_step must be > 0, got {}", settings.time_step)));
        }
        if !(settings.max_frequency_deviation > 0.0) {
            return Err(data("max_frequency_deviation must be > 0"));
        }
        if settings.load_noise_std < 0.0 {
            return Err(data("load_noise_std must be >= 0"));
        }

        let mut buses = Vec::with_capacity(flow.buses.len());
        for b in &flow.buses {
            if buses.iter().any(|x: &Bus| x.name == b.name) {
                return Err(data(format!("bus {} listed twice", b.name)));
            }
            if !(b.v_pu > 0.0) {
                return Err(data(format!("bus {} voltage must be > 0", b.name)));
            }
            buses.push(Bus {
                name: b.name.clone(),
                v0: b.v_pu,
                v: b.v_pu,
            });
        }

        let mut machines: Vec<Machine> = Vec::with_capacity(dynamic.machines.len());
        for m in &dynamic.machines {
            if machines.iter().any(|x| x.name == m.name) {
                return Err(data(format!("machine {} listed twice", m.name)));
            }
            for (what, value) in [
                ("rating_mw", m.rating_mw),
                ("inertia_s", m.inertia_s),
                ("droop", m.droop),
                ("governor_time_s", m.governor_time_s),
                ("turbine_time_s", m.turbine_time_s),
                ("avr_time_s", m.avr_time_s),
                ("q_max_mvar", m.q_max_mvar),
            ] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(data(format!("machine {}: {what} must be > 0", m.name)));
                }
            }
            let bus = buses
                .iter()
                .position(|b| b.name == m.bus)
                .ok_or_else(|| data(format!("machine {}: unknown bus {}", m.name, m.bus)))?;
            let point = flow
                .generators
                .iter()
                .find(|g| g.name == m.name)
                .ok_or_else(|| data(format!("machine {} has no power-flow point", m.name)))?;
            if point.p_mw < 0.0 || point.p_mw > m.rating_mw {
                return Err(data(format!(
                    "machine {}: {} MW outside [0, {}]",
                    m.name, point.p_mw, m.rating_mw
                )));
            }
            if point.q_mvar > m.q_max_mvar {
                return Err(data(format!(
                    "machine {}: {} Mvar above limit {}",
                    m.name, point.q_mvar, m.q_max_mvar
                )));
            }
            let v0 = buses[bus].v0;
            machines.push(Machine {
                name: m.name.clone(),
                bus,
                rating: m.rating_mw,
                inertia: m.inertia_s,
                droop: m.droop,
                governor_time: m.governor_time_s,
                turbine_time: m.turbine_time_s,
                avr_time: m.avr_time_s,
                q_max: m.q_max_mvar,
                voltage_sensitivity: m.voltage_sensitivity,
                z0: point.p_mw / m.rating_mw,
                q0: point.q_mvar,
                v0,
                online: true,
                z: point.p_mw / m.rating_mw,
                pm: point.p_mw,
                p: point.p_mw,
                q: point.q_mvar,
                q_req: point.q_mvar,
                v: v0,
            });
        }

        let mut loads: Vec<Load> = Vec::with_capacity(dynamic.loads.len());
        for l in &dynamic.loads {
            if loads.iter().any(|x| x.name == l.name) {
                return Err(data(format!("load {} listed twice", l.name)));
            }
            loads.push(Load {
                name: l.name.clone(),
                p: l.p_mw,
                q: l.q_mvar,
                online: true,
            });
        }

        let generation: f64 = machines.iter().map(|m| m.pm).sum();
        let demand: f64 = loads.iter().map(|l| l.p).sum();
        let p_loss = generation - demand;
        if p_loss < -1e-6 * demand.abs().max(1.0) {
            return Err(data(format!(
                "generation {generation:.1} MW does not cover load {demand:.1} MW"
            )));
        }
        let q_loss = machines.iter().map(|m| m.q).sum::<f64>() - loads.iter().map(|l| l.q).sum::<f64>();

        Ok(Self {
            machines,
            loads,
            buses,
            load_damping: dynamic.load_damping,
            p_loss: p_loss.max(0.0),
            q_loss,
            omega: 0.0,
            max_deviation: settings.max_frequency_deviation,
            min_voltage: settings.min_voltage,
            noise_std: settings.load_noise_std,
            rng: StdRng::seed_from_u64(settings.seed),
        })
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    /// Common speed deviation (pu).
    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Total mechanical power of online machines (MW).
    pub fn total_pm(&self) -> f64 {
        self.online().map(|m| m.pm).sum()
    }

    /// Connected load at nominal frequency (MW).
    pub fn total_load(&self) -> f64 {
        self.loads.iter().filter(|l| l.online).map(|l| l.p).sum()
    }

    fn online(&self) -> impl Iterator<Item = &Machine> {
        self.machines.iter().filter(|m| m.online)
    }

    /// Advances the state by `dt`, ending at `time`.
    ///
    /// # Errors
    ///
    /// `EngineError::Diverged` when no machine is in service, the speed
    /// deviation exceeds its limit, or a bus voltage collapses.
    pub fn step(&mut self, dt: f64, time: f64) -> EngineResult<()> {
        let inertia: f64 = self.online().map(Machine::mws).sum();
        if inertia <= 0.0 {
            return Err(EngineError::Diverged {
                time,
                what: "no synchronous machine in service".to_string(),
            });
        }

        let noise = gaussian_noise(&mut self.rng, self.noise_std);
        let p_load = self.total_load() * (1.0 + self.load_damping * self.omega) + self.p_loss + noise;
        let domega = (self.total_pm() - p_load) / inertia;

        let q_demand: f64 =
            self.loads.iter().filter(|l| l.online).map(|l| l.q).sum::<f64>() + self.q_loss;
        let q0_online: f64 = self.online().map(|m| m.q0).sum();
        let q_max_online: f64 = self.online().map(|m| m.q_max).sum();
        let shortfall = q_demand - q0_online;

        let omega = self.omega;
        for m in self.machines.iter_mut().filter(|m| m.online) {
            m.p = m.pm - m.mws() * domega;

            let z_target = (m.z0 - omega / m.droop).clamp(0.0, 1.0);
            m.z = (m.z + dt * (z_target - m.z) / m.governor_time).clamp(0.0, 1.0);
            m.pm += dt * (m.z * m.rating - m.pm) / m.turbine_time;

            let q_target = m.q0 + shortfall * m.q_max / q_max_online;
            m.q_req += dt * (q_target - m.q_req) / m.avr_time;
            m.q = m.q_req.min(m.q_max);
            m.v = m.v0 - m.voltage_sensitivity * (m.q_req - m.q0) / m.rating;
        }
        self.omega += dt * domega;
        self.update_buses();

        if self.omega.abs() > self.max_deviation {
            return Err(EngineError::Diverged {
                time,
                what: format!(
                    "speed deviation {:.5} pu exceeds {:.5} pu",
                    self.omega, self.max_deviation
                ),
            });
        }
        if let Some(bus) = self.buses.iter().find(|b| b.v < self.min_voltage) {
            return Err(EngineError::Diverged {
                time,
                what: format!("voltage collapse at bus {} ({:.4} pu)", bus.name, bus.v),
            });
        }
        Ok(())
    }

    /// Buses with online machines follow their mean terminal voltage; the
    /// rest shift by the system-wide mean voltage change.
    fn update_buses(&mut self) {
        let (sum, count) = self
            .online()
            .fold((0.0, 0usize), |(s, n), m| (s + (m.v - m.v0), n + 1));
        let mean_shift = if count > 0 { sum / count as f64 } else { 0.0 };
        for (idx, bus) in self.buses.iter_mut().enumerate() {
            let (sum, count) = self
                .machines
                .iter()
                .filter(|m| m.online && m.bus == idx)
                .fold((0.0, 0usize), |(s, n), m| (s + m.v, n + 1));
            bus.v = if count > 0 {
                sum / count as f64
            } else {
                bus.v0 + mean_shift
            };
        }
    }

    /// Applies a discrete command.
    ///
    /// Returns `false` if the breaker was already in the requested state.
    ///
    /// # Errors
    ///
    /// `Data` for an unknown component, `Unsupported` for component types
    /// the model has no breaker for.
    pub fn apply(&mut self, command: &Command) -> EngineResult<bool> {
        match command.component {
            ComponentType::SyncMachine => {
                let m = self
                    .machines
                    .iter_mut()
                    .find(|m| m.name == command.target)
                    .ok_or_else(|| data(format!("unknown machine {}", command.target)))?;
                if m.online == command.closed {
                    return Ok(false);
                }
                if command.closed {
                    m.reconnect();
                } else {
                    m.trip();
                }
                self.update_buses();
                Ok(true)
            }
            ComponentType::Load => {
                let l = self
                    .loads
                    .iter_mut()
                    .find(|l| l.name == command.target)
                    .ok_or_else(|| data(format!("unknown load {}", command.target)))?;
                let changed = l.online != command.closed;
                l.online = command.closed;
                Ok(changed)
            }
            other => Err(EngineError::Unsupported(format!(
                "{} {} is not modeled",
                command.action.as_str(),
                other.as_str()
            ))),
        }
    }

    /// Resolves `channel` to a model quantity.
    pub fn probe(&self, channel: &Channel) -> Option<Probe> {
        match channel.group() {
            SignalGroup::Sync | SignalGroup::Tor => self
                .machines
                .iter()
                .position(|m| m.name == channel.component)
                .map(|idx| Probe::Machine(idx, channel.signal)),
            SignalGroup::Bus => self
                .buses
                .iter()
                .position(|b| b.name == channel.component)
                .map(Probe::Bus),
        }
    }

    /// Current value of a resolved probe.
    pub fn value(&self, probe: Probe) -> f64 {
        match probe {
            Probe::Machine(idx, signal) => {
                let m = &self.machines[idx];
                match signal {
                    Signal::Speed => {
                        if m.online {
                            self.omega
                        } else {
                            0.0
                        }
                    }
                    Signal::ActivePower => m.p,
                    Signal::ReactivePower => m.q,
                    Signal::ValvePosition => m.z,
                    Signal::MechanicalPower => m.pm,
                    Signal::VoltageMagnitude => m.v,
                }
            }
            Probe::Bus(idx) => self.buses[idx].v,
        }
    }
}

fn data(message: impl Into<String>) -> EngineError {
    EngineError::Data(message.into())
}

/// Gaussian noise with mean 0 via the Box-Muller transform.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;

    const DYNAMIC: &str = r#"
load_damping = 1.0

[[machine]]
name = "g1"
bus = "b1"
rating_mw = 500.0
inertia_s = 5.0
droop = 0.05
governor_time_s = 0.5
turbine_time_s = 5.0
q_max_mvar = 200.0

[[machine]]
name = "g2"
bus = "b2"
rating_mw = 500.0
inertia_s = 5.0
droop = 0.05
governor_time_s = 0.5
turbine_time_s = 5.0
q_max_mvar = 200.0

[[machine]]
name = "g3"
bus = "b1"
rating_mw = 100.0
inertia_s = 4.0
droop = 0.05
governor_time_s = 0.5
turbine_time_s = 5.0
q_max_mvar = 40.0

[[load]]
name = "L1"
p_mw = 540.0
q_mvar = 140.0

[[load]]
name = "L2"
p_mw = 100.0
q_mvar = 30.0
"#;

    const FLOW: &str = r#"
[[generator]]
name = "g1"
p_mw = 300.0
q_mvar = 80.0

[[generator]]
name = "g2"
p_mw = 300.0
q_mvar = 80.0

[[generator]]
name = "g3"
p_mw = 50.0
q_mvar = 20.0

[[bus]]
name = "b1"
v_pu = 1.02

[[bus]]
name = "b2"
v_pu = 1.01

[[bus]]
name = "b3"
v_pu = 1.0
"#;

    fn grid(noise: f64) -> Grid {
        let dynamic: DynamicData = toml::from_str(DYNAMIC).expect("dynamic data parses");
        let flow: PowerFlow = toml::from_str(FLOW).expect("power flow parses");
        let settings = Settings {
            load_noise_std: noise,
            ..Settings::default()
        };
        Grid::build(&dynamic, &flow, &settings).expect("consistent case")
    }

    fn cmd(text: &str) -> Command {
        text.parse().expect("valid command")
    }

    /// Integrates from `from` to `to`, returning the first failure.
    fn run(grid: &mut Grid, from: f64, to: f64) -> EngineResult<()> {
        let dt = 0.01;
        let mut t = from;
        while t < to - 1e-9 {
            t += dt;
            grid.step(dt, t)?;
        }
        Ok(())
    }

    #[test]
    fn initial_point_is_steady() {
        let mut g = grid(0.0);
        run(&mut g, 0.0, 5.0).expect("stable run");
        assert!(g.omega().abs() < 1e-9);
        assert!((g.machines()[0].pm - 300.0).abs() < 1e-6);
        assert!((g.machines()[0].q - 80.0).abs() < 1e-6);
        assert!((g.buses()[0].v - 1.02).abs() < 1e-9);
    }

    #[test]
    fn trip_causes_frequency_dip_and_pickup() {
        let mut g = grid(0.0);
        assert!(g.apply(&cmd("BREAKER SYNC_MACH g3 0")).expect("known machine"));
        run(&mut g, 0.0, 60.0).expect("stable run");

        assert!(g.omega() < 0.0, "frequency should settle below nominal");
        let g1 = &g.machines()[0];
        assert!(g1.pm > 300.0, "remaining machines should pick up load");
        assert!(g1.z > 0.6);
        assert!(g1.q > 80.0);
        assert!(g1.v < 1.02);
        assert_eq!(g.machines()[2].pm, 0.0);
        assert!(!g.machines()[2].online);
    }

    #[test]
    fn machine_free_bus_follows_mean_voltage_shift() {
        let mut g = grid(0.0);
        g.apply(&cmd("BREAKER SYNC_MACH g3 0")).expect("known machine");
        run(&mut g, 0.0, 10.0).expect("stable run");
        assert!(g.buses()[2].v < 1.0);
    }

    #[test]
    fn repeated_breaker_operation_is_a_no_op() {
        let mut g = grid(0.0);
        assert!(g.apply(&cmd("BREAKER SYNC_MACH g1 0")).expect("known machine"));
        assert!(!g.apply(&cmd("BREAKER SYNC_MACH g1 0")).expect("known machine"));
        assert!(g.apply(&cmd("BREAKER SYNC_MACH g1 1")).expect("known machine"));
        assert!(g.machines()[0].online);
    }

    #[test]
    fn losing_every_machine_fails() {
        let mut g = grid(0.0);
        for name in ["g1", "g2", "g3"] {
            g.apply(&cmd(&format!("BREAKER SYNC_MACH {name} 0")))
                .expect("known machine");
        }
        assert!(matches!(g.step(0.01, 0.01), Err(EngineError::Diverged { .. })));
    }

    #[test]
    fn losing_too_much_generation_diverges() {
        let mut g = grid(0.0);
        g.apply(&cmd("BREAKER SYNC_MACH g1 0")).expect("known machine");
        let err = run(&mut g, 0.0, 60.0);
        assert!(matches!(err, Err(EngineError::Diverged { .. })));
    }

    #[test]
    fn unknown_and_unsupported_targets() {
        let mut g = grid(0.0);
        assert!(matches!(
            g.apply(&cmd("BREAKER SYNC_MACH g9 0")),
            Err(EngineError::Data(_))
        ));
        assert!(matches!(
            g.apply(&cmd("BREAKER BRANCH l1 0")),
            Err(EngineError::Unsupported(_))
        ));
    }

    #[test]
    fn load_shedding_raises_frequency() {
        let mut g = grid(0.0);
        assert!(g.apply(&cmd("BREAKER LOAD L2 0")).expect("known load"));
        g.step(0.01, 0.01).expect("single step is stable");
        assert!(g.omega() > 0.0);
        assert_eq!(g.total_load(), 540.0);
    }

    #[test]
    fn noise_is_reproducible_for_a_seed() {
        let mut a = grid(2.0);
        let mut b = grid(2.0);
        run(&mut a, 0.0, 1.0).expect("stable run");
        run(&mut b, 0.0, 1.0).expect("stable run");
        assert_eq!(a.omega(), b.omega());
        assert!(a.omega() != 0.0);
    }

    #[test]
    fn rejects_uncovered_load() {
        let dynamic: DynamicData = toml::from_str(DYNAMIC).expect("dynamic data parses");
        let mut flow: PowerFlow = toml::from_str(FLOW).expect("power flow parses");
        flow.generators[2].p_mw = 10.0;
        let err = Grid::build(&dynamic, &flow, &Settings::default());
        assert!(matches!(err, Err(EngineError::Data(_))));
    }

    #[test]
    fn rejects_machine_on_unknown_bus() {
        let mut dynamic: DynamicData = toml::from_str(DYNAMIC).expect("dynamic data parses");
        let flow: PowerFlow = toml::from_str(FLOW).expect("power flow parses");
        dynamic.machines[0].bus = "b9".to_string();
        let err = Grid::build(&dynamic, &flow, &Settings::default());
        assert!(matches!(err, Err(EngineError::Data(m)) if m.contains("b9")));
    }

    #[test]
    fn probes_resolve_by_group() {
        let g = grid(0.0);
        let pm = g.probe(&Channel::new("g1", Signal::MechanicalPower));
        assert_eq!(pm, Some(Probe::Machine(0, Signal::MechanicalPower)));
        assert_eq!(g.value(Probe::Machine(0, Signal::MechanicalPower)), 300.0);
        assert_eq!(
            g.probe(&Channel::new("b2", Signal::VoltageMagnitude)),
            Some(Probe::Bus(1))
        );
        assert_eq!(g.probe(&Channel::new("g9", Signal::Speed)), None);
    }
}
