//! Signal naming shared by the trajectory file and the extractor.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Component family a signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalGroup {
    /// Synchronous machine.
    Sync,
    /// Turbine/governor of a machine.
    Tor,
    /// Network bus.
    Bus,
}

impl SignalGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalGroup::Sync => "sync",
            SignalGroup::Tor => "tor",
            SignalGroup::Bus => "bus",
        }
    }
}

impl fmt::Display for SignalGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(SignalGroup::Sync),
            "tor" => Ok(SignalGroup::Tor),
            "bus" => Ok(SignalGroup::Bus),
            other => Err(format!("unknown signal group \"{other}\"")),
        }
    }
}

/// A recorded quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Rotor speed deviation (pu).
    Speed,
    /// Electrical active power (MW).
    ActivePower,
    /// Electrical reactive power (Mvar).
    ReactivePower,
    /// Governor valve position (pu).
    ValvePosition,
    /// Mechanical power (MW).
    MechanicalPower,
    /// Voltage magnitude (pu).
    VoltageMagnitude,
}

impl Signal {
    /// Signals recorded for each group.
    pub fn of_group(group: SignalGroup) -> &'static [Signal] {
        match group {
            SignalGroup::Sync => &[Signal::Speed, Signal::ActivePower, Signal::ReactivePower],
            SignalGroup::Tor => &[Signal::ValvePosition, Signal::MechanicalPower],
            SignalGroup::Bus => &[Signal::VoltageMagnitude],
        }
    }

    pub fn group(self) -> SignalGroup {
        match self {
            Signal::Speed | Signal::ActivePower | Signal::ReactivePower => SignalGroup::Sync,
            Signal::ValvePosition | Signal::MechanicalPower => SignalGroup::Tor,
            Signal::VoltageMagnitude => SignalGroup::Bus,
        }
    }

    /// Short code used in trajectory headers (`S`, `P`, `Q`, `z`, `Pm`, `mag`).
    pub fn code(self) -> &'static str {
        match self {
            Signal::Speed => "S",
            Signal::ActivePower => "P",
            Signal::ReactivePower => "Q",
            Signal::ValvePosition => "z",
            Signal::MechanicalPower => "Pm",
            Signal::VoltageMagnitude => "mag",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Signal::Speed | Signal::ValvePosition | Signal::VoltageMagnitude => "pu",
            Signal::ActivePower | Signal::MechanicalPower => "MW",
            Signal::ReactivePower => "Mvar",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Signal::Speed => "speed deviation",
            Signal::ActivePower => "electrical active power",
            Signal::ReactivePower => "electrical reactive power",
            Signal::ValvePosition => "governor valve position",
            Signal::MechanicalPower => "mechanical power",
            Signal::VoltageMagnitude => "voltage magnitude",
        }
    }

    /// Looks up a signal by group and code.
    pub fn from_code(group: SignalGroup, code: &str) -> Option<Signal> {
        Signal::of_group(group)
            .iter()
            .copied()
            .find(|s| s.code() == code)
    }
}

/// Fully qualified channel: `<group>:<component>:<signal>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    pub component: String,
    pub signal: Signal,
}

impl Channel {
    pub fn new(component: impl Into<String>, signal: Signal) -> Self {
        Self {
            component: component.into(),
            signal,
        }
    }

    pub fn group(&self) -> SignalGroup {
        self.signal.group()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.group(),
            self.component,
            self.signal.code()
        )
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // component names may themselves contain ':'
        let Some((group, component, code)) = s
            .split_once(':')
            .and_then(|(group, rest)| rest.rsplit_once(':').map(|(c, code)| (group, c, code)))
        else {
            return Err(format!("channel \"{s}\" is not <group>:<component>:<signal>"));
        };
        let group: SignalGroup = group.parse()?;
        let signal = Signal::from_code(group, code)
            .ok_or_else(|| format!("unknown signal \"{code}\" for group {group}"))?;
        if component.is_empty() {
            return Err(format!("channel \"{s}\" has an empty component"));
        }
        Ok(Channel::new(component, signal))
    }
}
