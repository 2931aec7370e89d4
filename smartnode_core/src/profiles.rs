//! Built-in node profiles.
//!
//! Each profile is the role table of one kind of smart-environment node.

use crate::domain::ValueDomain;
use crate::error::ConfigError;
use crate::role::{ConsumerRole, NodeRole, ProducerRole};
use crate::rule::DecisionRule;
use smartnode_env::Value;

/// Profile identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeProfile {
    /// Room lighting: ambient sensors and a touch/occupancy light switch
    Light,

    /// Smart display: brightness, sleep and volume control
    Display,

    /// Fire safety: gas/smoke/flame sensors, sprinklers and safety lights
    Safety,

    /// Session host only, no roles
    Server,
}

impl NodeProfile {
    /// Returns a list of all profiles.
    pub fn all() -> Vec<NodeProfile> {
        vec![
            NodeProfile::Light,
            NodeProfile::Display,
            NodeProfile::Safety,
            NodeProfile::Server,
        ]
    }

    /// Returns the profile name.
    pub fn name(&self) -> &'static str {
        match self {
            NodeProfile::Light => "light",
            NodeProfile::Display => "display",
            NodeProfile::Safety => "safety",
            NodeProfile::Server => "server",
        }
    }

    /// Returns a description of the profile.
    pub fn description(&self) -> &'static str {
        match self {
            NodeProfile::Light => "5 sensors, brightness driven by touch and occupancy",
            NodeProfile::Display => "4 sensors, brightness/sleep/volume actuators",
            NodeProfile::Safety => "4 sensors, sprinklers on flame, safety lights on smoke",
            NodeProfile::Server => "hosts the session, runs no roles",
        }
    }

    /// Returns the role table of this profile.
    pub fn roles(&self) -> Vec<NodeRole> {
        match self {
            NodeProfile::Light => light(),
            NodeProfile::Display => display(),
            NodeProfile::Safety => safety(),
            NodeProfile::Server => Vec::new(),
        }
    }
}

impl std::fmt::Display for NodeProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for NodeProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" | "lights" => Ok(NodeProfile::Light),
            "display" => Ok(NodeProfile::Display),
            "safety" => Ok(NodeProfile::Safety),
            "server" => Ok(NodeProfile::Server),
            _ => Err(ConfigError::UnknownProfile(s.to_string())),
        }
    }
}

fn sensor(name: &str, tag: &str, domain: ValueDomain) -> NodeRole {
    ProducerRole::new(name, tag, domain).into()
}

fn light() -> Vec<NodeRole> {
    let touch = DecisionRule::Map {
        cases: vec![
            (Value::Int(1), Value::Int(100)),
            (Value::Int(0), Value::Int(0)),
        ],
    };
    // Only an empty room switches the light off.
    let occupancy = DecisionRule::Map {
        cases: vec![(Value::Int(0), Value::Int(0))],
    };

    vec![
        sensor("TemperatureSensor", "temperature", ValueDomain::choice([0, 30])),
        sensor("IntensitySensor", "intensity", ValueDomain::float_range(0.0, 100.0)),
        sensor("TouchSensor", "Touch", ValueDomain::choice([0, 1])),
        sensor("AmbianceSensor", "Ambiance", ValueDomain::float_range(0.0, 100.0)),
        sensor("ToneSensor", "Tone", ValueDomain::choice([0, 256])),
        ConsumerRole::new(
            "BrightnessActuator",
            ["Touch", "Occupancy"],
            "Brightness",
            DecisionRule::Each {
                rules: vec![touch, occupancy],
            },
        )
        .into(),
    ]
}

fn display() -> Vec<NodeRole> {
    vec![
        sensor("IRSensor", "ir", ValueDomain::choice([0, 5])),
        sensor("IntensitySensor", "intensity", ValueDomain::choice([0, 120])),
        sensor("ProximitySensor", "proximity", ValueDomain::choice([0, 10])),
        sensor("BluetoothSensor", "bluetooth", ValueDomain::choice([0, 10])),
        ConsumerRole::new(
            "BrightnessActuator",
            ["intensity"],
            "brightness",
            DecisionRule::AtLeast {
                threshold: 100.0,
                then: Value::Int(100),
            },
        )
        .into(),
        ConsumerRole::new(
            "SleepActuator",
            ["occupancy"],
            "sleep",
            DecisionRule::Map {
                cases: vec![(Value::Int(0), Value::Int(0))],
            },
        )
        .into(),
        ConsumerRole::new(
            "VolumeActuator",
            ["microphone"],
            "volume",
            DecisionRule::Above {
                threshold: 50.0,
                then: Value::Int(50),
            },
        )
        .into(),
    ]
}

fn safety() -> Vec<NodeRole> {
    vec![
        sensor("CoSensor", "co", ValueDomain::int_range(0, 100)),
        sensor("SmokeSensor", "smoke", ValueDomain::int_range(0, 100)),
        sensor("FlameSensor", "flame", ValueDomain::choice([0, 1])),
        sensor("TempSensor", "temp", ValueDomain::int_range(0, 100)),
        ConsumerRole::new(
            "SprinklerActuator",
            ["flame"],
            "sprinklers",
            DecisionRule::OnPresent { then: Value::Int(1) },
        )
        .into(),
        ConsumerRole::new(
            "SafetyLightsActuator",
            ["smoke"],
            "safety_lights",
            DecisionRule::Above {
                threshold: 50.0,
                then: Value::Int(1),
            },
        )
        .into(),
    ]
}
