//! Fault scenarios for simulated node runs.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: No faults, session completes normally
    Steady,

    /// SIM-002: 60% of publish attempts dropped
    FlakyPublish,

    /// SIM-003: Every fetch fails for the first half of the run
    FetchBlackout,

    /// SIM-004: Session cancelled halfway through
    CancelMidrun,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Steady,
            ScenarioId::FlakyPublish,
            ScenarioId::FetchBlackout,
            ScenarioId::CancelMidrun,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Steady => "steady",
            ScenarioId::FlakyPublish => "flaky_publish",
            ScenarioId::FetchBlackout => "fetch_blackout",
            ScenarioId::CancelMidrun => "cancel_midrun",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Steady => "No faults; every publish lands and the session completes",
            ScenarioId::FlakyPublish => "60% publish drop rate; loops must keep iterating",
            ScenarioId::FetchBlackout => "Fetches unreachable for half the run, then heal",
            ScenarioId::CancelMidrun => "Session cancelled at half time; nothing runs after",
        }
    }

    /// Publish drop rate injected for the whole run.
    pub fn publish_failure_rate(&self) -> f64 {
        match self {
            ScenarioId::FlakyPublish => 0.6,
            _ => 0.0,
        }
    }

    /// Returns true if fetches start blacked out.
    pub fn starts_blacked_out(&self) -> bool {
        matches!(self, ScenarioId::FetchBlackout)
    }

    /// Returns true if the run ends by cancellation rather than completion.
    pub fn cancels(&self) -> bool {
        matches!(self, ScenarioId::CancelMidrun)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady" | "sim-001" => Ok(ScenarioId::Steady),
            "flaky_publish" | "flakypublish" | "sim-002" => Ok(ScenarioId::FlakyPublish),
            "fetch_blackout" | "fetchblackout" | "sim-003" => Ok(ScenarioId::FetchBlackout),
            "cancel_midrun" | "cancelmidrun" | "sim-004" => Ok(ScenarioId::CancelMidrun),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("SIM-003".parse::<ScenarioId>(), Ok(ScenarioId::FetchBlackout));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_only_flaky_publish_drops() {
        for scenario in ScenarioId::all() {
            let dropping = scenario.publish_failure_rate() > 0.0;
            assert_eq!(dropping, scenario == ScenarioId::FlakyPublish);
        }
    }
}
