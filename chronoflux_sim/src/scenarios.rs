//! Deterministic test scenarios for the multi-replica harness.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Single replica, no transport, invariant checks
    Solo,

    /// Two replicas relaying intents over a clean bus
    Relay,

    /// Portal fired on one replica propagates to all
    PortalWave,

    /// Repeated flips compound without destabilizing the swarm
    FlipStorm,

    /// Four replicas under 50% message loss
    LossyMesh,

    /// Partition, divergence, heal, telemetry re-merge
    SplitBrain,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Solo,
            ScenarioId::Relay,
            ScenarioId::PortalWave,
            ScenarioId::FlipStorm,
            ScenarioId::LossyMesh,
            ScenarioId::SplitBrain,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Solo => "solo",
            ScenarioId::Relay => "relay",
            ScenarioId::PortalWave => "portal_wave",
            ScenarioId::FlipStorm => "flip_storm",
            ScenarioId::LossyMesh => "lossy_mesh",
            ScenarioId::SplitBrain => "split_brain",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Solo => "Single replica, autopilot, metric and containment invariants",
            ScenarioId::Relay => "Two replicas on a clean bus, intents land on both fields",
            ScenarioId::PortalWave => "Portal on one replica switches the regime everywhere",
            ScenarioId::FlipStorm => "Repeated pacemaker flips, swarm stays bounded",
            ScenarioId::LossyMesh => "Four replicas under 50% loss, everyone keeps running",
            ScenarioId::SplitBrain => "Partition then heal, peer tables re-merge last-write-wins",
        }
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
            "solo" => Ok(ScenarioId::Solo),
            "relay" => Ok(ScenarioId::Relay),
            "portal_wave" | "portalwave" | "portal" => Ok(ScenarioId::PortalWave),
            "flip_storm" | "flipstorm" | "flip" => Ok(ScenarioId::FlipStorm),
            "lossy_mesh" | "lossymesh" | "lossy" => Ok(ScenarioId::LossyMesh),
            "split_brain" | "splitbrain" => Ok(ScenarioId::SplitBrain),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
