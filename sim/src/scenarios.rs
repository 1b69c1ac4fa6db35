//! Scenario definitions.
//!
//! Each scenario is a named closed-loop configuration: vehicle, horizon,
//! initial state and reference schedule. All scenarios are deterministic
//! given the same seed.

use crate::trajectory::LaneChangeReference;
use nmpc_core::{HorizonParams, Reference, ReferenceSource};
use serde::{Deserialize, Serialize};
use vehicle_models::VehicleParams;

/// Which pre-defined scenario to run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// ISO-style double lane change at constant speed
    LaneChange,
    /// Step change in the lateral target after one second
    StepLateral,
    /// Zero reference throughout; regulation from a perturbed initial state
    HoldStraight,
}

/// A fully configured closed-loop scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub kind: ScenarioKind,
    pub seed: u64,
    /// Run length (s)
    pub duration: f64,
    /// Longitudinal speed the references assume (m/s)
    pub speed: f64,
    pub initial_state: [f64; 6],
    pub vehicle: VehicleParams,
    pub horizon: HorizonParams,
    /// Steering disturbance std-dev injected at the plant (rad)
    pub disturbance_std: f64,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::LaneChange => Self::lane_change(seed),
            ScenarioKind::StepLateral => Self::step_lateral(seed),
            ScenarioKind::HoldStraight => Self::hold_straight(seed),
        }
    }

    fn lane_change(seed: u64) -> Self {
        Self {
            name: "lane_change".into(),
            kind: ScenarioKind::LaneChange,
            seed,
            duration: 10.0,
            speed: 10.0,
            initial_state: [10.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vehicle: VehicleParams::default(),
            horizon: HorizonParams {
                prediction_horizon: 10,
                control_horizon: 3,
                dt: 0.05,
                ..Default::default()
            },
            disturbance_std: 0.005,
        }
    }

    fn step_lateral(seed: u64) -> Self {
        Self {
            name: "step_lateral".into(),
            kind: ScenarioKind::StepLateral,
            seed,
            duration: 6.0,
            speed: 10.0,
            initial_state: [10.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vehicle: VehicleParams::default(),
            horizon: HorizonParams {
                prediction_horizon: 12,
                control_horizon: 4,
                dt: 0.05,
                ..Default::default()
            },
            disturbance_std: 0.0,
        }
    }

    fn hold_straight(seed: u64) -> Self {
        Self {
            name: "hold_straight".into(),
            kind: ScenarioKind::HoldStraight,
            seed,
            duration: 4.0,
            speed: 15.0,
            // Perturbed heading and lateral offset to regulate away.
            initial_state: [15.0, 0.0, 0.05, 0.0, 0.0, 0.5],
            vehicle: VehicleParams::default(),
            horizon: HorizonParams {
                prediction_horizon: 8,
                control_horizon: 3,
                dt: 0.05,
                ..Default::default()
            },
            disturbance_std: 0.01,
        }
    }
}

impl ReferenceSource for Scenario {
    fn reference_at(&self, time: f64) -> Reference {
        match self.kind {
            ScenarioKind::LaneChange => {
                LaneChangeReference::new(self.speed).reference_at(time)
            }
            ScenarioKind::StepLateral => {
                if time < 1.0 {
                    Reference::new(0.0, 0.0)
                } else {
                    Reference::new(0.0, 2.0)
                }
            }
            ScenarioKind::HoldStraight => Reference::new(0.0, 0.0),
        }
    }
}
