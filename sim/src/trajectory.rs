//! Closed-form double lane-change reference.
//!
//! The curve is a pair of opposed tanh ramps in the lateral position whose
//! derivative (a difference of sech² bumps) yields the yaw-angle target.
//! Longitudinal position is taken as X = speed · t, so the reference is a
//! pure function of time at constant speed.

use nmpc_core::{Reference, ReferenceSource};
use serde::{Deserialize, Serialize};

// Ramp geometry: lateral amplitudes (m), longitudinal extents (m) and center
// stations (m) of the two ramps, plus the shared z-scale and per-ramp phase
// of the tanh argument. The yaw target is derived from the same constants,
// so the two branches cannot drift apart.
const AMPLITUDE_1: f64 = 4.05;
const AMPLITUDE_2: f64 = 5.7;
const EXTENT_1: f64 = 25.0;
const EXTENT_2: f64 = 21.95;
const STATION_1: f64 = 27.19;
const STATION_2: f64 = 56.46;
const Z_SCALE: f64 = 2.4;
const PHASE_1: f64 = 1.2;
const PHASE_2: f64 = 1.0;

/// Double lane change at constant speed: ramp left, then further right.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaneChangeReference {
    /// Constant longitudinal speed (m/s) mapping time to station
    pub speed: f64,
}

impl Default for LaneChangeReference {
    fn default() -> Self {
        Self { speed: 10.0 }
    }
}

impl LaneChangeReference {
    pub fn new(speed: f64) -> Self {
        Self { speed }
    }

    /// Reference at longitudinal station `x` (m).
    pub fn at_station(&self, x: f64) -> Reference {
        let z1 = Z_SCALE / EXTENT_1 * (x - STATION_1) - PHASE_1;
        let z2 = Z_SCALE / EXTENT_2 * (x - STATION_2) - PHASE_2;

        let sech2 = |z: f64| {
            let s = 1.0 / z.cosh();
            s * s
        };

        // Slope of the lateral target, by the chain rule on the ramps below.
        let slope = AMPLITUDE_1 / 2.0 * sech2(z1) * (Z_SCALE / EXTENT_1)
            - AMPLITUDE_2 / 2.0 * sech2(z2) * (Z_SCALE / EXTENT_2);
        let lateral = AMPLITUDE_1 / 2.0 * (1.0 + z1.tanh())
            - AMPLITUDE_2 / 2.0 * (1.0 + z2.tanh());

        Reference {
            yaw: slope.atan(),
            lateral,
        }
    }
}

impl ReferenceSource for LaneChangeReference {
    fn reference_at(&self, time: f64) -> Reference {
        self.at_station(self.speed * time)
    }
}
