//! Plants with model–plant mismatch.
//!
//! The controller's open-loop default re-integrates its own model, which is
//! useful for algorithm checks but hides every real-world imperfection. The
//! disturbed plant injects seeded Gaussian noise on the applied steering so a
//! closed-loop run actually exercises the feedback path.

use nmpc_core::types::{state_from_array, state_to_array};
use nmpc_core::{Plant, StateVec};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use vehicle_models::BicycleModel;

/// Integrator plant with additive steering disturbance, deterministic per seed.
pub struct DisturbedPlant {
    model: BicycleModel,
    dt: f64,
    noise_std: f64,
    rng: ChaCha8Rng,
}

impl DisturbedPlant {
    /// `noise_std` is the standard deviation of the steering disturbance (rad).
    /// A zero deviation reduces to the plain integrator plant.
    pub fn new(model: BicycleModel, dt: f64, noise_std: f64, seed: u64) -> Self {
        Self {
            model,
            dt,
            noise_std,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Plant for DisturbedPlant {
    fn apply(&mut self, state: &StateVec, control: f64) -> StateVec {
        let draw: f64 = StandardNormal.sample(&mut self.rng);
        let disturbed = control + draw * self.noise_std;
        let next = self.model.step(&state_to_array(state), disturbed, self.dt);
        state_from_array(&next)
    }
}
