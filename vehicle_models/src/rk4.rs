//! Classical fixed-step 4th-order Runge–Kutta.
//!
//! This is the single discrete-time map of the whole system: the horizon
//! rollout, the open-loop plant and log replay all advance state through it,
//! which keeps the controller's internal prediction and any standalone
//! simulation consistent by construction.

use num_dual::DualNum;

use crate::bicycle::{BicycleModel, STATE_DIM};

/// One RK4 step of `dx/dt = f(x)` with step `dt`: four slope evaluations
/// combined with weights 1, 2, 2, 1 scaled by dt/6.
pub fn rk4_step<D, F>(f: F, x: &[D; STATE_DIM], dt: f64) -> [D; STATE_DIM]
where
    D: DualNum<f64> + Copy,
    F: Fn(&[D; STATE_DIM]) -> [D; STATE_DIM],
{
    let half = dt * 0.5;

    let k1 = f(x);
    let k2 = f(&add_scaled(x, &k1, half));
    let k3 = f(&add_scaled(x, &k2, half));
    let k4 = f(&add_scaled(x, &k3, dt));

    let mut out = *x;
    for i in 0..STATE_DIM {
        out[i] = out[i] + (k1[i] + k2[i] * 2.0 + k3[i] * 2.0 + k4[i]) * (dt / 6.0);
    }
    out
}

fn add_scaled<D>(x: &[D; STATE_DIM], k: &[D; STATE_DIM], h: f64) -> [D; STATE_DIM]
where
    D: DualNum<f64> + Copy,
{
    let mut out = *x;
    for i in 0..STATE_DIM {
        out[i] = out[i] + k[i] * h;
    }
    out
}

impl BicycleModel {
    /// Advance the vehicle one step of `dt` seconds under a constant
    /// steering angle. The control is held across all four sub-evaluations —
    /// there is no interpolation inside a step.
    pub fn step<D>(&self, state: &[D; STATE_DIM], steering: D, dt: f64) -> [D; STATE_DIM]
    where
        D: DualNum<f64> + Copy + std::ops::Neg<Output = D>,
    {
        rk4_step(|x| self.derivative(x, steering), state, dt)
    }
}
