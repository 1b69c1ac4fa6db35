//! `vehicle_models` — Vehicle-side leaf models.
//!
//! # Module layout
//! - [`tire`]    — Empirical magic-formula tire force curves
//! - [`bicycle`] — Nonlinear single-track (bicycle) dynamics
//! - [`rk4`]     — Fixed-step 4th-order Runge–Kutta integrator
//!
//! Everything here is generic over [`num_dual::DualNum`] scalars so the same
//! model code serves plain `f64` evaluation and forward-mode derivative
//! extraction in the optimizer.

pub mod bicycle;
pub mod rk4;
pub mod tire;

pub use bicycle::{BicycleModel, VehicleParams, STATE_DIM};
pub use rk4::rk4_step;
pub use tire::{PacejkaTire, TireCoefficients};
