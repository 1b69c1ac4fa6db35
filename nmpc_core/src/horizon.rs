//! Horizon parameters and fail-fast validation.

use serde::{Deserialize, Serialize};

use crate::types::NmpcError;

/// Configuration of one finite-horizon problem.
///
/// `prediction_horizon` (Np) is the number of future dynamics steps rolled
/// out in the cost; `control_horizon` (Nc ≤ Np) is the number of free
/// control decisions. Beyond Nc the last decision is held constant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HorizonParams {
    pub prediction_horizon: usize,
    pub control_horizon: usize,
    /// Discretization step Δt (s)
    pub dt: f64,
    /// Tracking weight on yaw-angle error
    pub q_yaw: f64,
    /// Tracking weight on lateral-position error
    pub q_lateral: f64,
    /// Weight on steering magnitude
    pub r: f64,
    /// Steering actuator limit: each decision is box-bounded to ±δ_max
    pub steering_limit: f64,
    /// Optional steering rate limit δ̇_max (rad/s). When set, consecutive
    /// decisions are constrained to |u_{k+1} − u_k| ≤ δ̇_max·Δt. Off by
    /// default: the box bounds alone do not imply any rate limit.
    pub steering_rate_limit: Option<f64>,
}

impl Default for HorizonParams {
    fn default() -> Self {
        Self {
            prediction_horizon: 10,
            control_horizon: 3,
            dt: 0.1,
            q_yaw: 10.0,
            q_lateral: 10.0,
            r: 0.5,
            steering_limit: 10.0,
            steering_rate_limit: None,
        }
    }
}

impl HorizonParams {
    /// Check the configuration before a problem is built. A malformed
    /// problem must never reach the solver.
    pub fn validate(&self) -> Result<(), NmpcError> {
        if self.control_horizon == 0 {
            return Err(NmpcError::Configuration(
                "control horizon must be at least 1".into(),
            ));
        }
        if self.control_horizon > self.prediction_horizon {
            return Err(NmpcError::Configuration(format!(
                "control horizon {} exceeds prediction horizon {}",
                self.control_horizon, self.prediction_horizon
            )));
        }
        if !(self.dt > 0.0) {
            return Err(NmpcError::Configuration(format!(
                "time step must be positive, got {}",
                self.dt
            )));
        }
        if !(self.steering_limit > 0.0) {
            return Err(NmpcError::Configuration(format!(
                "steering limit must be positive, got {}",
                self.steering_limit
            )));
        }
        if self.q_yaw < 0.0 || self.q_lateral < 0.0 || self.r < 0.0 {
            return Err(NmpcError::Configuration(
                "cost weights must be non-negative".into(),
            ));
        }
        if let Some(rate) = self.steering_rate_limit {
            if !(rate > 0.0) {
                return Err(NmpcError::Configuration(format!(
                    "steering rate limit must be positive, got {rate}"
                )));
            }
        }
        Ok(())
    }
}
