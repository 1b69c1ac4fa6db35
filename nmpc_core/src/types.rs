//! Fundamental types shared across the controller.

use nalgebra::Vector6;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vehicle_models::STATE_DIM;

/// 6-component vehicle state: [vx, vy, yaw, yaw_rate, X, Y].
pub type StateVec = Vector6<f64>;

/// Named state indices.
pub mod idx {
    pub const VX: usize = 0;
    pub const VY: usize = 1;
    pub const YAW: usize = 2;
    pub const YAW_RATE: usize = 3;
    pub const POS_X: usize = 4;
    pub const POS_Y: usize = 5;
}

/// Convert between the nalgebra state vector and the plain array the model
/// crates operate on.
pub fn state_to_array(state: &StateVec) -> [f64; STATE_DIM] {
    let mut out = [0.0; STATE_DIM];
    out.copy_from_slice(state.as_slice());
    out
}

pub fn state_from_array(state: &[f64; STATE_DIM]) -> StateVec {
    StateVec::from_column_slice(state)
}

/// Tracking reference for one solve: yaw angle and lateral position targets,
/// held constant across the horizon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Target yaw angle (rad)
    pub yaw: f64,
    /// Target lateral position Y (m)
    pub lateral: f64,
}

impl Reference {
    pub fn new(yaw: f64, lateral: f64) -> Self {
        Self { yaw, lateral }
    }
}

/// Controller-level error taxonomy. Configuration and dimension errors are
/// raised at problem-build time, before any solver call; solver failures
/// propagate unchanged to the tick boundary.
#[derive(Debug, Error)]
pub enum NmpcError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("invalid decision vector dimension: expected {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },
    #[error(transparent)]
    Solver(#[from] crate::solver::SolverFailure),
}
