//! `nmpc_core` — Receding-horizon nonlinear MPC for the bicycle vehicle.
//!
//! # Module layout
//! - [`types`]      — State vector, reference, error taxonomy
//! - [`horizon`]    — Horizon parameters (Np, Nc, Δt, weights, bounds) + validation
//! - [`problem`]    — Single-shooting horizon problem builder (rollout, cost, Jacobian)
//! - [`solver`]     — Solver adapter contract + box-projected Levenberg–Marquardt
//! - [`controller`] — The tick loop: build → warm start → solve → apply first control
//! - [`metrics`]    — Tracking/solver statistics over a run

pub mod controller;
pub mod horizon;
pub mod metrics;
pub mod problem;
pub mod solver;
pub mod types;

pub use controller::{
    shift_warm_start, IntegratorPlant, Plant, RecedingHorizonController, ReferenceSource,
    TickRecord,
};
pub use horizon::HorizonParams;
pub use metrics::RunMetrics;
pub use problem::HorizonProblem;
pub use solver::{LevenbergMarquardt, NlpSolver, Solution, SolverFailure, SolverStatus};
pub use types::{NmpcError, Reference, StateVec};
