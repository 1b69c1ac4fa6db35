//! Solver adapter boundary and the shipped Levenberg–Marquardt adapter.
//!
//! The controller consumes any optimizer through [`NlpSolver`]: it hands
//! over the built problem and a warm start, and gets back either a converged
//! decision vector or a typed failure. The adapter must never substitute a
//! default control on failure — failures propagate to the tick boundary.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::problem::HorizonProblem;

/// Floor on the Marquardt diagonal so damping still regularizes directions
/// the residuals are insensitive to.
const DIAG_FLOOR: f64 = 1e-12;

/// Halvings tried in the projected-gradient fallback.
const PG_BACKTRACK_STEPS: usize = 40;

/// Largest rate-constraint violation accepted on a returned sequence (rad).
const RATE_FEASIBILITY_TOL: f64 = 1e-6;

/// Hinge-weight escalation rounds before the rate limit counts as unenforceable.
const MAX_PENALTY_ROUNDS: usize = 5;

/// Terminal status of one solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    Optimal,
    Infeasible,
    IterationLimit,
    NumericalError,
}

/// Failure outcomes: no meaningful decision vector is available.
#[derive(Debug, Error)]
pub enum SolverFailure {
    #[error("problem is infeasible: contradictory variable bounds")]
    Infeasible,
    #[error("iteration limit reached after {iterations} iterations")]
    IterationLimit { iterations: usize },
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl SolverFailure {
    pub fn status(&self) -> SolverStatus {
        match self {
            SolverFailure::Infeasible => SolverStatus::Infeasible,
            SolverFailure::IterationLimit { .. } => SolverStatus::IterationLimit,
            SolverFailure::Numerical(_) => SolverStatus::NumericalError,
        }
    }
}

/// A converged solve.
#[derive(Clone, Debug)]
pub struct Solution {
    /// Optimal control sequence (length Nc)
    pub controls: DVector<f64>,
    /// Final cost value
    pub cost: f64,
    /// Outer iterations used
    pub iterations: usize,
    pub status: SolverStatus,
}

/// Narrow contract between the controller and the optimizer.
pub trait NlpSolver {
    fn solve(
        &self,
        problem: &HorizonProblem,
        warm_start: &DVector<f64>,
    ) -> Result<Solution, SolverFailure>;
}

/// Box-projected Levenberg–Marquardt over the weighted residual form.
///
/// Normal equations (JᵀJ + λ·diag(JᵀJ))d = −Jᵀr with adaptive damping; the
/// Marquardt diagonal keeps steps sensible when the cost is nearly flat in
/// some directions, as it is at low vehicle speeds. Candidate steps are
/// projected onto the variable box and accepted on strict cost decrease;
/// when no damped step descends, a backtracking projected-gradient step is
/// tried before the iterate is declared final. Termination is Optimal on a
/// small projected gradient or when the relative cost reduction falls below
/// `cost_tolerance` — on a cost plateau the best iterate found is the
/// answer. The iteration count is bounded; that bound is the only latency
/// safeguard of a solve. When a steering-rate limit is configured, the hinge
/// weight is escalated until the returned sequence satisfies the limit to
/// tolerance, and a sequence that cannot be made feasible is a failure.
#[derive(Clone, Debug)]
pub struct LevenbergMarquardt {
    pub max_iterations: usize,
    /// Projected-gradient tolerance, relative to 1 + cost
    pub gradient_tolerance: f64,
    /// Relative cost-reduction tolerance (ftol)
    pub cost_tolerance: f64,
    pub initial_damping: f64,
    pub max_damping: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            gradient_tolerance: 1e-8,
            cost_tolerance: 1e-8,
            initial_damping: 1e-3,
            max_damping: 1e10,
        }
    }
}

impl LevenbergMarquardt {
    fn projected_gradient_norm(
        w: &DVector<f64>,
        grad: &DVector<f64>,
        lbx: &DVector<f64>,
        ubx: &DVector<f64>,
    ) -> f64 {
        let mut norm_sq = 0.0;
        for i in 0..w.len() {
            let stepped = (w[i] - grad[i]).clamp(lbx[i], ubx[i]);
            let pg = w[i] - stepped;
            norm_sq += pg * pg;
        }
        norm_sq.sqrt()
    }

    fn clamp_to_box(w: &mut DVector<f64>, lbx: &DVector<f64>, ubx: &DVector<f64>) {
        for i in 0..w.len() {
            w[i] = w[i].clamp(lbx[i], ubx[i]);
        }
    }

    /// Largest violation of the general constraints by `w`.
    fn constraint_violation(problem: &HorizonProblem, w: &DVector<f64>) -> f64 {
        let g = problem.constraints(w);
        let (lbg, ubg) = problem.constraint_bounds();
        (0..g.len())
            .map(|k| (lbg[k] - g[k]).max(g[k] - ubg[k]).max(0.0))
            .fold(0.0, f64::max)
    }

    /// The core LM iteration on one (possibly penalty-scaled) problem.
    fn minimize(
        &self,
        problem: &HorizonProblem,
        warm_start: &DVector<f64>,
    ) -> Result<Solution, SolverFailure> {
        let n = problem.num_vars();
        let mut w = warm_start.clone();
        Self::clamp_to_box(&mut w, &problem.lbx, &problem.ubx);
        let mut damping = self.initial_damping;

        for iteration in 0..self.max_iterations {
            let residuals = problem.residual_vector(&w);
            let cost = residuals.norm_squared();
            if !cost.is_finite() {
                return Err(SolverFailure::Numerical("non-finite cost".into()));
            }

            let jac = problem.jacobian(&w);
            if jac.iter().any(|v| !v.is_finite()) {
                return Err(SolverFailure::Numerical("non-finite Jacobian".into()));
            }

            let grad = jac.transpose() * &residuals * 2.0;
            let pg_norm = Self::projected_gradient_norm(&w, &grad, &problem.lbx, &problem.ubx);
            if pg_norm <= self.gradient_tolerance * (1.0 + cost) {
                tracing::debug!(iteration, cost, pg_norm, "converged");
                return Ok(Solution {
                    controls: w,
                    cost,
                    iterations: iteration,
                    status: SolverStatus::Optimal,
                });
            }

            let jtj = jac.transpose() * &jac;
            let jtr = jac.transpose() * &residuals;

            // Damped normal-equation steps, escalating λ on rejection.
            let mut next: Option<(DVector<f64>, f64)> = None;
            while damping <= self.max_damping {
                let mut h = jtj.clone();
                for i in 0..n {
                    h[(i, i)] += damping * jtj[(i, i)].max(DIAG_FLOOR);
                }
                let step = match h.cholesky() {
                    Some(chol) => chol.solve(&(-&jtr)),
                    None => {
                        damping *= 10.0;
                        continue;
                    }
                };

                let mut candidate = &w + step;
                Self::clamp_to_box(&mut candidate, &problem.lbx, &problem.ubx);
                let candidate_cost = problem.cost(&candidate);
                if candidate_cost.is_finite() && candidate_cost < cost {
                    damping = (damping * 0.1).max(1e-12);
                    next = Some((candidate, candidate_cost));
                    break;
                }
                damping *= 10.0;
            }

            // No damped step descends: fall back to a backtracking step along
            // the projected negative gradient before giving up on this
            // iterate. The rollout cost has slope discontinuities where a
            // wheel's longitudinal velocity crosses zero, so the normal
            // equations can be misled where a plain downhill step is not.
            if next.is_none() {
                let mut t = 1.0;
                for _ in 0..PG_BACKTRACK_STEPS {
                    let mut candidate = &w - &grad * t;
                    Self::clamp_to_box(&mut candidate, &problem.lbx, &problem.ubx);
                    let candidate_cost = problem.cost(&candidate);
                    if candidate_cost.is_finite() && candidate_cost < cost {
                        damping = self.initial_damping;
                        next = Some((candidate, candidate_cost));
                        break;
                    }
                    t *= 0.5;
                }
            }

            match next {
                Some((candidate, candidate_cost)) => {
                    let reduction = (cost - candidate_cost) / (1.0 + cost);
                    w = candidate;
                    if reduction <= self.cost_tolerance {
                        tracing::debug!(
                            iteration,
                            cost = candidate_cost,
                            "converged on cost plateau"
                        );
                        return Ok(Solution {
                            controls: w,
                            cost: candidate_cost,
                            iterations: iteration + 1,
                            status: SolverStatus::Optimal,
                        });
                    }
                }
                None => {
                    // Neither the damped steps nor the gradient fallback found
                    // any reduction: the iterate is the best this landscape
                    // admits.
                    tracing::warn!(iteration, cost, pg_norm, "no descent direction, iterate final");
                    return Ok(Solution {
                        controls: w,
                        cost,
                        iterations: iteration,
                        status: SolverStatus::Optimal,
                    });
                }
            }
        }

        Err(SolverFailure::IterationLimit {
            iterations: self.max_iterations,
        })
    }
}

impl NlpSolver for LevenbergMarquardt {
    fn solve(
        &self,
        problem: &HorizonProblem,
        warm_start: &DVector<f64>,
    ) -> Result<Solution, SolverFailure> {
        let n = problem.num_vars();
        if warm_start.len() != n {
            return Err(SolverFailure::Numerical(format!(
                "warm start has dimension {}, problem has {}",
                warm_start.len(),
                n
            )));
        }
        for i in 0..n {
            if problem.lbx[i] > problem.ubx[i] {
                return Err(SolverFailure::Infeasible);
            }
        }

        if problem.params().steering_rate_limit.is_none() {
            return self.minimize(problem, warm_start);
        }

        // Rate-limited problems: re-solve with a stiffer hinge until the
        // returned sequence actually satisfies the constraint. An Optimal
        // report with a violated rate limit would be a lie.
        let mut scaled = problem.clone();
        let mut warm = warm_start.clone();
        for _ in 0..MAX_PENALTY_ROUNDS {
            let solution = self.minimize(&scaled, &warm)?;
            let violation = Self::constraint_violation(&scaled, &solution.controls);
            if violation <= RATE_FEASIBILITY_TOL {
                return Ok(solution);
            }
            tracing::warn!(violation, "rate limit violated, escalating hinge weight");
            warm = solution.controls;
            scaled.escalate_rate_penalty();
        }
        Err(SolverFailure::Numerical(
            "steering rate limit could not be enforced".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::horizon::HorizonParams;
    use crate::types::{Reference, StateVec};
    use approx::assert_abs_diff_eq;
    use vehicle_models::BicycleModel;

    #[test]
    fn unconstrained_control_only_cost_matches_analytic_minimum() {
        // Np = Nc = 1 with Q = 0: cost is exactly r·u², minimized at 0.
        let model = BicycleModel::default();
        let params = HorizonParams {
            prediction_horizon: 1,
            control_horizon: 1,
            q_yaw: 0.0,
            q_lateral: 0.0,
            r: 0.5,
            ..Default::default()
        };
        let x0 = StateVec::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let problem =
            HorizonProblem::build(&model, &params, &x0, Reference::default()).unwrap();

        let solver = LevenbergMarquardt::default();
        let sol = solver
            .solve(&problem, &DVector::from_vec(vec![5.0]))
            .unwrap();
        assert_eq!(sol.status, SolverStatus::Optimal);
        assert_abs_diff_eq!(sol.controls[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.cost, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn contradictory_bounds_fail_as_infeasible() {
        let model = BicycleModel::default();
        let params = HorizonParams::default();
        let mut problem =
            HorizonProblem::build(&model, &params, &StateVec::zeros(), Reference::default())
                .unwrap();
        problem.lbx[0] = 1.0;
        problem.ubx[0] = -1.0;

        let solver = LevenbergMarquardt::default();
        let result = solver.solve(&problem, &DVector::zeros(params.control_horizon));
        // Never a silently-returned zero control.
        assert!(matches!(result, Err(SolverFailure::Infeasible)));
    }

    #[test]
    fn solve_improves_on_the_warm_start() {
        let model = BicycleModel::default();
        let params = HorizonParams {
            prediction_horizon: 6,
            control_horizon: 3,
            dt: 0.05,
            ..Default::default()
        };
        let x0 = StateVec::new(10.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let problem =
            HorizonProblem::build(&model, &params, &x0, Reference::new(0.2, 1.0)).unwrap();

        let warm = DVector::zeros(3);
        let warm_cost = problem.cost(&warm);
        let solver = LevenbergMarquardt::default();
        let sol = solver.solve(&problem, &warm).unwrap();
        assert_eq!(sol.status, SolverStatus::Optimal);
        assert!(sol.cost < warm_cost);
        for u in sol.controls.iter() {
            assert!(u.abs() <= params.steering_limit + 1e-12);
        }
    }

    #[test]
    fn near_flat_low_speed_landscape_still_returns_optimal() {
        // Barely moving vehicle, far-away reference: most of the cost is
        // irreducible over the short horizon, the residual gradient is tiny
        // relative to the cost, and plain identity damping stalls without
        // converging. The adapter must still terminate Optimal with the best
        // sequence it found.
        let model = BicycleModel::default();
        let params = HorizonParams {
            prediction_horizon: 7,
            control_horizon: 6,
            dt: 0.05,
            q_yaw: 1.0,
            q_lateral: 1.0,
            r: 0.01,
            steering_limit: 10.0,
            steering_rate_limit: None,
        };
        let x0 = StateVec::from_element(0.1);
        let problem =
            HorizonProblem::build(&model, &params, &x0, Reference::new(1.0, 5.0)).unwrap();

        let warm = DVector::zeros(6);
        let warm_cost = problem.cost(&warm);
        let solver = LevenbergMarquardt::default();
        let sol = solver.solve(&problem, &warm).unwrap();

        assert_eq!(sol.status, SolverStatus::Optimal);
        assert!(sol.cost < warm_cost, "no progress: {} vs {}", sol.cost, warm_cost);
        for u in sol.controls.iter() {
            assert!(u.abs() <= params.steering_limit + 1e-12);
        }
    }

    #[test]
    fn rate_limited_solution_respects_consecutive_deltas() {
        let model = BicycleModel::default();
        let limited = HorizonParams {
            prediction_horizon: 5,
            control_horizon: 3,
            dt: 0.1,
            steering_rate_limit: Some(0.05),
            ..Default::default()
        };
        let free = HorizonParams {
            steering_rate_limit: None,
            ..limited.clone()
        };
        let x0 = StateVec::new(10.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let reference = Reference::new(0.5, 2.0);
        let solver = LevenbergMarquardt::default();
        let max_delta = |u: &DVector<f64>| {
            (0..u.len() - 1)
                .map(|k| (u[k + 1] - u[k]).abs())
                .fold(0.0, f64::max)
        };
        let du_max = 0.05 * limited.dt;

        // The limit only means something here if the free optimum breaks it.
        let free_problem = HorizonProblem::build(&model, &free, &x0, reference).unwrap();
        let free_sol = solver.solve(&free_problem, &DVector::zeros(3)).unwrap();
        assert!(max_delta(&free_sol.controls) > du_max);

        let problem = HorizonProblem::build(&model, &limited, &x0, reference).unwrap();
        let sol = solver.solve(&problem, &DVector::zeros(3)).unwrap();
        assert_eq!(sol.status, SolverStatus::Optimal);
        assert!(
            max_delta(&sol.controls) <= du_max + 1e-5,
            "rate limit violated: {}",
            max_delta(&sol.controls)
        );
    }

    #[test]
    fn wrong_warm_start_dimension_is_a_failure() {
        let model = BicycleModel::default();
        let params = HorizonParams::default();
        let problem =
            HorizonProblem::build(&model, &params, &StateVec::zeros(), Reference::default())
                .unwrap();
        let solver = LevenbergMarquardt::default();
        let result = solver.solve(&problem, &DVector::zeros(params.control_horizon + 1));
        assert!(matches!(result, Err(SolverFailure::Numerical(_))));
    }
}
