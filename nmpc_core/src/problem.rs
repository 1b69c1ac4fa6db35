//! Horizon problem builder: one finite prediction horizon as a
//! single-shooting optimization problem.
//!
//! The decision vector holds the Nc free controls. The state trajectory is
//! not a decision variable: starting from the current state, an explicit
//! fold rolls the RK4 dynamics out over Np steps (hold-last-value beyond
//! Nc) and substitutes the predicted states directly into the cost, so the
//! dynamics equality constraints hold by construction. Cost and constraint
//! evaluators are generic over dual scalars; exact gradients and Jacobians
//! come from one forward-mode pass per decision variable.

use nalgebra::{DMatrix, DVector};
use num_dual::{Dual64, DualNum};
use vehicle_models::{BicycleModel, STATE_DIM};

use crate::horizon::HorizonParams;
use crate::types::{idx, state_to_array, NmpcError, Reference, StateVec};

/// Initial weight on the quadratic hinge enforcing the optional
/// steering-rate constraint inside the adapter.
const RATE_PENALTY_WEIGHT: f64 = 1e4;

/// An immutable description of one horizon optimization problem.
#[derive(Clone)]
pub struct HorizonProblem<'a> {
    model: &'a BicycleModel,
    params: HorizonParams,
    initial_state: [f64; STATE_DIM],
    reference: Reference,
    rate_penalty_weight: f64,
    /// Box bounds on each decision variable.
    pub lbx: DVector<f64>,
    pub ubx: DVector<f64>,
}

impl<'a> HorizonProblem<'a> {
    /// Build the problem for the current state and reference. Configuration
    /// errors abort here — a malformed problem never reaches the solver.
    pub fn build(
        model: &'a BicycleModel,
        params: &HorizonParams,
        state: &StateVec,
        reference: Reference,
    ) -> Result<Self, NmpcError> {
        params.validate()?;
        let nc = params.control_horizon;
        Ok(Self {
            model,
            params: params.clone(),
            initial_state: state_to_array(state),
            reference,
            rate_penalty_weight: RATE_PENALTY_WEIGHT,
            lbx: DVector::from_element(nc, -params.steering_limit),
            ubx: DVector::from_element(nc, params.steering_limit),
        })
    }

    /// Number of decision variables (= Nc).
    pub fn num_vars(&self) -> usize {
        self.params.control_horizon
    }

    pub fn params(&self) -> &HorizonParams {
        &self.params
    }

    pub fn reference(&self) -> Reference {
        self.reference
    }

    /// Decision index applied at rollout step `k`: the hold-last-value
    /// policy pins steps beyond the control horizon to the final decision.
    pub fn applied_control_index(&self, k: usize) -> usize {
        k.min(self.params.control_horizon - 1)
    }

    /// Stiffen the rate-constraint hinge. Called by an adapter when the
    /// current weight lets the tracking cost buy a constraint violation.
    pub fn escalate_rate_penalty(&mut self) {
        self.rate_penalty_weight *= 100.0;
    }

    /// Check a decision vector against the problem dimension.
    pub fn check_dimension(&self, w: &DVector<f64>) -> Result<(), NmpcError> {
        if w.len() != self.num_vars() {
            return Err(NmpcError::InvalidDimension {
                expected: self.num_vars(),
                got: w.len(),
            });
        }
        Ok(())
    }

    /// Roll the dynamics out over the prediction horizon: the predicted
    /// state after steps 1..=Np, threaded through an explicit fold.
    pub fn rollout<D>(&self, controls: &[D]) -> Vec<[D; STATE_DIM]>
    where
        D: DualNum<f64> + Copy + std::ops::Neg<Output = D>,
    {
        let np = self.params.prediction_horizon;
        let mut states = Vec::with_capacity(np);
        let mut x = self.initial_state.map(D::from);
        for k in 0..np {
            let u = controls[self.applied_control_index(k)];
            x = self.model.step(&x, u, self.params.dt);
            states.push(x);
        }
        states
    }

    /// Weighted residual vector. The cost is the sum of squared residuals:
    /// per rollout step, √q_yaw·(ψ−ψ_ref), √q_lat·(Y−Y_ref) and √r·u for the
    /// control actually applied at that step; plus, when a rate limit is
    /// configured, a quadratic hinge on each consecutive-decision excess.
    pub fn residuals<D>(&self, controls: &[D]) -> Vec<D>
    where
        D: DualNum<f64> + Copy + std::ops::Neg<Output = D>,
    {
        let p = &self.params;
        let sqrt_q_yaw = p.q_yaw.sqrt();
        let sqrt_q_lat = p.q_lateral.sqrt();
        let sqrt_r = p.r.sqrt();

        let mut res = Vec::with_capacity(self.num_residuals());
        for (k, x) in self.rollout(controls).into_iter().enumerate() {
            let u = controls[self.applied_control_index(k)];
            res.push((x[idx::YAW] - self.reference.yaw) * sqrt_q_yaw);
            res.push((x[idx::POS_Y] - self.reference.lateral) * sqrt_q_lat);
            res.push(u * sqrt_r);
        }

        if let Some(rate) = p.steering_rate_limit {
            let limit = rate * p.dt;
            let w = self.rate_penalty_weight.sqrt();
            for k in 0..p.control_horizon - 1 {
                let du = controls[k + 1] - controls[k];
                let du_abs = if du.re() < 0.0 { -du } else { du };
                let excess = du_abs - limit;
                res.push(if excess.re() > 0.0 { excess * w } else { D::from(0.0) });
            }
        }
        res
    }

    pub fn num_residuals(&self) -> usize {
        let rate_rows = if self.params.steering_rate_limit.is_some() {
            self.params.control_horizon - 1
        } else {
            0
        };
        3 * self.params.prediction_horizon + rate_rows
    }

    /// Scalar cost: Σ residual².
    pub fn cost(&self, w: &DVector<f64>) -> f64 {
        self.residuals(w.as_slice()).iter().map(|r| r * r).sum()
    }

    pub fn residual_vector(&self, w: &DVector<f64>) -> DVector<f64> {
        DVector::from_vec(self.residuals(w.as_slice()))
    }

    /// Jacobian of the residual vector, one dual-number pass per variable.
    pub fn jacobian(&self, w: &DVector<f64>) -> DMatrix<f64> {
        let n = self.num_vars();
        let m = self.num_residuals();
        let base: Vec<Dual64> = w.iter().map(|&v| Dual64::from(v)).collect();

        let mut jac = DMatrix::zeros(m, n);
        for j in 0..n {
            let mut seeded = base.clone();
            seeded[j].eps = 1.0;
            for (i, r) in self.residuals(&seeded).into_iter().enumerate() {
                jac[(i, j)] = r.eps;
            }
        }
        jac
    }

    /// Cost gradient 2·Jᵀr.
    pub fn gradient(&self, w: &DVector<f64>) -> DVector<f64> {
        self.jacobian(w).transpose() * self.residual_vector(w) * 2.0
    }

    /// General (rate-limit) constraint values: u_{k+1} − u_k per consecutive
    /// pair of decisions. Empty when no rate limit is configured.
    pub fn constraints(&self, w: &DVector<f64>) -> DVector<f64> {
        if self.params.steering_rate_limit.is_none() {
            return DVector::zeros(0);
        }
        let nc = self.params.control_horizon;
        DVector::from_fn(nc - 1, |k, _| w[k + 1] - w[k])
    }

    /// Bounds for the general constraints. One-sided rows would use the
    /// infinity sentinels; the rate constraint is symmetric two-sided.
    pub fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        match self.params.steering_rate_limit {
            None => (DVector::zeros(0), DVector::zeros(0)),
            Some(rate) => {
                let n = self.params.control_horizon - 1;
                let limit = rate * self.params.dt;
                (
                    DVector::from_element(n, -limit),
                    DVector::from_element(n, limit),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn model() -> BicycleModel {
        BicycleModel::default()
    }

    #[test]
    fn build_rejects_bad_configuration_before_solving() {
        let model = model();
        let params = HorizonParams {
            prediction_horizon: 2,
            control_horizon: 4,
            ..Default::default()
        };
        let err = HorizonProblem::build(&model, &params, &StateVec::zeros(), Reference::default());
        assert!(matches!(err, Err(NmpcError::Configuration(_))));
    }

    #[test]
    fn hold_last_value_beyond_control_horizon() {
        let model = model();
        let params = HorizonParams {
            prediction_horizon: 5,
            control_horizon: 2,
            dt: 0.05,
            ..Default::default()
        };
        let x0 = StateVec::new(5.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let problem = HorizonProblem::build(&model, &params, &x0, Reference::default()).unwrap();

        // Steps 2, 3, 4 must apply the decision at index 1.
        for k in 2..5 {
            assert_eq!(problem.applied_control_index(k), 1);
        }

        // The rollout is identical to integrating by hand with that policy.
        let controls = [0.1, -0.04];
        let states = problem.rollout(&controls);
        let mut x = state_to_array(&x0);
        for (k, expected) in states.iter().enumerate() {
            let u = controls[k.min(1)];
            x = model.step(&x, u, params.dt);
            for i in 0..STATE_DIM {
                assert_abs_diff_eq!(expected[i], x[i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn zero_q_single_step_cost_is_exactly_control_cost() {
        let model = model();
        let params = HorizonParams {
            prediction_horizon: 1,
            control_horizon: 1,
            q_yaw: 0.0,
            q_lateral: 0.0,
            r: 0.5,
            ..Default::default()
        };
        let x0 = StateVec::new(1.0, 0.1, 0.0, 0.0, 0.0, 0.0);
        let problem = HorizonProblem::build(&model, &params, &x0, Reference::default()).unwrap();
        for u in [-2.0, -0.3, 0.0, 0.7, 4.0] {
            let w = DVector::from_vec(vec![u]);
            assert_abs_diff_eq!(problem.cost(&w), 0.5 * u * u, epsilon = 1e-12);
        }
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let model = model();
        let params = HorizonParams {
            prediction_horizon: 4,
            control_horizon: 3,
            dt: 0.05,
            ..Default::default()
        };
        let x0 = StateVec::new(10.0, 0.1, 0.05, 0.1, 0.0, 0.0);
        let problem =
            HorizonProblem::build(&model, &params, &x0, Reference::new(0.3, 2.0)).unwrap();

        let w = DVector::from_vec(vec![0.02, -0.01, 0.03]);
        let grad = problem.gradient(&w);
        let h = 1e-6;
        for j in 0..3 {
            let mut wp = w.clone();
            let mut wm = w.clone();
            wp[j] += h;
            wm[j] -= h;
            let fd = (problem.cost(&wp) - problem.cost(&wm)) / (2.0 * h);
            assert_abs_diff_eq!(grad[j], fd, epsilon = 1e-4 * (1.0 + fd.abs()));
        }
    }

    #[test]
    fn rate_limit_appears_as_explicit_constraints() {
        let model = model();
        let params = HorizonParams {
            prediction_horizon: 5,
            control_horizon: 3,
            dt: 0.1,
            steering_rate_limit: Some(0.5),
            ..Default::default()
        };
        let problem =
            HorizonProblem::build(&model, &params, &StateVec::zeros(), Reference::default())
                .unwrap();

        let w = DVector::from_vec(vec![0.0, 0.2, 0.1]);
        let g = problem.constraints(&w);
        assert_eq!(g.len(), 2);
        assert_abs_diff_eq!(g[0], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(g[1], -0.1, epsilon = 1e-12);

        let (lbg, ubg) = problem.constraint_bounds();
        assert_abs_diff_eq!(lbg[0], -0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(ubg[0], 0.05, epsilon = 1e-12);

        // Within the limit the penalty rows stay zero; beyond it they bite.
        let inside = DVector::from_vec(vec![0.0, 0.04, 0.04]);
        let outside = DVector::from_vec(vec![0.0, 0.2, 0.2]);
        assert!(problem.cost(&outside) > problem.cost(&inside));
    }

    #[test]
    fn escalating_the_hinge_makes_violations_costlier() {
        let model = model();
        let params = HorizonParams {
            prediction_horizon: 5,
            control_horizon: 3,
            dt: 0.1,
            steering_rate_limit: Some(0.5),
            ..Default::default()
        };
        let mut problem =
            HorizonProblem::build(&model, &params, &StateVec::zeros(), Reference::default())
                .unwrap();

        let violating = DVector::from_vec(vec![0.0, 0.2, 0.2]);
        let within = DVector::from_vec(vec![0.0, 0.04, 0.04]);
        let before = problem.cost(&violating);
        let within_before = problem.cost(&within);
        problem.escalate_rate_penalty();
        assert!(problem.cost(&violating) > before);
        // A feasible sequence costs the same under any hinge weight.
        assert_abs_diff_eq!(problem.cost(&within), within_before, epsilon = 1e-12);
    }

    #[test]
    fn dimension_mismatch_is_detected() {
        let model = model();
        let params = HorizonParams::default();
        let problem =
            HorizonProblem::build(&model, &params, &StateVec::zeros(), Reference::default())
                .unwrap();
        let w = DVector::zeros(params.control_horizon + 2);
        assert!(matches!(
            problem.check_dimension(&w),
            Err(NmpcError::InvalidDimension { .. })
        ));
    }
}
