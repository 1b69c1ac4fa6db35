//! Receding-horizon controller: the synchronous tick loop.
//!
//! # One control tick
//! 1. Build the horizon problem from the current true state and reference
//! 2. Warm-start from the previous solution shifted one step (zeros on the
//!    first tick)
//! 3. Invoke the solver adapter (blocking; bounded iterations)
//! 4. On success: apply only the first control through the plant boundary,
//!    store the full sequence for the next warm start
//! 5. On failure: leave the true state untouched and propagate the error —
//!    the caller owns the fail-safe policy
//!
//! The controller exclusively owns the true state and the warm-start buffer;
//! both are mutated only at the end of a successful tick.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use vehicle_models::BicycleModel;

use crate::horizon::HorizonParams;
use crate::problem::HorizonProblem;
use crate::solver::{NlpSolver, SolverStatus};
use crate::types::{state_from_array, state_to_array, NmpcError, Reference, StateVec};

/// Plant boundary: what the first control is actually applied to. The
/// open-loop default re-uses the controller's own integrator; a real system
/// substitutes its own plant here to capture model–plant mismatch.
pub trait Plant {
    fn apply(&mut self, state: &StateVec, control: f64) -> StateVec;
}

/// Open-loop self-simulation: advances the state with the same RK4 map the
/// rollout uses.
#[derive(Clone, Debug)]
pub struct IntegratorPlant {
    model: BicycleModel,
    dt: f64,
}

impl IntegratorPlant {
    pub fn new(model: BicycleModel, dt: f64) -> Self {
        Self { model, dt }
    }
}

impl Plant for IntegratorPlant {
    fn apply(&mut self, state: &StateVec, control: f64) -> StateVec {
        let next = self.model.step(&state_to_array(state), control, self.dt);
        state_from_array(&next)
    }
}

/// Reference boundary: a pure query, consulted once per tick.
pub trait ReferenceSource {
    fn reference_at(&self, time: f64) -> Reference;
}

/// A fixed setpoint.
impl ReferenceSource for Reference {
    fn reference_at(&self, _time: f64) -> Reference {
        *self
    }
}

/// Shift the previous optimal sequence one step for the next warm start:
/// drop the first element, duplicate the last.
pub fn shift_warm_start(previous: &DVector<f64>) -> DVector<f64> {
    let n = previous.len();
    DVector::from_fn(n, |i, _| previous[(i + 1).min(n - 1)])
}

/// What one successful tick produced, for logging and evaluation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TickRecord {
    /// Time after the tick (s)
    pub time: f64,
    /// True state after applying the first control
    pub state: [f64; 6],
    /// The applied (first) control
    pub control: f64,
    /// Reference used for this solve
    pub reference: Reference,
    pub cost: f64,
    pub solver_iterations: usize,
    pub status: SolverStatus,
}

/// The receding-horizon loop. Only the first of the Nc optimized controls is
/// ever applied; the rest exist to make that first decision consistent with
/// the longer lookahead.
pub struct RecedingHorizonController<S, P> {
    model: BicycleModel,
    params: HorizonParams,
    solver: S,
    plant: P,
    state: StateVec,
    warm_start: Option<DVector<f64>>,
    time: f64,
}

impl<S: NlpSolver, P: Plant> RecedingHorizonController<S, P> {
    /// Build a controller. The configuration is validated up front so a
    /// misconfigured horizon never reaches a solve.
    pub fn new(
        model: BicycleModel,
        params: HorizonParams,
        solver: S,
        plant: P,
        initial_state: StateVec,
    ) -> Result<Self, NmpcError> {
        params.validate()?;
        Ok(Self {
            model,
            params,
            solver,
            plant,
            state: initial_state,
            warm_start: None,
            time: 0.0,
        })
    }

    pub fn state(&self) -> &StateVec {
        &self.state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// The decision vector the next solve will start from.
    pub fn next_warm_start(&self) -> DVector<f64> {
        match &self.warm_start {
            Some(prev) => shift_warm_start(prev),
            None => DVector::zeros(self.params.control_horizon),
        }
    }

    /// One blocking control tick. On solver failure the true state is not
    /// advanced and the failure surfaces to the caller.
    pub fn tick(&mut self, reference: Reference) -> Result<TickRecord, NmpcError> {
        let problem = HorizonProblem::build(&self.model, &self.params, &self.state, reference)?;
        let guess = self.next_warm_start();
        problem.check_dimension(&guess)?;

        let solution = self.solver.solve(&problem, &guess)?;

        let control = solution.controls[0];
        self.state = self.plant.apply(&self.state, control);
        self.time += self.params.dt;
        self.warm_start = Some(solution.controls.clone());

        tracing::debug!(
            time = self.time,
            control,
            cost = solution.cost,
            iterations = solution.iterations,
            "tick"
        );

        Ok(TickRecord {
            time: self.time,
            state: state_to_array(&self.state),
            control,
            reference,
            cost: solution.cost,
            solver_iterations: solution.iterations,
            status: solution.status,
        })
    }
}
