//! Run metrics: tracking RMSE against the reference, control and solver
//! statistics, accumulated over tick records.

use serde::{Deserialize, Serialize};

use crate::controller::TickRecord;
use crate::types::idx;

/// Accumulated statistics of one closed-loop run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Number of ticks evaluated
    pub n_ticks: u64,
    /// Sum of squared yaw-angle tracking errors
    pub sum_sq_yaw_err: f64,
    /// Sum of squared lateral-position tracking errors
    pub sum_sq_lateral_err: f64,
    /// Largest |steering| applied
    pub max_control: f64,
    /// Total solver iterations across all ticks
    pub total_iterations: u64,
}

impl RunMetrics {
    /// Root-mean-square yaw tracking error (rad).
    pub fn rmse_yaw(&self) -> f64 {
        if self.n_ticks == 0 {
            return 0.0;
        }
        (self.sum_sq_yaw_err / self.n_ticks as f64).sqrt()
    }

    /// Root-mean-square lateral tracking error (m).
    pub fn rmse_lateral(&self) -> f64 {
        if self.n_ticks == 0 {
            return 0.0;
        }
        (self.sum_sq_lateral_err / self.n_ticks as f64).sqrt()
    }

    /// Mean solver iterations per tick.
    pub fn mean_iterations(&self) -> f64 {
        if self.n_ticks == 0 {
            return 0.0;
        }
        self.total_iterations as f64 / self.n_ticks as f64
    }

    /// Accumulate one tick.
    pub fn accumulate(&mut self, record: &TickRecord) {
        self.n_ticks += 1;
        let yaw_err = record.state[idx::YAW] - record.reference.yaw;
        let lat_err = record.state[idx::POS_Y] - record.reference.lateral;
        self.sum_sq_yaw_err += yaw_err * yaw_err;
        self.sum_sq_lateral_err += lat_err * lat_err;
        self.max_control = self.max_control.max(record.control.abs());
        self.total_iterations += record.solver_iterations as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolverStatus;
    use crate::types::Reference;
    use approx::assert_abs_diff_eq;

    fn record(yaw: f64, y: f64, control: f64) -> TickRecord {
        TickRecord {
            time: 0.0,
            state: [0.0, 0.0, yaw, 0.0, 0.0, y],
            control,
            reference: Reference::new(1.0, 5.0),
            cost: 0.0,
            solver_iterations: 4,
            status: SolverStatus::Optimal,
        }
    }

    #[test]
    fn rmse_and_control_stats() {
        let mut metrics = RunMetrics::default();
        metrics.accumulate(&record(1.0, 5.0, 0.2));
        metrics.accumulate(&record(0.0, 5.0, -0.6));

        assert_abs_diff_eq!(metrics.rmse_yaw(), (0.5f64).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.rmse_lateral(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.max_control, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.mean_iterations(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_run_reports_zeros() {
        let metrics = RunMetrics::default();
        assert_eq!(metrics.rmse_yaw(), 0.0);
        assert_eq!(metrics.rmse_lateral(), 0.0);
        assert_eq!(metrics.mean_iterations(), 0.0);
    }
}
