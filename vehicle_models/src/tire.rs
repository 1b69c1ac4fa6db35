//! Empirical "magic formula" tire force curves.
//!
//! Each output (lateral force, aligning moment, longitudinal force) is a
//! sine-of-arctangent curve whose stiffness B, shape C, peak D and curvature
//! E factors are low-order polynomials (or exponentials) of the normal load,
//! parameterized by one row of a 3×13 coefficient table. The table is fit
//! with the normal load in kN, slip angles in **degrees** and forces in
//! newtons; slip-angle inputs are taken in radians and converted before
//! evaluation — that conversion is part of the contract, not a convenience.

use num_dual::DualNum;
use serde::{Deserialize, Serialize};

const DEG_PER_RAD: f64 = 180.0 / std::f64::consts::PI;

/// 3×13 coefficient table. Row 0: lateral force, row 1: aligning moment,
/// row 2: longitudinal force.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TireCoefficients(pub [[f64; 13]; 3]);

impl Default for TireCoefficients {
    fn default() -> Self {
        TireCoefficients([
            [
                -22.1, 1011.0, 1078.0, 1.82, 0.208, 0.0, -0.354, 0.707, 0.028, 0.0, 14.8,
                0.022, 0.0,
            ],
            [
                -2.72, -2.28, -1.86, -2.73, 0.11, -0.07, 0.643, -4.04, 0.015, -0.066, 0.945,
                0.03, 0.07,
            ],
            [
                -21.3, 1144.0, 49.6, 226.0, 0.069, -0.006, 0.056, 0.486, 0.0, 0.0, 0.0, 0.0,
                0.0,
            ],
        ])
    }
}

/// Magic-formula tire with a fixed coefficient table.
///
/// All evaluators are pure and deterministic; they are generic over dual
/// scalars in the slip variable only, since the normal load is a constant of
/// the optimization.
#[derive(Clone, Debug, Default)]
pub struct PacejkaTire {
    pub coeffs: TireCoefficients,
}

impl PacejkaTire {
    pub fn new(coeffs: TireCoefficients) -> Self {
        Self { coeffs }
    }

    /// Lateral force (N) for a normal load (kN), slip angle (rad) and camber
    /// angle (deg).
    pub fn lateral_force<D>(&self, normal_load: f64, slip_angle: D, camber: f64) -> D
    where
        D: DualNum<f64> + Copy,
    {
        if normal_load <= 0.0 {
            return D::from(0.0);
        }
        let a = &self.coeffs.0[0];
        let fz = normal_load;

        let c = 1.3;
        let d = a[0] * fz * fz + a[1] * fz;
        let bcd = a[2] * (a[3] * (a[4] * fz).atan()).sin();
        let b = bcd / (c * d);
        let e = a[5] * fz * fz + a[6] * fz + a[7];
        let s_h = a[8] * camber;
        let s_v = (a[9] * fz * fz + a[10] * fz) * camber;

        let shifted = slip_angle * DEG_PER_RAD + s_h;
        let phi = shifted * (1.0 - e) + (shifted * b).atan() * (e / b);
        ((phi * b).atan() * c).sin() * d + s_v
    }

    /// Self-aligning moment (N·m) for a normal load (kN), slip angle (rad)
    /// and camber angle (deg).
    pub fn aligning_moment<D>(&self, normal_load: f64, slip_angle: D, camber: f64) -> D
    where
        D: DualNum<f64> + Copy,
    {
        if normal_load <= 0.0 {
            return D::from(0.0);
        }
        let a = &self.coeffs.0[1];
        let fz = normal_load;

        let c = 2.4;
        let d = a[0] * fz * fz + a[1] * fz;
        let bcd = (a[2] * fz * fz + a[3] * fz) / (a[4] * fz).exp();
        let b = bcd / (c * d);
        let e = a[5] * fz * fz + a[6] * fz + a[7];
        let s_h = a[8] * camber;
        let s_v = (a[9] * fz * fz + a[10] * fz) * camber;

        let shifted = slip_angle * DEG_PER_RAD + s_h;
        let phi = shifted * (1.0 - e) + (shifted * b).atan() * (e / b);
        ((phi * b).atan() * c).sin() * d + s_v
    }

    /// Longitudinal force (N) for a normal load (kN) and slip ratio
    /// (dimensionless, no unit conversion).
    pub fn longitudinal_force<D>(&self, normal_load: f64, slip_ratio: D) -> D
    where
        D: DualNum<f64> + Copy,
    {
        if normal_load <= 0.0 {
            return D::from(0.0);
        }
        let a = &self.coeffs.0[2];
        let fz = normal_load;

        let c = 1.65;
        let d = a[0] * fz * fz + a[1] * fz;
        let bcd = (a[2] * fz * fz + a[3] * fz) / (a[4] * fz).exp();
        let b = bcd / (c * d);
        let e = a[5] * fz * fz + a[6] * fz + a[7];

        let phi = slip_ratio * (1.0 - e) + (slip_ratio * b).atan() * (e / b);
        ((phi * b).atan() * c).sin() * d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn curves_pass_through_origin() {
        let tire = PacejkaTire::default();
        for fz in [0.0, 0.5, 2.0, 3.43, 6.0] {
            assert_abs_diff_eq!(tire.lateral_force(fz, 0.0, 0.0), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(tire.longitudinal_force(fz, 0.0), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(tire.aligning_moment(fz, 0.0, 0.0), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn lateral_force_is_odd_in_slip_angle() {
        let tire = PacejkaTire::default();
        let fz = 3.43;
        for alpha in [0.01, 0.05, 0.2, 0.6, 1.2] {
            let pos = tire.lateral_force(fz, alpha, 0.0);
            let neg = tire.lateral_force(fz, -alpha, 0.0);
            assert_abs_diff_eq!(pos, -neg, epsilon = 1e-9);
        }
    }

    #[test]
    fn longitudinal_force_is_odd_in_slip_ratio() {
        let tire = PacejkaTire::default();
        let fz = 2.0;
        for kappa in [0.01, 0.05, 0.1, 0.3] {
            let pos = tire.longitudinal_force(fz, kappa);
            let neg = tire.longitudinal_force(fz, -kappa);
            assert_abs_diff_eq!(pos, -neg, epsilon = 1e-9);
        }
    }

    #[test]
    fn small_slip_lateral_force_has_positive_stiffness() {
        let tire = PacejkaTire::default();
        let f = tire.lateral_force(3.43, 0.01, 0.0);
        assert!(f > 0.0, "positive slip must give positive force, got {f}");
        // Peak factor D bounds the whole curve (zero camber, no shift).
        let a = &tire.coeffs.0[0];
        let d = a[0] * 3.43 * 3.43 + a[1] * 3.43;
        let saturated: f64 = tire.lateral_force(3.43, 1.4, 0.0);
        assert!(saturated.abs() <= d + 1e-9);
    }

    #[test]
    fn dual_evaluation_matches_value_and_slope() {
        use num_dual::Dual64;
        let tire = PacejkaTire::default();
        let fz = 3.43;
        let alpha = 0.03;
        let dual = tire.lateral_force(fz, Dual64::from(alpha).derivative(), 0.0);
        assert_abs_diff_eq!(dual.re, tire.lateral_force(fz, alpha, 0.0), epsilon = 1e-12);
        // Finite-difference check of the dual slope.
        let h = 1e-7;
        let fd = (tire.lateral_force(fz, alpha + h, 0.0)
            - tire.lateral_force(fz, alpha - h, 0.0))
            / (2.0 * h);
        assert_abs_diff_eq!(dual.eps, fd, epsilon = 1e-4);
    }
}
