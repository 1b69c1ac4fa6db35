//! Nonlinear single-track (bicycle) vehicle dynamics.
//!
//! State is the 6-vector [vx, vy, yaw, yaw_rate, X, Y]: body-frame
//! longitudinal/lateral velocity, yaw angle, yaw rate, and global position.
//! The only input is the front steering angle. Lateral tire forces come from
//! the magic-formula curve per axle; longitudinal slip is taken as zero at
//! both axles (no traction or braking demand is modeled).

use num_dual::DualNum;
use serde::{Deserialize, Serialize};

use crate::tire::PacejkaTire;

/// Fixed state dimension of the bicycle model.
pub const STATE_DIM: usize = 6;

/// Immutable vehicle constants. Units: m, tonnes, t·m², kN — with forces in
/// kN and mass in tonnes, accelerations come out directly in m/s².
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleParams {
    /// Front axle to center of mass (m)
    pub a: f64,
    /// Rear axle to center of mass (m)
    pub b: f64,
    /// Vehicle mass (t)
    pub mass: f64,
    /// Gravitational acceleration (m/s²)
    pub gravity: f64,
    /// Yaw moment of inertia (t·m²)
    pub inertia: f64,
    /// Road friction coefficient scaling the normal load seen by the tire
    pub friction: f64,
    /// Fixed camber angle fed to the tire curve (deg)
    pub camber: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            a: 0.3,
            b: 0.7,
            mass: 1.0,
            gravity: 9.81,
            inertia: 2.0,
            friction: 0.9,
            camber: 0.0,
        }
    }
}

impl VehicleParams {
    /// Static normal load on one front wheel (kN).
    pub fn front_wheel_load(&self) -> f64 {
        self.b * self.mass * self.gravity / (2.0 * (self.a + self.b))
    }

    /// Static normal load on one rear wheel (kN).
    pub fn rear_wheel_load(&self) -> f64 {
        self.a * self.mass * self.gravity / (2.0 * (self.a + self.b))
    }
}

/// Slip angle of a wheel: arctangent of lateral over longitudinal velocity
/// in the wheel frame. A zero longitudinal velocity is degenerate and maps
/// to zero slip rather than an indeterminate ratio.
fn slip_angle<D>(lateral: D, longitudinal: D) -> D
where
    D: DualNum<f64> + Copy,
{
    if longitudinal.re() == 0.0 {
        D::from(0.0)
    } else {
        (lateral / longitudinal).atan()
    }
}

/// Bicycle model: vehicle constants plus the tire curve driving it.
#[derive(Clone, Debug, Default)]
pub struct BicycleModel {
    pub params: VehicleParams,
    pub tire: PacejkaTire,
}

impl BicycleModel {
    pub fn new(params: VehicleParams, tire: PacejkaTire) -> Self {
        Self { params, tire }
    }

    /// Continuous-time state derivative at `(state, steering)`.
    ///
    /// Single explicit evaluation: slip angles are kinematic, so there is no
    /// implicit force/slip coupling to iterate on.
    pub fn derivative<D>(&self, state: &[D; STATE_DIM], steering: D) -> [D; STATE_DIM]
    where
        D: DualNum<f64> + Copy + std::ops::Neg<Output = D>,
    {
        let p = &self.params;
        let [vx, vy, yaw, yaw_rate, _x, _y] = *state;

        // Axle velocities in body axes.
        let front_lat = vy + yaw_rate * p.a;
        let rear_lat = vy - yaw_rate * p.b;

        // Front wheel velocity in the wheel frame (rotated by the steering
        // angle); the rear wheel frame coincides with the body frame.
        let (sin_d, cos_d) = (steering.sin(), steering.cos());
        let front_long_w = vx * cos_d + front_lat * sin_d;
        let front_lat_w = front_lat * cos_d - vx * sin_d;

        let alpha_front = slip_angle(front_lat_w, front_long_w);
        let alpha_rear = slip_angle(rear_lat, vx);

        // Zero longitudinal slip at both axles.
        let kappa = D::from(0.0);

        let front_load = p.friction * p.front_wheel_load();
        let rear_load = p.friction * p.rear_wheel_load();

        // The curve is fit with positive slip producing positive force, so
        // the kinematic angle enters negated: the tire reaction opposes the
        // slip velocity. Forces are converted N → kN at this boundary.
        let fy_front_w = self.tire.lateral_force(front_load, -alpha_front, p.camber) * 1e-3;
        let fx_front_w = self.tire.longitudinal_force(front_load, kappa) * 1e-3;
        let fy_rear = self.tire.lateral_force(rear_load, -alpha_rear, p.camber) * 1e-3;
        let fx_rear = self.tire.longitudinal_force(rear_load, kappa) * 1e-3;

        // Front tire forces back into body axes.
        let fx_front = fx_front_w * cos_d - fy_front_w * sin_d;
        let fy_front = fx_front_w * sin_d + fy_front_w * cos_d;

        let (sin_yaw, cos_yaw) = (yaw.sin(), yaw.cos());

        [
            vy * yaw_rate + (fx_front + fx_rear) * (2.0 / p.mass),
            -(vx * yaw_rate) + (fy_front + fy_rear) * (2.0 / p.mass),
            yaw_rate,
            (fy_front * p.a - fy_rear * p.b) * (2.0 / p.inertia),
            vx * cos_yaw - vy * sin_yaw,
            vx * sin_yaw + vy * cos_yaw,
        ]
    }
}
