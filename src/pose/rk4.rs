//! 4th-order Runge-Kutta integration of the IMU kinematics, grounded on the
//! predictor actually wired into pose prediction (as opposed to the
//! header-only, `ProperQuaternion`-based integrator that ships alongside it
//! but is not reachable from `get_fast_pose`): a JPL-convention delta
//! quaternion `dq`, started at identity each step and composed onto the
//! integrator's last known orientation, with gravity subtracted in the body
//! frame at every slope.

use super::quaternion::{q_dot, Quaternion};
use super::types::RawImuState;
use super::vector::Vector3;

const GRAVITY: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 9.81 };

/// The result of one RK4 step: the propagated orientation, position, and
/// velocity.
#[derive(Debug, Clone, Copy)]
pub struct IntegratedState {
    pub orientation: Quaternion,
    pub position: Vector3,
    pub velocity: Vector3,
}

/// Integrate `state` forward by `dt` seconds. `dt` may be negative (for a
/// target time before the last IMU sample) or zero; both are numerically
/// well-defined, since every slope is computed from the same linear
/// interpolation regardless of the sign of `dt`.
pub fn predict_mean_rk4(state: &RawImuState, dt: f64) -> IntegratedState {
    let w_alpha = state.w_hat2.sub(state.w_hat).scale(if dt != 0.0 { 1.0 / dt } else { 0.0 });
    let a_jerk = state.a_hat2.sub(state.a_hat).scale(if dt != 0.0 { 1.0 / dt } else { 0.0 });

    let q0 = state.orientation;
    let p0 = state.position;
    let v0 = state.velocity;

    let dq0 = Quaternion::new(0.0, 0.0, 0.0, 1.0);

    // k1
    let mut w_hat = state.w_hat;
    let mut a_hat = state.a_hat;
    let q0_dot = q_dot(w_hat, dq0);
    let p0_dot = v0;
    let r_g_to_0 = dq0.multiply(q0);
    let v0_dot = r_g_to_0.rotate_transpose(a_hat).sub(GRAVITY);

    let k1_q = q0_dot.scale(dt);
    let k1_p = p0_dot.scale(dt);
    let k1_v = v0_dot.scale(dt);

    // k2
    w_hat = w_hat.add(w_alpha.scale(0.5 * dt));
    a_hat = a_hat.add(a_jerk.scale(0.5 * dt));

    let dq1 = dq0.add(k1_q.scale(0.5)).normalized();
    let v1 = v0.add(k1_v.scale(0.5));

    let q1_dot = q_dot(w_hat, dq1);
    let p1_dot = v1;
    let r_g_to_1 = dq1.multiply(q0);
    let v1_dot = r_g_to_1.rotate_transpose(a_hat).sub(GRAVITY);

    let k2_q = q1_dot.scale(dt);
    let k2_p = p1_dot.scale(dt);
    let k2_v = v1_dot.scale(dt);

    // k3
    let dq2 = dq0.add(k2_q.scale(0.5)).normalized();
    let v2 = v0.add(k2_v.scale(0.5));

    let q2_dot = q_dot(w_hat, dq2);
    let p2_dot = v2;
    let r_g_to_2 = dq2.multiply(q0);
    let v2_dot = r_g_to_2.rotate_transpose(a_hat).sub(GRAVITY);

    let k3_q = q2_dot.scale(dt);
    let k3_p = p2_dot.scale(dt);
    let k3_v = v2_dot.scale(dt);

    // k4
    w_hat = w_hat.add(w_alpha.scale(0.5 * dt));
    a_hat = a_hat.add(a_jerk.scale(0.5 * dt));

    let dq3 = dq0.add(k3_q).normalized();
    let v3 = v0.add(k3_v);

    let q3_dot = q_dot(w_hat, dq3);
    let p3_dot = v3;
    let r_g_to_3 = dq3.multiply(q0);
    let v3_dot = r_g_to_3.rotate_transpose(a_hat).sub(GRAVITY);

    let k4_q = q3_dot.scale(dt);
    let k4_p = p3_dot.scale(dt);
    let k4_v = v3_dot.scale(dt);

    let dq = dq0
        .add(k1_q.scale(1.0 / 6.0))
        .add(k2_q.scale(1.0 / 3.0))
        .add(k3_q.scale(1.0 / 3.0))
        .add(k4_q.scale(1.0 / 6.0))
        .normalized();

    IntegratedState {
        orientation: dq.multiply(q0),
        position: p0.add(k1_p.scale(1.0 / 6.0)).add(k2_p.scale(1.0 / 3.0)).add(k3_p.scale(1.0 / 3.0)).add(k4_p.scale(1.0 / 6.0)),
        velocity: v0.add(k1_v.scale(1.0 / 6.0)).add(k2_v.scale(1.0 / 3.0)).add(k3_v.scale(1.0 / 3.0)).add(k4_v.scale(1.0 / 6.0)),
    }
}
