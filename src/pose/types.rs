//! Event types exchanged between plugins through the pose-prediction
//! topics, named in the stable bus contract (§6).

use std::time::Duration;

use super::quaternion::Quaternion;
use super::vector::Vector3;

/// One raw IMU reading: published on the `imu_raw` topic's upstream
/// producer side before integration (the source's minimal IMU sample,
/// stripped of the camera-frame fields `imu_cam_type` also carries).
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    pub time: Duration,
    pub angular_velocity: Vector3,
    pub linear_acceleration: Vector3,
}

/// A pose as produced by SLAM or ground truth, before coordinate
/// correction: the `slow_pose` / `true_pose` event shape.
#[derive(Debug, Clone, Copy)]
pub struct SlowPose {
    pub sensor_time: Duration,
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl Default for SlowPose {
    fn default() -> Self {
        Self {
            sensor_time: Duration::ZERO,
            position: Vector3::ZERO,
            orientation: Quaternion::IDENTITY,
        }
    }
}

/// The IMU integrator's running state, as published on `imu_raw`: the last
/// two bias estimates (used by RK4 to linearly interpolate across the
/// integration interval) plus the propagated pose.
#[derive(Debug, Clone, Copy)]
pub struct RawImuState {
    pub w_hat: Vector3,
    pub a_hat: Vector3,
    pub w_hat2: Vector3,
    pub a_hat2: Vector3,
    pub position: Vector3,
    pub velocity: Vector3,
    pub orientation: Quaternion,
    pub imu_time: Duration,
}

/// A query response from the pose-prediction service: the corrected pose
/// plus the times the prediction was computed at and targeted.
#[derive(Debug, Clone, Copy)]
pub struct FastPose {
    pub pose: SlowPose,
    pub predict_computed_time: Duration,
    pub predict_target_time: Duration,
}

/// Constant parameters the IMU integrator was initialized with. Carried on
/// the bus so a late-starting consumer can recover them without a second
/// side-channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImuParams {
    pub gyro_noise: f64,
    pub acc_noise: f64,
    pub gyro_walk: f64,
    pub acc_walk: f64,
    pub gravity: Vector3,
    pub imu_integration_sigma: f64,
    pub nominal_rate: f64,
}

/// Biases, initialization parameters, and the slow pose the integrator
/// needs to (re)seed itself: the `imu_integrator_input` event shape.
#[derive(Debug, Clone, Copy)]
pub struct ImuIntegratorInput {
    pub last_cam_integration_time: f64,
    pub t_offset: f64,
    pub params: ImuParams,
    pub bias_acc: Vector3,
    pub bias_gyro: Vector3,
    pub position: Vector3,
    pub velocity: Vector3,
    pub orientation: Quaternion,
}
