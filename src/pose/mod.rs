//! Pose prediction: IMU integration, RK4, and the service built on top.

pub mod prediction;
pub mod quaternion;
pub mod rk4;
pub mod types;
pub mod vector;

pub use prediction::PosePredictionService;
pub use quaternion::Quaternion;
pub use types::{FastPose, ImuIntegratorInput, ImuParams, ImuSample, RawImuState, SlowPose};
pub use vector::Vector3;
