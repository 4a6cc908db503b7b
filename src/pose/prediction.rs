//! The pose-prediction service: degrades gracefully from identity, to the
//! latest slow pose, to a full RK4-integrated fast pose as more inputs
//! become available (§4.8).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::clock::RelativeClock;
use crate::registry::Service;
use crate::switchboard::Switchboard;
use crate::topic::Reader;

use super::quaternion::Quaternion;
use super::rk4::predict_mean_rk4;
use super::types::{FastPose, RawImuState, SlowPose};
use super::vector::Vector3;

fn signed_seconds_between(later: Duration, earlier: Duration) -> f64 {
    if later >= earlier {
        (later - earlier).as_secs_f64()
    } else {
        -(earlier - later).as_secs_f64()
    }
}

/// Subscribes to `slow_pose`, `imu_raw`, and the optional `true_pose` /
/// `ground_truth_offset` / `vsync_estimate` topics, and answers pose queries
/// from whatever of those has been observed so far.
pub struct PosePredictionService {
    clock: Arc<RelativeClock>,
    slow_pose: Reader<SlowPose>,
    imu_raw: Reader<RawImuState>,
    true_pose: Reader<SlowPose>,
    ground_truth_offset: Reader<Vector3>,
    vsync_estimate: Reader<Duration>,
    offset: RwLock<Quaternion>,
    offset_latched: AtomicBool,
}

impl PosePredictionService {
    /// Acquire readers against `switchboard` and build the service. Does not
    /// register itself in a [`crate::registry::PhoneBook`]; callers do that
    /// explicitly once construction succeeds, same as every other service.
    pub fn new(switchboard: &Switchboard, clock: Arc<RelativeClock>) -> Self {
        Self {
            clock,
            slow_pose: switchboard.get_reader("slow_pose"),
            imu_raw: switchboard.get_reader("imu_raw"),
            true_pose: switchboard.get_reader("true_pose"),
            ground_truth_offset: switchboard.get_reader("ground_truth_offset"),
            vsync_estimate: switchboard.get_reader("vsync_estimate"),
            offset: RwLock::new(Quaternion::IDENTITY),
            offset_latched: AtomicBool::new(false),
        }
    }

    /// Predict to the best available target: the latest vsync estimate if
    /// one has been published, else `now()`.
    pub fn get_fast_pose(&self) -> FastPose {
        match self.vsync_estimate.get_latest_ro_nullable() {
            Some(target) => self.get_fast_pose_at(*target),
            None => self.get_fast_pose_at(self.clock.now()),
        }
    }

    /// Predict to `target_time`, degrading through identity → slow pose →
    /// RK4-integrated fast pose as fewer inputs are available (§4.8).
    pub fn get_fast_pose_at(&self, target_time: Duration) -> FastPose {
        let Some(slow_pose) = self.slow_pose.get_latest_ro_nullable() else {
            return FastPose {
                pose: self.correct_pose(&SlowPose::default()),
                predict_computed_time: self.clock.now(),
                predict_target_time: target_time,
            };
        };

        let Some(imu_raw) = self.imu_raw.get_latest_ro_nullable() else {
            return FastPose {
                pose: self.correct_pose(&slow_pose),
                predict_computed_time: self.clock.now(),
                predict_target_time: target_time,
            };
        };

        let dt = signed_seconds_between(target_time, imu_raw.imu_time);
        let integrated = predict_mean_rk4(&imu_raw, dt);
        let predicted = SlowPose {
            sensor_time: imu_raw.imu_time,
            position: integrated.position,
            orientation: integrated.orientation,
        };

        // Latch the offset against the raw (pre-offset) orientation before
        // applying it, so the call that latches the offset is itself already
        // corrected to identity rather than lagging a call behind.
        if !self.offset_latched.load(Ordering::Acquire) {
            let (_, raw_o) = Self::remap_axes(&predicted);
            let mut offset = self.offset.write().expect("pose prediction lock poisoned");
            if !self.offset_latched.load(Ordering::Relaxed) {
                *offset = raw_o.inverse();
                self.offset_latched.store(true, Ordering::Release);
            }
        }

        FastPose {
            pose: self.correct_pose(&predicted),
            predict_computed_time: self.clock.now(),
            predict_target_time: target_time,
        }
    }

    /// The true pose minus the ground-truth offset, corrected; an identity
    /// pose if either input is missing (§4.8).
    pub fn get_true_pose(&self) -> SlowPose {
        let pose = self.true_pose.get_latest_ro_nullable();
        let offset = self.ground_truth_offset.get_latest_ro_nullable();
        let offset_pose = match (pose, offset) {
            (Some(pose), Some(offset)) => SlowPose {
                sensor_time: pose.sensor_time,
                position: pose.position.sub(*offset),
                orientation: pose.orientation,
            },
            _ => SlowPose {
                sensor_time: self.clock.now(),
                ..SlowPose::default()
            },
        };
        self.correct_pose(&offset_pose)
    }

    /// Latch the offset such that applying it to `raw_orientation_times_offset`
    /// yields identity.
    pub fn set_offset(&self, raw_orientation_times_offset: Quaternion) {
        let mut offset = self.offset.write().expect("pose prediction lock poisoned");
        let raw_o = raw_orientation_times_offset.multiply(offset.inverse());
        *offset = raw_o.inverse();
        self.offset_latched.store(true, Ordering::Release);
    }

    /// The currently latched offset.
    pub fn get_offset(&self) -> Quaternion {
        *self.offset.read().expect("pose prediction lock poisoned")
    }

    /// True iff both a slow pose and a raw-IMU state have been observed.
    pub fn fast_pose_reliable(&self) -> bool {
        self.slow_pose.get_latest_ro_nullable().is_some() && self.imu_raw.get_latest_ro_nullable().is_some()
    }

    /// True iff a true pose has been observed.
    pub fn true_pose_reliable(&self) -> bool {
        self.true_pose.get_latest_ro_nullable().is_some()
    }

    /// Remap the raw SLAM/IMU frame to the rendering frame
    /// (`p' = (-p_y, p_z, -p_x)`, `q' = (w, -q_y, q_z, -q_x)`), without
    /// applying the session offset.
    fn remap_axes(pose: &SlowPose) -> (Vector3, Quaternion) {
        let position = Vector3::new(-pose.position.y, pose.position.z, -pose.position.x);
        let raw_o = Quaternion::new(-pose.orientation.y, pose.orientation.z, -pose.orientation.x, pose.orientation.w);
        (position, raw_o)
    }

    /// Remap the raw SLAM/IMU frame to the rendering frame and apply the
    /// session offset. A fixed policy of this service, not configurable.
    pub fn correct_pose(&self, pose: &SlowPose) -> SlowPose {
        let (position, raw_o) = Self::remap_axes(pose);
        let offset = self.offset.read().expect("pose prediction lock poisoned");
        SlowPose {
            sensor_time: pose.sensor_time,
            position,
            orientation: raw_o.multiply(*offset),
        }
    }
}

impl Service for PosePredictionService {}
