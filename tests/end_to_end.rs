//! End-to-end scenarios wiring the registry, bus, clock, and pose
//! prediction together the way a real plugin set would.

use std::sync::Arc;
use std::time::Duration;

use illixr_core::guid::GenGuid;
use illixr_core::pose::{PosePredictionService, Quaternion, RawImuState, SlowPose, Vector3};
use illixr_core::record::RecordLogger;
use illixr_core::{PhoneBook, RelativeClock, Switchboard};

fn wired_registry() -> (Arc<PhoneBook>, Arc<Switchboard>, Arc<RelativeClock>) {
    let pb = Arc::new(PhoneBook::new());
    pb.register(Arc::new(GenGuid::new()));
    pb.register(Arc::new(RecordLogger::new()));

    let clock = Arc::new(RelativeClock::new());
    clock.start();
    pb.register(Arc::clone(&clock));

    let sb = Arc::new(Switchboard::new().with_record_logger(pb.lookup::<RecordLogger>()));
    (pb, sb, clock)
}

/// S5: pose prediction degrades from identity, to corrected slow pose, to a
/// corrected raw-IMU position, as each input becomes available.
#[test]
fn pose_degrades_through_each_available_input() {
    let (_pb, sb, clock) = wired_registry();
    let pose_service = PosePredictionService::new(&sb, Arc::clone(&clock));

    let identity = pose_service.get_fast_pose();
    assert_eq!(identity.pose.position, Vector3::ZERO);

    let slow_pose_writer = sb.get_writer::<SlowPose>("slow_pose");
    let slow_pose = SlowPose {
        sensor_time: clock.now(),
        position: Vector3::new(1.0, 2.0, 3.0),
        orientation: Quaternion::IDENTITY,
    };
    slow_pose_writer.put(slow_pose_writer.allocate(slow_pose));

    let from_slow_pose = pose_service.get_fast_pose();
    let expected = Vector3::new(-slow_pose.position.y, slow_pose.position.z, -slow_pose.position.x);
    assert!((from_slow_pose.pose.position.x - expected.x).abs() < 1e-6);
    assert!((from_slow_pose.pose.position.y - expected.y).abs() < 1e-6);
    assert!((from_slow_pose.pose.position.z - expected.z).abs() < 1e-6);

    let now = clock.now();
    let imu_time = now.saturating_sub(Duration::from_millis(5));
    let imu_writer = sb.get_writer::<RawImuState>("imu_raw");
    imu_writer.put(imu_writer.allocate(RawImuState {
        w_hat: Vector3::ZERO,
        a_hat: Vector3::new(0.0, 0.0, 9.81),
        w_hat2: Vector3::ZERO,
        a_hat2: Vector3::new(0.0, 0.0, 9.81),
        position: Vector3::new(5.0, 6.0, 7.0),
        velocity: Vector3::ZERO,
        orientation: Quaternion::IDENTITY,
        imu_time,
    }));

    let from_imu = pose_service.get_fast_pose_at(imu_time);
    let expected_imu = Vector3::new(-6.0, 7.0, -5.0);
    assert!((from_imu.pose.position.x - expected_imu.x).abs() < 1e-4);
    assert!((from_imu.pose.position.y - expected_imu.y).abs() < 1e-4);
    assert!((from_imu.pose.position.z - expected_imu.z).abs() < 1e-4);
}

/// S6: the offset latches on the first fast pose and stays fixed afterward,
/// even as the same raw-IMU state is republished.
#[test]
fn offset_latches_once_and_then_holds() {
    let (_pb, sb, clock) = wired_registry();
    let pose_service = PosePredictionService::new(&sb, Arc::clone(&clock));

    let slow_pose_writer = sb.get_writer::<SlowPose>("slow_pose");
    slow_pose_writer.put(slow_pose_writer.allocate(SlowPose {
        sensor_time: clock.now(),
        position: Vector3::ZERO,
        orientation: Quaternion::IDENTITY,
    }));

    let orientation = Quaternion::new(0.2, 0.1, 0.0, 0.95).normalized();
    let imu_writer = sb.get_writer::<RawImuState>("imu_raw");
    let imu_time = clock.now();
    imu_writer.put(imu_writer.allocate(RawImuState {
        w_hat: Vector3::ZERO,
        a_hat: Vector3::new(0.0, 0.0, 9.81),
        w_hat2: Vector3::ZERO,
        a_hat2: Vector3::new(0.0, 0.0, 9.81),
        position: Vector3::ZERO,
        velocity: Vector3::ZERO,
        orientation,
        imu_time,
    }));

    let first = pose_service.get_fast_pose_at(imu_time);
    assert!((first.pose.orientation.w - 1.0).abs() < 1e-6);

    let second = pose_service.get_fast_pose_at(imu_time);
    assert!((second.pose.orientation.w - first.pose.orientation.w).abs() < 1e-9);
    assert!((second.pose.orientation.x - first.pose.orientation.x).abs() < 1e-9);
}

/// S1/S4-adjacent: a subscription scheduled after a publication only ever
/// sees subsequent events, and stopping the switchboard ends delivery.
#[test]
fn schedule_after_publish_then_stop_ends_delivery() {
    use std::sync::atomic::{AtomicI32, Ordering};

    let (pb, sb, _clock) = wired_registry();
    let guid = pb.lookup::<GenGuid>();

    #[derive(Debug)]
    struct Reading {
        n: i32,
    }

    let writer = sb.get_writer::<Reading>("x");
    writer.put(writer.allocate(Reading { n: 1 }));

    let seen = Arc::new(AtomicI32::new(0));
    let seen_cb = Arc::clone(&seen);
    let subscriber_id = guid.get_global();
    let _subscription = sb.schedule::<Reading, _>(subscriber_id, "x", move |event, _seq| {
        seen_cb.store(event.n, Ordering::SeqCst);
    });

    writer.put(writer.allocate(Reading { n: 2 }));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    sb.stop();
    let after_stop = seen.load(Ordering::SeqCst);
    writer.put(writer.allocate(Reading { n: 3 }));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(seen.load(Ordering::SeqCst), after_stop);
}
