//! Cross-crate consistency tests for the transform registry
//!
//! Builds the frame tree the rover publishes at runtime
//! (map <- odom <- base_link <- laser) and checks that chained lookups,
//! interpolation, and pose export agree with manual composition.
//!
//! Run with: cargo test --test registry_chain

use nalgebra::Vector3;
use transforms::{Quaternion, RegistryConfig, StampedTransform, TransformRegistry};

fn stamped(parent: &str, child: &str, t: f64, x: f64, y: f64, yaw: f64) -> StampedTransform {
    StampedTransform {
        parent: parent.into(),
        child: child.into(),
        stamp: t,
        translation: Vector3::new(x, y, 0.0),
        rotation: Quaternion::from_yaw(yaw),
    }
}

/// Compose two parent<-child transforms into one.
fn compose(a: &StampedTransform, b: &StampedTransform) -> (Vector3<f64>, Quaternion) {
    (
        a.rotation.rotate(b.translation) + a.translation,
        a.rotation * b.rotation,
    )
}

fn rover_tree() -> TransformRegistry {
    let mut reg = TransformRegistry::new(RegistryConfig::default());
    // SLAM correction drifts between stamps; odometry advances.
    reg.insert_transforms(
        vec![
            stamped("map", "odom", 1.0, 0.0, 0.0, 0.0),
            stamped("map", "odom", 2.0, 0.2, 0.1, 0.05),
        ],
        false,
    );
    reg.insert_transforms(
        vec![
            stamped("odom", "base_link", 1.0, 1.0, 0.0, 0.0),
            stamped("odom", "base_link", 2.0, 2.0, 0.5, 0.3),
        ],
        false,
    );
    // Sensor mount is calibration data, published once as static.
    reg.insert_transforms(vec![stamped("base_link", "laser", 0.5, 0.3, 0.0, 0.0)], true);
    reg
}

#[test]
fn test_chained_lookup_matches_pairwise_composition() {
    let reg = rover_tree();
    let t = 1.5;

    let chained = reg.lookup_transform("map", "laser", t).unwrap();

    let map_odom = reg.lookup_transform("map", "odom", t).unwrap();
    let odom_base = reg.lookup_transform("odom", "base_link", t).unwrap();
    let base_laser = reg.lookup_transform("base_link", "laser", t).unwrap();

    let (trans_mb, rot_mb) = compose(&map_odom, &odom_base);
    let partial = StampedTransform {
        parent: "map".into(),
        child: "base_link".into(),
        stamp: t,
        translation: trans_mb,
        rotation: rot_mb,
    };
    let (expected_trans, expected_rot) = compose(&partial, &base_laser);

    assert_eq!(chained.parent, "map");
    assert_eq!(chained.child, "laser");
    assert!((chained.translation - expected_trans).norm() < 1e-6);
    assert!((chained.rotation.yaw() - expected_rot.yaw()).abs() < 1e-6);
}

#[test]
fn test_interpolated_chain_is_between_endpoints() {
    let reg = rover_tree();

    let at_1 = reg.lookup_transform("map", "base_link", 1.0).unwrap();
    let at_2 = reg.lookup_transform("map", "base_link", 2.0).unwrap();
    let mid = reg.lookup_transform("map", "base_link", 1.5).unwrap();

    assert!(mid.translation.x > at_1.translation.x);
    assert!(mid.translation.x < at_2.translation.x);
    assert!(mid.rotation.yaw() > at_1.rotation.yaw());
    assert!(mid.rotation.yaw() < at_2.rotation.yaw());
}

#[test]
fn test_latest_pose_reports_newest_stamp() {
    let reg = rover_tree();

    let pose = reg.latest_pose("base_link", "map").unwrap();

    let map_odom = reg.lookup_transform("map", "odom", 2.0).unwrap();
    let odom_base = reg.lookup_transform("odom", "base_link", 2.0).unwrap();
    let (expected_trans, expected_rot) = compose(&map_odom, &odom_base);

    assert!((pose.x - expected_trans.x).abs() < 1e-9);
    assert!((pose.y - expected_trans.y).abs() < 1e-9);
    assert!((pose.theta - expected_rot.yaw()).abs() < 1e-9);
}

#[test]
fn test_reverse_chain_inverts_forward_chain() {
    let reg = rover_tree();
    let t = 1.5;

    let forward = reg.lookup_transform("map", "laser", t).unwrap();
    let reverse = reg.lookup_transform("laser", "map", t).unwrap();

    let (trans, rot) = compose(&forward, &reverse);
    assert!(trans.norm() < 1e-9);
    assert!(rot.yaw().abs() < 1e-9);
}
