//! Wire-shaped stamped-transform messages.
//!
//! These mirror the shape the message broker delivers; the registry converts
//! them into [`StampedTransform`](crate::StampedTransform) on ingestion.
//! Stamps arrive as integers from some publishers and floats from others, so
//! both fields deserialize as `f64`.

use nalgebra::Vector3;
use serde::Deserialize;

use crate::buffer::StampedTransform;
use crate::quaternion::Quaternion;

/// One entry of a stamped-transforms list.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformEntry {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: TransformBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub stamp: Stamp,
    pub frame_id: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Stamp {
    pub sec: f64,
    pub nanosec: f64,
}

impl Stamp {
    /// Stamp as fractional seconds.
    pub fn seconds(&self) -> f64 {
        self.sec + self.nanosec * 1e-9
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TransformBody {
    pub translation: WireVector3,
    pub rotation: WireQuaternion,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireVector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireQuaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl TransformEntry {
    /// Convert into the registry's internal representation.
    pub fn into_stamped(self) -> StampedTransform {
        StampedTransform {
            parent: self.header.frame_id,
            child: self.child_frame_id,
            stamp: self.header.stamp.seconds(),
            translation: Vector3::new(
                self.transform.translation.x,
                self.transform.translation.y,
                self.transform.translation.z,
            ),
            rotation: Quaternion::new(
                self.transform.rotation.x,
                self.transform.rotation.y,
                self.transform.rotation.z,
                self.transform.rotation.w,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_with_integer_stamp() {
        let json = r#"{
            "header": { "stamp": { "sec": 5, "nanosec": 500000000 }, "frame_id": "odom" },
            "child_frame_id": "base_link",
            "transform": {
                "translation": { "x": 1.0, "y": 2.0, "z": 0.0 },
                "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
            }
        }"#;
        let entry: TransformEntry = serde_json::from_str(json).unwrap();
        let tf = entry.into_stamped();
        assert_eq!(tf.parent, "odom");
        assert_eq!(tf.child, "base_link");
        assert!((tf.stamp - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_entry_with_float_stamp() {
        let json = r#"{
            "header": { "stamp": { "sec": 5.0, "nanosec": 250000000.0 }, "frame_id": "map" },
            "child_frame_id": "odom",
            "transform": {
                "translation": { "x": 0.0, "y": 0.0, "z": 0.0 },
                "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
            }
        }"#;
        let entry: TransformEntry = serde_json::from_str(json).unwrap();
        assert!((entry.header.stamp.seconds() - 5.25).abs() < 1e-9);
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let json = r#"{ "child_frame_id": "odom" }"#;
        assert!(serde_json::from_str::<TransformEntry>(json).is_err());
    }
}
