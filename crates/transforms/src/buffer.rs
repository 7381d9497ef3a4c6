//! Time-ordered transform buffer for a single frame pair.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::quaternion::Quaternion;
use crate::TransformError;

/// Seconds within which a lookup counts as an exact stamp hit.
const EXACT_STAMP_TOLERANCE: f64 = 1e-6;

/// Seconds of slack past either end of the buffer before a lookup is
/// rejected as extrapolation.
const JITTER_TOLERANCE: f64 = 0.05;

/// A rigid-body transform between two named frames at a point in time.
///
/// Takes a point expressed in `child` coordinates to its coordinates in
/// `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    /// Frame the transform maps into
    pub parent: String,
    /// Frame the transform maps from
    pub child: String,
    /// Timestamp in seconds
    pub stamp: f64,
    pub translation: Vector3<f64>,
    pub rotation: Quaternion,
}

impl StampedTransform {
    /// Identity transform between two frames at time zero.
    pub fn identity(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            stamp: 0.0,
            translation: Vector3::zeros(),
            rotation: Quaternion::identity(),
        }
    }

    /// The reverse transform with parent and child swapped.
    pub fn inverse(&self) -> StampedTransform {
        let inv_rot = self.rotation.inverse();
        StampedTransform {
            parent: self.child.clone(),
            child: self.parent.clone(),
            stamp: self.stamp,
            translation: inv_rot.rotate(-self.translation),
            rotation: inv_rot,
        }
    }
}

/// Ordered buffer of transforms for one fixed `(parent, child)` pair.
///
/// Entries stay sorted ascending by stamp. A `max_age` of zero disables
/// eviction (static-transform convention: lookups return the latest entry).
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    parent: String,
    child: String,
    max_age: f64,
    entries: Vec<StampedTransform>,
}

impl FrameBuffer {
    pub fn new(parent: impl Into<String>, child: impl Into<String>, max_age: f64) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            max_age,
            entries: Vec::new(),
        }
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn child(&self) -> &str {
        &self.child
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest buffered transform, if any.
    pub fn latest(&self) -> Option<&StampedTransform> {
        self.entries.last()
    }

    /// Insert keeping stamp order, then evict entries older than
    /// `newest - max_age` when aging is enabled.
    pub fn insert(&mut self, tf: StampedTransform) {
        debug_assert_eq!(tf.parent, self.parent);
        debug_assert_eq!(tf.child, self.child);

        let fast_append = self.entries.last().map_or(true, |last| tf.stamp >= last.stamp);
        if fast_append {
            self.entries.push(tf);
        } else {
            let idx = self.entries.partition_point(|e| e.stamp < tf.stamp);
            self.entries.insert(idx, tf);
        }

        if self.max_age > 0.0 {
            // Unwrap is fine: we just pushed.
            let cutoff = self.entries.last().map(|e| e.stamp).unwrap_or(0.0) - self.max_age;
            self.entries.retain(|e| e.stamp >= cutoff);
        }
    }

    /// Look up the transform at time `t`.
    ///
    /// `t == 0` returns the latest entry. Otherwise the bracketing entries
    /// are interpolated (lerp translation, SLERP rotation); lookups within
    /// the jitter tolerance of either end clamp to the nearest entry.
    pub fn lookup(&self, t: f64) -> Result<StampedTransform, TransformError> {
        if self.entries.is_empty() {
            return Err(TransformError::NoData {
                parent: self.parent.clone(),
                child: self.child.clone(),
            });
        }
        if t == 0.0 {
            return Ok(self.entries[self.entries.len() - 1].clone());
        }

        let idx = self.entries.partition_point(|e| e.stamp < t);

        if idx < self.entries.len() && (self.entries[idx].stamp - t).abs() <= EXACT_STAMP_TOLERANCE {
            return Ok(self.entries[idx].clone());
        }

        let first = &self.entries[0];
        let last = &self.entries[self.entries.len() - 1];

        if idx == 0 {
            if t >= first.stamp - JITTER_TOLERANCE {
                return Ok(first.clone());
            }
            return Err(TransformError::Extrapolation {
                requested: t,
                earliest: first.stamp,
                latest: last.stamp,
            });
        }
        if idx == self.entries.len() {
            if t <= last.stamp + JITTER_TOLERANCE {
                return Ok(last.clone());
            }
            return Err(TransformError::Extrapolation {
                requested: t,
                earliest: first.stamp,
                latest: last.stamp,
            });
        }

        let before = &self.entries[idx - 1];
        let after = &self.entries[idx];
        let alpha = (t - before.stamp) / (after.stamp - before.stamp);

        Ok(StampedTransform {
            parent: self.parent.clone(),
            child: self.child.clone(),
            stamp: t,
            translation: before.translation + alpha * (after.translation - before.translation),
            rotation: before.rotation.slerp(&after.rotation, alpha),
        })
    }
}
