//! Quaternion algebra for rigid-body rotations.
//!
//! Hamilton product convention; all stored rotations are kept unit-norm.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Length below which normalization gives up and returns identity.
const DEGENERATE_NORM: f64 = 1e-10;

/// Dot-product threshold above which SLERP falls back to a normalized lerp.
const SLERP_LINEAR_THRESHOLD: f64 = 0.9995;

/// A rotation quaternion (x, y, z, w).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation (0, 0, 0, 1).
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Pure yaw rotation about +Z.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self::new(0.0, 0.0, half.sin(), half.cos())
    }

    pub fn dot(&self, other: &Quaternion) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Scale to unit length. Degenerate inputs collapse to identity.
    pub fn normalize(&self) -> Quaternion {
        let n = self.norm();
        if n < DEGENERATE_NORM {
            return Quaternion::identity();
        }
        Quaternion::new(self.x / n, self.y / n, self.z / n, self.w / n)
    }

    /// Inverse rotation. Assumes unit norm (conjugate).
    pub fn inverse(&self) -> Quaternion {
        Quaternion::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotate a vector: `v + 2(w*(q x v) + q x (q x v))`.
    pub fn rotate(&self, v: Vector3<f64>) -> Vector3<f64> {
        let u = Vector3::new(self.x, self.y, self.z);
        let uv = u.cross(&v);
        let uuv = u.cross(&uv);
        v + 2.0 * (self.w * uv + uuv)
    }

    /// Heading about +Z: `atan2(2(wz + xy), 1 - 2(y^2 + z^2))`.
    pub fn yaw(&self) -> f64 {
        let siny = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny.atan2(cosy)
    }

    /// Spherical linear interpolation from `self` to `other`.
    ///
    /// Picks the short path (hemisphere with non-negative dot); nearly
    /// parallel inputs interpolate linearly to avoid dividing by a vanishing
    /// sine. Result is unit-norm.
    pub fn slerp(&self, other: &Quaternion, t: f64) -> Quaternion {
        let mut b = *other;
        let mut d = self.dot(&b);
        if d < 0.0 {
            b = Quaternion::new(-b.x, -b.y, -b.z, -b.w);
            d = -d;
        }

        if d > SLERP_LINEAR_THRESHOLD {
            return Quaternion::new(
                self.x + t * (b.x - self.x),
                self.y + t * (b.y - self.y),
                self.z + t * (b.z - self.z),
                self.w + t * (b.w - self.w),
            )
            .normalize();
        }

        let theta_0 = d.acos();
        let theta = theta_0 * t;
        let sin_theta_0 = theta_0.sin();
        let s0 = theta.cos() - d * theta.sin() / sin_theta_0;
        let s1 = theta.sin() / sin_theta_0;
        Quaternion::new(
            s0 * self.x + s1 * b.x,
            s0 * self.y + s1 * b.y,
            s0 * self.z + s1 * b.z,
            s0 * self.w + s1 * b.w,
        )
        .normalize()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Quaternion {
    type Output = Quaternion;

    /// Hamilton product. `(a * b).rotate(v) == a.rotate(b.rotate(v))`.
    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_normalize_unit_is_noop() {
        let q = Quaternion::from_yaw(1.2);
        let n = q.normalize();
        assert_relative_eq!(q.x, n.x, epsilon = 1e-10);
        assert_relative_eq!(q.y, n.y, epsilon = 1e-10);
        assert_relative_eq!(q.z, n.z, epsilon = 1e-10);
        assert_relative_eq!(q.w, n.w, epsilon = 1e-10);
    }

    #[test]
    fn test_normalize_degenerate_is_identity() {
        let q = Quaternion::new(0.0, 0.0, 0.0, 0.0).normalize();
        assert_eq!(q, Quaternion::identity());
    }

    #[test]
    fn test_rotate_preserves_length() {
        let q = Quaternion::from_yaw(0.7);
        let v = Vector3::new(1.0, -2.0, 3.0);
        assert_relative_eq!(q.rotate(v).norm(), v.norm(), epsilon = 1e-10);
    }

    #[test]
    fn test_rotate_yaw_quarter_turn() {
        let q = Quaternion::from_yaw(PI / 2.0);
        let v = q.rotate(Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-10);
        assert_relative_eq!(v.z, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_multiply_composes_rotations() {
        let a = Quaternion::from_yaw(0.4);
        let b = Quaternion::from_yaw(0.3);
        let v = Vector3::new(1.0, 0.5, 0.0);
        let composed = (a * b).rotate(v);
        let sequential = a.rotate(b.rotate(v));
        assert_relative_eq!(composed.x, sequential.x, epsilon = 1e-10);
        assert_relative_eq!(composed.y, sequential.y, epsilon = 1e-10);
    }

    #[test]
    fn test_multiply_inverse_is_identity() {
        let q = Quaternion::from_yaw(1.1);
        let r = q * q.inverse();
        assert_relative_eq!(r.x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(r.y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(r.z, 0.0, epsilon = 1e-10);
        assert_relative_eq!(r.w, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_slerp_endpoints() {
        let a = Quaternion::from_yaw(0.2);
        let b = Quaternion::from_yaw(1.5);
        let at0 = a.slerp(&b, 0.0);
        let at1 = a.slerp(&b, 1.0);
        assert_relative_eq!(at0.yaw(), a.yaw(), epsilon = 1e-9);
        assert_relative_eq!(at1.yaw(), b.yaw(), epsilon = 1e-9);
    }

    #[test]
    fn test_slerp_midpoint_unit_norm() {
        let a = Quaternion::from_yaw(0.0);
        let b = Quaternion::from_yaw(2.0);
        let mid = a.slerp(&b, 0.5);
        assert_relative_eq!(mid.norm(), 1.0, epsilon = 1e-10);
        assert_relative_eq!(mid.yaw(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_slerp_short_path_with_negated_input() {
        // q and -q are the same rotation; the midpoint must stay near q
        // rather than swinging around the far side of the 4-sphere.
        let q = Quaternion::from_yaw(0.8);
        let neg = Quaternion::new(-q.x, -q.y, -q.z, -q.w);
        let mid = q.slerp(&neg, 0.5);
        assert_relative_eq!(mid.yaw(), q.yaw(), epsilon = 1e-6);
    }

    #[test]
    fn test_yaw_extraction() {
        for yaw in [-2.5, -0.3, 0.0, 0.9, 3.0] {
            let q = Quaternion::from_yaw(yaw);
            assert_relative_eq!(q.yaw(), yaw, epsilon = 1e-10);
        }
    }
}
