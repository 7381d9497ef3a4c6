//! Motion-compensated scan container.
//!
//! Converts a raw LiDAR range array into map-relative points, de-skewing
//! each ray by the robot's linear and angular velocity over the sweep.
//! Points carry the pixel value the map updater drives cells toward: dark
//! for obstacles, near-white for free space along a full-length ray.

use std::f64::consts::PI;

/// Target pixel value for an obstacle endpoint.
pub const OBSTACLE: u16 = 0;

/// Target pixel value for a no-return ray.
pub const NO_OBSTACLE: u16 = 65500;

/// One de-skewed scan point in millimeters, robot-relative.
#[derive(Debug, Clone, Copy)]
pub struct ScanPoint {
    pub x_mm: f64,
    pub y_mm: f64,
    /// `OBSTACLE` or `NO_OBSTACLE`
    pub value: u16,
    /// Range the point was emitted at
    pub distance_mm: f64,
}

impl ScanPoint {
    pub fn is_obstacle(&self) -> bool {
        self.value == OBSTACLE
    }
}

/// Scan container configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Points emitted per ray (1 for matching; >1 thickens map-build rays)
    pub span: usize,
    /// Ray count per sweep
    pub size: usize,
    /// Sweep rate in Hz
    pub rate_hz: f64,
    /// Angular coverage of the sweep in degrees
    pub detection_angle_deg: f64,
    /// Range assigned to no-return rays in millimeters
    pub distance_no_detection_mm: f64,
}

/// A de-skewed scan, rebuilt in place on every sweep.
#[derive(Debug, Clone)]
pub struct Scan {
    config: ScanConfig,
    points: Vec<ScanPoint>,
}

impl Scan {
    pub fn new(config: ScanConfig) -> Self {
        let capacity = config.size * config.span;
        Self {
            config,
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn points(&self) -> &[ScanPoint] {
        &self.points
    }

    /// Rebuild the point set from raw ranges.
    ///
    /// Rays of `0` (no return) emit free-space points at the no-detection
    /// range; rays at or under half the hole width are dropped as
    /// too-close noise. `vxy_mm_per_s`/`vtheta_deg_per_s` de-skew the sweep
    /// against robot motion.
    pub fn update(
        &mut self,
        distances_mm: &[i32],
        hole_width_mm: f64,
        vxy_mm_per_s: f64,
        vtheta_deg_per_s: f64,
    ) {
        let degrees_per_second = (self.config.rate_hz * 360.0).floor();
        let horz_mm = vxy_mm_per_s / degrees_per_second;
        let rotation = 1.0 + vtheta_deg_per_s / degrees_per_second;

        self.points.clear();

        for i in 1..self.config.size - 1 {
            let r = f64::from(distances_mm.get(i).copied().unwrap_or(0));
            if r == 0.0 {
                self.emit(i, self.config.distance_no_detection_mm, NO_OBSTACLE, horz_mm, rotation);
            } else if r > hole_width_mm / 2.0 {
                self.emit(i, r, OBSTACLE, horz_mm, rotation);
            }
            // else: inside the hole width, noise, dropped
        }
    }

    fn emit(&mut self, i: usize, r: f64, value: u16, horz_mm: f64, rotation: f64) {
        let detection = self.config.detection_angle_deg;
        let span = self.config.span;
        let steps = (self.config.size * span - 1) as f64;

        for j in 0..span {
            let k = ((i * span + j) as f64) * detection / steps;
            let angle = (-detection / 2.0 + k * rotation) * PI / 180.0;
            self.points.push(ScanPoint {
                x_mm: r * angle.cos() - k * horz_mm,
                // The map uses a y-down pixel convention.
                y_mm: -r * angle.sin(),
                value,
                distance_mm: r,
            });
        }
    }
}
