//! Shared types for the helio state-estimation core.

use serde::{Deserialize, Serialize};

/// 2D pose in a named planar frame.
///
/// Units are whatever the owning component uses: the transform registry
/// reports meters/radians, the SLAM engine reports map-frame
/// millimeters/degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// X position (positive = forward at theta=0)
    pub x: f64,
    /// Y position (positive = left at theta=0)
    pub y: f64,
    /// Heading (positive = counter-clockwise)
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }
}

/// Cell values for an exported occupancy grid.
pub mod cell {
    /// No information about the cell.
    pub const UNKNOWN: i8 = -1;
    /// Confidently free.
    pub const FREE: i8 = 0;
    /// Confidently occupied.
    pub const OCCUPIED: i8 = 100;
}

/// Dense 2D occupancy grid exported by the SLAM engine.
///
/// Cells hold `-1` for unknown, `0` for free, `100` for occupied, and
/// intermediate `0..100` for probability x 100. Data is row-major with
/// index `y * width + x` and y increasing upward in the world frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyGrid {
    /// Cell edge length in meters
    pub resolution: f64,
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
    /// World X of the bottom-left corner in meters
    pub origin_x: f64,
    /// World Y of the bottom-left corner in meters
    pub origin_y: f64,
    /// Yaw of the grid origin in radians
    pub origin_yaw: f64,
    /// Frame the grid is expressed in
    pub frame_id: String,
    /// Row-major cell data of length `width * height`
    pub data: Vec<i8>,
}

impl OccupancyGrid {
    /// Create a grid filled with unknown cells.
    pub fn unknown(width: usize, height: usize, resolution: f64, frame_id: impl Into<String>) -> Self {
        Self {
            resolution,
            width,
            height,
            origin_x: 0.0,
            origin_y: 0.0,
            origin_yaw: 0.0,
            frame_id: frame_id.into(),
            data: vec![cell::UNKNOWN; width * height],
        }
    }

    /// Get a cell value, or `None` when out of bounds.
    pub fn cell(&self, x: usize, y: usize) -> Option<i8> {
        if x < self.width && y < self.height {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    /// Occupancy probability of a cell (`None` for unknown or out of bounds).
    pub fn probability(&self, x: usize, y: usize) -> Option<f64> {
        match self.cell(x, y)? {
            v if v < 0 => None,
            v => Some(f64::from(v) / 100.0),
        }
    }

    /// World coordinates of a cell center.
    pub fn cell_to_world(&self, x: usize, y: usize) -> (f64, f64) {
        (
            self.origin_x + (x as f64 + 0.5) * self.resolution,
            self.origin_y + (y as f64 + 0.5) * self.resolution,
        )
    }
}
