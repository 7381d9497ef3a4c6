//! Log-odds occupancy map with wall-protected ray updates.
//!
//! Each scan point contributes a Bresenham ray from the robot cell to the
//! endpoint cell: traversed cells accumulate free evidence, the endpoint
//! and a short end zone accumulate occupied evidence. Confident walls are
//! protected from erosion by stray free rays.

use nalgebra::{Rotation2, Vector2};
use types::{cell, OccupancyGrid};

use crate::scan::Scan;
use crate::Position;

/// Log-odds evidence added by an occupied observation.
const LOG_ODDS_OCCUPIED: f64 = 0.85;

/// Log-odds evidence added by a free observation.
const LOG_ODDS_FREE: f64 = -0.62;

/// Cells are clamped to this magnitude.
const LOG_ODDS_CLAMP: f64 = 5.0;

/// Above this value a cell counts as a wall and rejects free updates.
const WALL_PROTECT_THRESHOLD: f64 = 2.0;

/// Floor for the per-point distance weight.
const MIN_WEIGHT: f64 = 0.05;

/// Ray cells before the endpoint that share the endpoint update.
const END_ZONE_CELLS: i64 = 2;

/// Log-odds thresholds for the exported occupancy grid.
const EXPORT_OCCUPIED_ABOVE: f64 = 0.5;
const EXPORT_FREE_BELOW: f64 = -0.5;

/// Dense square log-odds map in map-frame millimeters.
#[derive(Debug, Clone)]
pub struct LogOddsMap {
    size: usize,
    size_meters: f64,
    cells: Vec<f64>,
}

impl LogOddsMap {
    pub fn new(size_pixels: usize, size_meters: f64) -> Self {
        Self {
            size: size_pixels,
            size_meters,
            cells: vec![0.0; size_pixels * size_pixels],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn pixels_per_mm(&self) -> f64 {
        self.size as f64 / (self.size_meters * 1000.0)
    }

    /// Log-odds at a pixel, or `None` out of bounds.
    pub fn log_odds(&self, x: i64, y: i64) -> Option<f64> {
        if x >= 0 && y >= 0 && (x as usize) < self.size && (y as usize) < self.size {
            Some(self.cells[y as usize * self.size + x as usize])
        } else {
            None
        }
    }

    /// Integrate a de-skewed scan observed from `position`.
    pub fn integrate_scan(&mut self, scan: &Scan, position: &Position) {
        let ppmm = self.pixels_per_mm();
        let rot = Rotation2::new(position.theta_deg.to_radians());

        let rx = (position.x_mm * ppmm).round() as i64;
        let ry = (position.y_mm * ppmm).round() as i64;
        let no_detect = scan.config().distance_no_detection_mm;

        for pt in scan.points() {
            let w = rot * Vector2::new(pt.x_mm, pt.y_mm);
            let ex = ((position.x_mm + w.x) * ppmm).round() as i64;
            let ey = ((position.y_mm + w.y) * ppmm).round() as i64;

            let ratio = pt.distance_mm / no_detect;
            let weight = (1.0 - ratio * ratio).max(MIN_WEIGHT);

            self.raytrace(rx, ry, ex, ey, pt.is_obstacle(), weight);
        }
    }

    /// Bresenham walk from robot to endpoint.
    ///
    /// Cells up to the end zone take the free update; the end zone takes
    /// the occupied update for obstacle points, the free update otherwise.
    fn raytrace(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, occupied: bool, weight: f64) {
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx - dy;

        let total_steps = dx.max(dy);
        let mut step = 0;
        let mut x = x0;
        let mut y = y0;

        loop {
            let in_end_zone = step + END_ZONE_CELLS >= total_steps;
            if in_end_zone && occupied {
                self.apply_occupied(x, y, LOG_ODDS_OCCUPIED * weight);
            } else {
                self.apply_free(x, y, LOG_ODDS_FREE * weight);
            }

            if x == x1 && y == y1 {
                break;
            }
            step += 1;
            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                x += sx;
            }
            if e2 < dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn apply_occupied(&mut self, x: i64, y: i64, delta: f64) {
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = (self.cells[idx] + delta).clamp(-LOG_ODDS_CLAMP, LOG_ODDS_CLAMP);
        }
    }

    /// Free updates never erode a confident wall.
    fn apply_free(&mut self, x: i64, y: i64, delta: f64) {
        if let Some(idx) = self.index(x, y) {
            if self.cells[idx] > WALL_PROTECT_THRESHOLD {
                return;
            }
            self.cells[idx] = (self.cells[idx] + delta).clamp(-LOG_ODDS_CLAMP, LOG_ODDS_CLAMP);
        }
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x >= 0 && y >= 0 && (x as usize) < self.size && (y as usize) < self.size {
            Some(y as usize * self.size + x as usize)
        } else {
            None
        }
    }

    /// Grayscale rendering: occupied dark, free bright, unknown 128.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.cells
            .iter()
            .map(|&l| {
                let v = (((-l / LOG_ODDS_CLAMP) + 1.0) / 2.0 * 255.0).round();
                v.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Discretize the belief into the exported grid type.
    ///
    /// The map's y-down pixel rows flip into the grid's y-up convention.
    pub fn to_occupancy_grid(&self) -> OccupancyGrid {
        let mut grid = OccupancyGrid::unknown(
            self.size,
            self.size,
            self.size_meters / self.size as f64,
            "map",
        );
        grid.origin_x = -self.size_meters / 2.0;
        grid.origin_y = -self.size_meters / 2.0;

        for gy in 0..self.size {
            let src_row = self.size - 1 - gy;
            for gx in 0..self.size {
                let l = self.cells[src_row * self.size + gx];
                grid.data[gy * self.size + gx] = if l > EXPORT_OCCUPIED_ABOVE {
                    cell::OCCUPIED
                } else if l < EXPORT_FREE_BELOW {
                    cell::FREE
                } else {
                    cell::UNKNOWN
                };
            }
        }
        grid
    }
}
