//! 2D LiDAR SLAM for the helio rover.
//!
//! Provides:
//! - RMHC scan-to-map matching for pose correction
//! - Log-odds occupancy mapping with wall protection
//! - Occupancy-grid export for navigation and display
//!
//! The engine runs at scan rate (5-20Hz) on a dedicated worker thread fed
//! from a bounded queue; every public operation takes the engine-wide lock
//! for its whole body, so the handle can be shared freely across threads.

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};
use types::OccupancyGrid;

mod map;
mod matcher;
mod rng;
mod scan;

pub use map::LogOddsMap;
pub use matcher::{distance_scan_to_map, rmhc_search, SearchParams};
pub use rng::ZigguratRng;
pub use scan::{Scan, ScanConfig, ScanPoint, NO_OBSTACLE, OBSTACLE};

/// Margin kept between the estimated pose and the map edge, in millimeters.
const EDGE_MARGIN_MM: f64 = 20.0;

#[derive(Error, Debug)]
pub(crate) enum SlamError {
    #[error("scan length {got} does not match configured size {expected}")]
    ScanLength { expected: usize, got: usize },
    #[error("configuration out of range: {0}")]
    BadConfig(&'static str),
}

/// SLAM configuration.
#[derive(Debug, Clone)]
pub struct SlamConfig {
    /// Rays per sweep
    pub scan_size: usize,
    /// Sweep rate in Hz
    pub scan_rate_hz: f64,
    /// Angular coverage of the sweep in degrees
    pub detection_angle_deg: f64,
    /// Range reported for no-return rays (millimeters)
    pub distance_no_detection_mm: f64,
    /// Map side length in pixels
    pub map_size_pixels: usize,
    /// Map side length in meters
    pub map_size_meters: f64,
    /// Update weight for legacy integer map-update variants (0-255)
    pub map_quality: u8,
    /// Obstacle hole width (millimeters); closer returns are dropped
    pub hole_width_mm: f64,
    /// Initial position-search sigma (millimeters)
    pub sigma_xy_mm: f64,
    /// Initial heading-search sigma (degrees)
    pub sigma_theta_deg: f64,
    /// Hill-climb iteration budget per update
    pub max_search_iter: usize,
    /// Fixed RNG seed for reproducible runs; `None` seeds from the clock
    pub seed: Option<u32>,
}

impl Default for SlamConfig {
    fn default() -> Self {
        Self {
            scan_size: 360,
            scan_rate_hz: 5.0,
            detection_angle_deg: 360.0,
            distance_no_detection_mm: 3500.0,
            map_size_pixels: 800,
            map_size_meters: 20.0,
            map_quality: 50,
            hole_width_mm: 600.0,
            sigma_xy_mm: 100.0,
            sigma_theta_deg: 20.0,
            max_search_iter: 1000,
            seed: None,
        }
    }
}

impl SlamConfig {
    fn validate(&self) -> Result<(), SlamError> {
        if self.scan_size < 3 {
            return Err(SlamError::BadConfig("scan_size must be at least 3"));
        }
        if self.scan_rate_hz <= 0.0 {
            return Err(SlamError::BadConfig("scan_rate_hz must be positive"));
        }
        if self.map_size_pixels == 0 || self.map_size_meters <= 0.0 {
            return Err(SlamError::BadConfig("map dimensions must be positive"));
        }
        if self.distance_no_detection_mm <= 0.0 {
            return Err(SlamError::BadConfig("distance_no_detection_mm must be positive"));
        }
        Ok(())
    }

    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            span: 1,
            size: self.scan_size,
            rate_hz: self.scan_rate_hz,
            detection_angle_deg: self.detection_angle_deg,
            distance_no_detection_mm: self.distance_no_detection_mm,
        }
    }

    /// Map-frame starting pose: the center of the square map.
    fn initial_position(&self) -> Position {
        Position {
            x_mm: 500.0 * self.map_size_meters,
            y_mm: 500.0 * self.map_size_meters,
            theta_deg: 0.0,
        }
    }
}

/// Map-frame pose estimate in millimeters and degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x_mm: f64,
    pub y_mm: f64,
    pub theta_deg: f64,
}

/// Odometry displacement since the previous update, map frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct OdometryDelta {
    pub dx_mm: f64,
    pub dy_mm: f64,
    pub dtheta_deg: f64,
}

struct EngineState {
    config: SlamConfig,
    map: LogOddsMap,
    /// Scan used to score candidate poses
    matching_scan: Scan,
    /// Scan used to integrate the committed pose into the map
    map_build_scan: Scan,
    rng: ZigguratRng,
    position: Position,
    update_count: u64,
}

impl EngineState {
    fn new(config: SlamConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ZigguratRng::with_seed(seed),
            None => ZigguratRng::new(),
        };
        Self {
            map: LogOddsMap::new(config.map_size_pixels, config.map_size_meters),
            matching_scan: Scan::new(config.scan_config()),
            map_build_scan: Scan::new(config.scan_config()),
            rng,
            position: config.initial_position(),
            update_count: 0,
            config,
        }
    }
}

/// Thread-safe SLAM engine.
pub struct SlamEngine {
    inner: Mutex<EngineState>,
}

impl SlamEngine {
    pub fn new(config: SlamConfig) -> Self {
        Self {
            inner: Mutex::new(EngineState::new(config)),
        }
    }

    /// Ingest one sweep plus the odometry displacement since the last one.
    ///
    /// Invalid input leaves the engine untouched; the pose simply stalls at
    /// its last good value until the next sweep.
    pub fn update(&self, distances_mm: &[i32], odom_delta: Option<OdometryDelta>) {
        let mut state = self.lock();
        if let Err(e) = Self::update_inner(&mut state, distances_mm, odom_delta) {
            warn!(error = %e, "slam update rejected");
        }
    }

    /// Current map-frame pose estimate.
    pub fn position(&self) -> Position {
        self.lock().position
    }

    /// Grayscale belief snapshot (occupied dark, free bright, unknown 128).
    pub fn map_bytes(&self) -> Vec<u8> {
        self.lock().map.to_bytes()
    }

    /// Discretized occupancy grid in the `map` frame.
    pub fn occupancy_grid(&self) -> OccupancyGrid {
        self.lock().map.to_occupancy_grid()
    }

    /// Number of accepted updates since construction or reset.
    pub fn update_count(&self) -> u64 {
        self.lock().update_count
    }

    /// Override the heading estimate, e.g. from a compass at startup.
    pub fn set_initial_heading(&self, theta_deg: f64) {
        let mut state = self.lock();
        state.position.theta_deg = theta_deg;
    }

    /// Drop all accumulated state: fresh map, centered pose, rebuilt RNG.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = EngineState::new(state.config.clone());
        info!("slam engine reset");
    }

    fn update_inner(
        state: &mut EngineState,
        distances_mm: &[i32],
        odom_delta: Option<OdometryDelta>,
    ) -> Result<(), SlamError> {
        state.config.validate()?;
        if distances_mm.len() != state.config.scan_size {
            return Err(SlamError::ScanLength {
                expected: state.config.scan_size,
                got: distances_mm.len(),
            });
        }

        let delta = odom_delta.unwrap_or_default();
        let rate = state.config.scan_rate_hz;
        let vxy = (delta.dx_mm * delta.dx_mm + delta.dy_mm * delta.dy_mm).sqrt() * rate;
        let vtheta = delta.dtheta_deg * rate;

        let hole_width = state.config.hole_width_mm;
        state.matching_scan.update(distances_mm, hole_width, vxy, vtheta);
        state.map_build_scan.update(distances_mm, hole_width, vxy, vtheta);

        let odom_pos = Position {
            x_mm: state.position.x_mm + delta.dx_mm,
            y_mm: state.position.y_mm + delta.dy_mm,
            theta_deg: state.position.theta_deg + delta.dtheta_deg,
        };

        let params = SearchParams {
            sigma_xy_mm: state.config.sigma_xy_mm,
            sigma_theta_deg: state.config.sigma_theta_deg,
            max_iter: state.config.max_search_iter,
        };
        let rmhc_pos = rmhc_search(
            &mut state.rng,
            &state.matching_scan,
            &state.map,
            &odom_pos,
            &params,
        );

        // Only trust the matcher when it scored at all and did not lose to
        // the odometry prediction; this keeps spurious optima from jumping
        // the pose behind walls.
        let rmhc_cost = distance_scan_to_map(&state.matching_scan, &state.map, &rmhc_pos);
        let odom_cost = distance_scan_to_map(&state.matching_scan, &state.map, &odom_pos);
        let mut committed = if rmhc_cost >= 0 && (odom_cost < 0 || rmhc_cost <= odom_cost) {
            rmhc_pos
        } else {
            debug!(rmhc_cost, odom_cost, "falling back to odometry prediction");
            odom_pos
        };

        let max_mm = state.config.map_size_meters * 1000.0 - EDGE_MARGIN_MM;
        committed.x_mm = committed.x_mm.clamp(EDGE_MARGIN_MM, max_mm);
        committed.y_mm = committed.y_mm.clamp(EDGE_MARGIN_MM, max_mm);

        state.position = committed;
        state.map.integrate_scan(&state.map_build_scan, &committed);
        state.update_count += 1;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        // A panicked update cannot wedge readers; the guard is recovered.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
