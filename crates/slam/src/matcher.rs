//! Random-mutation hill-climbing position search.
//!
//! Scores candidate poses by projecting the scan's obstacle points into the
//! log-odds map and hill-climbs with Gaussian mutations, halving the search
//! sigmas whenever progress stalls long enough to bank the current best.

use nalgebra::{Rotation2, Vector2};

use crate::map::LogOddsMap;
use crate::rng::ZigguratRng;
use crate::scan::Scan;
use crate::Position;

/// Pseudo-pixel cost of an unknown cell; occupied cells score lower.
const COST_MIDPOINT: f64 = 32768.0;

/// Log-odds to pseudo-pixel scale.
const COST_SCALE: f64 = 6000.0;

const COST_MAX: f64 = 65535.0;

/// Stalled-iteration fraction after which the sigmas are halved.
const SIGMA_DECAY_DIVISOR: usize = 3;

/// Mean projected cost of the scan's obstacle points at `pos`, lower is
/// better. Returns -1 when no obstacle point lands on the map.
pub fn distance_scan_to_map(scan: &Scan, map: &LogOddsMap, pos: &Position) -> i64 {
    let ppmm = map.pixels_per_mm();
    let rot = Rotation2::new(pos.theta_deg.to_radians());

    let mut sum: i64 = 0;
    let mut count: i64 = 0;

    for pt in scan.points().iter().filter(|p| p.is_obstacle()) {
        let w = rot * Vector2::new(pt.x_mm, pt.y_mm);
        let x = ((pos.x_mm + w.x) * ppmm).round() as i64;
        let y = ((pos.y_mm + w.y) * ppmm).round() as i64;

        if let Some(l) = map.log_odds(x, y) {
            sum += (COST_MIDPOINT - l * COST_SCALE).clamp(0.0, COST_MAX) as i64;
            count += 1;
        }
    }

    if count > 0 {
        sum * 1024 / count
    } else {
        -1
    }
}

/// Search parameters for one hill-climb.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub sigma_xy_mm: f64,
    pub sigma_theta_deg: f64,
    pub max_iter: usize,
}

/// Hill-climb from `start`, returning the best position found.
pub fn rmhc_search(
    rng: &mut ZigguratRng,
    scan: &Scan,
    map: &LogOddsMap,
    start: &Position,
    params: &SearchParams,
) -> Position {
    let mut best = *start;
    let mut last_best = *start;
    let mut lowest = distance_scan_to_map(scan, map, start);
    let mut last_lowest = lowest;

    let mut sigma_xy = params.sigma_xy_mm;
    let mut sigma_theta = params.sigma_theta_deg;
    let mut counter = 0;

    while counter < params.max_iter {
        let candidate = Position {
            x_mm: rng.normal_scaled(last_best.x_mm, sigma_xy),
            y_mm: rng.normal_scaled(last_best.y_mm, sigma_xy),
            theta_deg: rng.normal_scaled(last_best.theta_deg, sigma_theta),
        };

        let cost = distance_scan_to_map(scan, map, &candidate);
        if cost > -1 && cost < lowest {
            lowest = cost;
            best = candidate;
        } else {
            counter += 1;
        }

        if counter > params.max_iter / SIGMA_DECAY_DIVISOR && lowest < last_lowest {
            last_best = best;
            last_lowest = lowest;
            counter = 0;
            sigma_xy *= 0.5;
            sigma_theta *= 0.5;
        }
    }

    best
}
