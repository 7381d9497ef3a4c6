//! Common test utilities for state-estimation integration tests

/// Synthetic LiDAR sweep of a rectangular room seen from its center.
///
/// Ranges are integer millimeters ordered the way the SLAM engine expects:
/// ray 0 at -180 degrees, increasing counter-clockwise over a full turn.
pub fn rectangle_scan_mm(half_x_mm: f64, half_y_mm: f64, rays: usize) -> Vec<i32> {
    (0..rays)
        .map(|i| {
            let angle = (i as f64 * 360.0 / rays as f64 - 180.0).to_radians();
            ray_box_intersection(half_x_mm, half_y_mm, angle).round() as i32
        })
        .collect()
}

/// Distance from the origin to the box boundary along `angle`.
fn ray_box_intersection(half_x: f64, half_y: f64, angle: f64) -> f64 {
    let cos_a = angle.cos();
    let sin_a = angle.sin();

    let mut min_dist = f64::INFINITY;

    if cos_a.abs() > 1e-6 {
        let t = half_x / cos_a.abs();
        if (t * sin_a).abs() <= half_y {
            min_dist = min_dist.min(t);
        }
    }
    if sin_a.abs() > 1e-6 {
        let t = half_y / sin_a.abs();
        if (t * cos_a).abs() <= half_x {
            min_dist = min_dist.min(t);
        }
    }

    min_dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_scan_hits_walls() {
        let scan = rectangle_scan_mm(2000.0, 1500.0, 360);
        assert_eq!(scan.len(), 360);
        // Ray 0 points at -180 degrees: the x = -2000 wall.
        assert!((scan[0] - 2000).abs() <= 1);
        // Ray 90 points at -90 degrees: the y = -1500 wall.
        assert!((scan[90] - 1500).abs() <= 1);
        // Ray 180 points at 0 degrees: the x = +2000 wall.
        assert!((scan[180] - 2000).abs() <= 1);
        // Every ray lands on the boundary, between the two half-extents
        // and the corner distance.
        let corner = (2000.0f64 * 2000.0 + 1500.0 * 1500.0).sqrt() as i32;
        for &r in &scan {
            assert!(r >= 1500 && r <= corner + 1);
        }
    }
}
