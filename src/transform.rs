// src/transform.rs
//
// Coordinate transforms between the rectified image, the rover-centric
// frame (x forward, y left, origin at the ground contact point) and the
// fixed world grid shared with the evidence map.

use nalgebra::{Rotation2, Vector2};

use crate::types::PolarSummary;

/// Nonzero mask pixels re-expressed in rover-centric coordinates. The
/// origin sits at the bottom-centre of the rectified frame; the frame
/// height serves as the horizontal origin as well, matching the square
/// aspect of the calibration target.
pub fn rover_coords(mask: &[u8], width: usize, height: usize) -> Vec<(f32, f32)> {
    let mut points = Vec::new();
    for row in 0..height {
        for col in 0..width {
            if mask[row * width + col] != 0 {
                let x = (row as f32 - height as f32).abs();
                let y = -(col as f32 - height as f32);
                points.push((x, y));
            }
        }
    }
    points
}

/// Rotate rover-centric points counter-clockwise by the heading so their
/// axes run parallel to the world axes.
pub fn rotate_pixels(points: &[(f32, f32)], yaw_deg: f32) -> Vec<(f32, f32)> {
    let rot = Rotation2::new(yaw_deg.to_radians());
    points
        .iter()
        .map(|&(x, y)| {
            let v = rot * Vector2::new(x, y);
            (v.x, v.y)
        })
        .collect()
}

/// Map rover-centric points into world grid cells: rotate by heading,
/// shrink by the rover-pixels-per-world-unit scale, translate by the rover
/// position, then round and clamp into the grid.
pub fn pixels_to_world(
    points: &[(f32, f32)],
    pos: (f32, f32),
    yaw_deg: f32,
    world_size: usize,
    scale: f32,
) -> Vec<(usize, usize)> {
    let limit = (world_size - 1) as i64;
    rotate_pixels(points, yaw_deg)
        .into_iter()
        .map(|(x, y)| {
            let wx = (pos.0 + x / scale).round() as i64;
            let wy = (pos.1 + y / scale).round() as i64;
            (wx.clamp(0, limit) as usize, wy.clamp(0, limit) as usize)
        })
        .collect()
}

/// Reduce a rover-centric pixel set to per-pixel polar form. The mean of
/// the angles steers the rover; the set size measures terrain extent.
pub fn to_polar(points: &[(f32, f32)]) -> PolarSummary {
    let mut polar = PolarSummary {
        distances: Vec::with_capacity(points.len()),
        angles: Vec::with_capacity(points.len()),
    };
    for &(x, y) in points {
        polar.distances.push((x * x + y * y).sqrt());
        polar.angles.push(y.atan2(x));
    }
    polar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rover_coords_origin_is_bottom_centre() {
        // 4x4 mask with a single pixel at the bottom-centre column.
        let mut mask = vec![0u8; 16];
        mask[3 * 4 + 2] = 1; // row 3, col 2
        let points = rover_coords(&mask, 4, 4);
        assert_eq!(points, vec![(1.0, 2.0)]);
    }

    #[test]
    fn test_rotation_inverse_round_trips_all_headings() {
        let points = vec![(12.0, -3.5), (0.0, 7.0), (140.0, 140.0)];
        for yaw in (0..360).step_by(15) {
            let yaw = yaw as f32;
            let there = rotate_pixels(&points, yaw);
            let back = rotate_pixels(&there, -yaw);
            for (orig, round) in points.iter().zip(back.iter()) {
                assert!((orig.0 - round.0).abs() < 1e-3, "yaw {yaw}");
                assert!((orig.1 - round.1).abs() < 1e-3, "yaw {yaw}");
            }
        }
    }

    #[test]
    fn test_rotation_by_90_degrees() {
        let rotated = rotate_pixels(&[(1.0, 0.0)], 90.0);
        assert!((rotated[0].0 - 0.0).abs() < 1e-5);
        assert!((rotated[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_world_cells_always_inside_grid() {
        let points = vec![
            (0.0, 0.0),
            (500.0, 500.0),
            (-500.0, 500.0),
            (160.0, -160.0),
        ];
        for &(px, py) in &[(-50.0, -50.0), (0.0, 0.0), (100.0, 100.0), (400.0, 0.0)] {
            for yaw in [0.0, 45.0, 180.0, 300.0] {
                for &(x, y) in &pixels_to_world(&points, (px, py), yaw, 200, 10.0) {
                    assert!(x <= 199);
                    assert!(y <= 199);
                }
            }
        }
    }

    #[test]
    fn test_world_translation_lands_at_rover_position() {
        // A point at the rover origin maps onto the rover's own cell.
        let cells = pixels_to_world(&[(0.0, 0.0)], (99.4, 120.6), 37.0, 200, 10.0);
        assert_eq!(cells, vec![(99, 121)]);
    }

    #[test]
    fn test_polar_distance_and_angle() {
        let polar = to_polar(&[(3.0, 4.0), (1.0, 0.0)]);
        assert!((polar.distances[0] - 5.0).abs() < 1e-5);
        assert!((polar.angles[1] - 0.0).abs() < 1e-5);
        // Positive y (rover-left) gives a positive angle.
        assert!(polar.angles[0] > 0.0);
    }

    #[test]
    fn test_polar_mean_guards_empty_set() {
        let polar = to_polar(&[]);
        assert!(polar.mean_angle_deg().is_none());
        assert!(polar.max_distance().is_none());
    }
}
