// src/perception.rs
//
// Per-tick perception: one camera frame in, updated rover perception
// summaries and evidence map out.
//
// Signal flow:
//   raw frame → warp_perspective → {navigable, obstacle, rock} masks
//     → vision snapshot (display)
//     → rover_coords → pixels_to_world → WorldMap (attitude gated)
//     → rover_coords → to_polar → nav / rock summaries → decision

use tracing::info;

use crate::rectify::{warp_perspective, Calibration};
use crate::threshold::{navigable_mask, obstacle_mask, rock_mask};
use crate::transform::{pixels_to_world, rover_coords, to_polar};
use crate::types::{Frame, PerceptionConfig, RoverState};
use crate::worldmap::{attitude_level, WorldMap};

/// Run the perception half of the tick. Pure state transition over the
/// rover state and evidence map; the frame is read-only and no I/O happens
/// here.
pub fn perceive(
    rover: &mut RoverState,
    map: &mut WorldMap,
    frame: &Frame,
    cal: &Calibration,
    cfg: &PerceptionConfig,
) {
    let w = frame.width;
    let h = frame.height;

    let warped = warp_perspective(frame, cal);

    let navigable = navigable_mask(&warped, w, h, cfg.navigable_thresh);
    let obstacles = obstacle_mask(&warped, w, h, cfg.obstacle_thresh);
    let rocks = rock_mask(&warped, w, h, cfg.rock_lower, cfg.rock_upper);

    // Display snapshot: obstacle, rock, navigable packed as RGB at full
    // intensity. Rebuilt from scratch every tick.
    rover.vision.clear();
    rover.vision.resize(w * h * 3, 0);
    for i in 0..w * h {
        rover.vision[i * 3] = obstacles[i] * 255;
        rover.vision[i * 3 + 1] = rocks[i] * 255;
        rover.vision[i * 3 + 2] = navigable[i] * 255;
    }

    let navigable_px = rover_coords(&navigable, w, h);
    let obstacle_px = rover_coords(&obstacles, w, h);
    let rock_px = rover_coords(&rocks, w, h);

    // Frames captured under significant tilt rectify incorrectly, so the
    // evidence map only accumulates while the rover is level.
    if attitude_level(rover.pitch, rover.roll, cfg.attitude_limit_deg) {
        let (pos, yaw, size) = (rover.pos, rover.yaw, map.size());
        let world = |px: &[(f32, f32)]| pixels_to_world(px, pos, yaw, size, cal.scale);
        map.add_obstacle_evidence(&world(&obstacle_px));
        map.mark_rock(&world(&rock_px));
        map.add_navigable_evidence(&world(&navigable_px));
    }

    rover.nav = Some(to_polar(&navigable_px));

    // A sample only counts as seen once its mask clears the debounce
    // floor. The polar summary persists across dropout frames while the
    // seen flag holds; the decision side clears both together.
    if rock_px.len() > cfg.rock_debounce_pixels {
        rover.rock = to_polar(&rock_px);
        if !rover.sample_seen {
            rover.sample_search_since = frame.timestamp;
            info!(
                "sample spotted: {} px, {:.1} units out",
                rock_px.len(),
                rover.rock.max_distance().unwrap_or(0.0)
            );
        }
        rover.sample_seen = true;
    }

    if rover.start_pos.is_none() {
        rover.start_pos = Some(rover.pos);
        info!(
            "start position fixed at ({:.1}, {:.1})",
            rover.pos.0, rover.pos.1
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoverMode;

    fn test_cfg() -> PerceptionConfig {
        PerceptionConfig::default()
    }

    /// Frame with bright ground everywhere the calibration square samples,
    /// dark sky above the horizon rows.
    fn ground_frame(t: f64) -> Frame {
        let (w, h) = (320, 160);
        let mut data = vec![0u8; w * h * 3];
        for row in 0..h {
            let v = if row < 80 { 60 } else { 200 };
            for col in 0..w {
                let i = (row * w + col) * 3;
                data[i] = v;
                data[i + 1] = v;
                data[i + 2] = v;
            }
        }
        Frame {
            data,
            width: w,
            height: h,
            timestamp: t,
        }
    }

    fn frame_with_rock(t: f64) -> Frame {
        let mut frame = ground_frame(t);
        // Paint a wide yellow patch in the lower image. The warp compresses
        // this region hard, so the patch has to be generous to clear the
        // debounce floor after resampling.
        for row in 110..150 {
            for col in 60..260 {
                let i = (row * frame.width + col) * 3;
                frame.data[i] = 220;
                frame.data[i + 1] = 180;
                frame.data[i + 2] = 40;
            }
        }
        frame
    }

    fn level_rover() -> RoverState {
        let mut rover = RoverState::new(0.0);
        rover.pos = (100.0, 100.0);
        rover
    }

    #[test]
    fn test_level_frame_populates_nav_and_map() {
        let cfg = test_cfg();
        let cal = Calibration::new(&cfg).unwrap();
        let mut map = WorldMap::new(cfg.world_size);
        let mut rover = level_rover();

        perceive(&mut rover, &mut map, &ground_frame(0.0), &cal, &cfg);

        let nav = rover.nav.as_ref().expect("nav summary set");
        assert!(!nav.is_empty());
        assert!(map.mapped_cells() > 0);
        assert_eq!(rover.start_pos, Some((100.0, 100.0)));
        assert_eq!(rover.mode, RoverMode::Forward);
    }

    #[test]
    fn test_tilted_frame_skips_map_but_keeps_polar() {
        let cfg = test_cfg();
        let cal = Calibration::new(&cfg).unwrap();
        let mut map = WorldMap::new(cfg.world_size);
        let mut rover = level_rover();
        rover.pitch = 5.0;

        perceive(&mut rover, &mut map, &ground_frame(0.0), &cal, &cfg);

        assert!(rover.nav.is_some());
        assert_eq!(map.mapped_cells(), 0);
    }

    #[test]
    fn test_rock_debounce_sets_seen_and_timer() {
        let cfg = test_cfg();
        let cal = Calibration::new(&cfg).unwrap();
        let mut map = WorldMap::new(cfg.world_size);
        let mut rover = level_rover();

        perceive(&mut rover, &mut map, &frame_with_rock(3.5), &cal, &cfg);

        assert!(rover.sample_seen);
        assert!(!rover.rock.is_empty());
        assert_eq!(rover.sample_search_since, 3.5);

        // A later rock-free frame keeps both the flag and the summary.
        perceive(&mut rover, &mut map, &ground_frame(4.0), &cal, &cfg);
        assert!(rover.sample_seen);
        assert!(!rover.rock.is_empty());
        assert_eq!(rover.sample_search_since, 3.5);
    }

    #[test]
    fn test_start_pos_set_once() {
        let cfg = test_cfg();
        let cal = Calibration::new(&cfg).unwrap();
        let mut map = WorldMap::new(cfg.world_size);
        let mut rover = level_rover();

        perceive(&mut rover, &mut map, &ground_frame(0.0), &cal, &cfg);
        rover.pos = (50.0, 50.0);
        perceive(&mut rover, &mut map, &ground_frame(0.1), &cal, &cfg);
        assert_eq!(rover.start_pos, Some((100.0, 100.0)));
    }

    #[test]
    fn test_vision_snapshot_dimensions_and_channels() {
        let cfg = test_cfg();
        let cal = Calibration::new(&cfg).unwrap();
        let mut map = WorldMap::new(cfg.world_size);
        let mut rover = level_rover();

        perceive(&mut rover, &mut map, &ground_frame(0.0), &cal, &cfg);
        assert_eq!(rover.vision.len(), 320 * 160 * 3);
        // Snapshot carries some navigable (blue channel) response.
        assert!(rover.vision.chunks_exact(3).any(|px| px[2] == 255));
    }
}
