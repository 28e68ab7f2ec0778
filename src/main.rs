// src/main.rs
//
// Stand-in for the simulator link: builds synthetic camera frames, feeds
// them through the perception and decision halves once per tick, and
// integrates a crude kinematic model so the behaviors play out. The core
// itself lives in the modules below and never touches I/O.

mod config;
mod decision;
mod perception;
mod rectify;
mod threshold;
mod transform;
mod types;
mod worldmap;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use decision::decide;
use perception::perceive;
use rectify::Calibration;
use types::{Config, DriveConfig, Frame, PerceptionConfig, RoverState};
use worldmap::WorldMap;

/// Simulation step, seconds per tick.
const DT: f64 = 0.05;
const MISSION_TICKS: u64 = 600;

fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("rover mission loop starting");

    let cal = Calibration::new(&config.perception)?;
    let mut map = WorldMap::new(config.perception.world_size);
    let mut rover = RoverState::new(0.0);
    rover.pos = (
        config.perception.world_size as f32 / 2.0,
        config.perception.world_size as f32 / 2.0,
    );

    let mut pickup_started_at: Option<u64> = None;

    for tick in 0..MISSION_TICKS {
        let now = tick as f64 * DT;
        let frame = synth_frame(&config.perception, tick, now);

        perceive(&mut rover, &mut map, &frame, &cal, &config.perception);
        decide(&mut rover, &config.drive, now);

        // Everything below is the simulator's side of the contract:
        // consume the actuation outputs, service the pickup request and
        // report fresh kinematics before the next tick.
        step_kinematics(&mut rover, &config.drive);

        if rover.sample_seen && rover.rock.max_distance().map_or(false, |d| d < 16.0) {
            rover.near_sample = true;
        }
        if rover.send_pickup {
            rover.picking_up = true;
            pickup_started_at = Some(tick);
        }
        if let Some(started) = pickup_started_at {
            if tick.saturating_sub(started) > 20 {
                rover.picking_up = false;
                rover.near_sample = false;
                rover.samples_found += 1;
                pickup_started_at = None;
                info!("sample {} stowed", rover.samples_found);
            }
        }
    }

    info!("mission loop finished");
    info!("  ticks: {}", MISSION_TICKS);
    info!("  final mode: {}", rover.mode.as_str());
    info!("  samples collected: {}", rover.samples_found);
    info!("  mapped cells: {}", map.mapped_cells());

    let size = map.size();
    save_ppm("worldmap.ppm", &map.to_rgb(), size, size)?;
    save_ppm(
        "vision.ppm",
        &rover.vision,
        config.perception.frame_width,
        config.perception.frame_height,
    )?;
    info!("  display artifacts written: worldmap.ppm, vision.ppm");

    Ok(())
}

/// Dump an RGB buffer as binary PPM, the simplest viewable container.
fn save_ppm(path: &str, rgb: &[u8], width: usize, height: usize) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::File::create(path)?;
    write!(file, "P6\n{width} {height}\n255\n")?;
    file.write_all(rgb)?;
    Ok(())
}

/// Crude point-mass integration of the actuation outputs.
fn step_kinematics(rover: &mut RoverState, cfg: &DriveConfig) {
    let dt = DT as f32;
    let accel = rover.throttle * 10.0 - rover.brake - rover.vel * 0.2;
    rover.vel = (rover.vel + accel * dt).clamp(0.0, cfg.max_vel);
    rover.yaw = (rover.yaw + rover.steer * dt * 4.0).rem_euclid(360.0);
    let yaw_rad = rover.yaw.to_radians();
    rover.pos.0 += rover.vel * yaw_rad.cos() * dt;
    rover.pos.1 += rover.vel * yaw_rad.sin() * dt;
}

/// Procedural camera frames: open bright ground by default, a dark wall
/// closing in mid-mission, then a yellow sample patch to chase.
fn synth_frame(cfg: &PerceptionConfig, tick: u64, now: f64) -> Frame {
    let w = cfg.frame_width;
    let h = cfg.frame_height;
    let mut data = vec![0u8; w * h * 3];

    let walled = (150..250).contains(&tick);
    for row in 0..h {
        let v = if row < h / 2 || walled { 60 } else { 200 };
        for col in 0..w {
            let i = (row * w + col) * 3;
            data[i] = v;
            data[i + 1] = v;
            data[i + 2] = v;
        }
    }

    if (300..420).contains(&tick) {
        for row in (h * 2 / 3)..(h * 9 / 10) {
            for col in (w / 4)..(w * 3 / 4) {
                let i = (row * w + col) * 3;
                data[i] = 220;
                data[i + 1] = 180;
                data[i + 2] = 40;
            }
        }
    }

    Frame {
        data,
        width: w,
        height: h,
        timestamp: now,
    }
}
