// src/decision.rs
//
// Actuation decision state machine: turns the per-tick polar summaries,
// kinematics and timers into throttle/brake/steer and the pickup trigger.
//
// Rule order, evaluated once per tick:
//   1. mission-complete homecoming overlay (terminates the tick)
//   2. stuck recovery hold / exit (terminates the tick)
//   3. no-vision crawl fallback
//   4. mode behavior: forward (stuck detection, sample approach, drive,
//      brake-to-stop) or stop (decelerate, pivot, resume)
//   5. pickup trigger, end of every non-terminated tick

use tracing::{debug, info, warn};

use crate::types::{DriveConfig, RoverMode, RoverState};

// ============================================================================
// STEERING
// ============================================================================
const STEER_CLAMP_DEG: f32 = 15.0;
/// Fixed hard turn shared by in-place pivots and stuck evasion.
const PIVOT_STEER_DEG: f32 = -15.0;

// ============================================================================
// SAMPLE APPROACH BANDS
// ============================================================================
const HEAD_ON_BAND_DEG: f32 = 15.0;
const ROTATE_BAND_DEG: f32 = 50.0;
/// Head-on approach switches from driving to a braked creep inside this
/// distance.
const BRAKE_APPROACH_DIST: f32 = 15.0;
/// Rotating toward a sample closer than this while still rolling brakes
/// to a stop first.
const ROTATE_BRAKE_DIST: f32 = 40.0;

// ============================================================================
// TERRAIN EXTENT
// ============================================================================
/// Navigable pixel count above which forward driving continues.
const DRIVE_PIXEL_FLOOR: usize = 50;
/// A stopped rover pivots until at least this many navigable pixels open
/// up ahead.
const RESUME_PIXEL_FLOOR: usize = 100;

/// Velocity below which the rover counts as not moving.
const MOVING_VEL: f32 = 0.2;
/// Homecoming tolerance per axis, world units.
const HOME_RADIUS: f32 = 20.0;

/// Run the decision half of the tick. Total function: every call leaves a
/// valid (throttle, brake, steer, send_pickup) tuple on the state.
pub fn decide(rover: &mut RoverState, cfg: &DriveConfig, now: f64) {
    // One-shot output: cleared every tick, raised again only by rule 5.
    rover.send_pickup = false;

    // 1. Homecoming overlay: every sample collected and the rover back
    //    inside the start box on both axes.
    if rover.samples_found >= cfg.sample_goal {
        if let Some(start) = rover.start_pos {
            if (rover.pos.0 - start.0).abs() < HOME_RADIUS
                && (rover.pos.1 - start.1).abs() < HOME_RADIUS
            {
                rover.throttle = 0.0;
                rover.brake = cfg.brake_set;
                rover.steer = 0.0;
                debug!("mission complete, holding at start");
                return;
            }
        }
    }

    // 2. Stuck recovery: hold the evasive turn until one second past the
    //    stuck timeout, then hand control back to forward.
    if rover.mode == RoverMode::Stuck {
        if now - rover.stuck_since > cfg.stuck_timeout_s + 1.0 {
            set_mode(rover, RoverMode::Forward, now);
            rover.stuck_since = now;
        } else {
            rover.throttle = 0.0;
            rover.brake = 0.0;
            rover.steer = PIVOT_STEER_DEG;
        }
        return;
    }

    let nav = rover
        .nav
        .as_ref()
        .map(|n| (n.len(), n.mean_angle_deg().unwrap_or(0.0)));

    match nav {
        // 3. Degraded operation: no perception data yet, crawl straight.
        None => {
            rover.throttle = cfg.throttle_set;
            rover.brake = 0.0;
            rover.steer = 0.0;
        }
        Some((nav_len, nav_mean_deg)) => match rover.mode {
            RoverMode::Forward => forward(rover, cfg, now, nav_len, nav_mean_deg),
            RoverMode::Stop => stop(rover, cfg, now, nav_len, nav_mean_deg),
            // Unreachable: the recovery rule above returned already.
            RoverMode::Stuck => {}
        },
    }

    // 5. Pickup trigger. The proximity sensor plus a dead stop plus an idle
    //    arm raises the one-shot request and drops the sighting.
    if rover.near_sample && rover.vel == 0.0 && !rover.picking_up {
        rover.send_pickup = true;
        rover.sample_seen = false;
        rover.rock.clear();
        info!(
            "pickup requested at ({:.1}, {:.1})",
            rover.pos.0, rover.pos.1
        );
    }
}

fn forward(rover: &mut RoverState, cfg: &DriveConfig, now: f64, nav_len: usize, nav_mean_deg: f32) {
    // Stuck detection: commanded throttle with no measured motion. The
    // timer resets whenever the rover moves or stops commanding.
    if rover.vel < MOVING_VEL && rover.throttle != 0.0 {
        if now - rover.stuck_since > cfg.stuck_timeout_s {
            set_mode(rover, RoverMode::Stuck, now);
            rover.stuck_since = now;
            return;
        }
    } else {
        rover.stuck_since = now;
    }

    if rover.sample_seen {
        approach_sample(rover, cfg, now);
    } else if nav_len > DRIVE_PIXEL_FLOOR {
        // Steady-state drive: accelerate up to the velocity cap, steer to
        // the clamped mean navigable bearing.
        rover.throttle = if rover.vel < cfg.max_vel {
            cfg.throttle_set
        } else {
            0.0
        };
        rover.brake = 0.0;
        rover.steer = nav_mean_deg.clamp(-STEER_CLAMP_DEG, STEER_CLAMP_DEG);
    } else {
        // Terrain has closed up: brake and reassess from a standstill.
        rover.throttle = 0.0;
        rover.brake = cfg.brake_set;
        rover.steer = 0.0;
        set_mode(rover, RoverMode::Stop, now);
    }
}

fn approach_sample(rover: &mut RoverState, cfg: &DriveConfig, now: f64) {
    if rover.picking_up {
        info!("sample pickup in progress, sighting cleared");
        rover.sample_seen = false;
        rover.rock.clear();
        rover.sample_search_since = now;
        return;
    }
    if now - rover.sample_search_since > cfg.sample_search_timeout_s {
        warn!(
            "sample not reached within {:.0}s, abandoning",
            cfg.sample_search_timeout_s
        );
        rover.sample_seen = false;
        rover.rock.clear();
        rover.sample_search_since = now;
        return;
    }

    // The seen flag can outlive the pixels that set it; without polar data
    // there is no bearing to steer on, so the sighting is dropped instead
    // of dividing by a zero count.
    let (Some(angle), Some(dist)) = (rover.rock.mean_angle_deg(), rover.rock.max_distance())
    else {
        rover.sample_seen = false;
        return;
    };

    if angle.abs() < HEAD_ON_BAND_DEG {
        if dist < BRAKE_APPROACH_DIST {
            // Close and head-on: brake while holding the bearing.
            rover.throttle = 0.0;
            rover.brake = cfg.brake_set;
            rover.steer = angle;
        } else {
            rover.throttle = cfg.throttle_set;
            rover.brake = 0.0;
            rover.steer = angle;
        }
        debug!("approaching sample head on: {:.1} deg, {:.1} out", angle, dist);
    } else if angle.abs() < ROTATE_BAND_DEG {
        if rover.vel > 0.0 && dist < ROTATE_BRAKE_DIST {
            // Still rolling near the sample: stop before pivoting.
            rover.throttle = 0.0;
            rover.brake = cfg.brake_set;
            rover.steer = 0.0;
        } else {
            rover.throttle = 0.0;
            rover.brake = 0.0;
            rover.steer = angle / 4.0;
        }
        debug!("rotating toward sample at {:.1} deg", angle);
    } else {
        info!("lost sight of sample at {:.1} deg", angle);
        rover.sample_seen = false;
        rover.rock.clear();
    }
}

fn stop(rover: &mut RoverState, cfg: &DriveConfig, now: f64, nav_len: usize, nav_mean_deg: f32) {
    if rover.vel > MOVING_VEL {
        // Still rolling: keep braking.
        rover.throttle = 0.0;
        rover.brake = cfg.brake_set;
        rover.steer = 0.0;
    } else if nav_len < RESUME_PIXEL_FLOOR {
        // Not enough open terrain ahead: release the brake and four-wheel
        // pivot until a path opens up.
        rover.throttle = 0.0;
        rover.brake = 0.0;
        rover.steer = PIVOT_STEER_DEG;
    } else {
        rover.throttle = cfg.throttle_set;
        rover.brake = 0.0;
        rover.steer = nav_mean_deg.clamp(-STEER_CLAMP_DEG, STEER_CLAMP_DEG);
        set_mode(rover, RoverMode::Forward, now);
    }
}

fn set_mode(rover: &mut RoverState, next: RoverMode, now: f64) {
    if rover.mode != next {
        info!(
            "mode: {} -> {} at {:.1}s",
            rover.mode.as_str(),
            next.as_str(),
            now
        );
        rover.mode = next;
    }
}
