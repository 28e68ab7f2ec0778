use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub perception: PerceptionConfig,
    pub drive: DriveConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionConfig {
    pub frame_width: usize,
    pub frame_height: usize,
    /// Calibration quad in the raw image, clockwise from bottom-left.
    pub src_quad: [[f32; 2]; 4],
    /// Half-size of the rectified calibration square, in pixels. One square
    /// metre of terrain maps to a (2 * dst_size)-pixel square.
    pub dst_size: f32,
    /// Rows between the bottom of the frame and the rover's ground contact.
    pub bottom_offset: f32,
    pub navigable_thresh: [u8; 3],
    pub obstacle_thresh: [u8; 3],
    /// Yellow band for sample rocks, [h, s, v] on OpenCV scales (h 0-180).
    pub rock_lower: [u8; 3],
    pub rock_upper: [u8; 3],
    pub world_size: usize,
    /// Max pitch/roll (degrees from level, mod 360) for map updates.
    pub attitude_limit_deg: f32,
    /// Rock mask pixel count above which a sample counts as seen.
    pub rock_debounce_pixels: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            frame_width: 320,
            frame_height: 160,
            src_quad: [[14.0, 140.0], [300.0, 140.0], [200.0, 96.0], [118.0, 96.0]],
            dst_size: 5.0,
            bottom_offset: 6.0,
            navigable_thresh: [160, 160, 160],
            // Intentionally below the navigable cutoff so the two classes
            // can neither overlap nor leave an ambiguous gap at the boundary.
            obstacle_thresh: [140, 140, 140],
            rock_lower: [20, 150, 100],
            rock_upper: [50, 255, 255],
            world_size: 200,
            attitude_limit_deg: 0.5,
            rock_debounce_pixels: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub throttle_set: f32,
    pub brake_set: f32,
    pub max_vel: f32,
    /// Seconds of commanded-but-absent motion before entering stuck mode.
    pub stuck_timeout_s: f64,
    /// Seconds to chase a seen sample before abandoning it.
    pub sample_search_timeout_s: f64,
    pub sample_goal: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            throttle_set: 0.2,
            brake_set: 10.0,
            max_vel: 2.0,
            stuck_timeout_s: 5.0,
            sample_search_timeout_s: 20.0,
            sample_goal: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "rover_nav=info".to_string(),
        }
    }
}

/// One camera frame from the simulator, tightly packed RGB.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// Simulation time the frame was captured, seconds.
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoverMode {
    Forward,
    Stop,
    Stuck,
}

impl RoverMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoverMode::Forward => "forward",
            RoverMode::Stop => "stop",
            RoverMode::Stuck => "stuck",
        }
    }
}

/// Rover-centric polar form of a classified pixel set. `distances` and
/// `angles` are parallel, one entry per pixel; angles in radians.
#[derive(Debug, Clone, Default)]
pub struct PolarSummary {
    pub distances: Vec<f32>,
    pub angles: Vec<f32>,
}

impl PolarSummary {
    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// Arithmetic mean of the angles in degrees, or `None` for an empty set.
    /// Callers must branch on `None` rather than divide by a zero count.
    pub fn mean_angle_deg(&self) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let sum: f32 = self.angles.iter().map(|a| a.to_degrees()).sum();
        Some(sum / self.angles.len() as f32)
    }

    pub fn max_distance(&self) -> Option<f32> {
        if self.distances.is_empty() {
            return None;
        }
        Some(self.distances.iter().fold(f32::MIN, |a, &d| a.max(d)))
    }

    pub fn clear(&mut self) {
        self.distances.clear();
        self.angles.clear();
    }
}

/// Full rover state shared between the perception and decision halves.
/// Mutated by exactly one tick at a time; the external loop owns the
/// exclusive reference and consumes the actuation outputs after each tick.
#[derive(Debug, Clone)]
pub struct RoverState {
    // Pose and kinematics, fed by the simulator each tick.
    pub pos: (f32, f32),
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub vel: f32,

    pub mode: RoverMode,
    /// World position on the first perception tick; set once, never cleared.
    pub start_pos: Option<(f32, f32)>,

    // Timers, seconds on the external clock. Reset on entry to the state
    // they govern; the core only stores timestamps and computes deltas.
    pub stuck_since: f64,
    pub sample_search_since: f64,

    pub samples_found: u32,
    pub sample_seen: bool,
    pub near_sample: bool,
    pub picking_up: bool,

    // Actuation outputs.
    pub throttle: f32,
    pub brake: f32,
    pub steer: f32,
    pub send_pickup: bool,

    /// Navigable polar summary; `None` until the first perception tick.
    pub nav: Option<PolarSummary>,
    /// Last rock polar summary that cleared the debounce; retained while
    /// `sample_seen` holds, cleared with it.
    pub rock: PolarSummary,

    /// Display-only vision snapshot, obstacle/rock/navigable packed RGB.
    pub vision: Vec<u8>,
}

impl RoverState {
    pub fn new(now: f64) -> Self {
        Self {
            pos: (0.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            vel: 0.0,
            mode: RoverMode::Forward,
            start_pos: None,
            stuck_since: now,
            sample_search_since: now,
            samples_found: 0,
            sample_seen: false,
            near_sample: false,
            picking_up: false,
            throttle: 0.0,
            brake: 0.0,
            steer: 0.0,
            send_pickup: false,
            nav: None,
            rock: PolarSummary::default(),
            vision: Vec::new(),
        }
    }
}
