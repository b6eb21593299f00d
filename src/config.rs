//! Tunable constants shared by the interpreter, the command engine and the swarm.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for script execution and robot motion.
///
/// Every field has a default, so a partial JSON/TOML document deserializes into a
/// complete configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate at which timed movers apply their per-tick delta.
    pub ticks_per_second: u32,
    /// Columns a tab counts for when measuring indentation.
    pub tab_width: usize,
    /// Distance from each arena edge at which a robot is considered to touch the wall.
    pub wall_margin: f32,
    /// Wheel diameter (mm) used for speed/rps conversion.
    pub wheel_diameter: f32,
    /// Upper bound on wheel revolutions per second.
    pub wheel_max_rps: f32,
    /// Reach of the distance sensor cone.
    pub sensor_range: f32,
    /// Full opening angle of the sensor cone, in degrees.
    pub sensor_spread: f32,
    /// Value reported by `@distance` when no robot is inside the cone.
    pub out_of_range: f32,
    /// `@random` yields an integer in `1..=random_max`.
    pub random_max: i64,
    /// Seed for `@random`. `None` seeds from the OS.
    pub random_seed: Option<u64>,
    /// Tone length used by `SOUND <freq>` when no duration is given.
    pub default_tone_ms: u32,
    /// Smallest arena width or height a swarm accepts.
    pub min_arena_size: f32,
    /// How long a stop request waits for the script to acknowledge termination.
    pub stop_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 50,
            tab_width: 4,
            wall_margin: 10.0,
            wheel_diameter: 30.0,
            wheel_max_rps: 10.0,
            sensor_range: 100.0,
            sensor_spread: 30.0,
            out_of_range: 9999.0,
            random_max: 12,
            random_seed: None,
            default_tone_ms: 1000,
            min_arena_size: 100.0,
            stop_timeout_ms: 100,
        }
    }
}

impl EngineConfig {
    /// Wall-clock spacing between two mover ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.ticks_per_second.max(1)))
    }

    /// Number of ticks covering `tenths` tenths of a second (at least one).
    pub fn ticks_for_tenths(&self, tenths: u32) -> u32 {
        let ticks = (f64::from(tenths) * f64::from(self.ticks_per_second) / 10.0).round();
        (ticks as u32).max(1)
    }

    /// Number of ticks covering `millis` milliseconds (may be zero).
    pub fn ticks_for_millis(&self, millis: u32) -> u32 {
        (f64::from(millis) * f64::from(self.ticks_per_second) / 1000.0).round() as u32
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
