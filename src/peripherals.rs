//! Collaborators the engine talks to but does not own: the console, the speaker and the
//! spatial index used by the distance sensor.

use crate::robot::Robot;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Where `print`/`println` output and script diagnostics go. Must not block for long.
pub trait Console: Send + Sync {
    fn print(&self, agent: &str, message: &str);
    fn println(&self, agent: &str, message: &str);
}

/// Sends console output to the `tracing` subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn print(&self, agent: &str, message: &str) {
        info!(target: "pixelbot::console", robot = agent, "{message}");
    }

    fn println(&self, agent: &str, message: &str) {
        info!(target: "pixelbot::console", robot = agent, "{message}");
    }
}

/// Keeps console output in memory, one entry per completed line.
///
/// `print` output is held back until the next `println` from the same robot.
#[derive(Debug, Default)]
pub struct MemoryConsole {
    pending: Mutex<Vec<(String, String)>>,
    lines: Mutex<Vec<String>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed lines, formatted `<agent>: <text>`.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_pending(&self, agent: &str) -> String {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.iter().position(|(name, _)| name == agent) {
            Some(idx) => pending.remove(idx).1,
            None => String::new(),
        }
    }
}

impl Console for MemoryConsole {
    fn print(&self, agent: &str, message: &str) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.iter_mut().find(|(name, _)| name == agent) {
            Some((_, text)) => text.push_str(message),
            None => pending.push((agent.to_string(), message.to_string())),
        }
    }

    fn println(&self, agent: &str, message: &str) {
        let mut text = self.take_pending(agent);
        text.push_str(message);
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{agent}: {text}"));
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    #[default]
    Square,
    Sine,
}

/// A speaker that can play one tone at a time.
pub trait Tone: Send + Sync {
    fn play_tone(&self, frequency: u32, duration: Duration, waveform: Waveform);
    fn stop(&self);
}

/// A speaker that only logs what it was asked to play.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentTone;

impl Tone for SilentTone {
    fn play_tone(&self, frequency: u32, duration: Duration, waveform: Waveform) {
        debug!(frequency, ?duration, ?waveform, "tone requested");
    }

    fn stop(&self) {
        debug!("tone stopped");
    }
}

/// Spatial queries over the other active robots.
pub trait Neighborhood: Send + Sync {
    /// Nearest other robot inside `me`'s sensor cone, with its distance.
    fn nearest_in_cone(&self, me: &Robot) -> Option<(Arc<Robot>, f32)>;

    /// Every robot currently taking part.
    fn active(&self) -> Vec<Arc<Robot>>;
}

/// A world with nobody else in it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Isolated;

impl Neighborhood for Isolated {
    fn nearest_in_cone(&self, _me: &Robot) -> Option<(Arc<Robot>, f32)> {
        None
    }

    fn active(&self) -> Vec<Arc<Robot>> {
        Vec::new()
    }
}
