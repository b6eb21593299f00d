//! Tick-paced state changes installed by timed commands.

use crate::robot::Robot;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

type Step = Box<dyn FnMut(&Robot) + Send>;
type Finish = Box<dyn FnOnce(&Robot) + Send>;

/// A change spread over a fixed number of ticks.
///
/// Each tick runs `step` once; ticks are paced against a deadline so a slow step does
/// not stretch the whole command. `on_finish` runs exactly once, whether the mover
/// completes or is cancelled.
pub struct Mover {
    label: &'static str,
    ticks: u32,
    step: Step,
    on_finish: Option<Finish>,
}

impl fmt::Debug for Mover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mover")
            .field("label", &self.label)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl Mover {
    pub fn new(
        label: &'static str,
        ticks: u32,
        step: impl FnMut(&Robot) + Send + 'static,
    ) -> Self {
        Self {
            label,
            ticks,
            step: Box::new(step),
            on_finish: None,
        }
    }

    /// Waits `ticks` ticks without touching the robot.
    pub fn pause(label: &'static str, ticks: u32) -> Self {
        Self::new(label, ticks, |_| ())
    }

    pub fn on_finish(mut self, finish: impl FnOnce(&Robot) + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(finish));
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Runs every tick on the calling thread.
    ///
    /// `running` is checked before each tick; returns `false` if it was cleared before
    /// the last tick ran.
    pub fn run(mut self, robot: &Robot, interval: Duration, running: &AtomicBool) -> bool {
        debug!(
            robot = robot.name(),
            mover = self.label,
            ticks = self.ticks,
            "mover started"
        );
        let mut deadline = Instant::now();
        let mut completed = true;

        for _ in 0..self.ticks {
            if !running.load(Ordering::Acquire) {
                completed = false;
                break;
            }
            (self.step)(robot);
            deadline += interval;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }

        if let Some(finish) = self.on_finish.take() {
            finish(robot);
        }
        debug!(robot = robot.name(), mover = self.label, completed, "mover finished");
        completed
    }
}
