//! Robot state and the handle scripts act through.

use crate::config::EngineConfig;
use crate::geometry::{wheel_speed, within};
use bevy_math::Rect;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_4;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Colours a robot can wear. Every colour name is also a script verb.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Red,
    Green,
    Blue,
    Black,
    White,
    Magenta,
    Yellow,
    Cyan,
}

impl Color {
    pub const ALL: [Color; 8] = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Black,
        Color::White,
        Color::Magenta,
        Color::Yellow,
        Color::Cyan,
    ];

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|color| color.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "RED",
            Color::Green => "GREEN",
            Color::Blue => "BLUE",
            Color::Black => "BLACK",
            Color::White => "WHITE",
            Color::Magenta => "MAGENTA",
            Color::Yellow => "YELLOW",
            Color::Cyan => "CYAN",
        }
    }

    /// `0xRRGGBB`.
    pub fn rgb(self) -> u32 {
        match self {
            Color::Red => 0xFF0000,
            Color::Green => 0x00FF00,
            Color::Blue => 0x0000FF,
            Color::Black => 0x000000,
            Color::White => 0xFFFFFF,
            Color::Magenta => 0xFF00FF,
            Color::Yellow => 0xFFFF00,
            Color::Cyan => 0x00FFFF,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the indicator ring on top of the robot shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mood {
    #[default]
    Happy,
    Angry,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Stopped,
    Running,
}

/// Position, heading and wheel speeds of one robot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub position: Vec2,

    /// Radians, 0 = east, growing clockwise on screen.
    pub heading: f32,

    /// Linear speed of the left wheel.
    pub left_speed: f32,

    /// Linear speed of the right wheel.
    pub right_speed: f32,

    /// Body radius.
    pub size: f32,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            heading: 0.0,
            left_speed: 0.0,
            right_speed: 0.0,
            size: 15.0,
        }
    }
}

impl Kinematics {
    /// Unit vector the robot is facing.
    pub fn forward(&self) -> Vec2 {
        Vec2::from_angle(self.heading)
    }

    /// Average of both wheels.
    pub fn speed(&self) -> f32 {
        (self.left_speed + self.right_speed) / 2.0
    }

    pub fn is_moving(&self) -> bool {
        self.speed() != 0.0
    }

    /// Whole degrees anti-clockwise from east, as scripts see it through `@angle`.
    pub fn angle(&self) -> i64 {
        ((360.0 - self.heading.to_degrees()).round() as i64).rem_euclid(360)
    }

    /// Whole degrees clockwise from north, as scripts see it through `@compass`.
    pub fn compass(&self) -> i64 {
        ((self.heading.to_degrees() + 90.0).round() as i64).rem_euclid(360)
    }
}

/// Construction parameters for a [`Robot`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotSpec {
    pub name: String,
    pub color: Color,
    pub position: Vec2,
    /// Radians.
    pub heading: f32,
    /// Body radius.
    pub size: f32,
}

impl RobotSpec {
    pub fn new(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color,
            position: Vec2::new(50.0, 50.0),
            heading: 0.0,
            size: Kinematics::default().size,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    pub fn facing(mut self, heading: f32) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }
}

/// A simulated robot.
///
/// Scripts, background movers and the swarm all hold an `Arc<Robot>`. Every kinematic
/// write goes through [`Robot::update`], which serializes writers and keeps the robot
/// inside the arena. Readers take short-lived snapshots so they never see a half-applied
/// update.
#[derive(Debug)]
pub struct Robot {
    name: String,
    arena: Rect,
    wall_margin: f32,
    wheel_diameter: f32,
    wheel_max_rps: f32,
    kinematics: Mutex<Kinematics>,
    color: Mutex<Color>,
    mood: Mutex<Mood>,
    status: Mutex<Status>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Robot {
    pub fn new(spec: RobotSpec, arena: Rect, config: &EngineConfig) -> Self {
        let robot = Self {
            name: spec.name,
            arena,
            wall_margin: config.wall_margin,
            wheel_diameter: config.wheel_diameter,
            wheel_max_rps: config.wheel_max_rps,
            kinematics: Mutex::new(Kinematics {
                position: spec.position,
                heading: spec.heading,
                size: spec.size,
                ..Default::default()
            }),
            color: Mutex::new(spec.color),
            mood: Mutex::new(Mood::default()),
            status: Mutex::new(Status::default()),
        };
        robot.update(|_| ());
        robot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arena(&self) -> Rect {
        self.arena
    }

    pub fn wall_margin(&self) -> f32 {
        self.wall_margin
    }

    pub fn wheel_diameter(&self) -> f32 {
        self.wheel_diameter
    }

    /// Copy of the current kinematic state.
    pub fn snapshot(&self) -> Kinematics {
        *lock(&self.kinematics)
    }

    /// Applies `change` atomically, then pulls the robot back inside the wall margin.
    ///
    /// `change` must not call back into this robot's kinematic accessors.
    pub fn update<R>(&self, change: impl FnOnce(&mut Kinematics) -> R) -> R {
        let mut state = lock(&self.kinematics);
        let result = change(&mut state);
        state.position = self.clamp(state.position);
        result
    }

    fn clamp(&self, position: Vec2) -> Vec2 {
        let low = self.arena.min + Vec2::splat(self.wall_margin);
        let high = self.arena.max - Vec2::splat(self.wall_margin);
        position.max(low).min(high)
    }

    /// Whether `position` is inside the arena at all.
    pub fn contains(&self, position: Vec2) -> bool {
        within(position, self.arena)
    }

    pub fn position(&self) -> Vec2 {
        self.snapshot().position
    }

    pub fn set_position(&self, position: Vec2) {
        self.update(|k| k.position = position);
    }

    pub fn heading(&self) -> f32 {
        self.snapshot().heading
    }

    pub fn set_heading(&self, heading: f32) {
        self.update(|k| k.heading = heading);
    }

    pub fn size(&self) -> f32 {
        self.snapshot().size
    }

    pub fn speed(&self) -> f32 {
        self.snapshot().speed()
    }

    pub fn set_wheel_speeds(&self, left: f32, right: f32) {
        self.update(|k| {
            k.left_speed = left;
            k.right_speed = right;
        });
    }

    /// Sets both wheels from revolutions per second, capped at the configured maximum.
    pub fn set_wheel_rps(&self, left: f32, right: f32) {
        let cap = |rps: f32| {
            if rps.abs() > self.wheel_max_rps {
                warn!(
                    robot = %self.name,
                    requested = rps,
                    max = self.wheel_max_rps,
                    "wheel rps capped"
                );
                rps.signum() * self.wheel_max_rps
            } else {
                rps
            }
        };
        let (left, right) = (cap(left), cap(right));
        self.set_wheel_speeds(
            wheel_speed(self.wheel_diameter, left),
            wheel_speed(self.wheel_diameter, right),
        );
    }

    pub fn stop_wheels(&self) {
        self.set_wheel_speeds(0.0, 0.0);
    }

    /// Veers 45 degrees right to get out of another robot's way.
    pub fn avert_collision(&self) {
        self.update(|k| k.heading += FRAC_PI_4);
    }

    pub fn color(&self) -> Color {
        *lock(&self.color)
    }

    pub fn set_color(&self, color: Color) {
        *lock(&self.color) = color;
    }

    pub fn mood(&self) -> Mood {
        *lock(&self.mood)
    }

    pub fn set_mood(&self, mood: Mood) {
        *lock(&self.mood) = mood;
    }

    pub fn status(&self) -> Status {
        *lock(&self.status)
    }

    pub fn set_status(&self, status: Status) {
        *lock(&self.status) = status;
    }
}
