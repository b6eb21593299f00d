//! Registry of the robots sharing one arena.

use crate::collision::has_collided;
use crate::config::EngineConfig;
use crate::error::SwarmError;
use crate::geometry::{rotate_point, within};
use crate::peripherals::Neighborhood;
use crate::robot::{Kinematics, Robot, RobotSpec};
use bevy_math::Rect;
use glam::Vec2;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, info};

/// All robots in an arena, and the spatial queries between them.
///
/// Robots are handed out as `Arc<Robot>` so scripts and the swarm can share them.
#[derive(Debug)]
pub struct Swarm {
    arena: Rect,
    config: Arc<EngineConfig>,
    robots: RwLock<Vec<Arc<Robot>>>,
}

impl Swarm {
    /// Creates an empty arena of `width` x `height` with its top-left corner at the origin.
    pub fn new(width: f32, height: f32, config: EngineConfig) -> Result<Self, SwarmError> {
        let min = config.min_arena_size;
        if width < min || height < min {
            return Err(SwarmError::ArenaTooSmall { width, height, min });
        }
        Ok(Self {
            arena: Rect::new(0.0, 0.0, width, height),
            config: Arc::new(config),
            robots: RwLock::new(Vec::new()),
        })
    }

    pub fn arena(&self) -> Rect {
        self.arena
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Robot>>> {
        self.robots.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a robot. Names (case-insensitive) and colors must be unique, and the robot
    /// must start inside the arena.
    pub fn add_robot(&self, spec: RobotSpec) -> Result<Arc<Robot>, SwarmError> {
        if !within(spec.position, self.arena) {
            return Err(SwarmError::OutsideArena {
                name: spec.name,
                x: spec.position.x,
                y: spec.position.y,
            });
        }

        let mut robots = self.robots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = robots
            .iter()
            .find(|robot| robot.name().eq_ignore_ascii_case(&spec.name))
        {
            return Err(SwarmError::DuplicateName(existing.name().to_string()));
        }
        if let Some(existing) = robots.iter().find(|robot| robot.color() == spec.color) {
            return Err(SwarmError::DuplicateColor {
                existing: existing.name().to_string(),
                color: spec.color,
            });
        }

        let robot = Arc::new(Robot::new(spec, self.arena, &self.config));
        info!(robot = robot.name(), color = %robot.color(), "robot added");
        robots.push(Arc::clone(&robot));
        Ok(robot)
    }

    pub fn remove_robot(&self, name: &str) -> Option<Arc<Robot>> {
        let mut robots = self.robots.write().unwrap_or_else(PoisonError::into_inner);
        let idx = robots
            .iter()
            .position(|robot| robot.name().eq_ignore_ascii_case(name))?;
        Some(robots.remove(idx))
    }

    /// Case-insensitive lookup.
    pub fn robot(&self, name: &str) -> Option<Arc<Robot>> {
        self.read()
            .iter()
            .find(|robot| robot.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Distance from `me` to `target` if `target` is within sensor range and no more than
    /// half the spread either side of `me`'s heading.
    fn in_cone(&self, me: &Kinematics, target: Vec2) -> Option<f32> {
        let origin = me.position;
        let distance = origin.distance(target);
        if distance > self.config.sensor_range {
            return None;
        }
        let local = rotate_point(origin, target, -me.heading) - origin;
        let off_axis = local.y.atan2(local.x).abs().to_degrees();
        (off_axis <= self.config.sensor_spread / 2.0).then_some(distance)
    }

    /// Turns every robot that has run into the robot nearest in its sensor cone.
    ///
    /// Returns how many robots veered.
    pub fn react_to_collisions(&self) -> usize {
        let robots = self.read().clone();
        let mut veered = 0;
        for robot in &robots {
            let Some((other, _)) = self.nearest_in_cone(robot) else {
                continue;
            };
            if has_collided(&robot.snapshot(), &other.snapshot()) {
                debug!(robot = robot.name(), other = other.name(), "collision, veering");
                robot.avert_collision();
                veered += 1;
            }
        }
        veered
    }
}

impl Neighborhood for Swarm {
    fn nearest_in_cone(&self, me: &Robot) -> Option<(Arc<Robot>, f32)> {
        let state = me.snapshot();
        self.read()
            .iter()
            .filter(|other| other.name() != me.name())
            .filter_map(|other| {
                let distance = self.in_cone(&state, other.position())?;
                Some((Arc::clone(other), distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn active(&self) -> Vec<Arc<Robot>> {
        self.read().clone()
    }
}
