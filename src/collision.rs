//! Robot-to-robot and robot-to-wall collision checks.

use crate::geometry::{
    Horizontal, Line, Vertical, angle_point, horizontal_motion, linear_delta, normalize_degrees,
    vertical_motion,
};
use crate::robot::Kinematics;
use bevy_math::Rect;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Combined-radius multiple under which a miss still counts as close.
pub const CLOSE_CALL_FACTOR: f32 = 1.2;

/// Relative arrival-time gap under which a predicted miss counts as close.
pub const CLOSE_CALL_TIME_RATIO: f32 = 0.1;

/// Arrival times closer than this (seconds) are treated as simultaneous.
pub const ARRIVAL_TOLERANCE: f32 = 1e-3;

/// Direction components smaller than this count as running along a wall.
const PARALLEL_TOLERANCE: f32 = 1e-4;

/// Speed assumed for a stationary robot when estimating arrival times.
const CRAWL_SPEED: f32 = 0.001;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proximity {
    Collided,
    CloseCall,
    Clear,
}

/// Classifies how close `a` and `b` are. Robots are assumed to share `a`'s radius.
pub fn proximity(a: &Kinematics, b: &Kinematics) -> Proximity {
    let separation = a.position.distance(b.position);
    let combined = 2.0 * a.size;
    if separation < combined {
        Proximity::Collided
    } else if separation < CLOSE_CALL_FACTOR * combined {
        Proximity::CloseCall
    } else {
        Proximity::Clear
    }
}

/// True when the two bodies overlap. Near misses are logged, not reported.
pub fn has_collided(a: &Kinematics, b: &Kinematics) -> bool {
    match proximity(a, b) {
        Proximity::Collided => true,
        Proximity::CloseCall => {
            debug!(a = ?a.position, b = ?b.position, "no collision but close call");
            false
        }
        Proximity::Clear => false,
    }
}

/// Outcome of projecting two robots along their current headings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Forecast {
    /// Both arrive at `at` after `eta` seconds.
    Collision { at: Vec2, eta: f32 },
    CloseCall,
    Clear,
}

fn time_to_reach(target: Vec2, robot: &Kinematics) -> f32 {
    let distance = robot.position.distance(target);
    let speed = robot.speed();
    if speed > 0.0 {
        distance / speed
    } else {
        distance / CRAWL_SPEED
    }
}

/// Predicts whether `a` and `b` reach the crossing point of their paths together.
pub fn will_collide(a: &Kinematics, b: &Kinematics) -> Forecast {
    let path_a = Line::from_heading(a.heading, a.position);
    let path_b = Line::from_heading(b.heading, b.position);
    let Some(crossing) = path_a.intersection(&path_b) else {
        return Forecast::Clear;
    };

    let t1 = time_to_reach(crossing, a);
    let t2 = time_to_reach(crossing, b);
    let gap = (t1 - t2).abs();

    if gap <= ARRIVAL_TOLERANCE {
        debug!(at = ?crossing, eta = t1, "collision predicted");
        Forecast::Collision {
            at: crossing,
            eta: t1,
        }
    } else if t1 > 0.0 && gap / t1 < CLOSE_CALL_TIME_RATIO {
        debug!(at = ?crossing, t1, t2, "no collision but close call");
        Forecast::CloseCall
    } else {
        Forecast::Clear
    }
}

/// Whether a robot is pressing against a wall, and which way it is heading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallBump {
    pub bump: bool,
    pub horizontal: Horizontal,
    pub vertical: Vertical,
}

/// Flags a bump when the robot is within `margin` (plus half its size) of a wall and
/// still heading towards it.
pub fn check_wall_bump(robot: &Kinematics, arena: Rect, margin: f32) -> WallBump {
    let nearest = margin + robot.size / 2.0;
    let Vec2 { x, y } = robot.position;
    let horizontal = horizontal_motion(robot.heading);
    let vertical = vertical_motion(robot.heading);

    let mut bump = false;
    if x <= arena.min.x + nearest && horizontal == Horizontal::Left {
        bump = true;
    } else if x >= arena.max.x - nearest && horizontal == Horizontal::Right {
        bump = true;
    }
    if y <= arena.min.y + nearest && vertical == Vertical::Up {
        bump = true;
    } else if y >= arena.max.y - nearest && vertical == Vertical::Down {
        bump = true;
    }

    WallBump {
        bump,
        horizontal,
        vertical,
    }
}

/// Replacement arc after bouncing off a wall.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArcReflection {
    /// New heading, radians.
    pub heading: f32,
    pub centre: Vec2,
    /// Unsigned; the turn sense is kept.
    pub radius: f32,
    /// Angle (radians) of the robot as seen from the new centre.
    pub angle: f32,
}

/// Whether the robot touches a wall and its heading carries it further into that wall.
///
/// [`check_wall_bump`] classifies motion inclusively, so a robot running along the bottom
/// or left wall is flagged there. This only answers `true` when the heading has a
/// component along the outward normal of a wall the robot is touching.
pub fn heads_into_wall(robot: &Kinematics, arena: Rect, margin: f32) -> bool {
    if !check_wall_bump(robot, arena, margin).bump {
        return false;
    }
    let nearest = margin + robot.size / 2.0;
    let Vec2 { x, y } = robot.position;
    let direction = linear_delta(robot.heading, 1.0);

    (x <= arena.min.x + nearest && direction.x < -PARALLEL_TOLERANCE)
        || (x >= arena.max.x - nearest && direction.x > PARALLEL_TOLERANCE)
        || (y <= arena.min.y + nearest && direction.y < -PARALLEL_TOLERANCE)
        || (y >= arena.max.y - nearest && direction.y > PARALLEL_TOLERANCE)
}

/// Reflects an arc whose robot has reached a wall.
///
/// The centre is mirrored across the line through the robot perpendicular to the wall,
/// so the robot's position is unchanged and its new heading is the reflected tangent.
pub fn check_arc_wall_bump(
    robot: &Kinematics,
    arena: Rect,
    margin: f32,
    centre: Vec2,
) -> Option<ArcReflection> {
    let wall = check_wall_bump(robot, arena, margin);
    if !wall.bump {
        return None;
    }

    let position = robot.position;
    let current = normalize_degrees(robot.heading);
    let offset = position - centre;

    let (heading, offset) = if position.x <= arena.min.x + margin
        && wall.horizontal == Horizontal::Left
    {
        (180.0 - current, Vec2::new(offset.x, -offset.y))
    } else if position.x >= arena.max.x - margin && wall.horizontal == Horizontal::Right {
        let heading = if current <= 90.0 {
            180.0 - current
        } else {
            540.0 - current
        };
        (heading, Vec2::new(offset.x, -offset.y))
    } else if position.y <= arena.min.y + margin && wall.vertical == Vertical::Up {
        (360.0 - current, Vec2::new(-offset.x, offset.y))
    } else if position.y >= arena.max.y - margin && wall.vertical == Vertical::Down {
        (360.0 - current, Vec2::new(-offset.x, offset.y))
    } else {
        return None;
    };

    let centre = position - offset;
    Some(ArcReflection {
        heading: heading.rem_euclid(360.0).to_radians(),
        centre,
        radius: offset.length(),
        angle: angle_point(position, centre).to_radians(),
    })
}
