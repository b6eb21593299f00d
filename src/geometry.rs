//! Stateless motion helpers.
//!
//! Screen coordinates: `y` grows downward, heading is in radians with `0` pointing east.
//! A growing heading therefore turns the robot clockwise on screen.

use crate::error::GeometryError;
use bevy_math::Rect;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// `y = slope * x + intercept`, built from a heading and a point on the line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    pub slope: f32,
    pub intercept: f32,
}

impl Line {
    pub fn from_heading(heading: f32, point: Vec2) -> Self {
        let slope = heading.tan();
        Self {
            slope,
            intercept: point.y - slope * point.x,
        }
    }

    /// Point where the two lines cross, or `None` for parallel lines.
    pub fn intersection(&self, other: &Line) -> Option<Vec2> {
        let divisor = other.slope - self.slope;
        if divisor.abs() <= f32::EPSILON || !divisor.is_finite() {
            return None;
        }
        let x = (self.intercept - other.intercept) / divisor;
        let point = Vec2::new(x, self.intercept + self.slope * x);
        point.is_finite().then_some(point)
    }
}

/// Linear speed of a wheel of `diameter` turning at `rps` revolutions per second.
pub fn wheel_speed(diameter: f32, rps: f32) -> f32 {
    rps * PI * diameter
}

/// Revolutions per second needed to cover `distance` in `seconds`.
pub fn wheel_rps_needed(distance: f32, seconds: f32, diameter: f32) -> f32 {
    let rotations = distance / (PI * diameter);
    rotations / seconds
}

/// Displacement for travelling `distance` along `heading`.
pub fn linear_delta(heading: f32, distance: f32) -> Vec2 {
    Vec2::from_angle(heading) * distance
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Horizontal {
    Left,
    Right,
    Undecided,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vertical {
    Up,
    Down,
    Undecided,
}

fn whole_degrees(heading: f32) -> Option<i64> {
    heading
        .is_finite()
        .then(|| (heading.to_degrees().trunc() as i64).rem_euclid(360))
}

/// 90..=270 degrees heads left, everything else heads right.
pub fn horizontal_motion(heading: f32) -> Horizontal {
    match whole_degrees(heading) {
        Some(d) if (90..=270).contains(&d) => Horizontal::Left,
        Some(_) => Horizontal::Right,
        None => Horizontal::Undecided,
    }
}

/// 0..=180 degrees heads down the screen, everything else heads up.
pub fn vertical_motion(heading: f32) -> Vertical {
    match whole_degrees(heading) {
        Some(d) if (0..=180).contains(&d) => Vertical::Down,
        Some(_) => Vertical::Up,
        None => Vertical::Undecided,
    }
}

/// Heading in degrees folded into `0..360`.
pub fn normalize_degrees(heading: f32) -> f32 {
    heading.to_degrees().rem_euclid(360.0)
}

/// Centre of rotation for an arc of `radius` starting at `position` while facing `heading`.
///
/// A positive radius turns right (clockwise on screen), a negative one turns left.
/// The centre always lies on the perpendicular to the heading; each quadrant of the
/// heading measures that perpendicular against a different axis.
pub fn arc_centre(position: Vec2, radius: f32, heading: f32) -> Result<Vec2, GeometryError> {
    let degrees = normalize_degrees(heading);
    let r = radius.abs();
    let (rx, ry) = (position.x, position.y);

    let (cx, cy) = if (180.0..=270.0).contains(&degrees) {
        let ang = (360.0 - (degrees + 90.0)).to_radians();
        if radius > 0.0 {
            (rx + r * ang.cos(), ry - r * ang.sin())
        } else {
            (rx - r * ang.cos(), ry + r * ang.sin())
        }
    } else if (270.0..=360.0).contains(&degrees) {
        let ang = (degrees + 90.0 - 360.0).to_radians();
        if radius > 0.0 {
            (rx + r * ang.cos(), ry + r * ang.sin())
        } else {
            (rx - r * ang.cos(), ry - r * ang.sin())
        }
    } else if (0.0..=90.0).contains(&degrees) {
        let ang = (180.0 - (degrees + 90.0)).to_radians();
        if radius > 0.0 {
            (rx - r * ang.cos(), ry + r * ang.sin())
        } else {
            (rx + r * ang.cos(), ry - r * ang.sin())
        }
    } else if (90.0..=180.0).contains(&degrees) {
        let ang = (degrees - 90.0).to_radians();
        if radius > 0.0 {
            (rx - r * ang.cos(), ry - r * ang.sin())
        } else {
            (rx + r * ang.cos(), ry + r * ang.sin())
        }
    } else {
        return Err(GeometryError::InvalidAngle(degrees));
    };

    Ok(Vec2::new(cx, cy))
}

/// Angle (degrees, east = 0) of `point` as seen from `centre`.
pub fn angle_point(point: Vec2, centre: Vec2) -> f32 {
    // atan2 of centre - point measures from the west; flip it round
    180.0 + (centre.y - point.y).atan2(centre.x - point.x).to_degrees()
}

/// Rotates `point` about `origin` by `angle` radians.
pub fn rotate_point(origin: Vec2, point: Vec2, angle: f32) -> Vec2 {
    origin + Vec2::from_angle(angle).rotate(point - origin)
}

/// Inclusive point-in-rectangle test.
pub fn within(point: Vec2, rect: Rect) -> bool {
    rect.contains(point)
}

/// The circle an `ARC` command is sweeping around.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArcPath {
    pub centre: Vec2,
    /// Signed: positive turns right.
    pub radius: f32,
    /// Current angle (radians) of the robot as seen from the centre.
    pub angle: f32,
}

impl ArcPath {
    /// Starts an arc at `position` facing `heading`.
    pub fn start(position: Vec2, heading: f32, radius: f32) -> Result<Self, GeometryError> {
        let centre = arc_centre(position, radius, heading)?;
        Ok(Self {
            centre,
            radius,
            angle: angle_point(position, centre).to_radians(),
        })
    }

    /// +1 for a right turn, -1 for a left turn.
    pub fn sense(&self) -> f32 {
        if self.radius < 0.0 { -1.0 } else { 1.0 }
    }

    pub fn position(&self) -> Vec2 {
        self.centre + Vec2::from_angle(self.angle) * self.radius.abs()
    }

    /// Sweeps `delta` radians further and returns the new position.
    pub fn advance(&mut self, delta: f32) -> Vec2 {
        self.angle += delta;
        self.position()
    }
}
