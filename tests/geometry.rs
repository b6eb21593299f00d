// tests/geometry.rs
use glam::Vec2;
use pixelbot_script::GeometryError;
use pixelbot_script::geometry::{
    ArcPath, Horizontal, Line, Vertical, angle_point, arc_centre, horizontal_motion,
    linear_delta, rotate_point, vertical_motion, wheel_rps_needed, wheel_speed,
};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

fn assert_close(actual: Vec2, expected: Vec2) {
    assert!(
        actual.distance(expected) < 1e-3,
        "expected {expected:?}, got {actual:?}"
    );
}

#[test]
fn test_arc_centre_sits_right_of_heading_for_positive_radius() {
    let p = Vec2::new(100.0, 100.0);

    // Screen y grows downward, so "right" of east is down the screen.
    assert_close(arc_centre(p, 10.0, 0.0).unwrap(), Vec2::new(100.0, 110.0));
    assert_close(
        arc_centre(p, 10.0, FRAC_PI_2).unwrap(),
        Vec2::new(90.0, 100.0),
    );
    assert_close(arc_centre(p, 10.0, PI).unwrap(), Vec2::new(100.0, 90.0));
    assert_close(
        arc_centre(p, 10.0, 3.0 * FRAC_PI_2).unwrap(),
        Vec2::new(110.0, 100.0),
    );
}

#[test]
fn test_arc_centre_negative_radius_mirrors_across_heading() {
    let p = Vec2::new(100.0, 100.0);
    assert_close(arc_centre(p, -10.0, 0.0).unwrap(), Vec2::new(100.0, 90.0));
    assert_close(arc_centre(p, -10.0, PI).unwrap(), Vec2::new(100.0, 110.0));

    // Inside a quadrant, the centre stays on the perpendicular at full radius.
    let heading = 30.0f32.to_radians();
    let centre = arc_centre(p, -25.0, heading).unwrap();
    assert!((centre.distance(p) - 25.0).abs() < 1e-3);
    assert!((centre - p).dot(Vec2::from_angle(heading)).abs() < 1e-3);
}

#[test]
fn test_arc_centre_rejects_nan_heading() {
    let result = arc_centre(Vec2::ZERO, 10.0, f32::NAN);
    assert!(matches!(result, Err(GeometryError::InvalidAngle(_))));
}

#[test]
fn test_angle_point_measures_from_east() {
    let centre = Vec2::new(100.0, 100.0);
    assert!((angle_point(Vec2::new(100.0, 90.0), centre) - 270.0).abs() < 1e-3);
    assert!((angle_point(Vec2::new(90.0, 100.0), centre) - 180.0).abs() < 1e-3);
    assert!((angle_point(Vec2::new(100.0, 110.0), centre) - 90.0).abs() < 1e-3);
}

#[test]
fn test_rotate_point_about_origin() {
    let rotated = rotate_point(Vec2::new(1.0, 1.0), Vec2::new(2.0, 1.0), FRAC_PI_2);
    assert_close(rotated, Vec2::new(1.0, 2.0));
}

#[test]
fn test_motion_classification() {
    assert_eq!(horizontal_motion(0.0), Horizontal::Right);
    assert_eq!(horizontal_motion(PI), Horizontal::Left);
    assert_eq!(horizontal_motion(100f32.to_radians()), Horizontal::Left);
    assert_eq!(horizontal_motion(f32::NAN), Horizontal::Undecided);

    assert_eq!(vertical_motion(FRAC_PI_4), Vertical::Down);
    assert_eq!(vertical_motion(300f32.to_radians()), Vertical::Up);
    // Negative headings are folded into 0..360 first.
    assert_eq!(vertical_motion(-FRAC_PI_4), Vertical::Up);
    assert_eq!(vertical_motion(f32::NAN), Vertical::Undecided);
}

#[test]
fn test_line_intersection() {
    let flat = Line::from_heading(0.0, Vec2::new(0.0, 5.0));
    let diagonal = Line::from_heading(FRAC_PI_4, Vec2::ZERO);
    assert_close(flat.intersection(&diagonal).unwrap(), Vec2::new(5.0, 5.0));

    let parallel = Line::from_heading(0.0, Vec2::new(3.0, 9.0));
    assert_eq!(flat.intersection(&parallel), None);
}

#[test]
fn test_wheel_conversions_are_inverse() {
    let speed = wheel_speed(30.0, 2.0);
    assert!((speed - 60.0 * PI).abs() < 1e-3);
    assert!((wheel_rps_needed(speed, 1.0, 30.0) - 2.0).abs() < 1e-5);
    // Covering the same distance in half the time needs twice the rps.
    assert!((wheel_rps_needed(speed, 0.5, 30.0) - 4.0).abs() < 1e-5);
}

#[test]
fn test_linear_delta_follows_heading() {
    assert_close(linear_delta(0.0, 10.0), Vec2::new(10.0, 0.0));
    assert_close(linear_delta(FRAC_PI_2, 10.0), Vec2::new(0.0, 10.0));
}

#[test]
fn test_arc_path_quarter_turn() {
    // Facing east with the centre below: a quarter sweep ends facing south.
    let mut path = ArcPath::start(Vec2::new(100.0, 100.0), 0.0, 10.0).unwrap();
    assert_close(path.centre, Vec2::new(100.0, 110.0));
    assert_close(path.position(), Vec2::new(100.0, 100.0));
    assert_eq!(path.sense(), 1.0);

    let end = path.advance(FRAC_PI_2);
    assert_close(end, Vec2::new(110.0, 110.0));

    let left = ArcPath::start(Vec2::new(100.0, 100.0), 0.0, -10.0).unwrap();
    assert_eq!(left.sense(), -1.0);
}
