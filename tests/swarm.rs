// tests/swarm.rs
use glam::Vec2;
use pixelbot_script::{
    Color, EngineConfig, MemoryConsole, Neighborhood, RobotSpec, Script, Session, Swarm,
    SwarmError, Variables,
};
use std::f32::consts::FRAC_PI_4;
use std::sync::Arc;

fn arena() -> Swarm {
    Swarm::new(400.0, 400.0, EngineConfig::default()).unwrap()
}

#[test]
fn test_rejects_small_arena() {
    let result = Swarm::new(50.0, 400.0, EngineConfig::default());
    assert!(matches!(result, Err(SwarmError::ArenaTooSmall { min, .. }) if min == 100.0));
}

#[test]
fn test_names_and_colors_must_be_unique() {
    let swarm = arena();
    swarm.add_robot(RobotSpec::new("Alpha", Color::Red)).unwrap();

    assert_eq!(
        swarm.add_robot(RobotSpec::new("ALPHA", Color::Blue)).unwrap_err(),
        SwarmError::DuplicateName("Alpha".to_string())
    );
    assert_eq!(
        swarm.add_robot(RobotSpec::new("Beta", Color::Red)).unwrap_err(),
        SwarmError::DuplicateColor {
            existing: "Alpha".to_string(),
            color: Color::Red,
        }
    );
    assert!(matches!(
        swarm.add_robot(RobotSpec::new("Gamma", Color::Cyan).at(500.0, 20.0)),
        Err(SwarmError::OutsideArena { .. })
    ));
    assert_eq!(swarm.len(), 1);
}

#[test]
fn test_lookup_and_removal() {
    let swarm = arena();
    let added = swarm.add_robot(RobotSpec::new("Alpha", Color::Red)).unwrap();

    let found = swarm.robot("alpha").unwrap();
    assert!(Arc::ptr_eq(&added, &found));

    assert!(swarm.remove_robot("Alpha").is_some());
    assert!(swarm.is_empty());
    assert!(swarm.robot("Alpha").is_none());
}

#[test]
fn test_sensor_cone_finds_nearest_ahead() {
    let swarm = arena();
    let me = swarm
        .add_robot(RobotSpec::new("Me", Color::Red).at(100.0, 200.0))
        .unwrap();
    swarm
        .add_robot(RobotSpec::new("Ahead", Color::Green).at(160.0, 200.0))
        .unwrap();
    swarm
        .add_robot(RobotSpec::new("Beside", Color::Blue).at(100.0, 240.0))
        .unwrap();
    swarm
        .add_robot(RobotSpec::new("Far", Color::White).at(250.0, 200.0))
        .unwrap();

    let (nearest, distance) = swarm.nearest_in_cone(&me).unwrap();
    assert_eq!(nearest.name(), "Ahead");
    assert!((distance - 60.0).abs() < 1e-3);

    // Facing away, nobody is in the cone.
    me.set_heading(std::f32::consts::PI);
    assert!(swarm.nearest_in_cone(&me).is_none());
    assert_eq!(swarm.active().len(), 4);
}

#[test]
fn test_distance_sensor_reads_through_swarm() {
    let swarm = Arc::new(arena());
    let me = swarm
        .add_robot(RobotSpec::new("Me", Color::Red).at(100.0, 200.0))
        .unwrap();
    swarm
        .add_robot(RobotSpec::new("Ahead", Color::Green).at(180.0, 200.0))
        .unwrap();

    let console = Arc::new(MemoryConsole::new());
    let mut session = Session::new(me, swarm.config().clone())
        .with_console(console.clone())
        .with_neighborhood(swarm.clone());
    session.execute(
        &mut Script::new("println @distance\nif @distance < 100\n    println 'close'"),
        Variables::new(),
    );

    assert_eq!(console.lines(), vec!["Me: 80.0", "Me: close"]);
}

#[test]
fn test_collided_robot_veers() {
    let swarm = arena();
    let back = swarm
        .add_robot(RobotSpec::new("Back", Color::Red).at(100.0, 200.0))
        .unwrap();
    let front = swarm
        .add_robot(RobotSpec::new("Front", Color::Green).at(120.0, 200.0))
        .unwrap();

    // Only the robot behind sees the other one in its cone.
    assert_eq!(swarm.react_to_collisions(), 1);
    assert!((back.heading() - FRAC_PI_4).abs() < 1e-5);
    assert_eq!(front.heading(), 0.0);
    assert_eq!(front.position(), Vec2::new(120.0, 200.0));
}
