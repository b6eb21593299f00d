// tests/interpreter.rs
use bevy_math::Rect;
use glam::Vec2;
use pixelbot_script::{
    Color, EngineConfig, MemoryConsole, Robot, RobotSpec, Script, Session, SourceProvider,
    Status, Termination, Value, Variables,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn setup_with(config: EngineConfig) -> (Session, Arc<MemoryConsole>) {
    let spec = RobotSpec::new("Rover", Color::Blue).at(200.0, 200.0);
    let robot = Arc::new(Robot::new(spec, Rect::new(0.0, 0.0, 400.0, 400.0), &config));
    let console = Arc::new(MemoryConsole::new());
    let session = Session::new(robot, config).with_console(console.clone());
    (session, console)
}

fn setup() -> (Session, Arc<MemoryConsole>) {
    setup_with(EngineConfig::default())
}

fn run(text: &str) -> (Session, Vec<String>) {
    let (mut session, console) = setup();
    let outcome = session.execute(&mut Script::new(text), Variables::new());
    assert_eq!(outcome, Termination::EndOfScript);
    (session, console.lines())
}

fn printed(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| format!("Rover: {line}")).collect()
}

#[test]
fn test_while_loop_reenters_until_false() {
    let (session, lines) = run("set x=1\nwhile x<3\n    println x\n    set x = x + 1\n");
    assert_eq!(lines, printed(&["1", "2"]));
    assert_eq!(session.variables().get("x"), Some(&Value::Int(3)));
}

#[test]
fn test_false_while_never_runs_body() {
    let (session, lines) = run("set x=5\nwhile x < 3\n    set x = 100\n    set y = 1\nprintln x");
    assert_eq!(lines, printed(&["5"]));
    assert_eq!(session.variables().get("x"), Some(&Value::Int(5)));
    assert_eq!(session.variables().get("y"), None);
}

#[test]
fn test_forever_break_resumes_after_loop() {
    let script = "set n=0\nforever\n    set n = n + 1\n    if n == 3\n        break\nprintln n";
    let (_, lines) = run(script);
    assert_eq!(lines, printed(&["3"]));
}

#[test]
fn test_continue_skips_rest_of_body() {
    let script = "\
set i=0
set total=0
while i < 5
    set i = i + 1
    if i % 2 == 0
        continue
    set total = total + i
println total";
    let (_, lines) = run(script);
    assert_eq!(lines, printed(&["9"]));
}

#[test]
fn test_break_leaves_only_innermost_loop() {
    let script = "\
set rows=0
set cells=0
while rows < 3
    set rows = rows + 1
    forever
        set cells = cells + 1
        break
println rows * 10 + cells";
    let (_, lines) = run(script);
    assert_eq!(lines, printed(&["33"]));
}

#[test]
fn test_if_else() {
    let script = "\
set x=2
if x > 1
    println 'big'
else
    println 'small'
if x > 5
    println 'huge'
else
    println 'modest'";
    let (_, lines) = run(script);
    assert_eq!(lines, printed(&["big", "modest"]));
}

#[test]
fn test_print_joins_until_println() {
    let (_, lines) = run("print 'a'\nprint 1\nprintln\nprintln 7 / 2");
    assert_eq!(lines, printed(&["a1", "3.5"]));
}

#[test]
fn test_begin_end_groups() {
    let (_, lines) = run("begin\n  println 1\nprintln 2\nend\nprintln 3");
    assert_eq!(lines, printed(&["1", "2", "3"]));

    let (_, lines) = run("begin\nprintln 1");
    assert_eq!(lines, printed(&["WARNING: Expected END. At line 1", "1"]));
}

#[test]
fn test_errors_are_reported_and_skipped() {
    let (_, lines) = run("FLY 10\nset x\nif y ==\n    println 'no'\nprintln 'after'");
    assert_eq!(lines.len(), 4, "{lines:?}");
    assert_eq!(lines[0], "Rover: ERROR: unknown command `FLY`. At line 1");
    assert_eq!(
        lines[1],
        "Rover: ERROR: expected something of the form <var>=<expr>. At line 2"
    );
    assert!(lines[2].starts_with("Rover: ERROR: ") && lines[2].ends_with("At line 3"));
    assert_eq!(lines[3], "Rover: after");
}

#[test]
fn test_undefined_variable_in_while_exits_loop() {
    let (_, lines) = run("while missing > 0\n    println 'never'\nprintln 'out'");
    assert_eq!(
        lines,
        printed(&["ERROR: `missing` is not defined. At line 1", "out"])
    );
}

#[test]
fn test_failed_if_condition_skips_else_too() {
    let script = "\
if missing > 0
    println 'then'
else
    println 'else'
println 'after'";
    let (_, lines) = run(script);
    assert_eq!(
        lines,
        printed(&["ERROR: `missing` is not defined. At line 1", "after"])
    );
}

#[test]
fn test_contextual_warnings() {
    let (_, lines) = run("break\ncontinue\nend\nelse\n    println 'hidden'\nprintln 1");
    assert_eq!(
        lines,
        printed(&[
            "WARNING: BREAK outside of a loop. At line 1",
            "WARNING: CONTINUE outside of a loop. At line 2",
            "WARNING: END without BEGIN. At line 3",
            "WARNING: ELSE without IF. At line 4",
            "1",
        ])
    );
}

#[test]
fn test_commands_move_the_robot() {
    let (session, _) = run("MOVE 50\nTURN 90\nMOVE 20\nmagenta");
    let robot = session.robot();
    assert!(robot.position().distance(Vec2::new(250.0, 220.0)) < 1e-3);
    assert_eq!(robot.color(), Color::Magenta);
    assert_eq!(robot.status(), Status::Stopped);
}

#[test]
fn test_sensor_values() {
    let script = "\
POS 100 120
ANGLE 90
println @x
println @y
println @angle
println @compass
println @name
println @moving
println @light
println @range
println @distance";
    let (_, lines) = run(script);
    assert_eq!(
        lines,
        printed(&["100", "120", "90", "0", "Rover", "False", "0", "100", "9999.0"])
    );
}

#[test]
fn test_seeded_random_is_repeatable() {
    let config = EngineConfig {
        random_seed: Some(7),
        ..Default::default()
    };
    let script = "set a = @random\nset b = @random\nset c = @random";

    let mut draws = Vec::new();
    for _ in 0..2 {
        let (mut session, _) = setup_with(config.clone());
        session.execute(&mut Script::new(script), Variables::new());
        let values: Vec<Value> = ["a", "b", "c"]
            .iter()
            .map(|name| session.variables()[*name].clone())
            .collect();
        for value in &values {
            let Value::Int(n) = value else {
                panic!("@random must be an int, got {value:?}");
            };
            assert!((1..=12).contains(n));
        }
        draws.push(values);
    }
    assert_eq!(draws[0], draws[1]);
}

#[test]
fn test_initial_variables_are_visible() {
    let (mut session, console) = setup();
    let mut variables = Variables::new();
    variables.insert("start".to_string(), Value::Int(41));

    session.execute(&mut Script::new("println start + 1"), variables);
    assert_eq!(console.lines(), printed(&["42"]));
}

/// Records every cursor move the interpreter makes.
struct Tracked {
    script: Script,
    jumps: Vec<usize>,
}

impl SourceProvider for Tracked {
    fn next_line(&mut self) -> Option<String> {
        self.script.next_line()
    }

    fn line_number(&self) -> usize {
        self.script.line_number()
    }

    fn set_line_number(&mut self, line: usize) {
        self.jumps.push(line);
        self.script.set_line_number(line);
    }

    fn restart(&mut self) {
        self.script.restart();
    }
}

#[test]
fn test_loops_jump_back_to_their_own_line() {
    let (mut session, _) = setup();
    let mut source = Tracked {
        script: Script::new("set x=0\nwhile x < 2\n    set x = x + 1\n"),
        jumps: Vec::new(),
    };
    session.execute(&mut source, Variables::new());

    // set, while, body, re-test, body, final re-test
    assert_eq!(source.jumps, vec![1, 2, 3, 2, 3, 2]);
}

#[test]
fn test_background_move_outlives_script() {
    let (mut session, _) = setup();
    let robot = Arc::clone(session.robot());

    let start = Instant::now();
    let outcome = session.execute(
        &mut Script::new("MOVE 100 INTIME 5 BACKGROUND\nTURN 90"),
        Variables::new(),
    );
    assert_eq!(outcome, Termination::EndOfScript);
    assert!(start.elapsed() < Duration::from_millis(300));

    let deadline = Instant::now() + Duration::from_secs(3);
    while session.engine().background_movers() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(session.engine().background_movers(), 0);
    // Turned south almost at once, so most of the distance went downward.
    assert!(robot.position().y > 250.0);
}

#[test]
fn test_stop_ends_forever_loop() {
    let (session, console) = setup();
    let robot = Arc::clone(session.robot());

    let handle = session
        .spawn(
            Script::new("forever\n    MOVE 1 INTIME 1\n    println 'tick'"),
            Variables::new(),
        )
        .unwrap();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(robot.status(), Status::Running);

    assert!(handle.stop(), "stop acknowledged");
    assert_eq!(handle.join(), Termination::Stopped);
    assert_eq!(robot.status(), Status::Stopped);
    assert!(!robot.snapshot().is_moving());
    assert!(!console.lines().is_empty());
}

#[test]
fn test_stop_interrupts_long_delay() {
    let (session, _) = setup();
    let handle = session
        .spawn(Script::new("DELAY 100\nprintln 'late'"), Variables::new())
        .unwrap();
    thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    assert!(handle.stop());
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(handle.join(), Termination::Stopped);
}
