//! Script interpreter for one robot.
//!
//! The entry point is [`Session`]. Build it for a robot, attach collaborators with the
//! `with_*` methods, then call [`Session::execute`] with a source, or
//! [`Session::spawn`] to run it on its own thread.
//!
//! # Execution model
//!
//! The source is parsed once into a [`Program`]. Execution walks that tree with an
//! explicit stack of frames: one per open block, where loop frames remember the line of
//! their `while`/`forever` so the source cursor can be moved back there on every pass.
//! `break` and `continue` unwind to the innermost loop frame.
//!
//! Bad statements never end the run. They are reported on the [`Console`] as
//! `ERROR: <message>. At line <n>` (or `WARNING: ...`) and execution moves on.

use crate::command::{CommandEngine, Completion};
use crate::config::EngineConfig;
use crate::expr::{Environment, Expr, Sensor, Value};
use crate::peripherals::{Console, Isolated, Neighborhood, Tone, TracingConsole};
use crate::program::{Program, Stmt};
use crate::robot::{Robot, Status};
use crate::script::SourceProvider;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fmt::Display;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Script variables by name.
pub type Variables = HashMap<String, Value>;

/// Why [`Session::execute`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    EndOfScript,
    Stopped,
}

/// Variables and sensors as an expression sees them.
struct Scope<'a> {
    variables: &'a Variables,
    robot: &'a Robot,
    neighborhood: &'a dyn Neighborhood,
    rng: &'a mut StdRng,
    config: &'a EngineConfig,
}

impl Environment for Scope<'_> {
    fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn sensor(&mut self, sensor: Sensor) -> Value {
        let state = self.robot.snapshot();
        match sensor {
            Sensor::X => Value::Int(state.position.x.round() as i64),
            Sensor::Y => Value::Int(state.position.y.round() as i64),
            Sensor::Angle => Value::Int(state.angle()),
            Sensor::Compass => Value::Int(state.compass()),
            Sensor::Distance => {
                let distance = self
                    .neighborhood
                    .nearest_in_cone(self.robot)
                    .map_or(self.config.out_of_range, |(_, distance)| distance);
                Value::Float(f64::from(distance))
            }
            Sensor::Range => Value::Int(self.config.sensor_range.round() as i64),
            Sensor::Light => Value::Int(0),
            Sensor::Moving => Value::Bool(state.is_moving()),
            Sensor::Random => Value::Int(self.rng.gen_range(1..=self.config.random_max.max(1))),
            Sensor::Name => Value::Str(self.robot.name().to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum FrameKind<'p> {
    Block,
    While { line: usize, condition: &'p Expr },
    Forever { line: usize },
}

/// An open block and the index of its next statement.
#[derive(Clone, Copy, Debug)]
struct Frame<'p> {
    kind: FrameKind<'p>,
    stmts: &'p [Stmt],
    next: usize,
}

impl<'p> Frame<'p> {
    fn new(kind: FrameKind<'p>, stmts: &'p [Stmt]) -> Self {
        Self {
            kind,
            stmts,
            next: 0,
        }
    }

    fn is_loop(&self) -> bool {
        !matches!(self.kind, FrameKind::Block)
    }
}

/// Cancels a running [`Session`] from another thread.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    movers: Arc<AtomicBool>,
    background: Arc<AtomicUsize>,
    terminated: Arc<AtomicBool>,
    tone: Arc<dyn Tone>,
    timeout: Duration,
}

impl StopHandle {
    /// Asks the script and all of its movers to stop, then waits until the script has
    /// returned and no background mover is left, or the timeout passes.
    ///
    /// Returns `true` if termination was observed in time.
    pub fn stop(&self) -> bool {
        self.running.store(false, Ordering::Release);
        self.movers.store(false, Ordering::Release);
        self.tone.stop();

        let deadline = Instant::now() + self.timeout;
        loop {
            if self.terminated.load(Ordering::Acquire)
                && self.background.load(Ordering::Acquire) == 0
            {
                return true;
            }
            if Instant::now() >= deadline {
                warn!("script did not acknowledge stop in time");
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// A session running on its own thread.
pub struct ScriptHandle {
    join: JoinHandle<Termination>,
    stop: StopHandle,
}

impl ScriptHandle {
    pub fn stop(&self) -> bool {
        self.stop.stop()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the script to end. A panicked script counts as stopped.
    pub fn join(self) -> Termination {
        self.join.join().unwrap_or(Termination::Stopped)
    }
}

/// Interpreter state owned by one robot.
pub struct Session {
    robot: Arc<Robot>,
    config: Arc<EngineConfig>,
    engine: CommandEngine,
    console: Arc<dyn Console>,
    neighborhood: Arc<dyn Neighborhood>,
    variables: Variables,
    rng: StdRng,
    running: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
}

impl Session {
    /// Creates a session with the standard verbs, console output sent to `tracing`, a
    /// silent speaker and no neighbours.
    pub fn new(robot: Arc<Robot>, config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let mut engine = CommandEngine::new(Arc::clone(&robot), Arc::clone(&config));
        engine.populate_standard_verbs();
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            robot,
            config,
            engine,
            console: Arc::new(TracingConsole),
            neighborhood: Arc::new(Isolated),
            variables: Variables::new(),
            rng,
            running: Arc::new(AtomicBool::new(false)),
            terminated: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    pub fn with_tone(mut self, tone: Arc<dyn Tone>) -> Self {
        self.engine = self.engine.with_tone(tone);
        self
    }

    pub fn with_neighborhood(mut self, neighborhood: Arc<dyn Neighborhood>) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    pub fn robot(&self) -> &Arc<Robot> {
        &self.robot
    }

    pub fn engine(&self) -> &CommandEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut CommandEngine {
        &mut self.engine
    }

    /// Variables as the last run left them.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            movers: self.engine.running_flag(),
            background: self.engine.background_count(),
            terminated: Arc::clone(&self.terminated),
            tone: self.engine.tone(),
            timeout: self.config.stop_timeout(),
        }
    }

    /// Runs `source` from its first line with `variables` as the starting variables.
    ///
    /// Returns when the script ends or a [`StopHandle`] stops it. Background movers
    /// started by the script keep running after a normal end.
    pub fn execute(
        &mut self,
        source: &mut dyn SourceProvider,
        variables: Variables,
    ) -> Termination {
        self.begin();
        self.run(source, variables)
    }

    /// Runs the session on a thread of its own.
    pub fn spawn<S>(mut self, mut source: S, variables: Variables) -> io::Result<ScriptHandle>
    where
        S: SourceProvider + Send + 'static,
    {
        let stop = self.stop_handle();
        // flagged here so a stop issued before the thread is scheduled still counts
        self.begin();
        let join = thread::Builder::new()
            .name(format!("{}-script", self.robot.name()))
            .spawn(move || self.run(&mut source, variables))?;
        Ok(ScriptHandle { join, stop })
    }

    fn begin(&self) {
        self.terminated.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
        self.engine.resume();
    }

    fn run(&mut self, source: &mut dyn SourceProvider, variables: Variables) -> Termination {
        self.variables = variables;
        self.robot.set_status(Status::Running);
        info!(robot = self.robot.name(), "script started");

        let program = Program::parse(source, self.config.tab_width);
        let outcome = self.walk(&program, source);

        self.robot.set_status(Status::Stopped);
        self.running.store(false, Ordering::Release);
        info!(robot = self.robot.name(), ?outcome, "script ended");
        self.terminated.store(true, Ordering::Release);
        outcome
    }

    fn walk(&mut self, program: &Program, source: &mut dyn SourceProvider) -> Termination {
        let mut frames = vec![Frame::new(FrameKind::Block, &program.body)];

        while let Some(frame) = frames.last_mut() {
            if !self.is_running() {
                return Termination::Stopped;
            }

            if frame.next >= frame.stmts.len() {
                match frame.kind {
                    FrameKind::Block => {
                        frames.pop();
                    }
                    FrameKind::While { line, condition } => {
                        source.set_line_number(line);
                        if self.test(condition, line) == Some(true) {
                            frame.next = 0;
                        } else {
                            frames.pop();
                        }
                    }
                    FrameKind::Forever { line } => {
                        source.set_line_number(line);
                        frame.next = 0;
                        thread::yield_now();
                    }
                }
                continue;
            }

            let stmts = frame.stmts;
            let stmt = &stmts[frame.next];
            frame.next += 1;
            source.set_line_number(stmt.line());
            self.step(stmt, &mut frames);
        }

        if self.is_running() {
            Termination::EndOfScript
        } else {
            Termination::Stopped
        }
    }

    fn step<'p>(&mut self, stmt: &'p Stmt, frames: &mut Vec<Frame<'p>>) {
        match stmt {
            Stmt::If {
                line,
                condition,
                then,
                otherwise,
            } => {
                let Some(condition) = self.compiled(condition, *line) else {
                    return;
                };
                match self.test(condition, *line) {
                    Some(true) => frames.push(Frame::new(FrameKind::Block, then)),
                    Some(false) => {
                        if let Some(otherwise) = otherwise {
                            frames.push(Frame::new(FrameKind::Block, otherwise));
                        }
                    }
                    // reported already; neither branch runs
                    None => {}
                }
            }
            Stmt::While {
                line,
                condition,
                body,
            } => {
                let Some(condition) = self.compiled(condition, *line) else {
                    return;
                };
                if self.test(condition, *line) == Some(true) {
                    let kind = FrameKind::While {
                        line: *line,
                        condition,
                    };
                    frames.push(Frame::new(kind, body));
                }
            }
            Stmt::Forever { line, body } => {
                frames.push(Frame::new(FrameKind::Forever { line: *line }, body));
            }
            Stmt::Group { line, body, closed } => {
                if !closed {
                    self.warning("Expected END", *line);
                }
                frames.push(Frame::new(FrameKind::Block, body));
            }
            Stmt::Break { line } => match frames.iter().rposition(Frame::is_loop) {
                Some(idx) => frames.truncate(idx),
                None => self.warning("BREAK outside of a loop", *line),
            },
            Stmt::Continue { line } => match frames.iter().rposition(Frame::is_loop) {
                Some(idx) => {
                    frames.truncate(idx + 1);
                    let frame = &mut frames[idx];
                    frame.next = frame.stmts.len();
                }
                None => self.warning("CONTINUE outside of a loop", *line),
            },
            Stmt::StrayEnd { line } => self.warning("END without BEGIN", *line),
            Stmt::StrayElse { line } => self.warning("ELSE without IF", *line),
            Stmt::Set { line, name, value } => {
                if let Some(value) = self.evaluate(value, *line) {
                    self.variables.insert(name.clone(), value);
                }
            }
            Stmt::Print {
                line,
                value,
                newline,
            } => {
                if let Some(value) = self.evaluate(value, *line) {
                    let text = value.to_string();
                    if *newline {
                        self.console.println(self.robot.name(), &text);
                    } else {
                        self.console.print(self.robot.name(), &text);
                    }
                }
            }
            Stmt::Command { line, text } => match self.engine.execute(text) {
                Ok(Completion::Finished) => {}
                Ok(Completion::Deferred(mover)) => {
                    self.engine.drive(mover);
                }
                Err(err) => self.error(err, *line),
            },
            Stmt::Invalid { line, error } => self.error(error, *line),
        }
    }

    fn compiled<'p, E: Display>(
        &self,
        condition: &'p Result<Expr, E>,
        line: usize,
    ) -> Option<&'p Expr> {
        match condition {
            Ok(expr) => Some(expr),
            Err(err) => {
                self.error(err, line);
                None
            }
        }
    }

    fn evaluate(&mut self, expr: &Expr, line: usize) -> Option<Value> {
        let mut scope = Scope {
            variables: &self.variables,
            robot: &self.robot,
            neighborhood: self.neighborhood.as_ref(),
            rng: &mut self.rng,
            config: &self.config,
        };
        match expr.evaluate(&mut scope) {
            Ok(value) => Some(value),
            Err(err) => {
                self.error(err, line);
                None
            }
        }
    }

    /// Truthiness of `condition`, or `None` once an evaluation error has been reported.
    fn test(&mut self, condition: &Expr, line: usize) -> Option<bool> {
        self.evaluate(condition, line).map(|value| value.is_truthy())
    }

    fn error(&self, err: impl Display, line: usize) {
        error!(robot = self.robot.name(), line, %err, "script error");
        self.console
            .println(self.robot.name(), &format!("ERROR: {err}. At line {line}"));
    }

    fn warning(&self, message: &str, line: usize) {
        warn!(robot = self.robot.name(), line, "{message}");
        self.console
            .println(self.robot.name(), &format!("WARNING: {message}. At line {line}"));
    }
}
