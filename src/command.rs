//! Command engine: turns machine statements into robot state changes.
//!
//! The entry point is [`CommandEngine`]. Verbs are looked up in a table filled by
//! [`CommandEngine::populate_standard_verbs`]; extra names can be bound with
//! [`CommandEngine::set_verb`]. [`CommandEngine::execute`] parses one statement and
//! either applies it at once or hands back a [`Mover`] for the caller to
//! [`drive`](CommandEngine::drive).
//!
//! # Timed commands
//!
//! `MOVE`, `TURN` and `ARC` accept `INTIME <tenths>` and then `BACKGROUND`. A timed
//! command is split into equal per-tick increments. In the foreground the caller blocks
//! until every tick has run; in the background the increments run on their own thread
//! and the command finishes immediately.

use crate::collision::{check_arc_wall_bump, heads_into_wall};
use crate::config::EngineConfig;
use crate::error::CommandError;
use crate::geometry::{ArcPath, linear_delta, wheel_rps_needed};
use crate::mover::Mover;
use crate::peripherals::{SilentTone, Tone, Waveform};
use crate::robot::{Color, Kinematics, Mood, Robot};
use glam::Vec2;
use std::collections::HashMap;
use std::f32::consts::{PI, TAU};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// What the caller must do after [`CommandEngine::execute`].
#[derive(Debug)]
pub enum Completion {
    Finished,
    /// Run the mover to completion (see [`CommandEngine::drive`]) before going on.
    Deferred(Mover),
}

impl Completion {
    pub fn is_finished(&self) -> bool {
        matches!(self, Completion::Finished)
    }
}

/// `INTIME <tenths> [BACKGROUND]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    pub tenths: u32,
    pub background: bool,
}

/// A parsed machine statement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Move {
        distance: f32,
        timing: Option<Timing>,
    },
    /// Clockwise on screen for positive degrees.
    Turn {
        degrees: f32,
        timing: Option<Timing>,
    },
    /// Positive radius turns right.
    Arc {
        radius: f32,
        degrees: f32,
        timing: Option<Timing>,
    },
    Sound {
        frequency: f32,
        millis: Option<f32>,
        wait: bool,
    },
    Delay {
        tenths: u32,
    },
    Pos {
        x: f32,
        y: f32,
    },
    Dir {
        degrees: f32,
    },
    Angle {
        degrees: f32,
    },
    Compass {
        degrees: f32,
    },
    Paint(Color),
    Feel(Mood),
}

/// The operation a verb name is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Move,
    Turn,
    Arc,
    Sound,
    Delay,
    Pos,
    Dir,
    Angle,
    Compass,
    Paint(Color),
    Feel(Mood),
}

impl Verb {
    pub fn usage(self) -> &'static str {
        match self {
            Verb::Move => "MOVE <distance> [INTIME <tenths> [BACKGROUND]]",
            Verb::Turn => "TURN <degrees> [INTIME <tenths> [BACKGROUND]]",
            Verb::Arc => "ARC <radius> ANGLE <degrees> [INTIME <tenths> [BACKGROUND]]",
            Verb::Sound => "SOUND <frequency> [<millis> [WAIT]]",
            Verb::Delay => "DELAY <tenths>",
            Verb::Pos => "POS <x> <y>",
            Verb::Dir => "DIR <degrees>",
            Verb::Angle => "ANGLE <degrees>",
            Verb::Compass => "COMPASS <degrees>",
            Verb::Paint(_) => "a color name on its own",
            Verb::Feel(_) => "ANGRY or HAPPY on its own",
        }
    }
}

fn number(word: &str) -> Result<f32, CommandError> {
    word.parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandError::BadNumber(word.to_string()))
}

fn tenths(word: &str) -> Result<u32, CommandError> {
    let value = number(word)?;
    if value < 0.0 || value > u32::MAX as f32 {
        return Err(CommandError::BadNumber(word.to_string()));
    }
    Ok(value.round() as u32)
}

fn is_word(word: &str, expected: &str) -> bool {
    word.eq_ignore_ascii_case(expected)
}

/// Reads `INTIME <tenths> [BACKGROUND]` from the words after a command's own arguments.
fn timing(verb: Verb, words: &[&str]) -> Result<Option<Timing>, CommandError> {
    let usage = CommandError::Usage {
        usage: verb.usage(),
    };
    match words {
        [] => Ok(None),
        [intime, t] if is_word(intime, "INTIME") => Ok(Some(Timing {
            tenths: tenths(t)?,
            background: false,
        })),
        [intime, t, background]
            if is_word(intime, "INTIME") && is_word(background, "BACKGROUND") =>
        {
            Ok(Some(Timing {
                tenths: tenths(t)?,
                background: true,
            }))
        }
        _ => Err(usage),
    }
}

/// Degrees folded into `0..360`, as radians.
fn heading_from_degrees(degrees: f32) -> f32 {
    degrees.rem_euclid(360.0).to_radians()
}

/// Decrements the background count when a mover thread ends, however it ends.
struct BackgroundGuard(Arc<AtomicUsize>);

impl Drop for BackgroundGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Executes machine statements for one robot.
pub struct CommandEngine {
    robot: Arc<Robot>,
    tone: Arc<dyn Tone>,
    config: Arc<EngineConfig>,
    running: Arc<AtomicBool>,
    background: Arc<AtomicUsize>,
    verbs: HashMap<String, Verb>,
}

impl CommandEngine {
    /// Creates an engine with an empty verb table and a silent speaker.
    pub fn new(robot: Arc<Robot>, config: Arc<EngineConfig>) -> Self {
        Self {
            robot,
            tone: Arc::new(SilentTone),
            config,
            running: Arc::new(AtomicBool::new(true)),
            background: Arc::new(AtomicUsize::new(0)),
            verbs: HashMap::new(),
        }
    }

    pub fn with_tone(mut self, tone: Arc<dyn Tone>) -> Self {
        self.tone = tone;
        self
    }

    /// Binds `name` (case-insensitive) to `verb`, replacing any earlier binding.
    pub fn set_verb(&mut self, name: &str, verb: Verb) {
        self.verbs.insert(name.to_ascii_uppercase(), verb);
    }

    /// Registers every built-in verb, `HEADING` as an alias of `COMPASS` and one verb per
    /// color name.
    pub fn populate_standard_verbs(&mut self) {
        let mappings = [
            // Motion
            ("MOVE", Verb::Move),
            ("TURN", Verb::Turn),
            ("ARC", Verb::Arc),
            // Placement
            ("POS", Verb::Pos),
            ("DIR", Verb::Dir),
            ("ANGLE", Verb::Angle),
            ("COMPASS", Verb::Compass),
            ("HEADING", Verb::Compass),
            // Timing and sound
            ("DELAY", Verb::Delay),
            ("SOUND", Verb::Sound),
            // Indicator
            ("ANGRY", Verb::Feel(Mood::Angry)),
            ("HAPPY", Verb::Feel(Mood::Happy)),
        ];

        for (name, verb) in mappings {
            self.set_verb(name, verb);
        }
        for color in Color::ALL {
            self.set_verb(color.name(), Verb::Paint(color));
        }
    }

    pub fn verb(&self, name: &str) -> Option<Verb> {
        self.verbs.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn robot(&self) -> &Arc<Robot> {
        &self.robot
    }

    /// Parses `text` against the verb table, checking each verb's arguments.
    pub fn parse(&self, text: &str) -> Result<Command, CommandError> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Err(CommandError::Empty);
        };
        let verb = self
            .verb(name)
            .ok_or_else(|| CommandError::UnknownVerb(name.to_string()))?;
        let usage = CommandError::Usage {
            usage: verb.usage(),
        };

        let command = match (verb, args) {
            (Verb::Move, [distance, rest @ ..]) => Command::Move {
                distance: number(distance)?,
                timing: timing(verb, rest)?,
            },
            (Verb::Turn, [degrees, rest @ ..]) => Command::Turn {
                degrees: number(degrees)?,
                timing: timing(verb, rest)?,
            },
            (Verb::Arc, [radius, angle, degrees, rest @ ..]) if is_word(angle, "ANGLE") => {
                Command::Arc {
                    radius: number(radius)?,
                    degrees: number(degrees)?,
                    timing: timing(verb, rest)?,
                }
            }
            (Verb::Sound, [frequency]) => Command::Sound {
                frequency: number(frequency)?,
                millis: None,
                wait: false,
            },
            (Verb::Sound, [frequency, millis]) => Command::Sound {
                frequency: number(frequency)?,
                millis: Some(number(millis)?),
                wait: false,
            },
            (Verb::Sound, [frequency, millis, wait]) if is_word(wait, "WAIT") => Command::Sound {
                frequency: number(frequency)?,
                millis: Some(number(millis)?),
                wait: true,
            },
            (Verb::Delay, [t]) => Command::Delay { tenths: tenths(t)? },
            (Verb::Pos, [x, y]) => Command::Pos {
                x: number(x)?,
                y: number(y)?,
            },
            (Verb::Dir, [degrees]) => Command::Dir {
                degrees: number(degrees)?,
            },
            (Verb::Angle, [degrees]) => Command::Angle {
                degrees: number(degrees)?,
            },
            (Verb::Compass, [degrees]) => Command::Compass {
                degrees: number(degrees)?,
            },
            (Verb::Paint(color), []) => Command::Paint(color),
            (Verb::Feel(mood), []) => Command::Feel(mood),
            _ => return Err(usage),
        };
        Ok(command)
    }

    /// Parses and applies one machine statement.
    pub fn execute(&self, text: &str) -> Result<Completion, CommandError> {
        let command = self.parse(text)?;
        self.apply(command)
    }

    /// Applies an already parsed command.
    pub fn apply(&self, command: Command) -> Result<Completion, CommandError> {
        let robot = &self.robot;
        match command {
            Command::Move { distance, timing } => {
                Ok(self.movement(self.move_by(distance, timing), timing))
            }
            Command::Turn { degrees, timing } => {
                Ok(self.movement(self.turn_by(degrees, timing), timing))
            }
            Command::Arc {
                radius,
                degrees,
                timing,
            } => {
                if degrees == 0.0 {
                    return Ok(Completion::Finished);
                }
                let arc = self.arc_by(radius, degrees, timing)?;
                Ok(self.movement(arc, timing))
            }
            Command::Sound {
                frequency,
                millis,
                wait,
            } => Ok(self.sound(frequency, millis, wait)),
            Command::Delay { tenths } => {
                if tenths == 0 {
                    return Ok(Completion::Finished);
                }
                let ticks = self.config.ticks_for_tenths(tenths);
                Ok(Completion::Deferred(Mover::pause("DELAY", ticks)))
            }
            Command::Pos { x, y } => {
                robot.set_position(Vec2::new(x, y));
                Ok(Completion::Finished)
            }
            Command::Dir { degrees } => {
                robot.set_heading(heading_from_degrees(degrees));
                Ok(Completion::Finished)
            }
            Command::Angle { degrees } => {
                robot.set_heading(heading_from_degrees(360.0 - degrees));
                Ok(Completion::Finished)
            }
            Command::Compass { degrees } => {
                robot.set_heading(heading_from_degrees(degrees + 270.0));
                Ok(Completion::Finished)
            }
            Command::Paint(color) => {
                robot.set_color(color);
                Ok(Completion::Finished)
            }
            Command::Feel(mood) => {
                robot.set_mood(mood);
                Ok(Completion::Finished)
            }
        }
    }

    /// Instant changes return `None`; timed ones come back as a mover.
    fn movement(&self, mover: Option<Mover>, timing: Option<Timing>) -> Completion {
        match (mover, timing) {
            (Some(mover), Some(Timing { background: true, .. })) => {
                self.spawn_background(mover);
                Completion::Finished
            }
            (Some(mover), _) => Completion::Deferred(mover),
            (None, _) => Completion::Finished,
        }
    }

    fn seconds(tenths: u32) -> f32 {
        tenths as f32 / 10.0
    }

    fn move_by(&self, distance: f32, timing: Option<Timing>) -> Option<Mover> {
        let robot = &self.robot;
        let Some(Timing { tenths, .. }) = timing.filter(|t| t.tenths > 0) else {
            robot.update(|k| k.position += linear_delta(k.heading, distance));
            return None;
        };

        let ticks = self.config.ticks_for_tenths(tenths);
        let per_tick = distance / ticks as f32;
        let rps = wheel_rps_needed(distance, Self::seconds(tenths), robot.wheel_diameter());
        robot.set_wheel_rps(rps, rps);

        let step = move |robot: &Robot| {
            let arena = robot.arena();
            let margin = robot.wall_margin();
            robot.update(|k| {
                // reversing drives tail first, so test the wall behind the robot
                let travel = if per_tick < 0.0 { k.heading + PI } else { k.heading };
                let probe = Kinematics {
                    heading: travel,
                    ..*k
                };
                if heads_into_wall(&probe, arena, margin) {
                    k.heading = (k.heading + PI).rem_euclid(TAU);
                }
                k.position += linear_delta(k.heading, per_tick);
            });
        };
        Some(Mover::new("MOVE", ticks, step).on_finish(Robot::stop_wheels))
    }

    fn turn_by(&self, degrees: f32, timing: Option<Timing>) -> Option<Mover> {
        let robot = &self.robot;
        let radians = degrees.to_radians();
        let Some(Timing { tenths, .. }) = timing.filter(|t| t.tenths > 0) else {
            robot.update(|k| k.heading = (k.heading + radians).rem_euclid(TAU));
            return None;
        };

        let ticks = self.config.ticks_for_tenths(tenths);
        let per_tick = radians / ticks as f32;
        let wheel_travel = radians * robot.size() / 2.0;
        let rps = wheel_rps_needed(wheel_travel, Self::seconds(tenths), robot.wheel_diameter());
        robot.set_wheel_rps(rps, -rps);

        let step = move |robot: &Robot| {
            robot.update(|k| k.heading = (k.heading + per_tick).rem_euclid(TAU));
        };
        Some(Mover::new("TURN", ticks, step).on_finish(Robot::stop_wheels))
    }

    fn arc_by(
        &self,
        radius: f32,
        degrees: f32,
        timing: Option<Timing>,
    ) -> Result<Option<Mover>, CommandError> {
        let robot = &self.robot;
        let start = robot.snapshot();
        let mut path = ArcPath::start(start.position, start.heading, radius)?;
        // only the radius sign picks the turn direction
        let turned = degrees.abs().to_radians();
        let sweep = turned * path.sense();

        let Some(Timing { tenths, .. }) = timing.filter(|t| t.tenths > 0) else {
            let position = path.advance(sweep);
            robot.update(|k| {
                k.position = position;
                k.heading = (k.heading + sweep).rem_euclid(TAU);
            });
            return Ok(None);
        };

        let ticks = self.config.ticks_for_tenths(tenths);
        let per_tick = sweep / ticks as f32;
        let seconds = Self::seconds(tenths);
        let half = start.size / 2.0;
        let diameter = robot.wheel_diameter();
        let outer = wheel_rps_needed((radius.abs() + half) * turned, seconds, diameter);
        let inner = wheel_rps_needed((radius.abs() - half) * turned, seconds, diameter);
        if radius < 0.0 {
            robot.set_wheel_rps(inner, outer);
        } else {
            robot.set_wheel_rps(outer, inner);
        }

        let step = move |robot: &Robot| {
            let arena = robot.arena();
            let margin = robot.wall_margin();
            robot.update(|k| {
                k.position = path.advance(per_tick);
                k.heading = (k.heading + per_tick).rem_euclid(TAU);
                if let Some(reflection) = check_arc_wall_bump(k, arena, margin, path.centre) {
                    debug!(
                        centre = ?reflection.centre,
                        radius = reflection.radius,
                        "arc reflected"
                    );
                    k.heading = reflection.heading;
                    path = ArcPath {
                        centre: reflection.centre,
                        radius: reflection.radius * path.sense(),
                        angle: reflection.angle,
                    };
                }
            });
        };
        Ok(Some(Mover::new("ARC", ticks, step).on_finish(Robot::stop_wheels)))
    }

    fn sound(&self, frequency: f32, millis: Option<f32>, wait: bool) -> Completion {
        if frequency <= 0.0 {
            self.tone.stop();
            return Completion::Finished;
        }
        let millis = millis.unwrap_or(self.config.default_tone_ms as f32);
        if millis <= 0.0 {
            return Completion::Finished;
        }

        let millis = millis.round() as u32;
        self.tone.play_tone(
            frequency.round() as u32,
            Duration::from_millis(u64::from(millis)),
            Waveform::default(),
        );
        if wait {
            Completion::Deferred(Mover::pause("SOUND", self.config.ticks_for_millis(millis)))
        } else {
            Completion::Finished
        }
    }

    /// Runs a deferred mover on the calling thread. Returns `false` if it was cut short
    /// by [`stop`](Self::stop).
    pub fn drive(&self, mover: Mover) -> bool {
        mover.run(&self.robot, self.config.tick_interval(), &self.running)
    }

    fn spawn_background(&self, mover: Mover) {
        let robot = Arc::clone(&self.robot);
        let running = Arc::clone(&self.running);
        let interval = self.config.tick_interval();
        let name = format!("{}-{}", robot.name(), mover.label().to_ascii_lowercase());

        self.background.fetch_add(1, Ordering::AcqRel);
        let guard = BackgroundGuard(Arc::clone(&self.background));

        let spawned = thread::Builder::new().name(name).spawn(move || {
            let _guard = guard;
            mover.run(&robot, interval, &running);
        });
        if let Err(err) = spawned {
            // the closure (and with it the guard) was dropped, so the count is already back
            error!(robot = self.robot.name(), %err, "unable to start background mover");
        }
    }

    /// Cancels every running mover and silences the speaker.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.tone.stop();
    }

    /// Allows movers to run again after [`stop`](Self::stop).
    pub fn resume(&self) {
        self.running.store(true, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of background movers still ticking.
    pub fn background_movers(&self) -> usize {
        self.background.load(Ordering::Acquire)
    }

    pub(crate) fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub(crate) fn background_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.background)
    }

    pub(crate) fn tone(&self) -> Arc<dyn Tone> {
        Arc::clone(&self.tone)
    }
}
