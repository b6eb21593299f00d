//! # pixelbot-script
//!
//! Scripting engine for simulated PixelBot robots. Each robot runs its own small
//! indentation-structured script (`if`/`else`, `while`, `forever`, `set`, `print`, and
//! `@` sensors such as `@x` or `@distance`), and every other line is a machine command
//! like `MOVE 100 INTIME 20 BACKGROUND` or `ARC 50 ANGLE 90`.
//!
//! Scripts drive a [`Robot`] through a [`Session`]. Timed commands are spread over ticks,
//! bounce off the arena walls, and can run in the background while the script carries
//! on. A [`Swarm`] keeps the robots of one arena together and answers the sensor-cone
//! queries behind `@distance`.

pub mod collision;
pub mod command;
pub mod config;
pub mod error;
pub mod expr;
pub mod geometry;
pub mod interpreter;
pub mod mover;
pub mod peripherals;
pub mod program;
pub mod robot;
pub mod script;
pub mod swarm;

pub use command::{Command, CommandEngine, Completion, Timing, Verb};
pub use config::EngineConfig;
pub use error::*;
pub use expr::{Environment, Expr, Sensor, Value};
pub use interpreter::{ScriptHandle, Session, StopHandle, Termination, Variables};
pub use mover::Mover;
pub use peripherals::*;
pub use program::{Program, Stmt};
pub use robot::*;
pub use script::{Script, SourceProvider};
pub use swarm::Swarm;
