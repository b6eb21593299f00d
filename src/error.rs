//! Error types for every recoverable failure in the engine.
//!
//! Apart from [`SwarmError`], none of these abort a running script: the interpreter
//! reports them to the console together with the line number and moves on.

use crate::robot::Color;
use thiserror::Error;

/// A heading that could not be placed in one of the four quadrants.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    #[error("unable to fit heading into the 0-360 degree range, got {0}")]
    InvalidAngle(f32),
}

/// A machine statement the command engine could not run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownVerb(String),
    #[error("expected {usage}")]
    Usage { usage: &'static str },
    #[error("`{0}` is not a valid number")]
    BadNumber(String),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Lexing, parsing or evaluation failure of a script expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("unknown sensor `@{0}`")]
    UnknownSensor(String),
    #[error("unexpected `{0}`")]
    UnexpectedToken(String),
    #[error("expression ended unexpectedly")]
    UnexpectedEnd,
    #[error("`{0}` is not defined")]
    UndefinedVariable(String),
    #[error("unsupported operand types for `{op}`: {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("bad operand type for `{op}`: {operand}")]
    BadOperand {
        op: &'static str,
        operand: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("expression nested more than {0} levels deep")]
    TooDeep(usize),
}

/// Anything the interpreter reports as a syntax error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("expected something of the form <var>=<expr>")]
    BadSet,
    #[error("`{0}` is not a valid variable name")]
    BadName(String),
    #[error(transparent)]
    Expression(#[from] ExprError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Rejections raised while building a swarm or adding a robot to it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SwarmError {
    #[error("the arena {width}x{height} is too small, it must be at least {min}x{min}")]
    ArenaTooSmall { width: f32, height: f32, min: f32 },
    #[error("a robot called `{0}` already exists")]
    DuplicateName(String),
    #[error("`{existing}` is already {color}, robots must all be different colors")]
    DuplicateColor { existing: String, color: Color },
    #[error("`{name}` would start outside the arena at ({x}, {y})")]
    OutsideArena { name: String, x: f32, y: f32 },
}
