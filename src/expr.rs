//! Script expressions.
//!
//! Expressions are parsed once into an [`Expr`] tree and evaluated against an
//! [`Environment`] that supplies named variables and `@` sensor readings. The grammar,
//! loosest binding first:
//!
//! ```text
//! or      := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | compare
//! compare := sum (("<" | "<=" | ">" | ">=" | "==" | "!=") sum)*
//! sum     := term (("+" | "-") term)*
//! term    := unary (("*" | "/" | "//" | "%") unary)*
//! unary   := ("-" | "+") unary | power
//! power   := atom ("**" unary)?
//! atom    := number | string | True | False | name | @sensor | "(" or ")"
//! ```
//!
//! Comparisons chain (`0 < x < 10`), `and`/`or` short-circuit and yield one of their
//! operands, `/` always divides to a float and `//`/`%` round towards negative infinity.

use crate::error::ExprError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A value a script variable can hold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
        }
    }

    fn number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

#[derive(Clone, Copy, Debug)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

/// The live readings a script can reference with `@`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sensor {
    X,
    Y,
    Angle,
    Compass,
    Distance,
    Range,
    Light,
    Moving,
    Random,
    Name,
}

impl Sensor {
    pub const ALL: [Sensor; 10] = [
        Sensor::X,
        Sensor::Y,
        Sensor::Angle,
        Sensor::Compass,
        Sensor::Distance,
        Sensor::Range,
        Sensor::Light,
        Sensor::Moving,
        Sensor::Random,
        Sensor::Name,
    ];

    /// Case-insensitive lookup, without the `@`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sensor| sensor.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Sensor::X => "x",
            Sensor::Y => "y",
            Sensor::Angle => "angle",
            Sensor::Compass => "compass",
            Sensor::Distance => "distance",
            Sensor::Range => "range",
            Sensor::Light => "light",
            Sensor::Moving => "moving",
            Sensor::Random => "random",
            Sensor::Name => "name",
        }
    }
}

/// Supplies values while an expression is evaluated.
pub trait Environment {
    fn variable(&self, name: &str) -> Option<Value>;
    fn sensor(&mut self, sensor: Sensor) -> Value;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
        }
    }
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }
}

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    Sensor(Sensor),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn parse(text: &str) -> Result<Expr, ExprError> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
        }
    }

    pub fn evaluate(&self, env: &mut dyn Environment) -> Result<Value, ExprError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => env
                .variable(name)
                .ok_or_else(|| ExprError::UndefinedVariable(name.clone())),
            Expr::Sensor(sensor) => Ok(env.sensor(*sensor)),
            Expr::Unary(op, operand) => unary(*op, operand.evaluate(env)?),
            Expr::Binary(op, left, right) => {
                let left = left.evaluate(env)?;
                let right = right.evaluate(env)?;
                binary(*op, &left, &right)
            }
            Expr::Compare(first, rest) => {
                let mut left = first.evaluate(env)?;
                for (op, expr) in rest {
                    let right = expr.evaluate(env)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let left = left.evaluate(env)?;
                if left.is_truthy() {
                    right.evaluate(env)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = left.evaluate(env)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    right.evaluate(env)
                }
            }
        }
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, ExprError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Pos | UnaryOp::Neg => {
            let symbol = if op == UnaryOp::Neg { "-" } else { "+" };
            let number = value.number().ok_or(ExprError::BadOperand {
                op: symbol,
                operand: value.type_name(),
            })?;
            Ok(match (op, number) {
                (UnaryOp::Neg, Number::Int(i)) => {
                    Value::Int(i.checked_neg().ok_or(ExprError::Overflow)?)
                }
                (UnaryOp::Neg, Number::Float(f)) => Value::Float(-f),
                (_, Number::Int(i)) => Value::Int(i),
                (_, Number::Float(f)) => Value::Float(f),
            })
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    if let (BinaryOp::Add, Value::Str(a), Value::Str(b)) = (op, left, right) {
        return Ok(Value::Str(format!("{a}{b}")));
    }
    let mismatch = || ExprError::TypeMismatch {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };
    let a = left.number().ok_or_else(mismatch)?;
    let b = right.number().ok_or_else(mismatch)?;

    match (a, b) {
        (Number::Int(a), Number::Int(b)) => int_binary(op, a, b),
        _ => float_binary(op, a.as_f64(), b.as_f64()),
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<Value, ExprError> {
    let value = match op {
        BinaryOp::Add => a.checked_add(b).ok_or(ExprError::Overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or(ExprError::Overflow)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or(ExprError::Overflow)?,
        BinaryOp::Div => return float_binary(op, a as f64, b as f64),
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            let quotient = a.checked_div(b).ok_or(ExprError::Overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                quotient - 1
            } else {
                quotient
            }
        }
        BinaryOp::Rem => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            let rem = a.checked_rem(b).ok_or(ExprError::Overflow)?;
            if rem != 0 && ((rem < 0) != (b < 0)) {
                rem + b
            } else {
                rem
            }
        }
        BinaryOp::Pow => match u32::try_from(b) {
            Ok(exp) => a.checked_pow(exp).ok_or(ExprError::Overflow)?,
            Err(_) => return float_binary(op, a as f64, b as f64),
        },
    };
    Ok(Value::Int(value))
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Result<Value, ExprError> {
    let divides = matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Rem);
    if divides && b == 0.0 {
        return Err(ExprError::DivisionByZero);
    }
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Rem => a - b * (a / b).floor(),
        BinaryOp::Pow => a.powf(b),
    };
    Ok(Value::Float(value))
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExprError> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (left.number(), right.number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
            (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
            _ => {
                // mixed strings and numbers are never equal and cannot be ordered
                return match op {
                    CompareOp::Eq => Ok(false),
                    CompareOp::Ne => Ok(true),
                    _ => Err(ExprError::TypeMismatch {
                        op: op.symbol(),
                        left: left.type_name(),
                        right: right.type_name(),
                    }),
                };
            }
        },
    };

    // NaN compares unequal to everything
    let Some(ordering) = ordering else {
        return Ok(op == CompareOp::Ne);
    };
    Ok(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
    })
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Sensor(Sensor),
    Symbol(&'static str),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(i) => write!(f, "{i}"),
            Token::Float(x) => write!(f, "{x}"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Name(name) => f.write_str(name),
            Token::Sensor(sensor) => write!(f, "@{}", sensor.name()),
            Token::Symbol(symbol) => f.write_str(symbol),
        }
    }
}

/// Longest first so `**` wins over `*`.
const SYMBOLS: [&str; 16] = [
    "**", "//", "<=", ">=", "==", "!=", "<", ">", "+", "-", "*", "/", "%", "(", ")", "=",
];

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if ch.is_whitespace() {
            rest = &rest[ch.len_utf8()..];
            continue;
        }

        let leading_dot = ch == '.' && rest[1..].starts_with(|c: char| c.is_ascii_digit());
        if ch.is_ascii_digit() || leading_dot {
            let end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(rest.len());
            let literal = &rest[..end];
            let token = if literal.contains('.') {
                literal
                    .parse()
                    .map(Token::Float)
                    .map_err(|_| ExprError::InvalidNumber(literal.to_string()))?
            } else {
                literal
                    .parse()
                    .map(Token::Int)
                    .map_err(|_| ExprError::InvalidNumber(literal.to_string()))?
            };
            tokens.push(token);
            rest = &rest[end..];
            continue;
        }

        if ch == '"' || ch == '\'' {
            let body = &rest[1..];
            let end = body.find(ch).ok_or(ExprError::UnterminatedString)?;
            tokens.push(Token::Str(body[..end].to_string()));
            rest = &body[end + 1..];
            continue;
        }

        if ch == '@' {
            let body = &rest[1..];
            let end = body.find(|c: char| !is_name_char(c)).unwrap_or(body.len());
            let name = &body[..end];
            let sensor =
                Sensor::from_name(name).ok_or_else(|| ExprError::UnknownSensor(name.to_string()))?;
            tokens.push(Token::Sensor(sensor));
            rest = &body[end..];
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let end = rest.find(|c: char| !is_name_char(c)).unwrap_or(rest.len());
            tokens.push(Token::Name(rest[..end].to_string()));
            rest = &rest[end..];
            continue;
        }

        match SYMBOLS.iter().find(|symbol| rest.starts_with(**symbol)) {
            // a lone `=` is assignment, which only `set` understands
            Some(&"=") | None => return Err(ExprError::UnexpectedChar(ch)),
            Some(symbol) => {
                tokens.push(Token::Symbol(*symbol));
                rest = &rest[symbol.len()..];
            }
        }
    }

    Ok(tokens)
}

/// Deepest nesting of brackets and prefix operators a parser accepts.
pub const MAX_NESTING: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ExprError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(name)) if name == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        if self.depth >= MAX_NESTING {
            return Err(ExprError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let expr = parse(self);
        self.depth -= 1;
        expr
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.and()?;
        while self.eat_word("or") {
            expr = Expr::Or(Box::new(expr), Box::new(self.and()?));
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.not()?;
        while self.eat_word("and") {
            expr = Expr::And(Box::new(expr), Box::new(self.not()?));
        }
        Ok(expr)
    }

    fn not(&mut self) -> Result<Expr, ExprError> {
        if self.eat_word("not") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.nested(Self::not)?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, ExprError> {
        let first = self.sum()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("<")) => CompareOp::Lt,
                Some(Token::Symbol("<=")) => CompareOp::Le,
                Some(Token::Symbol(">")) => CompareOp::Gt,
                Some(Token::Symbol(">=")) => CompareOp::Ge,
                Some(Token::Symbol("==")) => CompareOp::Eq,
                Some(Token::Symbol("!=")) => CompareOp::Ne,
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.sum()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn sum(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.term()?;
        loop {
            let op = if self.eat_symbol("+") {
                BinaryOp::Add
            } else if self.eat_symbol("-") {
                BinaryOp::Sub
            } else {
                return Ok(expr);
            };
            expr = Expr::Binary(op, Box::new(expr), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.unary()?;
        loop {
            let op = if self.eat_symbol("*") {
                BinaryOp::Mul
            } else if self.eat_symbol("//") {
                BinaryOp::FloorDiv
            } else if self.eat_symbol("/") {
                BinaryOp::Div
            } else if self.eat_symbol("%") {
                BinaryOp::Rem
            } else {
                return Ok(expr);
            };
            expr = Expr::Binary(op, Box::new(expr), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_symbol("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.nested(Self::unary)?)));
        }
        if self.eat_symbol("+") {
            return Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.nested(Self::unary)?)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.atom()?;
        if self.eat_symbol("**") {
            return Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(self.nested(Self::unary)?),
            ));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        match self.next()? {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Sensor(sensor) => Ok(Expr::Sensor(sensor)),
            Token::Symbol("(") => {
                let inner = self.nested(Self::or)?;
                if self.eat_symbol(")") {
                    Ok(inner)
                } else {
                    match self.peek() {
                        Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
                        None => Err(ExprError::UnexpectedEnd),
                    }
                }
            }
            Token::Name(name) => match name.as_str() {
                "True" | "true" => Ok(Expr::Literal(Value::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(Value::Bool(false))),
                "and" | "or" | "not" => Err(ExprError::UnexpectedToken(name)),
                _ => Ok(Expr::Variable(name)),
            },
            token @ Token::Symbol(_) => Err(ExprError::UnexpectedToken(token.to_string())),
        }
    }
}
