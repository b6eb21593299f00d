// tests/expressions.rs
use pixelbot_script::expr::MAX_NESTING;
use pixelbot_script::{Environment, Expr, ExprError, Sensor, Value};
use std::collections::HashMap;

/// Variables from a map, `@x` fixed at 21 and every other sensor reading 0.
#[derive(Default)]
struct Fixture {
    variables: HashMap<String, Value>,
    reads: usize,
}

impl Environment for Fixture {
    fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn sensor(&mut self, sensor: Sensor) -> Value {
        self.reads += 1;
        match sensor {
            Sensor::X => Value::Int(21),
            Sensor::Name => Value::from("Rover"),
            _ => Value::Int(0),
        }
    }
}

fn eval(text: &str) -> Result<Value, ExprError> {
    Expr::parse(text)?.evaluate(&mut Fixture::default())
}

#[test]
fn test_arithmetic_follows_precedence() {
    assert_eq!(eval("1 + 2 * 3"), Ok(Value::Int(7)));
    assert_eq!(eval("(1 + 2) * 3"), Ok(Value::Int(9)));
    assert_eq!(eval("2 ** 10"), Ok(Value::Int(1024)));
    assert_eq!(eval("-2 ** 2"), Ok(Value::Int(-4)));
    assert_eq!(eval("10 - 4 - 3"), Ok(Value::Int(3)));
}

#[test]
fn test_division_floors_towards_negative_infinity() {
    assert_eq!(eval("7 / 2"), Ok(Value::Float(3.5)));
    assert_eq!(eval("7 // 2"), Ok(Value::Int(3)));
    assert_eq!(eval("-7 // 2"), Ok(Value::Int(-4)));
    assert_eq!(eval("-7 % 3"), Ok(Value::Int(2)));
    assert_eq!(eval("7.5 // 2"), Ok(Value::Float(3.0)));
    assert_eq!(eval("1 / 0"), Err(ExprError::DivisionByZero));
    assert_eq!(eval("1 % 0"), Err(ExprError::DivisionByZero));
}

#[test]
fn test_comparisons_chain() {
    assert_eq!(eval("1 < 2 < 3"), Ok(Value::Bool(true)));
    assert_eq!(eval("3 > 2 > 2"), Ok(Value::Bool(false)));
    assert_eq!(eval("2 == 2.0"), Ok(Value::Bool(true)));
    assert_eq!(eval("'a' != 1"), Ok(Value::Bool(true)));
    assert!(matches!(eval("'a' < 1"), Err(ExprError::TypeMismatch { .. })));
}

#[test]
fn test_boolean_operators_return_operands() {
    assert_eq!(eval("0 or 5"), Ok(Value::Int(5)));
    assert_eq!(eval("2 and 0"), Ok(Value::Int(0)));
    assert_eq!(eval("not 0"), Ok(Value::Bool(true)));
    assert_eq!(eval("True and False"), Ok(Value::Bool(false)));
    assert_eq!(eval("false or 'x'"), Ok(Value::from("x")));
}

#[test]
fn test_short_circuit_skips_right_side() {
    // `missing` is undefined but never looked at.
    assert_eq!(eval("1 or missing"), Ok(Value::Int(1)));
    assert_eq!(eval("0 and missing"), Ok(Value::Int(0)));
}

#[test]
fn test_strings() {
    assert_eq!(eval("'pixel' + \"bot\""), Ok(Value::from("pixelbot")));
    assert_eq!(eval("'# not a comment'"), Ok(Value::from("# not a comment")));
    assert!(matches!(eval("'a' - 1"), Err(ExprError::TypeMismatch { .. })));
    assert_eq!(eval("'open"), Err(ExprError::UnterminatedString));
}

#[test]
fn test_variables_and_sensors() {
    let mut env = Fixture::default();
    env.variables.insert("speed".to_string(), Value::Int(4));

    let expr = Expr::parse("speed * @x + 1").unwrap();
    assert_eq!(expr.evaluate(&mut env), Ok(Value::Int(85)));
    assert_eq!(env.reads, 1);

    let name = Expr::parse("@NAME").unwrap();
    assert_eq!(name.evaluate(&mut env), Ok(Value::from("Rover")));

    assert_eq!(
        Expr::parse("nope + 1").unwrap().evaluate(&mut env),
        Err(ExprError::UndefinedVariable("nope".to_string()))
    );
}

#[test]
fn test_parse_errors() {
    assert_eq!(Expr::parse("   "), Err(ExprError::Empty));
    assert_eq!(Expr::parse("1 +"), Err(ExprError::UnexpectedEnd));
    assert_eq!(
        Expr::parse("@nope"),
        Err(ExprError::UnknownSensor("nope".to_string()))
    );
    assert_eq!(Expr::parse("x = 1"), Err(ExprError::UnexpectedChar('=')));
    assert_eq!(Expr::parse("1 $ 2"), Err(ExprError::UnexpectedChar('$')));
    assert!(matches!(
        Expr::parse("(1 + 2"),
        Err(ExprError::UnexpectedEnd)
    ));
    assert!(matches!(
        Expr::parse("1 2"),
        Err(ExprError::UnexpectedToken(_))
    ));
}

#[test]
fn test_nesting_is_capped() {
    let allowed = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
    assert_eq!(eval(&allowed), Ok(Value::Int(1)));

    // Far past the cap must fail cleanly rather than exhaust the stack.
    let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
    assert_eq!(Expr::parse(&deep), Err(ExprError::TooDeep(MAX_NESTING)));
    let negations = format!("{}1", "-".repeat(10_000));
    assert_eq!(Expr::parse(&negations), Err(ExprError::TooDeep(MAX_NESTING)));
    let nots = format!("{}True", "not ".repeat(10_000));
    assert_eq!(Expr::parse(&nots), Err(ExprError::TooDeep(MAX_NESTING)));
}

#[test]
fn test_overflow_is_an_error() {
    assert_eq!(eval("9223372036854775807 + 1"), Err(ExprError::Overflow));
}

#[test]
fn test_value_display() {
    assert_eq!(Value::Int(3).to_string(), "3");
    assert_eq!(Value::Float(2.0).to_string(), "2.0");
    assert_eq!(Value::Float(2.5).to_string(), "2.5");
    assert_eq!(Value::Bool(true).to_string(), "True");
    assert_eq!(Value::from("hi").to_string(), "hi");
}
