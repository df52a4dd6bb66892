// Focused tests for expression evaluation

use cfglang::{Config, ConfigError, Value};
use num_complex::Complex64;

fn eval(expr: &str) -> Value {
    let source = format!("result: {}", expr);
    let cfg = Config::from_source(&source).expect("load failed");

    cfg.get("result").expect("evaluation failed")
}

fn eval_err(expr: &str) -> ConfigError {
    let source = format!("result: {}", expr);
    let cfg = Config::from_source(&source).expect("load failed");

    cfg.get("result").expect_err("evaluation succeeded")
}

#[test]
fn test_addition() {
    assert_eq!(eval("1 + 2"), Value::Integer(3));
    assert_eq!(eval("1 + 2.5"), Value::Float(3.5));
    assert_eq!(eval("'a' + 'b'"), Value::from("ab"));
    assert_eq!(eval("1 + 3j"), Value::Complex(Complex64::new(1.0, 3.0)));
}

#[test]
fn test_subtraction() {
    assert_eq!(eval("5 - 8"), Value::Integer(-3));
    assert_eq!(eval("1.5 - 1"), Value::Float(0.5));
}

#[test]
fn test_multiplication() {
    assert_eq!(eval("6 * 7"), Value::Integer(42));
    assert_eq!(eval("2 * 3.5"), Value::Float(7.0));
}

#[test]
fn test_true_division_produces_floats() {
    assert_eq!(eval("1 / 4"), Value::Float(0.25));
    assert_eq!(eval("7 / 2"), Value::Float(3.5));
}

#[test]
fn test_floor_division() {
    assert_eq!(eval("7 // 2"), Value::Integer(3));
    // floor division rounds toward negative infinity
    assert_eq!(eval("-7 // 2"), Value::Integer(-4));
    assert_eq!(eval("7 // -2"), Value::Integer(-4));
    assert_eq!(eval("7.0 // 2"), Value::Float(3.0));
}

#[test]
fn test_modulo() {
    assert_eq!(eval("10 % 3"), Value::Integer(1));
    // the result takes the sign of the divisor
    assert_eq!(eval("-10 % 3"), Value::Integer(2));
    assert_eq!(eval("10 % -3"), Value::Integer(-2));
}

#[test]
fn test_division_by_zero() {
    let err = eval_err("7 // 0");
    assert_eq!(format!("{}", err), "integer division or modulo by zero");

    let err = eval_err("7 % 0");
    assert_eq!(format!("{}", err), "integer division or modulo by zero");
}

#[test]
fn test_power() {
    assert_eq!(eval("2 ** 10"), Value::Integer(1024));
    assert_eq!(eval("2 ** -1"), Value::Float(0.5));
    assert_eq!(eval("4 ** 0.5"), Value::Float(2.0));
    // right-associative
    assert_eq!(eval("2 ** 3 ** 2"), Value::Integer(512));
}

#[test]
fn test_shifts() {
    assert_eq!(eval("1 << 4"), Value::Integer(16));
    assert_eq!(eval("256 >> 4"), Value::Integer(16));
}

#[test]
fn test_bitwise() {
    assert_eq!(eval("6 & 3"), Value::Integer(2));
    assert_eq!(eval("6 ^ 3"), Value::Integer(5));
    assert_eq!(eval("6 | 3"), Value::Integer(7));
}

#[test]
fn test_unary() {
    assert_eq!(eval("-(2 + 3)"), Value::Integer(-5));
    assert_eq!(eval("+42"), Value::Integer(42));
    assert_eq!(eval("~5"), Value::Integer(-6));
    assert_eq!(eval("not true"), Value::Bool(false));
    assert_eq!(eval("not ''"), Value::Bool(true));
}

#[test]
fn test_unary_binds_tighter_than_binary_operators() {
    // -a + 1 is (-a) + 1, not -(a + 1)
    let cfg = Config::from_source("a: 3\nneg: -${a} + 1").expect("load failed");
    assert_eq!(cfg.get("neg").expect("evaluation failed"), Value::Integer(-2));

    let mut cfg = Config::new();
    let mut context = rustc_hash::FxHashMap::default();

    context.insert("a".to_string(), Value::Integer(3));
    cfg.set_context(context);
    cfg.load("neg: -a + 1\nflipped: ~a & 7".as_bytes())
        .expect("load failed");
    assert_eq!(cfg.get("neg").expect("evaluation failed"), Value::Integer(-2));
    assert_eq!(
        cfg.get("flipped").expect("evaluation failed"),
        Value::Integer(4)
    );
}

#[test]
fn test_logical_operators_coerce_to_bool() {
    assert_eq!(eval("true and false"), Value::Bool(false));
    assert_eq!(eval("true and 'x'"), Value::Bool(true));
    assert_eq!(eval("'' or 'x'"), Value::Bool(true));
    assert_eq!(eval("'' or 0"), Value::Bool(false));
    assert_eq!(eval("false && true"), Value::Bool(false));
    assert_eq!(eval("false || true"), Value::Bool(true));
}

#[test]
fn test_short_circuit() {
    // the right operand would fail if evaluated
    assert_eq!(eval("false and nosuchvar"), Value::Bool(false));
    assert_eq!(eval("true or nosuchvar"), Value::Bool(true));
}

#[test]
fn test_operator_precedence() {
    assert_eq!(eval("1 + 2 * 3"), Value::Integer(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::Integer(9));
    assert_eq!(eval("1 | 2 ^ 3 & 6"), Value::Integer(1));
    assert_eq!(eval("16 >> 2 + 1"), Value::Integer(2));
}

#[test]
fn test_complex_arithmetic() {
    assert_eq!(eval("3j * 2"), Value::Complex(Complex64::new(0.0, 6.0)));
    assert_eq!(
        eval("1 + 2j - 2j"),
        Value::Complex(Complex64::new(1.0, 0.0))
    );
}

#[test]
fn test_type_mismatches() {
    let err = eval_err("1 + 'x'");
    assert_eq!(format!("{}", err), "unable to add 1 and 'x'");

    let err = eval_err("{a: 1} - 2");
    assert_eq!(format!("{}", err), "unable to subtract 2 from a mapping");

    let err = eval_err("'a' * 'b'");
    assert_eq!(format!("{}", err), "unable to multiply 'a' by 'b'");

    let err = eval_err("-'x'");
    assert_eq!(format!("{}", err), "unable to negate 'x'");

    let err = eval_err("~2.5");
    assert_eq!(format!("{}", err), "unable to apply '~' to 2.5");
}

#[test]
fn test_modulo_is_integer_only() {
    let err = eval_err("10.5 % 3");
    assert_eq!(format!("{}", err), "unable to compute 10.5 modulo 3");
}

#[test]
fn test_comparisons_are_not_evaluated() {
    let err = eval_err("1 < 2");
    assert_eq!(format!("{}", err), "unable to evaluate '<'");
}
