//! The Math object

use super::eval;
use regjs::JsValue;

#[test]
fn test_constants() {
    assert_eq!(eval("Math.PI"), JsValue::Number(std::f64::consts::PI));
    assert_eq!(eval("Math.E"), JsValue::Number(std::f64::consts::E));
    assert_eq!(eval("Math.SQRT2"), JsValue::Number(std::f64::consts::SQRT_2));
}

#[test]
fn test_rounding() {
    assert_eq!(eval("Math.floor(-1.5)"), JsValue::Int(-2));
    assert_eq!(eval("Math.ceil(1.2)"), JsValue::Int(2));
    assert_eq!(eval("Math.round(2.5)"), JsValue::Int(3));
    assert_eq!(eval("Math.round(-2.5)"), JsValue::Int(-2));
    assert_eq!(eval("1 / Math.round(-0.4)"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("Math.abs(-7)"), JsValue::Int(7));
}

#[test]
fn test_min_max() {
    assert_eq!(eval("Math.max(1, 5, 3)"), JsValue::Int(5));
    assert_eq!(eval("Math.min(1, -5, 3)"), JsValue::Int(-5));
    assert_eq!(eval("Math.max()"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("Math.min()"), JsValue::Number(f64::INFINITY));
    assert_eq!(eval("isNaN(Math.max(1, NaN, 3))"), JsValue::Boolean(true));
    assert_eq!(eval("1 / Math.min(0, -0)"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("Math.max('4', 2)"), JsValue::Int(4));
}

#[test]
fn test_pow_and_sqrt() {
    assert_eq!(eval("Math.pow(2, 10)"), JsValue::Int(1024));
    assert_eq!(eval("Math.pow(4, 0.5)"), JsValue::Int(2));
    assert_eq!(eval("isNaN(Math.pow(1, Infinity))"), JsValue::Boolean(true));
    assert_eq!(eval("Math.pow(NaN, 0)"), JsValue::Int(1));
    assert_eq!(eval("Math.sqrt(81)"), JsValue::Int(9));
    assert_eq!(eval("isNaN(Math.sqrt(-1))"), JsValue::Boolean(true));
}

#[test]
fn test_trigonometry() {
    assert_eq!(eval("Math.sin(0)"), JsValue::Int(0));
    assert_eq!(eval("Math.cos(0)"), JsValue::Int(1));
    assert_eq!(eval("Math.atan2(1, 1) == Math.PI / 4"), JsValue::Boolean(true));
}

#[test]
fn test_logarithms() {
    assert_eq!(eval("Math.log(1)"), JsValue::Int(0));
    assert_eq!(eval("Math.exp(0)"), JsValue::Int(1));
    assert_eq!(eval("Math.log(0)"), JsValue::Number(f64::NEG_INFINITY));
}

#[test]
fn test_random_range() {
    assert_eq!(
        eval(
            "var ok = true;
             for (var i = 0; i < 500; i++) { var r = Math.random(); if (r < 0 || r >= 1) ok = false; }
             ok"
        ),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_random_varies() {
    assert_eq!(
        eval("var first = Math.random(); var differs = false; for (var i = 0; i < 10; i++) if (Math.random() != first) differs = true; differs"),
        JsValue::Boolean(true)
    );
}
