//! Global functions and values

use super::{eval, throws_error};
use regjs::JsValue;

#[test]
fn test_parse_int() {
    assert_eq!(eval("parseInt('42px')"), JsValue::Int(42));
    assert_eq!(eval("parseInt('  -17')"), JsValue::Int(-17));
    assert_eq!(eval("parseInt('0x1F')"), JsValue::Int(31));
    assert_eq!(eval("parseInt('ff', 16)"), JsValue::Int(255));
    assert_eq!(eval("parseInt('101', 2)"), JsValue::Int(5));
    assert_eq!(eval("isNaN(parseInt('px'))"), JsValue::Boolean(true));
    assert_eq!(eval("isNaN(parseInt('5', 1))"), JsValue::Boolean(true));
    assert_eq!(eval("parseInt(12.9)"), JsValue::Int(12));
}

#[test]
fn test_parse_float() {
    assert_eq!(eval("parseFloat('3.25abc')"), JsValue::Number(3.25));
    assert_eq!(eval("parseFloat('  .5')"), JsValue::Number(0.5));
    assert_eq!(eval("parseFloat('1e3')"), JsValue::Int(1000));
    assert_eq!(eval("parseFloat('1e')"), JsValue::Int(1));
    assert_eq!(eval("parseFloat('-Infinity')"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("isNaN(parseFloat('x1'))"), JsValue::Boolean(true));
}

#[test]
fn test_is_nan_and_is_finite() {
    assert_eq!(eval("isNaN('abc')"), JsValue::Boolean(true));
    assert_eq!(eval("isNaN('12')"), JsValue::Boolean(false));
    assert_eq!(eval("isFinite(1 / 0)"), JsValue::Boolean(false));
    assert_eq!(eval("isFinite('7')"), JsValue::Boolean(true));
}

#[test]
fn test_global_values() {
    assert_eq!(eval("Infinity"), JsValue::Number(f64::INFINITY));
    assert_eq!(eval("typeof NaN"), JsValue::from("number"));
    assert_eq!(eval("undefined"), JsValue::Undefined);
}

#[test]
fn test_global_values_are_not_enumerable() {
    assert_eq!(
        eval("var seen = ''; for (var k in this) { if (k == 'NaN' || k == 'Math' || k == 'parseInt') seen += k; } seen"),
        JsValue::from("")
    );
}

#[test]
fn test_user_globals_are_enumerable() {
    assert_eq!(
        eval("var mine = 1; var seen = false; for (var k in this) { if (k == 'mine') seen = true; } seen"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_builtin_constructors_exist() {
    assert_eq!(
        eval("typeof Object + typeof Function + typeof Array + typeof String + typeof Number + typeof Boolean + typeof Error"),
        JsValue::from("functionfunctionfunctionfunctionfunctionfunctionfunction")
    );
}

#[test]
fn test_this_at_top_level_is_global() {
    assert_eq!(eval("this.Math === Math"), JsValue::Boolean(true));
}

#[test]
fn test_calling_undefined_global_is_reference_error() {
    assert!(throws_error("notAFunction()", "ReferenceError"));
}
