//! Number and Boolean wrappers

use super::{eval, throws_error};
use regjs::JsValue;

#[test]
fn test_to_string_radix() {
    assert_eq!(eval("(255).toString(16)"), JsValue::from("ff"));
    assert_eq!(eval("(5).toString(2)"), JsValue::from("101"));
    assert_eq!(eval("(-8).toString(8)"), JsValue::from("-10"));
    assert_eq!(eval("(3.5).toString()"), JsValue::from("3.5"));
    assert!(throws_error("(1).toString(1)", "RangeError"));
    assert!(throws_error("(1).toString(37)", "RangeError"));
}

#[test]
fn test_to_fixed() {
    assert_eq!(eval("(3.14159).toFixed(2)"), JsValue::from("3.14"));
    assert_eq!(eval("(2.5).toFixed(0)"), JsValue::from("3"));
    assert_eq!(eval("(0).toFixed(3)"), JsValue::from("0.000"));
    assert_eq!(eval("(-1.5).toFixed(1)"), JsValue::from("-1.5"));
    assert_eq!(eval("(1e21).toFixed(2)"), JsValue::from("1e+21"));
    assert!(throws_error("(1).toFixed(21)", "RangeError"));
}

#[test]
fn test_constants() {
    assert_eq!(eval("Number.MAX_VALUE"), JsValue::Number(f64::MAX));
    assert_eq!(eval("Number.MIN_VALUE > 0"), JsValue::Boolean(true));
    assert_eq!(eval("Number.POSITIVE_INFINITY"), JsValue::Number(f64::INFINITY));
    assert_eq!(eval("Number.NEGATIVE_INFINITY"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("isNaN(Number.NaN)"), JsValue::Boolean(true));
}

#[test]
fn test_number_conversion() {
    assert_eq!(eval("Number('42')"), JsValue::Int(42));
    assert_eq!(eval("Number()"), JsValue::Int(0));
    assert_eq!(eval("Number(true)"), JsValue::Int(1));
    assert_eq!(eval("Number(null)"), JsValue::Int(0));
    assert_eq!(eval("isNaN(Number(undefined))"), JsValue::Boolean(true));
    assert_eq!(eval("Number([5])"), JsValue::Int(5));
}

#[test]
fn test_number_wrapper() {
    assert_eq!(eval("typeof new Number(3)"), JsValue::from("object"));
    assert_eq!(eval("new Number(3) + 4"), JsValue::Int(7));
    assert_eq!(eval("new Number(3).valueOf()"), JsValue::Int(3));
    assert!(throws_error("Number.prototype.valueOf.call('x')", "TypeError"));
}

#[test]
fn test_boolean_conversion_and_wrapper() {
    assert_eq!(eval("Boolean('')"), JsValue::Boolean(false));
    assert_eq!(eval("Boolean('0')"), JsValue::Boolean(true));
    assert_eq!(eval("Boolean(NaN)"), JsValue::Boolean(false));
    assert_eq!(eval("typeof new Boolean(false)"), JsValue::from("object"));
    assert_eq!(eval("new Boolean(false) ? 'truthy' : 'falsy'"), JsValue::from("truthy"));
    assert_eq!(eval("new Boolean(false).valueOf()"), JsValue::Boolean(false));
    assert_eq!(eval("true.toString() + false.toString()"), JsValue::from("truefalse"));
}

#[test]
fn test_int_overflow_becomes_double() {
    assert_eq!(eval("var x = 2147483647; x++; x"), JsValue::Number(2147483648.0));
    assert_eq!(eval("-2147483648 - 1"), JsValue::Number(-2147483649.0));
    assert_eq!(eval("65536 * 65536"), JsValue::Number(4294967296.0));
}

#[test]
fn test_division_by_zero() {
    assert_eq!(eval("1 / 0"), JsValue::Number(f64::INFINITY));
    assert_eq!(eval("-1 / 0"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("isNaN(0 / 0)"), JsValue::Boolean(true));
    assert_eq!(eval("isNaN(5 % 0)"), JsValue::Boolean(true));
}
