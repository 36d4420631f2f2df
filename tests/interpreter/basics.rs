//! Literals, operators and conversions

use super::{eval, throws_error};
use regjs::JsValue;

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 2 * 3"), JsValue::Int(7));
    assert_eq!(eval("(1 + 2) * 3"), JsValue::Int(9));
    assert_eq!(eval("7 / 2"), JsValue::Number(3.5));
    assert_eq!(eval("7 % 3"), JsValue::Int(1));
    assert_eq!(eval("-7 % 3"), JsValue::Int(-1));
    assert_eq!(eval("2147483647 + 1"), JsValue::Number(2147483648.0));
}

#[test]
fn test_negative_zero() {
    assert_eq!(eval("1 / (0 * -1)"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("1 / (-4 % 2)"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("1 / -0"), JsValue::Number(f64::NEG_INFINITY));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("'a' + 'b'"), JsValue::from("ab"));
    assert_eq!(eval("'n' + 1 + 2"), JsValue::from("n12"));
    assert_eq!(eval("1 + 2 + 'n'"), JsValue::from("3n"));
    assert_eq!(eval("'x' + null + undefined + true"), JsValue::from("xnullundefinedtrue"));
}

#[test]
fn test_number_formatting() {
    assert_eq!(eval("'' + 0.1"), JsValue::from("0.1"));
    assert_eq!(eval("'' + 1e21"), JsValue::from("1e+21"));
    assert_eq!(eval("'' + 123456789012"), JsValue::from("123456789012"));
    assert_eq!(eval("'' + (1 / 3)"), JsValue::from("0.3333333333333333"));
    assert_eq!(eval("'' + -1.5e-7"), JsValue::from("-1.5e-7"));
}

#[test]
fn test_comparisons() {
    assert_eq!(eval("1 < 2"), JsValue::Boolean(true));
    assert_eq!(eval("2 > 1"), JsValue::Boolean(true));
    assert_eq!(eval("2 >= 2"), JsValue::Boolean(true));
    assert_eq!(eval("'a' < 'b'"), JsValue::Boolean(true));
    assert_eq!(eval("'10' < '9'"), JsValue::Boolean(true));
    assert_eq!(eval("'10' < 9"), JsValue::Boolean(false));
    assert_eq!(eval("NaN < 1 || NaN >= 1"), JsValue::Boolean(false));
}

#[test]
fn test_equality() {
    assert_eq!(eval("1 == '1'"), JsValue::Boolean(true));
    assert_eq!(eval("1 === '1'"), JsValue::Boolean(false));
    assert_eq!(eval("null == undefined"), JsValue::Boolean(true));
    assert_eq!(eval("null === undefined"), JsValue::Boolean(false));
    assert_eq!(eval("null == 0"), JsValue::Boolean(false));
    assert_eq!(eval("NaN == NaN"), JsValue::Boolean(false));
    assert_eq!(eval("true == 1"), JsValue::Boolean(true));
    assert_eq!(eval("var o = {}; o == o && o !== {}"), JsValue::Boolean(true));
}

#[test]
fn test_bitwise() {
    assert_eq!(eval("5 & 3"), JsValue::Int(1));
    assert_eq!(eval("5 | 3"), JsValue::Int(7));
    assert_eq!(eval("5 ^ 3"), JsValue::Int(6));
    assert_eq!(eval("~5"), JsValue::Int(-6));
    assert_eq!(eval("1 << 31"), JsValue::Int(i32::MIN));
    assert_eq!(eval("-16 >> 2"), JsValue::Int(-4));
    assert_eq!(eval("-1 >>> 0"), JsValue::Number(4294967295.0));
    assert_eq!(eval("4294967296 | 0"), JsValue::Int(0));
}

#[test]
fn test_logical_operators_return_operands() {
    assert_eq!(eval("0 || 'x'"), JsValue::from("x"));
    assert_eq!(eval("1 && 'y'"), JsValue::from("y"));
    assert_eq!(eval("'' && 'z'"), JsValue::from(""));
    assert_eq!(eval("!''"), JsValue::Boolean(true));
    assert_eq!(eval("null ? 1 : 2"), JsValue::Int(2));
}

#[test]
fn test_typeof() {
    assert_eq!(eval("typeof 1"), JsValue::from("number"));
    assert_eq!(eval("typeof 'a'"), JsValue::from("string"));
    assert_eq!(eval("typeof null"), JsValue::from("object"));
    assert_eq!(eval("typeof undefined"), JsValue::from("undefined"));
    assert_eq!(eval("typeof notDeclaredAnywhere"), JsValue::from("undefined"));
    assert_eq!(eval("typeof function () {}"), JsValue::from("function"));
    assert_eq!(eval("typeof Math"), JsValue::from("object"));
}

#[test]
fn test_void_and_comma() {
    assert_eq!(eval("void 0"), JsValue::Undefined);
    assert_eq!(eval("(1, 2, 3)"), JsValue::Int(3));
}

#[test]
fn test_update_expressions() {
    assert_eq!(eval("var i = 5; i++"), JsValue::Int(5));
    assert_eq!(eval("var i = 5; ++i"), JsValue::Int(6));
    assert_eq!(eval("var i = 5; i--; i"), JsValue::Int(4));
    assert_eq!(eval("var s = '5'; s++; s"), JsValue::Int(6));
    assert_eq!(eval("var s = '5'; s++"), JsValue::Int(5));
    assert_eq!(eval("var o = {n: 1}; o.n++; o.n += 10; o.n"), JsValue::Int(12));
    assert_eq!(eval("var a = [1]; a[0]++; a[0]"), JsValue::Int(2));
}

#[test]
fn test_compound_assignment() {
    assert_eq!(eval("var x = 10; x -= 3; x *= 2; x"), JsValue::Int(14));
    assert_eq!(eval("var x = 'a'; x += 'b'; x"), JsValue::from("ab"));
    assert_eq!(eval("var x = 1; x <<= 4; x |= 1; x"), JsValue::Int(17));
}

#[test]
fn test_unbound_compound_assignment_is_reference_error() {
    assert!(throws_error("nothingHere += 1", "ReferenceError"));
    assert!(throws_error("nothingHere++", "ReferenceError"));
}

#[test]
fn test_undeclared_read_is_reference_error() {
    assert!(throws_error("missingName", "missingName is not defined"));
}

#[test]
fn test_assignment_to_undeclared_creates_global() {
    assert_eq!(eval("function f() { leaked = 3; } f(); leaked"), JsValue::Int(3));
}

#[test]
fn test_const_is_read_only() {
    assert_eq!(eval("const K = 1; K = 2; K"), JsValue::Int(1));
}

#[test]
fn test_in_and_instanceof() {
    assert_eq!(eval("'a' in {a: 1}"), JsValue::Boolean(true));
    assert_eq!(eval("'toString' in {}"), JsValue::Boolean(true));
    assert_eq!(eval("0 in [5]"), JsValue::Boolean(true));
    assert_eq!(eval("[] instanceof Array"), JsValue::Boolean(true));
    assert_eq!(eval("[] instanceof Object"), JsValue::Boolean(true));
    assert!(throws_error("'a' in 'abc'", "TypeError"));
    assert!(throws_error("({}) instanceof 3", "TypeError"));
}

#[test]
fn test_delete() {
    assert_eq!(eval("var o = {a: 1}; delete o.a; 'a' in o"), JsValue::Boolean(false));
    assert_eq!(eval("var o = {a: 1}; delete o.b"), JsValue::Boolean(true));
    assert_eq!(eval("delete Math.PI"), JsValue::Boolean(false));
}

#[test]
fn test_completion_value() {
    assert_eq!(eval("var a = 1;"), JsValue::Undefined);
    assert_eq!(eval("1; 2; var b = 3;"), JsValue::Int(2));
    assert_eq!(eval("if (true) { 'yes'; } else { 'no'; }"), JsValue::from("yes"));
}

#[test]
fn test_legacy_octal_literal() {
    assert_eq!(eval("010"), JsValue::Int(8));
}

#[test]
fn test_string_to_number_conversion() {
    assert_eq!(eval("+'  12  '"), JsValue::Int(12));
    assert_eq!(eval("+'0x10'"), JsValue::Int(16));
    assert_eq!(eval("+''"), JsValue::Int(0));
    assert_eq!(eval("+'1e3'"), JsValue::Int(1000));
    assert_eq!(eval("+'abc'"), JsValue::Number(f64::NAN));
    assert_eq!(eval("+'Infinity'"), JsValue::Number(f64::INFINITY));
}
