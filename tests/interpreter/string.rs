//! String primitives and String.prototype

use super::{eval, eval_json, throws_error};
use regjs::JsValue;
use serde_json::json;

#[test]
fn test_length_and_indexing() {
    assert_eq!(eval("'hello'.length"), JsValue::Int(5));
    assert_eq!(eval("'hello'[1]"), JsValue::from("e"));
    assert_eq!(eval("'hello'[10]"), JsValue::Undefined);
}

#[test]
fn test_char_at_and_char_code_at() {
    assert_eq!(eval("'abc'.charAt(2)"), JsValue::from("c"));
    assert_eq!(eval("'abc'.charAt(5)"), JsValue::from(""));
    assert_eq!(eval("'abc'.charCodeAt(0)"), JsValue::Int(97));
    assert_eq!(eval("'abc'.charCodeAt(9)"), JsValue::Number(f64::NAN));
}

#[test]
fn test_from_char_code() {
    assert_eq!(eval("String.fromCharCode(72, 105)"), JsValue::from("Hi"));
    assert_eq!(eval("String.fromCharCode(65601)"), JsValue::from("A"));
}

#[test]
fn test_index_of_and_last_index_of() {
    assert_eq!(eval("'banana'.indexOf('an')"), JsValue::Int(1));
    assert_eq!(eval("'banana'.indexOf('an', 2)"), JsValue::Int(3));
    assert_eq!(eval("'banana'.indexOf('x')"), JsValue::Int(-1));
    assert_eq!(eval("'banana'.indexOf('')"), JsValue::Int(0));
    assert_eq!(eval("'banana'.lastIndexOf('an')"), JsValue::Int(3));
    assert_eq!(eval("'banana'.lastIndexOf('an', 2)"), JsValue::Int(1));
}

#[test]
fn test_substring_substr_slice() {
    assert_eq!(eval("'abcdef'.substring(1, 4)"), JsValue::from("bcd"));
    assert_eq!(eval("'abcdef'.substring(4, 1)"), JsValue::from("bcd"));
    assert_eq!(eval("'abcdef'.substring(-3)"), JsValue::from("abcdef"));
    assert_eq!(eval("'abcdef'.substr(2, 3)"), JsValue::from("cde"));
    assert_eq!(eval("'abcdef'.substr(-2)"), JsValue::from("ef"));
    assert_eq!(eval("'abcdef'.slice(1, -1)"), JsValue::from("bcde"));
    assert_eq!(eval("'abcdef'.slice(4, 1)"), JsValue::from(""));
}

#[test]
fn test_case_conversion() {
    assert_eq!(eval("'MiXeD'.toUpperCase()"), JsValue::from("MIXED"));
    assert_eq!(eval("'MiXeD'.toLowerCase()"), JsValue::from("mixed"));
}

#[test]
fn test_concat() {
    assert_eq!(eval("'a'.concat('b', 1, null)"), JsValue::from("ab1null"));
}

#[test]
fn test_split_with_string_separator() {
    assert_eq!(eval_json("'a,b,,c'.split(',')"), json!(["a", "b", "", "c"]));
    assert_eq!(eval_json("'abc'.split('')"), json!(["a", "b", "c"]));
    assert_eq!(eval_json("'abc'.split()"), json!(["abc"]));
    assert_eq!(eval_json("'a,b,c'.split(',', 2)"), json!(["a", "b"]));
    assert_eq!(eval_json("''.split(',')"), json!([""]));
}

#[test]
fn test_replace_with_string_pattern() {
    assert_eq!(eval("'aXbXc'.replace('X', '-')"), JsValue::from("a-bXc"));
    assert_eq!(eval("'price'.replace('price', '$$5')"), JsValue::from("$5"));
    assert_eq!(eval("'abc'.replace('b', '[$&]')"), JsValue::from("a[b]c"));
    assert_eq!(eval("'abc'.replace('z', 'y')"), JsValue::from("abc"));
}

#[test]
fn test_string_methods_on_numbers() {
    assert_eq!(eval("String.prototype.charAt.call(123, 1)"), JsValue::from("2"));
    assert!(throws_error("String.prototype.charAt.call(null, 0)", "TypeError"));
}

#[test]
fn test_string_constructor() {
    assert_eq!(eval("String(12)"), JsValue::from("12"));
    assert_eq!(eval("String()"), JsValue::from(""));
    assert_eq!(eval("typeof new String('x')"), JsValue::from("object"));
    assert_eq!(eval("new String('xyz').length"), JsValue::Int(3));
    assert_eq!(eval("new String('a') + 'b'"), JsValue::from("ab"));
}

#[test]
fn test_strings_are_immutable() {
    assert_eq!(eval("var s = 'abc'; s[0] = 'z'; s"), JsValue::from("abc"));
    assert_eq!(eval("var s = 'abc'; s.length = 1; s.length"), JsValue::Int(3));
}

#[test]
fn test_escapes_in_literals() {
    assert_eq!(eval("'a\\tb'.length"), JsValue::Int(3));
    assert_eq!(eval("'\\u0041\\x42'"), JsValue::from("AB"));
}

#[test]
fn test_utf16_semantics() {
    assert_eq!(eval("'\\u00e9t\\u00e9'.length"), JsValue::Int(3));
    assert_eq!(eval("'\\u00e9t\\u00e9'.charAt(2)"), JsValue::from("\u{e9}"));
}

#[test]
fn test_string_building_in_loop() {
    assert_eq!(
        eval("var s = ''; for (var i = 0; i < 5; i++) s += i; s"),
        JsValue::from("01234")
    );
}

#[test]
fn test_string_comparison_by_code_units() {
    assert_eq!(eval("'Z' < 'a'"), JsValue::Boolean(true));
    assert_eq!(eval("'abc' < 'abd'"), JsValue::Boolean(true));
    assert_eq!(eval("'ab' < 'abc'"), JsValue::Boolean(true));
}
