//! Regular expressions

use super::{eval, eval_json, throws_error};
use regjs::JsValue;
use serde_json::json;

#[test]
fn test_literal_properties() {
    assert_eq!(eval("/ab+c/gi.source"), JsValue::from("ab+c"));
    assert_eq!(eval("/x/g.global && /x/i.ignoreCase && /x/m.multiline"), JsValue::Boolean(true));
    assert_eq!(eval("/x/.lastIndex"), JsValue::Int(0));
    assert_eq!(eval("/a\\/b/.toString()"), JsValue::from("/a\\/b/"));
    assert_eq!(eval("typeof /x/"), JsValue::from("object"));
}

#[test]
fn test_each_evaluation_creates_a_new_object() {
    assert_eq!(eval("function r() { return /x/; } r() === r()"), JsValue::Boolean(false));
}

#[test]
fn test_test_method() {
    assert_eq!(eval("/^\\d+$/.test('12345')"), JsValue::Boolean(true));
    assert_eq!(eval("/^\\d+$/.test('12a45')"), JsValue::Boolean(false));
    assert_eq!(eval("/HELLO/i.test('say hello')"), JsValue::Boolean(true));
}

#[test]
fn test_exec_result() {
    assert_eq!(eval_json("/(\\w+)@(\\w+)/.exec('mail bob@host now')"), json!(["bob@host", "bob", "host"]));
    assert_eq!(eval("/(\\w+)@/.exec('mail bob@host').index"), JsValue::Int(5));
    assert_eq!(eval("/b/.exec('abc').input"), JsValue::from("abc"));
    assert_eq!(eval("/z/.exec('abc')"), JsValue::Null);
}

#[test]
fn test_unmatched_group_is_undefined() {
    assert_eq!(eval("/(a)|(b)/.exec('b')[1]"), JsValue::Undefined);
}

#[test]
fn test_global_exec_advances_last_index() {
    assert_eq!(
        eval("var re = /o/g; var s = 'foo boo'; var n = 0; while (re.exec(s)) n++; n + ':' + re.lastIndex"),
        JsValue::from("4:0")
    );
}

#[test]
fn test_multiline_anchors() {
    assert_eq!(eval("/^b/m.test('a\\nb')"), JsValue::Boolean(true));
    assert_eq!(eval("/^b/.test('a\\nb')"), JsValue::Boolean(false));
}

#[test]
fn test_constructor() {
    assert_eq!(eval("new RegExp('a+', 'g').source"), JsValue::from("a+"));
    assert_eq!(eval("RegExp('\\\\d').test('7')"), JsValue::Boolean(true));
    assert_eq!(eval("new RegExp(/q/i).ignoreCase"), JsValue::Boolean(true));
    assert!(throws_error("new RegExp('a', 'gg')", "SyntaxError"));
    assert!(throws_error("new RegExp('(')", "SyntaxError"));
    assert!(throws_error("new RegExp(/q/, 'g')", "TypeError"));
}

#[test]
fn test_string_replace_with_regexp() {
    assert_eq!(eval("'a1b2c3'.replace(/\\d/g, '#')"), JsValue::from("a#b#c#"));
    assert_eq!(eval("'a1b2c3'.replace(/\\d/, '#')"), JsValue::from("a#b2c3"));
    assert_eq!(eval("'John Smith'.replace(/(\\w+) (\\w+)/, '$2, $1')"), JsValue::from("Smith, John"));
    assert_eq!(
        eval("'x-1 y-2'.replace(/(\\w)-(\\d)/g, function (m, letter, digit) { return letter + digit * 2; })"),
        JsValue::from("x2 y4")
    );
}

#[test]
fn test_string_match() {
    assert_eq!(eval_json("'a1b22c333'.match(/\\d+/g)"), json!(["1", "22", "333"]));
    assert_eq!(eval_json("'key=val'.match(/(\\w+)=(\\w+)/)"), json!(["key=val", "key", "val"]));
    assert_eq!(eval("'abc'.match(/z/g)"), JsValue::Null);
}

#[test]
fn test_string_split_with_regexp() {
    assert_eq!(eval_json("'a1b22c'.split(/\\d+/)"), json!(["a", "b", "c"]));
    assert_eq!(eval_json("'a, b ,c'.split(/\\s*,\\s*/)"), json!(["a", "b", "c"]));
    assert_eq!(eval_json("'a1b'.split(/(\\d)/)"), json!(["a", "1", "b"]));
    assert_eq!(eval_json("'abc'.split(/(?:)/)"), json!(["a", "b", "c"]));
}

#[test]
fn test_match_positions_in_utf16_units() {
    assert_eq!(eval("/b/.exec('\\u00e9\\u00e9b').index"), JsValue::Int(2));
}

#[test]
fn test_regexp_literal_after_operators() {
    assert_eq!(eval("var ok = true && /x/.test('x'); ok"), JsValue::Boolean(true));
    assert_eq!(eval("var f = [/a/, /b/]; f[1].source"), JsValue::from("b"));
}
