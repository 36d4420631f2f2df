//! Object literals, property access and Object.prototype

use super::{eval, eval_json, throws_error};
use regjs::JsValue;
use serde_json::json;

#[test]
fn test_object_literal() {
    assert_eq!(eval_json("({a: 1, 'b c': 2, 3: 'three'})"), json!({"a": 1, "b c": 2, "3": "three"}));
    assert_eq!(eval("var o = {x: {y: {z: 'deep'}}}; o.x.y.z"), JsValue::from("deep"));
}

#[test]
fn test_property_insertion_order() {
    assert_eq!(
        eval("var o = {}; o.z = 1; o.a = 2; o.m = 3; var k = ''; for (var p in o) k += p; k"),
        JsValue::from("zam")
    );
}

#[test]
fn test_computed_access() {
    assert_eq!(eval("var o = {}; var key = 'dyn'; o[key] = 5; o.dyn"), JsValue::Int(5));
    assert_eq!(eval("var o = {1: 'one'}; o[1] + o['1']"), JsValue::from("oneone"));
}

#[test]
fn test_missing_property_is_undefined() {
    assert_eq!(eval("({}).nothing"), JsValue::Undefined);
}

#[test]
fn test_property_access_on_null_throws() {
    assert!(throws_error("var n = null; n.x", "TypeError"));
    assert!(throws_error("var u; u.x = 1", "TypeError"));
}

#[test]
fn test_primitive_property_access() {
    assert_eq!(eval("(5).toString()"), JsValue::from("5"));
    assert_eq!(eval("true.toString()"), JsValue::from("true"));
}

#[test]
fn test_has_own_property() {
    assert_eq!(eval("({a: 1}).hasOwnProperty('a')"), JsValue::Boolean(true));
    assert_eq!(eval("({a: 1}).hasOwnProperty('toString')"), JsValue::Boolean(false));
    assert_eq!(eval("[1].hasOwnProperty('length')"), JsValue::Boolean(true));
}

#[test]
fn test_is_prototype_of() {
    assert_eq!(eval("Object.prototype.isPrototypeOf({})"), JsValue::Boolean(true));
    assert_eq!(eval("function P() {} P.prototype.isPrototypeOf(new P())"), JsValue::Boolean(true));
    assert_eq!(eval("Array.prototype.isPrototypeOf({})"), JsValue::Boolean(false));
}

#[test]
fn test_property_is_enumerable() {
    assert_eq!(eval("({a: 1}).propertyIsEnumerable('a')"), JsValue::Boolean(true));
    assert_eq!(eval("[].propertyIsEnumerable('length')"), JsValue::Boolean(false));
}

#[test]
fn test_object_to_string() {
    assert_eq!(eval("({}).toString()"), JsValue::from("[object Object]"));
    assert_eq!(eval("Object.prototype.toString.call([])"), JsValue::from("[object Array]"));
    assert_eq!(eval("Object.prototype.toString.call(null)"), JsValue::from("[object Null]"));
    assert_eq!(eval("'' + {}"), JsValue::from("[object Object]"));
}

#[test]
fn test_value_of_and_to_string_drive_conversion() {
    assert_eq!(eval("var o = {valueOf: function () { return 41; }}; o + 1"), JsValue::Int(42));
    assert_eq!(eval("var o = {toString: function () { return 'custom'; }}; 'x' + o"), JsValue::from("xcustom"));
    assert_eq!(
        eval("var o = {valueOf: function () { return 1; }, toString: function () { return 'two'; }}; String(o)"),
        JsValue::from("two")
    );
}

#[test]
fn test_conversion_without_primitive_is_type_error() {
    assert!(throws_error(
        "var o = {valueOf: function () { return {}; }, toString: function () { return {}; }}; o + 1",
        "TypeError"
    ));
}

#[test]
fn test_object_constructor() {
    assert_eq!(eval("typeof new Object()"), JsValue::from("object"));
    assert_eq!(eval("var o = {}; Object(o) === o"), JsValue::Boolean(true));
    assert_eq!(eval("typeof Object('s')"), JsValue::from("object"));
}

#[test]
fn test_shared_prototype_lookup() {
    assert_eq!(
        eval(
            "function Shape() {}
             Shape.prototype.sides = 0;
             var a = new Shape(), b = new Shape();
             a.sides = 3;
             a.sides * 10 + b.sides"
        ),
        JsValue::Int(30)
    );
}

#[test]
fn test_prototype_change_is_visible() {
    assert_eq!(
        eval("function P() {} var p = new P(); P.prototype.late = 'added'; p.late"),
        JsValue::from("added")
    );
}

#[test]
fn test_builtin_prototype_extension() {
    assert_eq!(
        eval("Array.prototype.last = function () { return this[this.length - 1]; }; [1, 2, 9].last()"),
        JsValue::Int(9)
    );
    assert_eq!(
        eval("String.prototype.shout = function () { return this.toUpperCase() + '!'; }; 'hey'.shout()"),
        JsValue::from("HEY!")
    );
}

#[test]
fn test_many_properties() {
    assert_eq!(
        eval("var o = {}; for (var i = 0; i < 200; i++) o['k' + i] = i; o.k150 + o.k7"),
        JsValue::Int(157)
    );
}

#[test]
fn test_read_only_builtin_properties() {
    assert_eq!(eval("Math.PI = 3; Math.PI > 3.14"), JsValue::Boolean(true));
    assert_eq!(eval("Number.MAX_VALUE = 1; Number.MAX_VALUE > 1"), JsValue::Boolean(true));
}
