//! Array literals and Array.prototype

use super::{eval, eval_json, throws_error};
use regjs::JsValue;
use serde_json::json;

#[test]
fn test_array_literal_and_length() {
    assert_eq!(eval("[1, 2, 3].length"), JsValue::Int(3));
    assert_eq!(eval("[].length"), JsValue::Int(0));
    assert_eq!(eval("[1, , 3].length"), JsValue::Int(3));
    assert_eq!(eval("[1, 2,].length"), JsValue::Int(2));
}

#[test]
fn test_holes_read_as_undefined() {
    assert_eq!(eval("var a = [1, , 3]; a[1]"), JsValue::Undefined);
    assert_eq!(eval("var a = [1, , 3]; 1 in a"), JsValue::Boolean(false));
}

#[test]
fn test_index_assignment_grows_length() {
    assert_eq!(eval("var a = []; a[4] = 'x'; a.length"), JsValue::Int(5));
    assert_eq!(eval("var a = [1, 2, 3]; a['1'] = 'two'; a[1]"), JsValue::from("two"));
}

#[test]
fn test_length_assignment_truncates() {
    assert_eq!(eval_json("var a = [1, 2, 3, 4]; a.length = 2; a"), json!([1, 2]));
    assert_eq!(eval("var a = [1, 2, 3]; a.length = 0; a[0]"), JsValue::Undefined);
    assert!(throws_error("var a = []; a.length = -1", "RangeError"));
}

#[test]
fn test_array_constructor() {
    assert_eq!(eval("new Array(5).length"), JsValue::Int(5));
    assert_eq!(eval_json("new Array(1, 2, 3)"), json!([1, 2, 3]));
    assert_eq!(eval_json("Array('a')"), json!(["a"]));
    assert!(throws_error("new Array(1.5)", "RangeError"));
}

#[test]
fn test_push_and_pop() {
    assert_eq!(eval("var a = [1]; a.push(2, 3)"), JsValue::Int(3));
    assert_eq!(eval_json("var a = [1]; a.push(2, 3); a"), json!([1, 2, 3]));
    assert_eq!(eval("var a = [1, 2]; a.pop()"), JsValue::Int(2));
    assert_eq!(eval("var a = [1, 2]; a.pop(); a.length"), JsValue::Int(1));
    assert_eq!(eval("[].pop()"), JsValue::Undefined);
}

#[test]
fn test_shift_and_unshift() {
    assert_eq!(eval("var a = [1, 2, 3]; a.shift()"), JsValue::Int(1));
    assert_eq!(eval_json("var a = [1, 2, 3]; a.shift(); a"), json!([2, 3]));
    assert_eq!(eval("var a = [3]; a.unshift(1, 2)"), JsValue::Int(3));
    assert_eq!(eval_json("var a = [3]; a.unshift(1, 2); a"), json!([1, 2, 3]));
}

#[test]
fn test_splice() {
    assert_eq!(eval_json("var a = [1, 2, 3, 4, 5]; a.splice(1, 2)"), json!([2, 3]));
    assert_eq!(eval_json("var a = [1, 2, 3, 4, 5]; a.splice(1, 2); a"), json!([1, 4, 5]));
    assert_eq!(eval_json("var a = [1, 2, 3]; a.splice(1, 0, 'x', 'y'); a"), json!([1, "x", "y", 2, 3]));
    assert_eq!(eval_json("var a = [1, 2, 3, 4]; a.splice(-2, 1); a"), json!([1, 2, 4]));
}

#[test]
fn test_splice_with_only_start_removes_the_rest() {
    assert_eq!(eval_json("var a = [1, 2, 3, 4]; var r = a.splice(1); [a, r]"), json!([[1], [2, 3, 4]]));
    assert_eq!(eval_json("var a = [1, 2]; a.splice(); a"), json!([1, 2]));
}

#[test]
fn test_reverse() {
    assert_eq!(eval_json("[1, 2, 3].reverse()"), json!([3, 2, 1]));
}

#[test]
fn test_default_sort_compares_strings() {
    assert_eq!(eval_json("[10, 9, 1, 100].sort()"), json!([1, 10, 100, 9]));
    assert_eq!(eval_json("['b', 'c', 'a'].sort()"), json!(["a", "b", "c"]));
}

#[test]
fn test_sort_places_undefined_last() {
    assert_eq!(eval("var a = [3, undefined, 1]; a.sort(); a[2]"), JsValue::Undefined);
    assert_eq!(eval("var a = [3, undefined, 1]; a.sort(); a[0]"), JsValue::Int(1));
}

#[test]
fn test_sort_with_comparator_is_stable() {
    assert_eq!(
        eval_json(
            "var people = [{n: 'a', age: 30}, {n: 'b', age: 20}, {n: 'c', age: 30}, {n: 'd', age: 20}];
             people.sort(function (x, y) { return x.age - y.age; });
             var names = []; for (var i = 0; i < people.length; i++) names.push(people[i].n); names"
        ),
        json!(["b", "d", "a", "c"])
    );
}

#[test]
fn test_sort_rejects_non_function_comparator() {
    assert!(throws_error("[2, 1].sort(5)", "TypeError"));
}

#[test]
fn test_concat() {
    assert_eq!(eval_json("[1].concat([2, 3], 4, [[5]])"), json!([1, 2, 3, 4, [5]]));
}

#[test]
fn test_slice() {
    assert_eq!(eval_json("[1, 2, 3, 4].slice(1, 3)"), json!([2, 3]));
    assert_eq!(eval_json("[1, 2, 3, 4].slice(-2)"), json!([3, 4]));
    assert_eq!(eval_json("[1, 2, 3].slice()"), json!([1, 2, 3]));
}

#[test]
fn test_join_and_to_string() {
    assert_eq!(eval("[1, 2, 3].join('-')"), JsValue::from("1-2-3"));
    assert_eq!(eval("[1, null, undefined, 4].join()"), JsValue::from("1,,,4"));
    assert_eq!(eval("[1, [2, 3]].toString()"), JsValue::from("1,2,3"));
    assert_eq!(eval("'' + [1, 2]"), JsValue::from("1,2"));
}

#[test]
fn test_index_of() {
    assert_eq!(eval("[1, 2, 3, 2].indexOf(2)"), JsValue::Int(1));
    assert_eq!(eval("[1, 2, 3, 2].indexOf(2, 2)"), JsValue::Int(3));
    assert_eq!(eval("[1, 2, 3].indexOf('2')"), JsValue::Int(-1));
}

#[test]
fn test_is_array() {
    assert_eq!(eval("Array.isArray([])"), JsValue::Boolean(true));
    assert_eq!(eval("Array.isArray({length: 0})"), JsValue::Boolean(false));
}

#[test]
fn test_generic_methods_on_arguments() {
    assert_eq!(
        eval("function f() { return Array.prototype.join.call(arguments, '+'); } f(1, 2, 3)"),
        JsValue::from("1+2+3")
    );
    assert_eq!(
        eval_json("function f() { return Array.prototype.slice.call(arguments, 1); } f('a', 'b', 'c')"),
        json!(["b", "c"])
    );
}

#[test]
fn test_large_array_building() {
    assert_eq!(
        eval("var a = []; for (var i = 0; i < 1000; i++) a.push(i * 2); a[999] + a.length"),
        JsValue::Int(2998)
    );
}

#[test]
fn test_nested_arrays() {
    assert_eq!(eval("var m = [[1, 2], [3, 4]]; m[1][0]"), JsValue::Int(3));
}
