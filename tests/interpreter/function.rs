//! Calls, closures, constructors and the arguments object

use super::{eval, eval_json, throws_error};
use regjs::JsValue;
use serde_json::json;

#[test]
fn test_recursion() {
    assert_eq!(
        eval("function f(n) { if (n == 0) return 0; return n + f(n - 1); } f(5)"),
        JsValue::Int(15)
    );
}

#[test]
fn test_deep_recursion() {
    assert_eq!(
        eval("function count(n) { return n == 0 ? 0 : 1 + count(n - 1); } count(2000)"),
        JsValue::Int(2000)
    );
}

#[test]
fn test_fibonacci() {
    assert_eq!(
        eval("function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(15)"),
        JsValue::Int(610)
    );
}

#[test]
fn test_function_hoisting() {
    assert_eq!(eval("var r = early(); function early() { return 'hoisted'; } r"), JsValue::from("hoisted"));
}

#[test]
fn test_missing_arguments_are_undefined() {
    assert_eq!(eval("function f(a, b, c) { return typeof c; } f(1)"), JsValue::from("undefined"));
    assert_eq!(eval("function f(a, b) { return b; } f(1)"), JsValue::Undefined);
}

#[test]
fn test_excess_arguments_are_visible_through_arguments() {
    assert_eq!(
        eval("function f(a) { return arguments.length + ':' + arguments[2]; } f(1, 2, 3)"),
        JsValue::from("3:3")
    );
    assert_eq!(
        eval("function sum() { var s = 0; for (var i = 0; i < arguments.length; i++) s += arguments[i]; return s; } sum(1, 2, 3, 4)"),
        JsValue::Int(10)
    );
}

#[test]
fn test_parameters_after_excess_arguments() {
    assert_eq!(
        eval("function f(a, b) { var local = a * 10; return local + b; } f(1, 2, 3, 4, 5)"),
        JsValue::Int(12)
    );
}

#[test]
fn test_arguments_callee() {
    assert_eq!(
        eval("var fact = function (n) { return n <= 1 ? 1 : n * arguments.callee(n - 1); }; fact(5)"),
        JsValue::Int(120)
    );
}

#[test]
fn test_function_arguments_property() {
    assert_eq!(
        eval("function outer(x) { return inner(); } function inner() { return outer.arguments[0]; } outer('seen')"),
        JsValue::from("seen")
    );
    assert_eq!(eval("function idle() {} idle.arguments"), JsValue::Null);
}

#[test]
fn test_function_caller_property() {
    assert_eq!(
        eval("function callee() { return callee.caller; } function named() { return callee(); } named() === named"),
        JsValue::Boolean(true)
    );
    assert_eq!(eval("function top() { return top.caller; } top()"), JsValue::Null);
}

#[test]
fn test_closures_capture_variables() {
    assert_eq!(
        eval(
            "function counter() { var c = 0; return function () { c++; return c; }; }
             var next = counter(); next(); next(); next()"
        ),
        JsValue::Int(3)
    );
}

#[test]
fn test_closures_see_later_assignments() {
    assert_eq!(
        eval("function make() { var x = 1; var get = function () { return x; }; x = 2; return get; } make()()"),
        JsValue::Int(2)
    );
}

#[test]
fn test_independent_closures() {
    assert_eq!(
        eval(
            "function counter() { var c = 0; return function () { return ++c; }; }
             var a = counter(), b = counter();
             a(); a(); b();
             a() * 10 + b()"
        ),
        JsValue::Int(32)
    );
}

#[test]
fn test_closure_over_parameters() {
    assert_eq!(
        eval("function adder(n) { return function (m) { return n + m; }; } adder(3)(4)"),
        JsValue::Int(7)
    );
}

#[test]
fn test_named_function_expression_binds_its_name() {
    assert_eq!(
        eval("var f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }; f(6)"),
        JsValue::Int(720)
    );
    assert_eq!(eval("var g = function inner() {}; typeof inner"), JsValue::from("undefined"));
}

#[test]
fn test_this_binding() {
    assert_eq!(eval("var o = {v: 4, get: function () { return this.v; }}; o.get()"), JsValue::Int(4));
    assert_eq!(eval("var o = {v: 4}; o['get'] = function () { return this.v; }; o['get']()"), JsValue::Int(4));
    assert_eq!(eval("function f() { return this; } f() === this"), JsValue::Boolean(true));
}

#[test]
fn test_call_and_apply() {
    assert_eq!(eval("function f(a, b) { return this.k + a + b; } f.call({k: 1}, 2, 3)"), JsValue::Int(6));
    assert_eq!(eval("function f(a, b) { return this.k + a + b; } f.apply({k: 1}, [2, 3])"), JsValue::Int(6));
    assert_eq!(eval("function f() { return arguments.length; } f.apply(null)"), JsValue::Int(0));
}

#[test]
fn test_constructors() {
    assert_eq!(
        eval("function Point(x, y) { this.x = x; this.y = y; } var p = new Point(3, 4); p.x * p.y"),
        JsValue::Int(12)
    );
    assert_eq!(
        eval("function P() {} P.prototype.hello = function () { return 'hi'; }; new P().hello()"),
        JsValue::from("hi")
    );
    assert_eq!(eval("function P() {} var p = new P; p instanceof P"), JsValue::Boolean(true));
    assert_eq!(eval("function P() {} new P().constructor === P"), JsValue::Boolean(true));
}

#[test]
fn test_constructor_returning_object_replaces_this() {
    assert_eq!(eval("function F() { this.a = 1; return {a: 2}; } new F().a"), JsValue::Int(2));
    assert_eq!(eval("function F() { this.a = 1; return 5; } new F().a"), JsValue::Int(1));
}

#[test]
fn test_prototype_chain_methods() {
    assert_eq!(
        eval(
            "function Animal(name) { this.name = name; }
             Animal.prototype.speak = function () { return this.name + ' speaks'; };
             function Dog(name) { Animal.call(this, name); }
             Dog.prototype = new Animal();
             Dog.prototype.speak = function () { return this.name + ' barks'; };
             var d = new Dog('rex');
             d.speak() + ', ' + (d instanceof Animal)"
        ),
        JsValue::from("rex barks, true")
    );
}

#[test]
fn test_function_length_and_name() {
    assert_eq!(eval("function f(a, b, c) {} f.length"), JsValue::Int(3));
    assert_eq!(eval("Math.max.length"), JsValue::Int(2));
}

#[test]
fn test_calling_non_function_is_type_error() {
    assert!(throws_error("var x = 1; x()", "TypeError"));
    assert!(throws_error("var o = {}; o.missing()", "TypeError"));
    assert!(throws_error("new 5", "TypeError"));
}

#[test]
fn test_function_constructor() {
    assert_eq!(eval("var add = new Function('a', 'b', 'return a + b'); add(2, 3)"), JsValue::Int(5));
    assert_eq!(eval("Function('return 7')()"), JsValue::Int(7));
}

#[test]
fn test_function_to_string() {
    assert_eq!(
        eval("function f(a) { return a; } f.toString()"),
        JsValue::from("function f(a) { return a; }")
    );
    let native = eval("Math.max.toString()");
    assert!(native.to_string().contains("[native code]"));
}

#[test]
fn test_higher_order_functions() {
    assert_eq!(
        eval_json(
            "function map(list, fn) { var out = []; for (var i = 0; i < list.length; i++) out.push(fn(list[i])); return out; }
             map([1, 2, 3], function (x) { return x * x; })"
        ),
        json!([1, 4, 9])
    );
}

#[test]
fn test_native_reentry_calls_script() {
    assert_eq!(
        eval_json("[3, 1, 2].sort(function (a, b) { return a - b; })"),
        json!([1, 2, 3])
    );
    assert_eq!(
        eval("'a-b'.replace('-', function (m) { return '[' + m + ']'; })"),
        JsValue::from("a[-]b")
    );
}

#[test]
fn test_exceptions_cross_native_frames() {
    assert_eq!(
        eval("var r; try { [2, 1].sort(function () { throw 'cmp'; }); } catch (e) { r = e; } r"),
        JsValue::from("cmp")
    );
}

#[test]
fn test_unbounded_script_recursion_is_range_error() {
    assert!(throws_error("function f() { return f(); } f()", "RangeError"));
    assert_eq!(
        eval("function f() { return f(); } var r; try { f(); } catch (e) { r = e.message; } r"),
        JsValue::from("Maximum call stack size exceeded")
    );
}

#[test]
fn test_unbounded_native_reentry_is_range_error() {
    assert!(throws_error("function f() { return f.call(null); } f()", "RangeError"));
    assert!(throws_error(
        "function g() { return [1, 2].sort(function () { return g(); }); } g()",
        "RangeError"
    ));
    assert_eq!(
        eval("function f() { return f.call(null); } var r; try { f(); } catch (e) { r = e.name; } r + ':' + f.call.length"),
        JsValue::from("RangeError:1")
    );
}
