//! Variable resolution through the scope chain

use super::{create_test_runtime, eval, throws_error};
use regjs::JsValue;

#[test]
fn test_var_hoisting() {
    assert_eq!(eval("var r = typeof v; var v = 1; r"), JsValue::from("undefined"));
    assert_eq!(eval("function f() { x = 5; var x; return x; } f()"), JsValue::Int(5));
}

#[test]
fn test_locals_shadow_globals() {
    assert_eq!(
        eval("var x = 'global'; function f() { var x = 'local'; return x; } f() + ' ' + x"),
        JsValue::from("local global")
    );
}

#[test]
fn test_global_assignment_from_function() {
    assert_eq!(eval("var g = 1; function set() { g = 2; } set(); g"), JsValue::Int(2));
}

#[test]
fn test_nested_closure_resolution() {
    assert_eq!(
        eval(
            "function a() { var x = 1;
                 function b() { var y = 2;
                     function c() { return x + y; }
                     return c();
                 }
                 return b();
             }
             a()"
        ),
        JsValue::Int(3)
    );
}

#[test]
fn test_with_lookup_falls_through() {
    assert_eq!(
        eval("var outside = 'o'; function f(obj) { with (obj) { return inside + outside; } } f({inside: 'i'})"),
        JsValue::from("io")
    );
}

#[test]
fn test_with_shadows_locals() {
    assert_eq!(
        eval("function f() { var v = 'local'; with ({v: 'object'}) { return v; } } f()"),
        JsValue::from("object")
    );
}

#[test]
fn test_with_assignment_writes_to_object() {
    assert_eq!(
        eval("function f() { var o = {v: 1}; var v = 0; with (o) { v = 9; } return o.v * 10 + v; } f()"),
        JsValue::Int(90)
    );
}

#[test]
fn test_function_declared_in_with_sees_object() {
    assert_eq!(
        eval("var o = {k: 'from object'}; var get; with (o) { get = function () { return k; }; } get()"),
        JsValue::from("from object")
    );
}

#[test]
fn test_catch_scope_closure() {
    assert_eq!(
        eval("var f; try { throw 'captured'; } catch (err) { f = function () { return err; }; } f()"),
        JsValue::from("captured")
    );
}

#[test]
fn test_globals_persist_across_evals() {
    let mut runtime = create_test_runtime();
    runtime.eval("var counter = 10; function bump() { counter++; return counter; }").unwrap();
    runtime.eval("bump(); bump();").unwrap();
    assert_eq!(runtime.eval("counter").unwrap(), JsValue::Int(12));
}

#[test]
fn test_redeclaring_var_keeps_value() {
    let mut runtime = create_test_runtime();
    runtime.eval("var kept = 'first';").unwrap();
    assert_eq!(runtime.eval("var kept; kept").unwrap(), JsValue::from("first"));
}

#[test]
fn test_later_program_sees_new_function() {
    let mut runtime = create_test_runtime();
    runtime.eval("function early() { return typeof later == 'function' ? later() : 'missing'; }").unwrap();
    assert_eq!(runtime.eval("early()").unwrap(), JsValue::from("missing"));
    runtime.eval("function later() { return 'found'; }").unwrap();
    assert_eq!(runtime.eval("early()").unwrap(), JsValue::from("found"));
}

#[test]
fn test_global_var_is_property_of_global_object() {
    assert_eq!(eval("var visible = 3; this.visible"), JsValue::Int(3));
    assert_eq!(eval("this.made = 4; made"), JsValue::Int(4));
}

#[test]
fn test_global_var_cannot_be_deleted() {
    assert_eq!(eval("var fixed = 1; delete fixed"), JsValue::Boolean(false));
    assert_eq!(eval("loose = 1; delete loose"), JsValue::Boolean(true));
}

#[test]
fn test_global_const_survives_reassignment() {
    let mut runtime = create_test_runtime();
    runtime.eval("const LIMIT = 5;").unwrap();
    runtime.eval("LIMIT = 6;").unwrap();
    assert_eq!(runtime.eval("LIMIT").unwrap(), JsValue::Int(5));
}

#[test]
fn test_reading_unbound_in_function_throws() {
    assert!(throws_error("function f() { return nowhere; } f()", "ReferenceError"));
}

#[test]
fn test_parameters_shadow_outer_names() {
    assert_eq!(eval("var a = 1; function f(a) { a = 2; return a; } f(5) + a"), JsValue::Int(3));
}

#[test]
fn test_duplicate_parameter_takes_last() {
    assert_eq!(eval("function f(a, a) { return a; } f(1, 2)"), JsValue::Int(2));
}

#[test]
fn test_arguments_can_be_shadowed_by_var() {
    assert_eq!(eval("function f() { var arguments = 3; return arguments; } f(1)"), JsValue::Int(3));
}
