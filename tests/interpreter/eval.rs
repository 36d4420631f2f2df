//! Direct and indirect eval

use super::{create_test_runtime, eval, throws_error};
use regjs::JsValue;

#[test]
fn test_eval_returns_completion_value() {
    assert_eq!(eval("eval('1 + 2')"), JsValue::Int(3));
    assert_eq!(eval("eval('var q = 1; q * 10')"), JsValue::Int(10));
    assert_eq!(eval("eval('')"), JsValue::Undefined);
}

#[test]
fn test_eval_of_non_string_returns_argument() {
    assert_eq!(eval("eval(42)"), JsValue::Int(42));
    assert_eq!(eval("var o = {}; eval(o) === o"), JsValue::Boolean(true));
}

#[test]
fn test_direct_eval_sees_locals() {
    assert_eq!(eval("function f() { var secret = 'local'; return eval('secret'); } f()"), JsValue::from("local"));
    assert_eq!(eval("function f(p) { return eval('p * 2'); } f(21)"), JsValue::Int(42));
}

#[test]
fn test_direct_eval_writes_locals() {
    assert_eq!(eval("function f() { var x = 1; eval('x = 2'); return x; } f()"), JsValue::Int(2));
}

#[test]
fn test_eval_found_on_with_object_is_not_direct() {
    assert_eq!(
        eval("var x = 'g'; function f() { var x = 'l'; with ({eval: eval}) { return eval('x'); } } f()"),
        JsValue::from("g")
    );
    assert_eq!(
        eval("var x = 'g'; function f() { var x = 'l'; with ({}) { return eval('x'); } } f()"),
        JsValue::from("l")
    );
}

#[test]
fn test_closure_observes_eval_assignment() {
    assert_eq!(
        eval("function f() { var x = 1; var get = function () { return x; }; eval('x = 2'); return get(); } f()"),
        JsValue::Int(2)
    );
}

#[test]
fn test_eval_declares_in_calling_function() {
    assert_eq!(
        eval("function f() { eval('var added = 5'); return added; } f()"),
        JsValue::Int(5)
    );
    assert_eq!(eval("function f() { eval('var inner = 5'); } f(); typeof inner"), JsValue::from("undefined"));
}

#[test]
fn test_eval_defines_functions_at_call_site() {
    assert_eq!(
        eval("function f() { eval('function helper() { return 9; }'); return helper(); } f()"),
        JsValue::Int(9)
    );
}

#[test]
fn test_global_eval_declares_globals() {
    let mut runtime = create_test_runtime();
    runtime.eval("eval('var fromEval = 3')").unwrap();
    assert_eq!(runtime.eval("fromEval").unwrap(), JsValue::Int(3));
}

#[test]
fn test_eval_sees_this() {
    assert_eq!(eval("var o = {v: 8, m: function () { return eval('this.v'); }}; o.m()"), JsValue::Int(8));
}

#[test]
fn test_indirect_eval_uses_global_scope() {
    assert_eq!(
        eval("var x = 'global'; function f() { var x = 'local'; var e = eval; return e('x'); } f()"),
        JsValue::from("global")
    );
}

#[test]
fn test_eval_inside_with() {
    assert_eq!(
        eval("function f(o) { with (o) { return eval('field + 1'); } } f({field: 41})"),
        JsValue::Int(42)
    );
}

#[test]
fn test_eval_syntax_error_is_catchable() {
    assert_eq!(
        eval("var r; try { eval('var = ;'); } catch (e) { r = e instanceof SyntaxError; } r"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_eval_propagates_exceptions() {
    assert!(throws_error("eval('throw new RangeError(\"from eval\")')", "RangeError: from eval"));
}

#[test]
fn test_loop_in_eval_function_stays_correct() {
    assert_eq!(
        eval("function f(n) { var s = 0; eval(''); for (var i = 0; i < n; i++) s += i; return s; } f(10)"),
        JsValue::Int(45)
    );
}

#[test]
fn test_eval_in_loop_sees_current_iteration() {
    assert_eq!(
        eval("function f() { var out = ''; for (var i = 0; i < 3; i++) out += eval('i'); return out; } f()"),
        JsValue::from("012")
    );
}
