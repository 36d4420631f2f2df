//! Loops, switch, labels and exception control flow

use super::{eval, eval_json, throws_error};
use regjs::JsValue;
use serde_json::json;

#[test]
fn test_if_else() {
    assert_eq!(eval("var r; if (1 > 2) r = 'a'; else if (2 > 1) r = 'b'; else r = 'c'; r"), JsValue::from("b"));
}

#[test]
fn test_while_and_do_while() {
    assert_eq!(eval("var i = 0; while (i < 10) i++; i"), JsValue::Int(10));
    assert_eq!(eval("var i = 10; do { i++; } while (i < 5); i"), JsValue::Int(11));
}

#[test]
fn test_for_loop_sum() {
    assert_eq!(eval("var s = 0; for (var i = 0; i < 100; i++) s += i; s"), JsValue::Int(4950));
}

#[test]
fn test_for_loop_with_variable_bound() {
    assert_eq!(
        eval("var n = 7, s = 0; for (var i = 0; i <= n; ++i) { s = s + i; } s"),
        JsValue::Int(28)
    );
}

#[test]
fn test_loop_with_non_numeric_bound() {
    assert_eq!(eval("var n = '3', c = 0; for (var i = 0; i < n; i++) c++; c"), JsValue::Int(3));
    assert_eq!(eval("var c = 0; for (var i = 0.5; i < 3; i++) c++; c"), JsValue::Int(3));
}

#[test]
fn test_break_and_continue() {
    assert_eq!(
        eval("var s = 0; for (var i = 0; i < 10; i++) { if (i == 5) break; if (i % 2) continue; s += i; } s"),
        JsValue::Int(6)
    );
}

#[test]
fn test_labeled_break_and_continue() {
    assert_eq!(
        eval(
            "var hits = 0;
             outer: for (var i = 0; i < 5; i++) {
                 for (var j = 0; j < 5; j++) {
                     if (j == 2) continue outer;
                     if (i == 3) break outer;
                     hits++;
                 }
             }
             hits"
        ),
        JsValue::Int(6)
    );
    assert_eq!(eval("var x = 0; block: { x = 1; break block; x = 2; } x"), JsValue::Int(1));
}

#[test]
fn test_for_in_visits_enumerable_properties() {
    assert_eq!(
        eval_json("var o = {a: 1, b: 2, c: 3}; var keys = []; for (var k in o) keys.push(k); keys"),
        json!(["a", "b", "c"])
    );
}

#[test]
fn test_for_in_skips_builtins_and_includes_inherited() {
    assert_eq!(
        eval_json(
            "function P() {} P.prototype.inherited = 1;
             var o = new P(); o.own = 2;
             var keys = []; for (var k in o) keys.push(k); keys.sort()"
        ),
        json!(["inherited", "own"])
    );
}

#[test]
fn test_for_in_over_array_indices() {
    assert_eq!(
        eval_json("var a = ['x', 'y']; var keys = []; for (var i in a) keys.push(i); keys"),
        json!(["0", "1"])
    );
}

#[test]
fn test_for_in_skips_deleted_properties() {
    assert_eq!(
        eval_json("var o = {a: 1, b: 2}; var keys = []; for (var k in o) { delete o.b; keys.push(k); } keys"),
        json!(["a"])
    );
}

#[test]
fn test_for_in_over_null_runs_zero_times() {
    assert_eq!(eval("var n = 0; for (var k in null) n++; for (var k in undefined) n++; n"), JsValue::Int(0));
}

#[test]
fn test_for_in_with_member_target() {
    assert_eq!(eval("var t = {}; for (t.key in {only: 1}); t.key"), JsValue::from("only"));
}

#[test]
fn test_switch_dense_ints() {
    let source = "function f(x) { switch (x) { case 1: return 'one'; case 2: return 'two'; case 3: return 'three'; default: return 'other'; } }";
    assert_eq!(eval(&format!("{} f(2)", source)), JsValue::from("two"));
    assert_eq!(eval(&format!("{} f(9)", source)), JsValue::from("other"));
    assert_eq!(eval(&format!("{} f('2')", source)), JsValue::from("other"));
    assert_eq!(eval(&format!("{} f(2.0)", source)), JsValue::from("two"));
}

#[test]
fn test_switch_fallthrough() {
    assert_eq!(
        eval("var r = ''; switch (1) { case 1: r += 'a'; case 2: r += 'b'; break; case 3: r += 'c'; } r"),
        JsValue::from("ab")
    );
}

#[test]
fn test_switch_strings() {
    assert_eq!(
        eval("function f(c) { switch (c) { case 'red': return 1; case 'green': return 2; } return 0; } f('green') + f('blue')"),
        JsValue::Int(2)
    );
}

#[test]
fn test_switch_non_constant_cases_are_strict() {
    assert_eq!(
        eval("var one = 1; var r; switch ('1') { case one: r = 'loose'; break; default: r = 'strict'; } r"),
        JsValue::from("strict")
    );
}

#[test]
fn test_default_in_the_middle() {
    assert_eq!(
        eval("var r = ''; switch (5) { case 1: r += '1'; default: r += 'd'; case 2: r += '2'; } r"),
        JsValue::from("d2")
    );
}

#[test]
fn test_try_catch() {
    assert_eq!(eval("try { throw 'boom'; } catch (e) { 'caught ' + e; }"), JsValue::from("caught boom"));
    assert_eq!(eval("var r; try { null.x; } catch (e) { r = e instanceof TypeError; } r"), JsValue::Boolean(true));
}

#[test]
fn test_catch_binding_is_scoped() {
    assert_eq!(eval("var e = 'outer'; try { throw 'inner'; } catch (e) {} e"), JsValue::from("outer"));
}

#[test]
fn test_finally_runs_exactly_once() {
    assert_eq!(
        eval(
            "var count = 0;
             function f() { try { return 'r'; } finally { count++; } }
             f(); count"
        ),
        JsValue::Int(1)
    );
    assert_eq!(
        eval("var count = 0; try { try { throw 1; } finally { count++; } } catch (e) {} count"),
        JsValue::Int(1)
    );
    assert_eq!(
        eval("var count = 0; for (var i = 0; i < 3; i++) { try { continue; } finally { count++; } } count"),
        JsValue::Int(3)
    );
}

#[test]
fn test_finally_can_override_return() {
    assert_eq!(eval("function f() { try { return 1; } finally { return 2; } } f()"), JsValue::Int(2));
}

#[test]
fn test_finally_preserves_return_value() {
    assert_eq!(
        eval("var x = 1; function f() { try { return x; } finally { x = 5; } } f() + x"),
        JsValue::Int(6)
    );
}

#[test]
fn test_break_through_nested_finally() {
    assert_eq!(
        eval(
            "var log = '';
             for (;;) {
                 try {
                     try { break; } finally { log += 'a'; }
                 } finally { log += 'b'; }
             }
             log"
        ),
        JsValue::from("ab")
    );
}

#[test]
fn test_rethrow_from_catch_runs_finally() {
    assert_eq!(
        eval(
            "var log = '';
             try {
                 try { throw 'x'; } catch (e) { log += 'c'; throw e + 'y'; } finally { log += 'f'; }
             } catch (e2) { log += e2; }
             log"
        ),
        JsValue::from("cfxy")
    );
}

#[test]
fn test_exception_crosses_frames() {
    assert_eq!(
        eval(
            "function thrower(n) { if (n == 0) throw 'deep'; return thrower(n - 1); }
             var r; try { thrower(10); } catch (e) { r = e; } r"
        ),
        JsValue::from("deep")
    );
}

#[test]
fn test_throw_inside_with_restores_scope() {
    assert_eq!(
        eval(
            "var x = 'global';
             function f() {
                 try {
                     with ({x: 'a'}) { with ({x: 'b'}) { with ({x: 'c'}) { throw 'out'; } } }
                 } catch (e) {}
                 return x;
             }
             f()"
        ),
        JsValue::from("global")
    );
}

#[test]
fn test_uncaught_throw_reports_location() {
    let err = super::eval_result("var a = 1;\nthrow new Error('bad');").unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("Uncaught Error: bad at 2:"), "{}", text);
}

#[test]
fn test_uncaught_primitive() {
    assert!(throws_error("throw 42", "Uncaught 42"));
}

#[test]
fn test_with_statement() {
    assert_eq!(eval("var o = {a: 5}; with (o) { a = a + 1; } o.a"), JsValue::Int(6));
    assert_eq!(eval("var b = 1; with ({}) { b = 2; } b"), JsValue::Int(2));
}

#[test]
fn test_conditional_chains() {
    assert_eq!(
        eval("function grade(n) { return n > 90 ? 'A' : n > 80 ? 'B' : 'C'; } grade(95) + grade(85) + grade(10)"),
        JsValue::from("ABC")
    );
}

#[test]
fn test_empty_loop_bodies() {
    assert_eq!(eval("for (var i = 0; i < 5; i++); i"), JsValue::Int(5));
    assert_eq!(eval("var j = 0; while (j++ < 3); j"), JsValue::Int(4));
}
