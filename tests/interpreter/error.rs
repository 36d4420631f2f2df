//! Error objects and host-facing errors

use super::{create_test_runtime, eval, eval_result, throws_error};
use regjs::{JsError, JsValue};

#[test]
fn test_error_constructor() {
    assert_eq!(eval("new Error('m').message"), JsValue::from("m"));
    assert_eq!(eval("new Error('m').name"), JsValue::from("Error"));
    assert_eq!(eval("Error('called').message"), JsValue::from("called"));
    assert_eq!(eval("new Error().message"), JsValue::from(""));
}

#[test]
fn test_native_error_types() {
    assert_eq!(eval("new TypeError('t').name"), JsValue::from("TypeError"));
    assert_eq!(eval("new RangeError('r') instanceof Error"), JsValue::Boolean(true));
    assert_eq!(eval("new SyntaxError('s') instanceof RangeError"), JsValue::Boolean(false));
    assert_eq!(eval("new EvalError('e').name"), JsValue::from("EvalError"));
    assert_eq!(eval("new ReferenceError('x') instanceof ReferenceError"), JsValue::Boolean(true));
}

#[test]
fn test_error_to_string() {
    assert_eq!(eval("new TypeError('bad thing').toString()"), JsValue::from("TypeError: bad thing"));
    assert_eq!(eval("new Error().toString()"), JsValue::from("Error"));
    assert_eq!(eval("'' + new RangeError('x')"), JsValue::from("RangeError: x"));
}

#[test]
fn test_runtime_errors_are_catchable_error_objects() {
    assert_eq!(
        eval("var r; try { undefined.x; } catch (e) { r = e.name; } r"),
        JsValue::from("TypeError")
    );
    assert_eq!(
        eval("var r; try { missing; } catch (e) { r = (e instanceof ReferenceError) + ':' + e.message; } r"),
        JsValue::from("true:missing is not defined")
    );
    assert_eq!(
        eval("var r; try { new Array(-1); } catch (e) { r = e.name; } r"),
        JsValue::from("RangeError")
    );
}

#[test]
fn test_thrown_objects_carry_line() {
    assert_eq!(
        eval("var r;\ntry {\n  throw new Error('where');\n} catch (e) { r = e.line; }\nr"),
        JsValue::Int(3)
    );
}

#[test]
fn test_throw_keeps_existing_position_properties() {
    assert_eq!(
        eval("var e = new Error('x'); e.line = 42; var r; try { throw e; } catch (x) { r = x.line; } r"),
        JsValue::Int(42)
    );
    assert_eq!(
        eval("var o = {sourceURL: 'mine'}; var r; try { throw o; } catch (x) { r = x.sourceURL + ':' + x.line; } r"),
        JsValue::from("mine:1")
    );
}

#[test]
fn test_custom_error_objects() {
    assert_eq!(
        eval("function MyError(m) { this.message = m; } MyError.prototype = new Error(); MyError.prototype.name = 'MyError';
              var r; try { throw new MyError('custom'); } catch (e) { r = e.name + '/' + e.message + '/' + (e instanceof Error); } r"),
        JsValue::from("MyError/custom/true")
    );
}

#[test]
fn test_uncaught_error_message() {
    let err = eval_result("null.boom").unwrap_err();
    assert!(err.to_string().contains("TypeError"), "{}", err);
    assert!(err.to_string().starts_with("Uncaught"), "{}", err);
}

#[test]
fn test_uncaught_value_is_available_to_host() {
    let err = eval_result("throw {code: 7}").unwrap_err();
    match err {
        JsError::Exception { value, .. } => assert!(value.is_object()),
        other => panic!("expected exception, got {:?}", other),
    }
}

#[test]
fn test_uncaught_error_includes_url() {
    let mut runtime = create_test_runtime();
    let err = runtime.eval_with_url("\n\nthrow new Error('x');", Some("app.js")).unwrap_err();
    assert!(err.to_string().contains("app.js:3:"), "{}", err);
}

#[test]
fn test_syntax_errors_are_reported_before_running() {
    let mut runtime = create_test_runtime();
    let err = runtime.eval("ran = true; var = ;").unwrap_err();
    assert!(matches!(err, JsError::SyntaxError { .. }), "{:?}", err);
    assert!(runtime.eval("typeof ran").unwrap() == JsValue::from("undefined"));
}

#[test]
fn test_runtime_recovers_after_error() {
    let mut runtime = create_test_runtime();
    assert!(runtime.eval("throw 1").is_err());
    assert_eq!(runtime.eval("1 + 1").unwrap(), JsValue::Int(2));
    assert!(runtime.eval("function f() { throw 'in f'; } f()").is_err());
    assert_eq!(runtime.eval("[1, 2].length").unwrap(), JsValue::Int(2));
}

#[test]
fn test_error_in_nested_native_call_reaches_host() {
    assert!(throws_error("[1, 2].sort(function () { return undefined.x; })", "TypeError"));
}
