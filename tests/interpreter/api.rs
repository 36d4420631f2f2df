//! The host-facing Runtime API

use super::create_test_runtime;
use regjs::{JsError, JsValue, Runtime, VmConfig};
use serde_json::json;

#[test]
fn test_call_function_spreads_array_arguments() {
    let mut runtime = create_test_runtime();
    runtime.eval("function add(a, b) { return a + b; }").unwrap();
    assert_eq!(runtime.call_function("add", &json!([2, 3])).unwrap(), JsValue::Int(5));
}

#[test]
fn test_call_function_with_single_argument() {
    let mut runtime = create_test_runtime();
    runtime.eval("function keys(o) { var k = []; for (var p in o) k.push(p); return k.join(); }").unwrap();
    assert_eq!(
        runtime.call_function("keys", &json!({"x": 1, "y": 2})).unwrap(),
        JsValue::from("x,y")
    );
}

#[test]
fn test_call_function_json_round_trips_structures() {
    let mut runtime = create_test_runtime();
    runtime
        .eval("function wrap(v) { return {value: v, doubled: v.n * 2, tags: ['a', 'b']}; }")
        .unwrap();
    assert_eq!(
        runtime.call_function_json("wrap", &json!([{"n": 21}])).unwrap(),
        json!({"value": {"n": 21}, "doubled": 42, "tags": ["a", "b"]})
    );
}

#[test]
fn test_calling_missing_function_is_type_error() {
    let mut runtime = create_test_runtime();
    runtime.eval("var notCallable = 3;").unwrap();
    let err = runtime.call_function("notCallable", &json!([])).unwrap_err();
    assert!(matches!(err, JsError::TypeError { .. }), "{:?}", err);
}

#[test]
fn test_set_global_json() {
    let mut runtime = create_test_runtime();
    runtime
        .set_global_json("config", &json!({"name": "demo", "limits": [1, 2], "on": true, "none": null}))
        .unwrap();
    assert_eq!(runtime.eval("config.name + config.limits.length").unwrap(), JsValue::from("demo2"));
    assert_eq!(runtime.eval("config.none === null && config.on").unwrap(), JsValue::Boolean(true));
}

#[test]
fn test_to_json_conversion_rules() {
    let mut runtime = create_test_runtime();
    let value = runtime
        .eval("({n: 1.5, s: 'x', u: undefined, f: function () {}, wrapped: new Number(4), list: [1, undefined]})")
        .unwrap();
    assert_eq!(
        runtime.to_json(&value).unwrap(),
        json!({"n": 1.5, "s": "x", "wrapped": 4, "list": [1, null]})
    );
}

#[test]
fn test_to_json_rejects_cycles() {
    let mut runtime = create_test_runtime();
    let value = runtime.eval("var a = {}; a.self = a; a").unwrap();
    assert!(runtime.to_json(&value).is_err());
}

#[test]
fn test_get_global() {
    let mut runtime = create_test_runtime();
    runtime.eval("var answer = 42;").unwrap();
    assert_eq!(runtime.get_global("answer").unwrap(), JsValue::Int(42));
    assert_eq!(runtime.get_global("nothing").unwrap(), JsValue::Undefined);
}

#[test]
fn test_host_call_into_closure() {
    let mut runtime = create_test_runtime();
    let counter = runtime
        .eval("(function () { var c = 0; return function () { return ++c; }; })()")
        .unwrap();
    let interp = runtime.interpreter_mut();
    interp.call_function(&counter, JsValue::Undefined, &[]).unwrap();
    assert_eq!(
        interp.call_function(&counter, JsValue::Undefined, &[]).unwrap(),
        JsValue::Int(2)
    );
}

#[test]
fn test_native_function_registration() {
    fn double(
        interp: &mut regjs::Interpreter,
        _this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let n = interp.to_number(args.first().unwrap_or(&JsValue::Undefined))?;
        Ok(JsValue::number(n * 2.0))
    }

    let mut runtime = create_test_runtime();
    let interp = runtime.interpreter_mut();
    let global = interp.global_object();
    interp.register_method(global, "double", double, 1);
    assert_eq!(runtime.eval("double(21) + double('1')").unwrap(), JsValue::Int(44));
}

#[test]
fn test_native_errors_become_script_exceptions() {
    fn fail(_interp: &mut regjs::Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
        Err(JsError::range_error("out of range"))
    }

    let mut runtime = create_test_runtime();
    let interp = runtime.interpreter_mut();
    let global = interp.global_object();
    interp.register_method(global, "fail", fail, 0);
    assert_eq!(
        runtime.eval("var r; try { fail(); } catch (e) { r = e.name + ': ' + e.message; } r").unwrap(),
        JsValue::from("RangeError: out of range")
    );
}

#[test]
fn test_config_from_json() {
    let config: VmConfig = serde_json::from_value(json!({"timeout_ms": 50, "gc_threshold": 7})).unwrap();
    assert_eq!(config.timeout_ms, 50);
    assert_eq!(config.gc_threshold, 7);
    assert_eq!(config.max_reentry_depth, VmConfig::default().max_reentry_depth);
    let mut runtime = Runtime::with_config(config);
    assert_eq!(runtime.timeout_ms(), 50);
    assert_eq!(runtime.eval("6 * 7").unwrap(), JsValue::Int(42));

    let parsed = VmConfig::from_json(r#"{"debug_hooks": true}"#).unwrap();
    assert!(parsed.debug_hooks);
    assert_eq!(parsed.timeout_ms, 3000);
    assert!(VmConfig::from_json("{\"timeout_ms\": \"soon\"}").is_err());
}

#[test]
fn test_source_url_is_recorded() {
    let mut runtime = create_test_runtime();
    runtime
        .eval_with_url("function located() { throw new Error('here'); }", Some("lib.js"))
        .unwrap();
    assert_eq!(
        runtime.eval("var u; try { located(); } catch (e) { u = e.sourceURL; } u").unwrap(),
        JsValue::from("lib.js")
    );
}
