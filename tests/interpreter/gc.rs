//! Collection at safepoints and host rooting

use super::{create_test_runtime, eval};
use regjs::{JsValue, Runtime};
use serde_json::json;

#[test]
fn test_garbage_is_reclaimed() {
    let mut runtime = Runtime::new();
    runtime.set_gc_threshold(0);
    runtime
        .eval("for (var i = 0; i < 500; i++) { var tmp = {index: i, list: [i, i]}; } 0")
        .unwrap();
    let before = runtime.gc_stats();
    let freed = runtime.collect_garbage();
    let after = runtime.gc_stats();
    assert!(freed >= 900, "freed {}", freed);
    assert_eq!(after.live_objects + freed, before.live_objects);
    assert_eq!(after.collections, before.collections + 1);
}

#[test]
fn test_live_objects_survive_collection() {
    let mut runtime = create_test_runtime();
    runtime
        .eval("var keep = {nested: {value: 'still here'}}; for (var i = 0; i < 300; i++) { [i]; }")
        .unwrap();
    runtime.collect_garbage();
    assert_eq!(runtime.eval("keep.nested.value").unwrap(), JsValue::from("still here"));
}

#[test]
fn test_escaped_values_stay_rooted() {
    let mut runtime = create_test_runtime();
    let value = runtime.eval("({items: [1, 2, 3]})").unwrap();
    runtime.eval("for (var i = 0; i < 200; i++) { ({}) }").unwrap();
    runtime.collect_garbage();
    assert_eq!(runtime.to_json(&value).unwrap(), json!({"items": [1, 2, 3]}));
}

#[test]
fn test_release_escaped_allows_collection() {
    let mut runtime = Runtime::new();
    runtime.set_gc_threshold(0);
    runtime.eval("({a: {}, b: {}})").unwrap();
    runtime.collect_garbage();
    let held = runtime.gc_stats().live_objects;
    runtime.release_escaped();
    runtime.collect_garbage();
    assert!(runtime.gc_stats().live_objects < held);
}

#[test]
fn test_protected_objects_survive_release() {
    let mut runtime = Runtime::new();
    let value = runtime.eval("({tag: 'protected'})").unwrap();
    let obj = value.as_object().unwrap();
    runtime.interpreter_mut().protect(obj);
    runtime.release_escaped();
    runtime.collect_garbage();
    assert_eq!(runtime.to_json(&value).unwrap(), json!({"tag": "protected"}));
    runtime.interpreter_mut().unprotect(obj);
}

#[test]
fn test_closures_keep_activations_alive() {
    assert_eq!(
        eval(
            "function make() { var captured = {v: 'closed over'}; return function () { return captured.v; }; }
             var fns = [];
             for (var i = 0; i < 50; i++) fns.push(make());
             for (var j = 0; j < 500; j++) { ({junk: j}); }
             fns[49]()"
        ),
        JsValue::from("closed over")
    );
}

#[test]
fn test_values_in_native_frames_survive() {
    assert_eq!(
        eval(
            "var list = [];
             for (var i = 0; i < 40; i++) list.push({n: 40 - i});
             list.sort(function (a, b) { var garbage = [{}, {}, {}]; return a.n - b.n; });
             list[0].n + list[39].n"
        ),
        JsValue::Int(41)
    );
}

#[test]
fn test_heap_slots_are_reused() {
    let mut runtime = Runtime::new();
    runtime.set_gc_threshold(0);
    runtime.eval("function churn() { for (var i = 0; i < 200; i++) { ({}); } } churn();").unwrap();
    runtime.release_escaped();
    runtime.collect_garbage();
    let slots = runtime.gc_stats().total_slots;
    for _ in 0..5 {
        runtime.eval("churn();").unwrap();
        runtime.release_escaped();
        runtime.collect_garbage();
    }
    assert_eq!(runtime.gc_stats().total_slots, slots);
}

#[test]
fn test_stats_count_frees() {
    let mut runtime = Runtime::new();
    runtime.set_gc_threshold(0);
    runtime.eval("for (var i = 0; i < 100; i++) { ({}); }").unwrap();
    let freed = runtime.collect_garbage();
    assert_eq!(runtime.gc_stats().total_freed, freed);
}
