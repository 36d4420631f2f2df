//! Watchdog termination of long running scripts

use std::time::Duration;

use regjs::{InterruptPolicy, JsError, JsValue, Runtime};

fn runtime_with_timeout(timeout_ms: u64) -> Runtime {
    let mut runtime = Runtime::new();
    runtime.set_timeout_ms(timeout_ms);
    runtime
}

#[test]
fn test_default_timeout() {
    assert_eq!(Runtime::new().timeout_ms(), 3000);
}

#[test]
fn test_infinite_loop_times_out() {
    let mut runtime = runtime_with_timeout(50);
    let err = runtime.eval("while (true) {}").unwrap_err();
    assert!(matches!(err, JsError::Timeout { timeout_ms: 50, .. }), "{:?}", err);
    assert!(err.to_string().contains("Execution timeout"));
}

#[test]
fn test_long_counting_loop_times_out() {
    let mut runtime = runtime_with_timeout(20);
    let err = runtime
        .eval("var s = 0; for (var i = 0; i < 10000000000; i++) { s = s + i; } s")
        .unwrap_err();
    assert!(matches!(err, JsError::Timeout { .. }), "{:?}", err);
}

#[test]
fn test_timeout_cannot_be_caught() {
    let mut runtime = runtime_with_timeout(30);
    let err = runtime
        .eval("var caught = false; try { for (;;) {} } catch (e) { caught = true; } finally { caught = true; }")
        .unwrap_err();
    assert!(matches!(err, JsError::Timeout { .. }), "{:?}", err);
    assert_eq!(runtime.eval("caught").unwrap(), JsValue::Boolean(false));
}

#[test]
fn test_timeout_inside_native_callback() {
    let mut runtime = runtime_with_timeout(30);
    let err = runtime
        .eval("[2, 1].sort(function (a, b) { while (true) {} })")
        .unwrap_err();
    assert!(matches!(err, JsError::Timeout { .. }), "{:?}", err);
}

#[test]
fn test_runtime_is_usable_after_timeout() {
    let mut runtime = runtime_with_timeout(20);
    assert!(runtime.eval("function spin() { for (;;) {} } spin()").is_err());
    assert_eq!(runtime.eval("'alive'").unwrap(), JsValue::from("alive"));
}

#[test]
fn test_zero_disables_timeout() {
    let mut runtime = runtime_with_timeout(0);
    assert_eq!(runtime.timeout_ms(), 0);
    assert_eq!(
        runtime.eval("var n = 0; for (var i = 0; i < 200000; i++) n++; n").unwrap(),
        JsValue::Int(200000)
    );
}

struct GracePeriod {
    grace: Duration,
}

impl InterruptPolicy for GracePeriod {
    fn should_terminate(&mut self, elapsed: Duration) -> bool {
        elapsed > self.grace
    }
}

#[test]
fn test_interrupt_policy_can_extend_execution() {
    let mut runtime = runtime_with_timeout(10);
    runtime.set_interrupt_policy(Box::new(GracePeriod {
        grace: Duration::from_millis(60),
    }));
    let started = std::time::Instant::now();
    let err = runtime.eval("for (;;) {}").unwrap_err();
    assert!(matches!(err, JsError::Timeout { .. }), "{:?}", err);
    assert!(started.elapsed() >= Duration::from_millis(60));
}

struct Never;

impl InterruptPolicy for Never {
    fn should_terminate(&mut self, _elapsed: Duration) -> bool {
        false
    }
}

#[test]
fn test_interrupt_policy_can_refuse_termination() {
    let mut runtime = runtime_with_timeout(1);
    runtime.set_interrupt_policy(Box::new(Never));
    assert_eq!(
        runtime.eval("var n = 0; for (var i = 0; i < 300000; i++) n += 2; n").unwrap(),
        JsValue::Int(600000)
    );
}
