//! Integration tests for the interpreter, organized by feature
//!
//! These tests exercise the interpreter through the public API.
//!
//! ## Aggressive Test Defaults
//!
//! Tests use aggressive defaults to catch bugs early:
//! - `GC_THRESHOLD=1` - collect at every safepoint to catch rooting bugs
//!
//! Override via environment variables:
//!
//! ```bash
//! cargo test                           # Default: aggressive settings
//! GC_THRESHOLD=100 cargo test          # Less aggressive GC for faster runs
//! ```

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

mod api;
mod array;
mod basics;
mod control_flow;
#[cfg(feature = "debugger")]
mod debugger;
mod error;
mod eval;
mod function;
mod gc;
mod global;
mod math;
mod number;
mod object;
#[cfg(feature = "regex")]
mod regexp;
mod scope;
mod string;
mod timeout;

use regjs::{JsError, JsValue, Runtime};

/// Create a new runtime with aggressive defaults for testing:
/// - GC_THRESHOLD=1 (collect at every safepoint) to catch GC bugs
pub fn create_test_runtime() -> Runtime {
    let mut runtime = Runtime::new();

    // GC_THRESHOLD=100 cargo test  # Faster runs
    // GC_THRESHOLD=0 cargo test    # Disable automatic GC
    let gc_threshold = std::env::var("GC_THRESHOLD")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1);
    runtime.set_gc_threshold(gc_threshold);

    runtime
}

/// Evaluate source in a fresh runtime, panicking on error
#[allow(clippy::expect_used)]
pub fn eval(source: &str) -> JsValue {
    eval_result(source).expect("eval failed")
}

/// Evaluate source in a fresh runtime
pub fn eval_result(source: &str) -> Result<JsValue, JsError> {
    let mut runtime = create_test_runtime();
    runtime.eval(source)
}

/// Evaluate source and convert the result to JSON
pub fn eval_json(source: &str) -> serde_json::Value {
    let mut runtime = create_test_runtime();
    let value = runtime.eval(source).unwrap();
    runtime.to_json(&value).unwrap()
}

/// Helper to check if evaluation throws an error containing a specific message
pub fn throws_error(source: &str, error_contains: &str) -> bool {
    match eval_result(source) {
        Err(e) => e.to_string().contains(error_contains),
        Ok(_) => false,
    }
}
