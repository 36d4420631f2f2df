#![no_main]

use libfuzzer_sys::fuzz_target;
use regjs::{Runtime, VmConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Execution is more expensive per byte than parsing
    if source.len() > 10_000 {
        return;
    }

    // Collect often and stop runaway loops quickly
    let mut runtime = Runtime::with_config(VmConfig {
        timeout_ms: 200,
        gc_threshold: 16,
        ..VmConfig::default()
    });

    // Errors are expected, panics and internal errors are not
    if let Err(regjs::JsError::Internal(message)) = runtime.eval(source) {
        panic!("internal error: {}", message);
    }
    runtime.collect_garbage();
});
