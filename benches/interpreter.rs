//! Dispatch loop benchmarks
//!
//! Run with: cargo bench --bench interpreter
//! Profile with: cargo flamegraph --bench interpreter -- --bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use regjs::{Runtime, VmConfig};

/// Integer loop that stays on the fast arithmetic paths
const COUNTING_LOOP: &str = "var s = 0; for (var i = 0; i < 100000; i++) { s = s + i; } s";

/// Call frames and recursion
const FIB: &str = "function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(20)";

/// Property access and object allocation
const OBJECTS: &str = r#"
function Point(x, y) { this.x = x; this.y = y; }
Point.prototype.len = function () { return this.x * this.x + this.y * this.y; };
var total = 0;
for (var i = 0; i < 5000; i++) {
    var p = new Point(i, i + 1);
    total += p.len();
}
total
"#;

/// Closures reading captured variables
const CLOSURES: &str = r#"
function make(n) { var base = n; return function (x) { return base + x; }; }
var acc = 0;
for (var i = 0; i < 5000; i++) { acc = make(i)(acc) % 100000; }
acc
"#;

/// Strings and arrays through native methods
const BUILTINS: &str = r#"
var parts = [];
for (var i = 0; i < 2000; i++) { parts.push('item' + i); }
var joined = parts.join(',');
joined.split(',').length + joined.indexOf('item1999')
"#;

/// Dense switch dispatch
const SWITCH: &str = r#"
function pick(n) {
    switch (n % 5) {
        case 0: return 1;
        case 1: return 2;
        case 2: return 3;
        case 3: return 4;
        default: return 5;
    }
}
var s = 0;
for (var i = 0; i < 20000; i++) s += pick(i);
s
"#;

/// Exceptions unwinding through frames
const EXCEPTIONS: &str = r#"
function thrower(n) { if (n == 0) throw n; return thrower(n - 1); }
var caught = 0;
for (var i = 0; i < 500; i++) { try { thrower(10); } catch (e) { caught++; } }
caught
"#;

fn runtime() -> Runtime {
    Runtime::with_config(VmConfig {
        timeout_ms: 0,
        ..VmConfig::default()
    })
}

fn bench_programs(c: &mut Criterion) {
    let mut group = c.benchmark_group("programs");
    for (name, source) in [
        ("counting_loop", COUNTING_LOOP),
        ("fib", FIB),
        ("objects", OBJECTS),
        ("closures", CLOSURES),
        ("builtins", BUILTINS),
        ("switch", SWITCH),
        ("exceptions", EXCEPTIONS),
    ] {
        group.bench_with_input(BenchmarkId::new("eval", name), source, |b, s| {
            b.iter(|| {
                let mut runtime = runtime();
                let _ = black_box(runtime.eval(black_box(s)));
            })
        });
    }
    group.finish();
}

fn bench_host_calls(c: &mut Criterion) {
    let mut runtime = runtime();
    let setup = runtime.eval("function add(a, b) { return a + b; }");
    if setup.is_err() {
        return;
    }
    let args = serde_json::json!([1, 2]);
    c.bench_function("host_call_function", |b| {
        b.iter(|| {
            let _ = black_box(runtime.call_function("add", black_box(&args)));
            runtime.release_escaped();
        })
    });
}

fn bench_gc(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc");
    for threshold in [100, 10_000] {
        group.bench_with_input(BenchmarkId::new("threshold", threshold), &threshold, |b, &t| {
            b.iter(|| {
                let mut runtime = runtime();
                runtime.set_gc_threshold(t);
                let _ = black_box(runtime.eval(OBJECTS));
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_programs, bench_host_calls, bench_gc);
criterion_main!(benches);
