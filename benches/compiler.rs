//! Front end benchmarks: parsing and bytecode generation
//!
//! Run with: cargo bench --bench compiler

use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use regjs::compiler::{CompileOptions, Compiler, GlobalSymbolTable, SourceCode};
use regjs::parser::Parser;
use regjs::string_dict::StringDict;

/// Function-heavy code with loops, closures and switches
const FUNCTIONS: &str = r#"
function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
function counter() {
    var count = 0;
    return function () { count++; return count; };
}
function classify(x) {
    switch (x) {
        case 0: return 'zero';
        case 1: return 'one';
        case 2: return 'two';
        default: return 'many';
    }
}
function sum(list) {
    var total = 0;
    for (var i = 0; i < list.length; i++) {
        total += list[i];
    }
    return total;
}
"#;

/// Exception handling and dynamic scope
const CONTROL: &str = r#"
function guarded(o) {
    try {
        with (o) {
            for (var key in o) {
                if (key == 'stop') break;
                if (typeof o[key] == 'function') continue;
                value = o[key];
            }
        }
    } catch (e) {
        return e;
    } finally {
        cleanup();
    }
}
"#;

/// Repeat a block of functions with distinct names
fn generate_large_source(copies: usize) -> String {
    let mut out = String::new();
    for i in 0..copies {
        out.push_str(&format!(
            "function f{i}(a, b) {{ var r = []; for (var j = 0; j < a; j++) {{ r.push(j * b + {i}); }} return r.join(','); }}\n"
        ));
        out.push_str(&format!("var v{i} = {{name: 'item{i}', values: [1, 2, 3], run: f{i}}};\n"));
    }
    out
}

fn compile(source: &str) {
    let mut dict = StringDict::new();
    let program = match Parser::new(source, &mut dict).parse_program() {
        Ok(program) => program,
        Err(_) => return,
    };
    let code = Rc::new(SourceCode {
        id: 1,
        url: None,
        text: Rc::from(source),
    });
    let mut globals = GlobalSymbolTable::new();
    let block = Compiler::compile_program(&program, &mut globals, &|_| false, CompileOptions::default(), code);
    let _ = black_box(block);
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for (name, source) in [("functions", FUNCTIONS), ("control", CONTROL)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("bytes", name), source, |b, s| {
            b.iter(|| {
                let mut dict = StringDict::new();
                let _ = black_box(Parser::new(black_box(s), &mut dict).parse_program());
            })
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for (name, source) in [("functions", FUNCTIONS), ("control", CONTROL)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("bytes", name), source, |b, s| {
            b.iter(|| compile(black_box(s)))
        });
    }
    group.finish();
}

fn bench_compile_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_throughput");
    for copies in [10, 100, 500] {
        let source = generate_large_source(copies);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("functions", copies), &source, |b, s| {
            b.iter(|| compile(black_box(s)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_compile, bench_compile_throughput);
criterion_main!(benches);
