use exprjit::compiler::{evaluate, parse};
use exprjit::{CompiledCode, FunctionTable, JitConfig, compile};
use serde::Serialize;
use std::hint::black_box;
use std::time::Instant;

const ITERATIONS: usize = 1_000_000;

#[derive(Serialize)]
struct BenchmarkResult {
    name: String,
    expr: String,
    code_size: usize,
    jit_optimized_secs: f64,
    jit_unoptimized_secs: f64,
    interpreter_secs: f64,
    rust_time_secs: f64,
}

#[derive(Serialize)]
struct BenchmarkOutput {
    iterations: usize,
    results: Vec<BenchmarkResult>,
}

struct Case {
    name: &'static str,
    expr: &'static str,
    native: fn(f64, f64) -> f64,
}

// Rust reference implementations

fn rust_polynomial(x: f64, y: f64) -> f64 {
    (x + 1.0) * (y - 2.0) + x * x * y - 3.0 * y
}

fn rust_distance(x: f64, y: f64) -> f64 {
    (x * x + y * y).sqrt()
}

fn rust_trig(x: f64, y: f64) -> f64 {
    x.sin() * y.cos() - x.cos() * y.sin()
}

fn rust_nested_calls(x: f64, y: f64) -> f64 {
    x.cos().sin().exp() / (1.0 + y.abs()) + (x - y).tanh()
}

fn cases() -> Vec<Case> {
    vec![
        Case {
            name: "polynomial",
            expr: "(x + 1) * (y - 2) + x * x * y - 3 * y",
            native: rust_polynomial,
        },
        Case {
            name: "distance",
            expr: "sqrt(x*x + y*y)",
            native: rust_distance,
        },
        Case {
            name: "trig",
            expr: "sin(x)*cos(y) - cos(x)*sin(y)",
            native: rust_trig,
        },
        Case {
            name: "nested_calls",
            expr: "exp(sin(cos(x))) / (1 + abs(y)) + tanh(x - y)",
            native: rust_nested_calls,
        },
    ]
}

fn input(i: usize) -> (f64, f64) {
    let t = i as f64 * 1e-6;
    (t - 0.5, 0.25 - t)
}

fn time_loop<F>(mut f: F) -> f64
where
    F: FnMut(f64, f64) -> f64,
{
    let start = Instant::now();
    let mut acc = 0.0;
    for i in 0..ITERATIONS {
        let (x, y) = input(i);
        acc += f(black_box(x), black_box(y));
    }
    black_box(acc);
    start.elapsed().as_secs_f64()
}

fn time_jit(code: &CompiledCode) -> f64 {
    time_loop(|x, y| code.eval(x, y))
}

fn run_case(case: &Case, table: &FunctionTable) -> Result<BenchmarkResult, String> {
    let optimized = compile(case.expr, table, &JitConfig::default())
        .map_err(|e| format!("{}: {}", case.name, e))?;
    let unoptimized = compile(case.expr, table, &JitConfig::unoptimized())
        .map_err(|e| format!("{}: {}", case.name, e))?;
    let (arena, root) = parse(case.expr).map_err(|e| format!("{}: {}", case.name, e))?;

    let jit_optimized_secs = time_jit(&optimized);
    let jit_unoptimized_secs = time_jit(&unoptimized);
    let interpreter_secs = time_loop(|x, y| evaluate(&arena, root, table, x, y).unwrap_or(f64::NAN));
    let rust_time_secs = time_loop(case.native);

    let result = BenchmarkResult {
        name: case.name.to_string(),
        expr: case.expr.to_string(),
        code_size: optimized.code_size(),
        jit_optimized_secs,
        jit_unoptimized_secs,
        interpreter_secs,
        rust_time_secs,
    };
    optimized.free();
    unoptimized.free();
    Ok(result)
}

fn main() {
    let table = FunctionTable::with_builtins();
    let mut results = Vec::new();

    for case in cases() {
        match run_case(&case, &table) {
            Ok(result) => results.push(result),
            Err(e) => eprintln!("benchmark {} failed: {}", case.name, e),
        }
    }

    let output = BenchmarkOutput {
        iterations: ITERATIONS,
        results,
    };
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to serialize results: {}", e),
    }
}
