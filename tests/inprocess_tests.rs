//! In-process tests that compile expressions and run the generated code.

use exprjit::compiler::{evaluate, fold_constants, parse};
use exprjit::{FunctionTable, JitConfig, JitError, NativeFn, SymbolKind, assemble, compile};

fn all_configs() -> Vec<JitConfig> {
    let mut configs = Vec::new();
    for use_registers in [true, false] {
        for use_call_depth in [true, false] {
            for use_const_folding in [true, false] {
                configs.push(JitConfig {
                    use_registers,
                    use_call_depth,
                    use_const_folding,
                });
            }
        }
    }
    configs
}

fn same_value(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

#[cfg(all(unix, target_arch = "x86_64"))]
mod native {
    use super::*;

    extern "C" fn halve(v: f64) -> f64 {
        v / 2.0
    }

    extern "C" fn plus_ten(v: f64) -> f64 {
        v + 10.0
    }

    fn run(source: &str, x: f64, y: f64) -> f64 {
        let code = compile(source, &FunctionTable::with_builtins(), &JitConfig::default()).unwrap();
        code.eval(x, y)
    }

    fn check_against_interpreter(source: &str, table: &FunctionTable) {
        let (arena, root) = parse(source).unwrap();
        let inputs = [
            (3.0, 5.0),
            (-1.5, 0.25),
            (0.0, -0.0),
            (1e10, -7.0),
            (0.5, 2.0),
        ];

        for config in all_configs() {
            let code = compile(source, table, &config).unwrap();
            for (x, y) in inputs {
                let expected = evaluate(&arena, root, table, x, y).unwrap();
                let actual = code.eval(x, y);
                assert!(
                    same_value(actual, expected),
                    "{} at x={}, y={} with {:?}: jit {} vs interpreter {}",
                    source,
                    x,
                    y,
                    config,
                    actual,
                    expected
                );
            }
            code.free();
        }
    }

    #[test]
    fn test_scenario_product_of_sums() {
        assert_eq!(run("(x+1)*(y-2)", 3.0, 5.0), 12.0);
    }

    #[test]
    fn test_scenario_division_by_zero_is_infinity() {
        assert_eq!(run("x/y", 1.0, 0.0), f64::INFINITY);
        assert_eq!(run("-x/y", 1.0, 0.0), f64::NEG_INFINITY);
        assert!(run("x/y", 0.0, 0.0).is_nan());
    }

    #[test]
    fn test_scenario_nested_calls_survive_clobbering() {
        let mut table = FunctionTable::new();
        table.register("f", plus_ten as NativeFn);
        table.register("g", halve as NativeFn);

        for config in all_configs() {
            let code = compile("f(g(x))", &table, &config).unwrap();
            assert_eq!(code.eval(8.0, 0.0), 14.0);

            // The parked g(x) must survive the call to f.
            let code = compile("g(x) - f(g(y))", &table, &config).unwrap();
            assert_eq!(code.eval(8.0, 4.0), 4.0 - 12.0);

            let code = compile("(x + y) * f(y) - g(f(x)) / g(y)", &table, &config).unwrap();
            let (x, y) = (2.0, 6.0);
            assert_eq!(code.eval(x, y), (x + y) * (y + 10.0) - ((x + 10.0) / 2.0) / (y / 2.0));
        }
    }

    #[test]
    fn test_operand_order_for_non_commutative_ops() {
        assert_eq!(run("x - y", 10.0, 3.0), 7.0);
        assert_eq!(run("y - x", 10.0, 3.0), -7.0);
        assert_eq!(run("x / y", 10.0, 4.0), 2.5);
        assert_eq!(run("sin(x) - y", 0.0, 3.0), -3.0);
        assert_eq!(run("y / sqrt(x)", 4.0, 3.0), 1.5);
    }

    #[test]
    fn test_variables_and_constants() {
        assert_eq!(run("x", 1.25, 9.0), 1.25);
        assert_eq!(run("y", 1.25, 9.0), 9.0);
        assert_eq!(run("42", 0.0, 0.0), 42.0);
        assert_eq!(run("-x", 0.0, 0.0).to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn test_matches_interpreter() {
        let table = FunctionTable::with_builtins();
        let sources = [
            "(x+1)*(y-2)",
            "x*x + y*y - 2*x*y",
            "sqrt(x*x + y*y)",
            "sin(x)*cos(y) - cos(x)*sin(y)",
            "exp(sin(cos(x))) / (1 + abs(y))",
            "((((((((x+y)+x)+x)+x)+x)+x)+x)+x)",
            "x+(y-(x*(y/(x+(y-(x*(y/(x+y))))))))",
            "abs(sin(x) + cos(y)) * (tanh(x - y) + atan(x / (y + 3)))",
            "floor(x) - ceil(y) + round(x * y) / 7",
            "ln(abs(x) + 1) * log10(abs(y) + 1) - log2(4)",
        ];
        for source in sources {
            check_against_interpreter(source, &table);
        }
    }

    #[test]
    fn test_deep_register_pressure() {
        // Left-leaning chain: each level parks its right leaf while the left
        // subtree is evaluated, so more values are live than pool registers.
        let mut source = String::from("x");
        for (i, op) in ["+", "*", "-", "/", "+", "*", "-", "/", "+", "*", "-"].iter().enumerate() {
            let leaf = if i % 2 == 0 { "y" } else { "x" };
            source = format!("({}{}{})", source, op, leaf);
        }
        check_against_interpreter(&source, &FunctionTable::with_builtins());
    }

    #[test]
    fn test_many_spills_across_calls() {
        let source = "sin(x) + (cos(y) + (sin(x) + (cos(y) + (sin(x) + cos(y)))))";
        check_against_interpreter(source, &FunctionTable::with_builtins());
    }

    #[test]
    fn test_long_flat_sum() {
        let source = vec!["x"; 10_000].join("+");
        let table = FunctionTable::with_builtins();
        for config in [JitConfig::default(), JitConfig::unoptimized()] {
            let code = compile(&source, &table, &config).unwrap();
            assert_eq!(code.eval(1.0, 0.0), 10_000.0);
            assert_eq!(code.stats().stack_spills + code.stats().registers_hit, 9_999);
        }
    }

    #[test]
    fn test_long_sum_of_calls() {
        // Every level parks a call result on the stack, so calls run with
        // both even and odd spill counts outstanding.
        let source = vec!["sqrt(x)"; 2_000].join(" + ");
        let table = FunctionTable::with_builtins();
        let code = compile(&source, &table, &JitConfig::default()).unwrap();
        assert_eq!(code.eval(4.0, 0.0), 4_000.0);

        let (arena, root) = parse(&source).unwrap();
        assert_eq!(evaluate(&arena, root, &table, 9.0, 0.0).unwrap(), code.eval(9.0, 0.0));
    }

    #[test]
    fn test_routines_run_concurrently() {
        let table = FunctionTable::with_builtins();
        let code = compile("sqrt(x*x + y*y)", &table, &JitConfig::default()).unwrap();
        std::thread::scope(|s| {
            for i in 0..4 {
                let code = &code;
                s.spawn(move || {
                    let x = 3.0 * i as f64;
                    let y = 4.0 * i as f64;
                    assert_eq!(code.eval(x, y), 5.0 * i as f64);
                });
            }
        });
    }

    #[test]
    fn test_entry_point_and_dump() {
        let code = compile("x*y", &FunctionTable::new(), &JitConfig::default()).unwrap();
        let f = code.entry_point();
        assert_eq!(f(6.0, 7.0), 42.0);
        assert!(code.mapped_size() >= code.code_size());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.bin");
        code.dump(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), code.code());
        code.free();
    }
}

#[test]
fn test_assembly_is_deterministic() {
    let table = FunctionTable::with_builtins();
    for source in ["(x+1)*(y-2)", "sin(cos(x)) + tan(y) * x", "x/y"] {
        let (arena, root) = parse(source).unwrap();
        for config in all_configs() {
            let first = assemble(&arena, root, &table, &config).unwrap();
            let second = assemble(&arena, root, &table, &config).unwrap();
            assert_eq!(first, second);
        }
    }
}

#[test]
fn test_long_flat_sum_assembles() {
    let source = vec!["y"; 10_000].join(" - ");
    let table = FunctionTable::new();
    let (arena, root) = parse(&source).unwrap();
    assert_eq!(evaluate(&arena, root, &table, 0.0, 1.0).unwrap(), -9_998.0);

    for config in all_configs() {
        let (arena, root) = if config.use_const_folding {
            fold_constants(&arena, root, &table)
        } else {
            (arena.clone(), root)
        };
        let assembly = assemble(&arena, root, &table, &config).unwrap();
        assert_eq!(assembly.stats.stack_spills + assembly.stats.registers_hit, 9_999);
    }
}

#[test]
fn test_deep_parentheses_rejected() {
    let source = format!("{}x{}", "(".repeat(100_000), ")".repeat(100_000));
    let err = compile(&source, &FunctionTable::new(), &JitConfig::default()).unwrap_err();
    assert!(matches!(err, JitError::Syntax { .. }));
}

#[test]
fn test_unknown_variable_fails_before_emission() {
    let err = compile("z+1", &FunctionTable::with_builtins(), &JitConfig::default()).unwrap_err();
    match err {
        JitError::UnknownSymbol { kind, name } => {
            assert_eq!(kind, SymbolKind::Variable);
            assert_eq!(name, "z");
        }
        other => panic!("expected unknown symbol, got {:?}", other),
    }
}

#[test]
fn test_unknown_function() {
    for config in all_configs() {
        let err = compile("1 + nope(x)", &FunctionTable::with_builtins(), &config).unwrap_err();
        assert!(matches!(
            err,
            JitError::UnknownSymbol { kind: SymbolKind::Function, ref name } if name == "nope"
        ));
    }
}

#[test]
fn test_syntax_error() {
    let err = compile("(x+", &FunctionTable::with_builtins(), &JitConfig::default()).unwrap_err();
    assert!(matches!(err, JitError::Syntax { .. }));
    assert!(err.to_string().starts_with("syntax error at column"));
}

#[test]
fn test_folding_shrinks_code() {
    let table = FunctionTable::with_builtins();
    let (arena, root) = parse("x + sqrt(16) * (2 + 3)").unwrap();
    let config = JitConfig::default();

    let unfolded = assemble(&arena, root, &table, &config).unwrap();
    let (folded_arena, folded_root) = fold_constants(&arena, root, &table);
    let folded = assemble(&folded_arena, folded_root, &table, &config).unwrap();

    assert!(folded.code.len() < unfolded.code.len());
    assert_eq!(folded.stats.registers_hit, 1);
}

#[test]
#[cfg(not(target_arch = "x86_64"))]
fn test_load_refuses_foreign_architecture() {
    let err = compile("x + y", &FunctionTable::new(), &JitConfig::default()).unwrap_err();
    assert!(matches!(err, JitError::UnsupportedArch(arch) if arch == std::env::consts::ARCH));

    // Emission itself is host independent.
    let (arena, root) = parse("x + y").unwrap();
    assert!(assemble(&arena, root, &FunctionTable::new(), &JitConfig::default()).is_ok());
}
