use clap::{Args, Parser, Subcommand, ValueEnum};
use exprjit::compiler::{evaluate, parse};
use exprjit::{CompiledCode, EmitStats, FunctionTable, JitConfig, JitResult, compile};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum StatsFormatArg {
    #[default]
    Human,
    Json,
}

#[derive(Parser)]
#[command(name = "exprjit")]
#[command(about = "JIT-compile arithmetic expressions over x and y", long_about = None)]
struct Cli {
    /// Log compilation details to stderr (same as RUST_LOG=debug)
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an expression and evaluate it
    Run {
        /// The expression, e.g. "(x+1)*(y-2)"
        expr: String,

        /// Value bound to x
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        x: f64,

        /// Value bound to y
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        y: f64,

        /// Also evaluate with the tree interpreter and fail on mismatch
        #[arg(long)]
        check: bool,

        /// Print allocation statistics after the result
        #[arg(long, value_enum)]
        stats: Option<StatsFormatArg>,

        #[command(flatten)]
        options: CompileOptions,
    },
    /// Write the generated machine code to a file, or print it as hex
    Dump {
        /// The expression to compile
        expr: String,

        /// Output file for raw bytes (hex to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: CompileOptions,
    },
    /// List the functions expressions may call
    Funcs,
}

#[derive(Args)]
struct CompileOptions {
    /// Load optimization switches from a TOML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Never park values in XMM registers; spill everything
    #[arg(long)]
    no_registers: bool,

    /// Disable call-depth scheduling (fixed right-then-left order)
    #[arg(long)]
    no_call_depth: bool,

    /// Disable constant folding
    #[arg(long)]
    no_fold: bool,
}

impl CompileOptions {
    fn to_config(&self) -> JitResult<JitConfig> {
        let mut config = match &self.config {
            Some(path) => JitConfig::load(path)?,
            None => JitConfig::default(),
        };
        if self.no_registers {
            config.use_registers = false;
        }
        if self.no_call_depth {
            config.use_call_depth = false;
        }
        if self.no_fold {
            config.use_const_folding = false;
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct RunReport {
    result: f64,
    code_size: usize,
    stats: EmitStats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.trace { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let table = FunctionTable::with_builtins();

    let result = match cli.command {
        Commands::Run {
            expr,
            x,
            y,
            check,
            stats,
            options,
        } => run(&expr, x, y, check, stats, &options, &table),
        Commands::Dump {
            expr,
            output,
            options,
        } => dump(&expr, output, &options, &table),
        Commands::Funcs => {
            for name in table.names() {
                println!("{}", name);
            }
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(
    expr: &str,
    x: f64,
    y: f64,
    check: bool,
    stats: Option<StatsFormatArg>,
    options: &CompileOptions,
    table: &FunctionTable,
) -> CliResult {
    let config = options.to_config()?;
    let code = compile(expr, table, &config)?;
    let result = code.eval(x, y);

    if check {
        let (arena, root) = parse(expr)?;
        let expected = evaluate(&arena, root, table, x, y)?;
        let same = result.to_bits() == expected.to_bits() || (result.is_nan() && expected.is_nan());
        if !same {
            return Err(format!(
                "check failed: jit returned {} but interpreter returned {}",
                result, expected
            )
            .into());
        }
    }

    match stats {
        None => println!("{}", result),
        Some(StatsFormatArg::Human) => {
            println!("{}", result);
            print_human_stats(&code);
        }
        Some(StatsFormatArg::Json) => {
            let report = RunReport {
                result,
                code_size: code.code_size(),
                stats: code.stats(),
            };
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    code.free();
    Ok(())
}

fn print_human_stats(code: &CompiledCode) {
    let stats = code.stats();
    eprintln!("code size:      {} bytes", code.code_size());
    eprintln!("register hits:  {}", stats.registers_hit);
    eprintln!("stack spills:   {}", stats.stack_spills);
    eprintln!("highest xmm:    {}", stats.max_reg);
}

fn dump(
    expr: &str,
    output: Option<PathBuf>,
    options: &CompileOptions,
    table: &FunctionTable,
) -> CliResult {
    let config = options.to_config()?;
    let code = compile(expr, table, &config)?;

    match output {
        Some(path) => {
            code.dump(&path)?;
            eprintln!("wrote {} bytes to {}", code.code_size(), path.display());
        }
        None => {
            let hex: Vec<String> = code.code().iter().map(|b| format!("{:02x}", b)).collect();
            println!("{}", hex.join(" "));
        }
    }

    code.free();
    Ok(())
}
