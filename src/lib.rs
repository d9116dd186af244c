//! exprjit - a just-in-time compiler for two-variable arithmetic expressions.
//!
//! Expressions over `x`, `y`, `+ - * /` and unary native function calls are
//! compiled straight to x86-64 SSE2 code and executed in-process.
//!
//! ```no_run
//! use exprjit::{FunctionTable, JitConfig, compile};
//!
//! let code = compile("(x+1)*(y-2)", &FunctionTable::with_builtins(), &JitConfig::default())?;
//! assert_eq!(code.eval(3.0, 5.0), 12.0);
//! code.free();
//! # Ok::<(), exprjit::JitError>(())
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod jit;

// Re-export commonly used types
pub use config::JitConfig;
pub use error::{JitError, JitResult, SymbolKind};
pub use jit::emitter::Assembly;
pub use jit::function_table::{FunctionTable, NativeFn};
pub use jit::regalloc::EmitStats;
pub use jit::{CompiledCode, EntryPoint, assemble, compile};
