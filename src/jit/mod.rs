//! JIT compilation of arithmetic expressions to x86-64.
//!
//! - Executable memory allocation
//! - Code buffer and x86-64 instruction encoding
//! - Call analysis, register pool and emitter
//!
//! Generated routines follow the System V AMD64 ABI:
//! `extern "C" fn(x: f64, y: f64) -> f64`.

pub mod analysis;
pub mod codebuf;
pub mod emitter;
pub mod function_table;
pub mod memory;
pub mod regalloc;
pub mod x86_64;

use crate::compiler::ast::{ExprArena, ExprId};
use crate::compiler::{fold_constants, parse};
use crate::config::JitConfig;
use crate::error::{JitError, JitResult};
use codebuf::CodeBuffer;
use emitter::{Assembly, Emitter};
use function_table::FunctionTable;
use memory::ExecutableMemory;
use regalloc::EmitStats;
use std::path::Path;

/// Signature of every generated routine.
pub type EntryPoint = extern "C" fn(f64, f64) -> f64;

/// Emit machine code for an already built tree without making it executable.
///
/// A fresh emitter is used every time, so the same tree and config always
/// produce the same bytes.
pub fn assemble(
    arena: &ExprArena,
    root: ExprId,
    table: &FunctionTable,
    config: &JitConfig,
) -> JitResult<Assembly> {
    Emitter::new(arena, table, config).emit_function(root)
}

/// Parse, optionally fold, and compile `source` into a callable routine.
pub fn compile(source: &str, table: &FunctionTable, config: &JitConfig) -> JitResult<CompiledCode> {
    let (arena, root) = parse(source)?;
    let (arena, root) = if config.use_const_folding {
        fold_constants(&arena, root, table)
    } else {
        (arena, root)
    };
    log::debug!("compiling {}", arena.display(root));

    let assembly = assemble(&arena, root, table, config)?;
    CompiledCode::load(assembly)
}

/// A compiled expression living in its own executable mapping.
///
/// The mapping is released by [`free`](Self::free) or when the value is
/// dropped.
pub struct CompiledCode {
    memory: ExecutableMemory,
    entry: EntryPoint,
    code: Vec<u8>,
    stats: EmitStats,
}

impl CompiledCode {
    /// Copy assembled code into executable memory.
    ///
    /// Fails with [`JitError::UnsupportedArch`] on any host that cannot run
    /// x86-64 code, before anything is mapped.
    pub fn load(assembly: Assembly) -> JitResult<Self> {
        if !cfg!(target_arch = "x86_64") {
            return Err(JitError::UnsupportedArch(std::env::consts::ARCH));
        }

        let mut buf = CodeBuffer::with_capacity(assembly.code.len());
        buf.emit_bytes(&assembly.code);
        let memory = buf.finalize()?;

        // SAFETY: the mapping holds a complete routine emitted for exactly
        // this signature and stays mapped as long as `self` lives.
        let entry: EntryPoint = unsafe { std::mem::transmute(memory.as_ptr()) };

        Ok(Self {
            memory,
            entry,
            code: assembly.code,
            stats: assembly.stats,
        })
    }

    /// Run the routine.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        (self.entry)(x, y)
    }

    /// Raw entry point, valid only while `self` is alive.
    pub fn entry_point(&self) -> EntryPoint {
        self.entry
    }

    /// Emitted code size in bytes (the mapping itself is page-sized).
    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    pub fn mapped_size(&self) -> usize {
        self.memory.size()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn stats(&self) -> EmitStats {
        self.stats
    }

    /// Write the raw code to `path` for offline disassembly, e.g.
    /// `objdump -D -b binary -m i386:x86-64 <path>`.
    pub fn dump(&self, path: &Path) -> JitResult<()> {
        std::fs::write(path, &self.code)?;
        Ok(())
    }

    /// Unmap the code. Equivalent to dropping, but explicit at call sites
    /// that manage many routines.
    pub fn free(self) {
        drop(self);
    }
}

impl std::fmt::Debug for CompiledCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledCode")
            .field("code_size", &self.code.len())
            .field("stats", &self.stats)
            .finish()
    }
}
