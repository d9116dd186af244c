//! Expression tree to x86-64 machine code.
//!
//! Every handler leaves its result in XMM0. Binary operators evaluate one
//! operand, park it (register or stack), evaluate the other, then arrange
//! left in XMM0 and right in XMM1 and emit `op xmm0, xmm1`.
//!
//! Frame layout after the prologue:
//!
//! ```text
//! [rbp - 8]   x
//! [rbp - 16]  y
//! [rbp - 24]  spilled values, pushed/popped in LIFO order
//! ...
//! ```
//!
//! All XMM registers are caller-saved under System V, so a parked value
//! that must survive a call always goes to the stack.

use super::analysis::CallAnalysis;
use super::codebuf::CodeBuffer;
use super::function_table::FunctionTable;
use super::regalloc::{EmitStats, PRIMARY, RegisterPool, SECONDARY, Stash};
use super::x86_64::{Reg, X86_64Assembler};
use crate::compiler::ast::{BinOp, Expr, ExprArena, ExprId, Var};
use crate::config::JitConfig;
use crate::error::{JitError, JitResult};

/// Bytes reserved below the frame pointer for the two arguments.
const ARG_FRAME_SIZE: i32 = 16;

/// Output of one emission: raw code plus allocation counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub code: Vec<u8>,
    pub stats: EmitStats,
}

pub struct Emitter<'a> {
    arena: &'a ExprArena,
    table: &'a FunctionTable,
    analysis: CallAnalysis,
    buf: CodeBuffer,
    pool: RegisterPool,
}

impl<'a> Emitter<'a> {
    /// Prepare an emitter for `arena`. Call analysis runs here, before any
    /// code is emitted.
    pub fn new(arena: &'a ExprArena, table: &'a FunctionTable, config: &JitConfig) -> Self {
        Self {
            arena,
            table,
            analysis: CallAnalysis::run(arena, config.use_call_depth),
            buf: CodeBuffer::with_capacity(16 * arena.len() + 32),
            pool: RegisterPool::new(config.use_registers),
        }
    }

    /// Emit a complete `extern "C" fn(x: f64, y: f64) -> f64` for `root`.
    pub fn emit_function(mut self, root: ExprId) -> JitResult<Assembly> {
        self.emit_prologue();
        self.compile_expr(root)?;
        self.emit_epilogue();

        debug_assert_eq!(self.pool.occupied(), 0, "pool registers leaked");
        debug_assert_eq!(self.pool.pending_spills(), 0, "unbalanced spill stack");

        let stats = self.pool.stats();
        log::debug!(
            "emitted {} bytes: {} register hits, {} stack spills, highest xmm{}",
            self.buf.len(),
            stats.registers_hit,
            stats.stack_spills,
            stats.max_reg
        );

        Ok(Assembly {
            code: self.buf.into_code(),
            stats,
        })
    }

    fn emit_prologue(&mut self) {
        let mut asm = X86_64Assembler::new(&mut self.buf);
        asm.push(Reg::Rbp);
        asm.mov_rr(Reg::Rbp, Reg::Rsp);
        asm.sub_ri32(Reg::Rsp, ARG_FRAME_SIZE);
        asm.movsd_mx(Reg::Rbp, Var::X.slot_offset(), 0);
        asm.movsd_mx(Reg::Rbp, Var::Y.slot_offset(), 1);
    }

    fn emit_epilogue(&mut self) {
        let mut asm = X86_64Assembler::new(&mut self.buf);
        asm.add_ri32(Reg::Rsp, ARG_FRAME_SIZE);
        asm.pop(Reg::Rbp);
        asm.ret();
    }

    /// Emit `root` with an explicit work list instead of recursion, so tree
    /// height is bounded by memory rather than the native stack.
    fn compile_expr(&mut self, root: ExprId) -> JitResult<()> {
        let mut steps = vec![Step::Eval(root)];
        let mut parked = Vec::new();

        while let Some(step) = steps.pop() {
            match step {
                Step::Eval(id) => self.compile_node(id, &mut steps)?,
                Step::Park { force_spill } => {
                    let mut asm = X86_64Assembler::new(&mut self.buf);
                    parked.push(self.pool.stash(&mut asm, force_spill));
                }
                Step::Combine { op, left_first } => {
                    let Some(handle) = parked.pop() else {
                        unreachable!("combine without a parked operand");
                    };
                    self.combine(op, left_first, handle);
                }
                Step::CallNative { addr } => self.call_native(addr),
            }
        }
        Ok(())
    }

    /// Leaves are emitted directly. Interior nodes push their remaining
    /// steps in reverse execution order.
    fn compile_node(&mut self, id: ExprId, steps: &mut Vec<Step>) -> JitResult<()> {
        let arena = self.arena;
        match arena.get(id) {
            Expr::Constant(value) => self.compile_constant(*value),
            Expr::Variable(var) => self.compile_variable(*var),
            Expr::Binary { op, lhs, rhs } => {
                // Deeper call chain first while the pool is still empty, but
                // only if the other side has no call: otherwise the parked
                // value must hit the stack anyway and the reordering buys
                // nothing.
                let left_first = self.analysis.call_depth(*lhs) > self.analysis.call_depth(*rhs)
                    && !self.analysis.contains_call(*rhs);
                let (first, second) = if left_first { (*lhs, *rhs) } else { (*rhs, *lhs) };

                steps.push(Step::Combine { op: *op, left_first });
                steps.push(Step::Eval(second));
                steps.push(Step::Park {
                    force_spill: self.analysis.contains_call(second),
                });
                steps.push(Step::Eval(first));
            }
            Expr::Call { func, arg } => {
                let addr = self
                    .table
                    .address(func)
                    .ok_or_else(|| JitError::unknown_function(func.as_str()))?;
                // The argument lands in xmm0, which is also the first float
                // argument register.
                steps.push(Step::CallNative { addr });
                steps.push(Step::Eval(*arg));
            }
        }
        Ok(())
    }

    fn compile_constant(&mut self, value: f64) {
        let mut asm = X86_64Assembler::new(&mut self.buf);
        asm.mov_ri64(Reg::Rax, value.to_bits());
        asm.movq_xmm_r64(PRIMARY, Reg::Rax);
    }

    fn compile_variable(&mut self, var: Var) {
        let mut asm = X86_64Assembler::new(&mut self.buf);
        asm.movsd_xm(PRIMARY, Reg::Rbp, var.slot_offset());
    }

    /// Both operands are done: the second is in xmm0, the first is parked.
    fn combine(&mut self, op: BinOp, left_first: bool, parked: Stash) {
        let mut asm = X86_64Assembler::new(&mut self.buf);
        if left_first {
            // xmm0 holds rhs.
            asm.movsd_xx(SECONDARY, PRIMARY);
            self.pool.unstash(&mut asm, parked, PRIMARY);
        } else {
            // xmm0 holds lhs.
            self.pool.unstash(&mut asm, parked, SECONDARY);
        }

        match op {
            BinOp::Add => asm.addsd(PRIMARY, SECONDARY),
            BinOp::Sub => asm.subsd(PRIMARY, SECONDARY),
            BinOp::Mul => asm.mulsd(PRIMARY, SECONDARY),
            BinOp::Div => asm.divsd(PRIMARY, SECONDARY),
        }
    }

    fn call_native(&mut self, addr: u64) {
        // The frame is 16-byte aligned; each outstanding spill shifts it by 8.
        let misaligned = self.pool.pending_spills() % 2 == 1;
        let mut asm = X86_64Assembler::new(&mut self.buf);
        if misaligned {
            asm.sub_ri32(Reg::Rsp, 8);
        }
        asm.mov_ri64(Reg::Rax, addr);
        asm.call_r(Reg::Rax);
        if misaligned {
            asm.add_ri32(Reg::Rsp, 8);
        }
    }
}

/// Pending work for [`Emitter::compile_expr`].
enum Step {
    Eval(ExprId),
    /// Park xmm0 after the first operand of a binary node.
    Park { force_spill: bool },
    /// Restore the parked operand and apply `op`.
    Combine { op: BinOp, left_first: bool },
    CallNative { addr: u64 },
}
