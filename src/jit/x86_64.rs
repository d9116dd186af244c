//! x86-64 instruction encoding for JIT compilation.
//!
//! Only the subset a straight-line scalar-double routine needs: frame setup,
//! integer moves for materializing bit patterns, push/pop for spills,
//! indirect calls, and SSE2 scalar-double arithmetic. Uses System V AMD64
//! ABI conventions.
//!
//! XMM operands are plain register numbers. Only XMM0..XMM7 are used, so
//! no REX prefix is ever needed on their account.

use super::codebuf::CodeBuffer;

/// The general-purpose registers generated routines touch: RAX as scratch
/// and call target, RSP/RBP for the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rsp = 4,
    Rbp = 5,
}

impl Reg {
    /// Get the register code (lower 3 bits).
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// x86-64 assembler.
pub struct X86_64Assembler<'a> {
    buf: &'a mut CodeBuffer,
}

impl<'a> X86_64Assembler<'a> {
    pub fn new(buf: &'a mut CodeBuffer) -> Self {
        Self { buf }
    }

    // ==================== Encoding helpers ====================

    /// Emit REX.W prefix for 64-bit operations. No extended registers exist
    /// in [`Reg`], so R and B are always clear.
    fn emit_rex_w(&mut self) {
        self.buf.emit_u8(0x48);
    }

    /// Encode ModR/M byte.
    fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
        ((mode & 0x3) << 6) | ((reg & 0x7) << 3) | (rm & 0x7)
    }

    /// Emit ModR/M (+ SIB, + displacement) for a `[base + disp]` operand.
    fn emit_mem_operand(&mut self, reg: u8, base: Reg, disp: i32) {
        // RSP as base always needs a SIB byte; RBP cannot use mod=00.
        let needs_sib = base == Reg::Rsp;
        let rm = if needs_sib { 0b100 } else { base.code() };
        let mode = if disp == 0 && base != Reg::Rbp {
            0b00
        } else if (-128..=127).contains(&disp) {
            0b01
        } else {
            0b10
        };

        self.buf.emit_u8(Self::modrm(mode, reg, rm));
        if needs_sib {
            self.buf.emit_u8(0x24);
        }
        match mode {
            0b01 => self.buf.emit_u8(disp as u8),
            0b10 => self.buf.emit_u32(disp as u32),
            _ => {}
        }
    }

    /// Emit the mandatory prefix and escape for an SSE2 scalar-double op.
    fn emit_sd_prefix(&mut self) {
        self.buf.emit_u8(0xF2);
        self.buf.emit_u8(0x0F);
    }

    // ==================== Integer ====================

    /// MOV r64, r64 (register to register)
    pub fn mov_rr(&mut self, dst: Reg, src: Reg) {
        self.emit_rex_w();
        self.buf.emit_u8(0x89); // MOV r/m64, r64
        self.buf.emit_u8(Self::modrm(0b11, src.code(), dst.code()));
    }

    /// MOV r64, imm64 (move 64-bit immediate to register)
    pub fn mov_ri64(&mut self, dst: Reg, imm: u64) {
        self.emit_rex_w();
        self.buf.emit_u8(0xB8 + dst.code());
        self.buf.emit_u64(imm);
    }

    /// ADD r64, imm32 (sign-extended)
    pub fn add_ri32(&mut self, dst: Reg, imm: i32) {
        self.emit_group1_imm(0, dst, imm);
    }

    /// SUB r64, imm32 (sign-extended)
    pub fn sub_ri32(&mut self, dst: Reg, imm: i32) {
        self.emit_group1_imm(5, dst, imm);
    }

    /// Group-1 ALU op with immediate; `ext` is the /digit opcode extension.
    fn emit_group1_imm(&mut self, ext: u8, dst: Reg, imm: i32) {
        self.emit_rex_w();
        if (-128..=127).contains(&imm) {
            self.buf.emit_u8(0x83);
            self.buf.emit_u8(Self::modrm(0b11, ext, dst.code()));
            self.buf.emit_u8(imm as u8);
        } else {
            self.buf.emit_u8(0x81);
            self.buf.emit_u8(Self::modrm(0b11, ext, dst.code()));
            self.buf.emit_u32(imm as u32);
        }
    }

    // ==================== Stack ====================

    /// PUSH r64
    pub fn push(&mut self, reg: Reg) {
        self.buf.emit_u8(0x50 + reg.code());
    }

    /// POP r64
    pub fn pop(&mut self, reg: Reg) {
        self.buf.emit_u8(0x58 + reg.code());
    }

    // ==================== Control Flow ====================

    /// CALL r64 (indirect call through register)
    pub fn call_r(&mut self, reg: Reg) {
        self.buf.emit_u8(0xFF); // CALL r/m64
        self.buf.emit_u8(Self::modrm(0b11, 2, reg.code()));
    }

    /// RET (return)
    pub fn ret(&mut self) {
        self.buf.emit_u8(0xC3);
    }

    // ==================== SSE2 Floating Point ====================

    /// MOVQ xmm, r64 (move quadword from GP register to XMM)
    pub fn movq_xmm_r64(&mut self, xmm: u8, src: Reg) {
        // 66 REX.W 0F 6E /r
        self.buf.emit_u8(0x66);
        self.emit_rex_w();
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x6E);
        self.buf.emit_u8(Self::modrm(0b11, xmm, src.code()));
    }

    /// MOVQ r64, xmm (move quadword from XMM to GP register)
    pub fn movq_r64_xmm(&mut self, dst: Reg, xmm: u8) {
        // 66 REX.W 0F 7E /r
        self.buf.emit_u8(0x66);
        self.emit_rex_w();
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x7E);
        self.buf.emit_u8(Self::modrm(0b11, xmm, dst.code()));
    }

    /// MOVSD xmm1, xmm2 (copy low double between XMM registers)
    pub fn movsd_xx(&mut self, dst: u8, src: u8) {
        // F2 0F 10 /r
        self.emit_sd_prefix();
        self.buf.emit_u8(0x10);
        self.buf.emit_u8(Self::modrm(0b11, dst, src));
    }

    /// MOVSD xmm, [base + disp] (load scalar double)
    pub fn movsd_xm(&mut self, dst: u8, base: Reg, disp: i32) {
        // F2 0F 10 /r
        self.emit_sd_prefix();
        self.buf.emit_u8(0x10);
        self.emit_mem_operand(dst, base, disp);
    }

    /// MOVSD [base + disp], xmm (store scalar double)
    pub fn movsd_mx(&mut self, base: Reg, disp: i32, src: u8) {
        // F2 0F 11 /r
        self.emit_sd_prefix();
        self.buf.emit_u8(0x11);
        self.emit_mem_operand(src, base, disp);
    }

    /// ADDSD xmm1, xmm2 (add scalar double-precision)
    pub fn addsd(&mut self, dst: u8, src: u8) {
        self.emit_sd_arith(0x58, dst, src);
    }

    /// SUBSD xmm1, xmm2 (subtract scalar double-precision)
    pub fn subsd(&mut self, dst: u8, src: u8) {
        self.emit_sd_arith(0x5C, dst, src);
    }

    /// MULSD xmm1, xmm2 (multiply scalar double-precision)
    pub fn mulsd(&mut self, dst: u8, src: u8) {
        self.emit_sd_arith(0x59, dst, src);
    }

    /// DIVSD xmm1, xmm2 (divide scalar double-precision)
    pub fn divsd(&mut self, dst: u8, src: u8) {
        self.emit_sd_arith(0x5E, dst, src);
    }

    /// F2 0F <op> /r with both operands in registers.
    fn emit_sd_arith(&mut self, opcode: u8, dst: u8, src: u8) {
        self.emit_sd_prefix();
        self.buf.emit_u8(opcode);
        self.buf.emit_u8(Self::modrm(0b11, dst, src));
    }
}
