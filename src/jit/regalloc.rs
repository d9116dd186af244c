//! XMM register pool with stack spill fallback.
//!
//! XMM0 and XMM1 are the working registers every expression handler
//! computes in; they are never handed out. XMM2..XMM7 form the pool used to
//! park intermediate results. When the pool is empty, or the parked value
//! has to survive a call, the value goes to the machine stack instead.
//!
//! Misuse (double release, releasing something never acquired) means the
//! emitter's scheduling is broken and the code already emitted is garbage,
//! so it panics rather than returning an error.

use super::x86_64::{Reg, X86_64Assembler};
use serde::Serialize;

/// Register every handler leaves its result in (also arg 0 and return value).
pub const PRIMARY: u8 = 0;
/// Second operand register for binary operators.
pub const SECONDARY: u8 = 1;

const NUM_XMM: usize = 8;
const FIRST_POOL_REG: u8 = 2;

/// Where a parked value lives until it is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stash {
    Register(u8),
    Spill,
}

/// Allocation counters for one compilation. They never influence emitted code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmitStats {
    /// Values parked in a pool register.
    pub registers_hit: usize,
    /// Values that went to the stack (pool full, disabled, or forced).
    pub stack_spills: usize,
    /// Highest pool register ever handed out, 0 if none.
    pub max_reg: u8,
}

pub struct RegisterPool {
    used: [bool; NUM_XMM],
    enabled: bool,
    /// Values currently pushed on the machine stack.
    pending_spills: usize,
    stats: EmitStats,
}

impl RegisterPool {
    /// With `enabled == false` every acquire spills, giving a pure stack
    /// discipline.
    pub fn new(enabled: bool) -> Self {
        Self {
            used: [false; NUM_XMM],
            enabled,
            pending_spills: 0,
            stats: EmitStats::default(),
        }
    }

    /// Hand out the lowest free pool register, or `Stash::Spill` if there is
    /// none. Running out is not an error; the caller uses the stack.
    pub fn acquire(&mut self) -> Stash {
        if !self.enabled {
            self.stats.stack_spills += 1;
            return Stash::Spill;
        }

        for reg in FIRST_POOL_REG..NUM_XMM as u8 {
            let slot = &mut self.used[reg as usize];
            if !*slot {
                *slot = true;
                self.stats.registers_hit += 1;
                self.stats.max_reg = self.stats.max_reg.max(reg);
                return Stash::Register(reg);
            }
        }

        self.stats.stack_spills += 1;
        Stash::Spill
    }

    /// Return a register to the pool. Releasing `Stash::Spill` does nothing.
    pub fn release(&mut self, handle: Stash) {
        let Stash::Register(reg) = handle else {
            return;
        };
        if !(FIRST_POOL_REG..NUM_XMM as u8).contains(&reg) {
            panic!("xmm{} is not an allocatable register", reg);
        }
        if !self.used[reg as usize] {
            panic!("register double free: xmm{}", reg);
        }
        self.used[reg as usize] = false;
    }

    /// Park the value in XMM0. A register is used unless `force_spill` is set
    /// or the pool is exhausted; then it is pushed on the stack.
    pub fn stash(&mut self, asm: &mut X86_64Assembler<'_>, force_spill: bool) -> Stash {
        let handle = if force_spill {
            self.stats.stack_spills += 1;
            Stash::Spill
        } else {
            self.acquire()
        };

        match handle {
            Stash::Register(reg) => asm.movsd_xx(reg, PRIMARY),
            Stash::Spill => {
                asm.movq_r64_xmm(Reg::Rax, PRIMARY);
                asm.push(Reg::Rax);
                self.pending_spills += 1;
            }
        }

        log::trace!("stash xmm0 -> {:?} (forced: {})", handle, force_spill);
        handle
    }

    /// Inverse of [`stash`](Self::stash): move the parked value into `dest`
    /// (XMM0 or XMM1) and free whatever held it.
    pub fn unstash(&mut self, asm: &mut X86_64Assembler<'_>, handle: Stash, dest: u8) {
        if dest != PRIMARY && dest != SECONDARY {
            panic!("unstash target must be xmm0 or xmm1, got xmm{}", dest);
        }

        match handle {
            Stash::Register(reg) => {
                asm.movsd_xx(dest, reg);
                self.release(handle);
            }
            Stash::Spill => {
                if self.pending_spills == 0 {
                    panic!("unstash from an empty spill stack");
                }
                asm.pop(Reg::Rax);
                asm.movq_xmm_r64(dest, Reg::Rax);
                self.pending_spills -= 1;
            }
        }
    }

    /// Number of values currently pushed; each one is 8 bytes of stack.
    pub fn pending_spills(&self) -> usize {
        self.pending_spills
    }

    /// Number of pool registers currently held.
    pub fn occupied(&self) -> usize {
        self.used.iter().filter(|&&u| u).count()
    }

    pub fn stats(&self) -> EmitStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::codebuf::CodeBuffer;

    #[test]
    fn test_acquire_lowest_first() {
        let mut pool = RegisterPool::new(true);
        assert_eq!(pool.acquire(), Stash::Register(2));
        assert_eq!(pool.acquire(), Stash::Register(3));
        pool.release(Stash::Register(2));
        assert_eq!(pool.acquire(), Stash::Register(2));
        assert_eq!(pool.occupied(), 2);
    }

    #[test]
    fn test_pool_exhaustion_spills() {
        let mut pool = RegisterPool::new(true);
        for expected in 2..8 {
            assert_eq!(pool.acquire(), Stash::Register(expected));
        }
        assert_eq!(pool.occupied(), 6);
        assert_eq!(pool.acquire(), Stash::Spill);
        assert_eq!(pool.occupied(), 6);

        let stats = pool.stats();
        assert_eq!(stats.registers_hit, 6);
        assert_eq!(stats.stack_spills, 1);
        assert_eq!(stats.max_reg, 7);
    }

    #[test]
    fn test_disabled_pool_always_spills() {
        let mut pool = RegisterPool::new(false);
        assert_eq!(pool.acquire(), Stash::Spill);
        assert_eq!(pool.acquire(), Stash::Spill);
        assert_eq!(pool.occupied(), 0);
        assert_eq!(pool.stats().registers_hit, 0);
    }

    #[test]
    fn test_release_spill_is_noop() {
        let mut pool = RegisterPool::new(true);
        pool.release(Stash::Spill);
        pool.release(Stash::Spill);
        assert_eq!(pool.occupied(), 0);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_double_release_panics() {
        let mut pool = RegisterPool::new(true);
        let handle = pool.acquire();
        pool.release(handle);
        pool.release(handle);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_release_unacquired_panics() {
        let mut pool = RegisterPool::new(true);
        pool.release(Stash::Register(5));
    }

    #[test]
    #[should_panic(expected = "not an allocatable register")]
    fn test_release_scratch_register_panics() {
        let mut pool = RegisterPool::new(true);
        pool.release(Stash::Register(SECONDARY));
    }

    #[test]
    fn test_stash_to_register_bytes() {
        let mut buf = CodeBuffer::new();
        let mut pool = RegisterPool::new(true);
        let mut asm = X86_64Assembler::new(&mut buf);

        let handle = pool.stash(&mut asm, false);
        assert_eq!(handle, Stash::Register(2));
        pool.unstash(&mut asm, handle, SECONDARY);

        // MOVSD XMM2, XMM0 ; MOVSD XMM1, XMM2
        assert_eq!(buf.code(), &[0xF2, 0x0F, 0x10, 0xD0, 0xF2, 0x0F, 0x10, 0xCA]);
        assert_eq!(pool.occupied(), 0);
        assert_eq!(pool.pending_spills(), 0);
    }

    #[test]
    fn test_forced_stash_uses_stack() {
        let mut buf = CodeBuffer::new();
        let mut pool = RegisterPool::new(true);
        let mut asm = X86_64Assembler::new(&mut buf);

        let handle = pool.stash(&mut asm, true);
        assert_eq!(handle, Stash::Spill);
        assert_eq!(pool.pending_spills(), 1);
        assert_eq!(pool.occupied(), 0);
        pool.unstash(&mut asm, handle, PRIMARY);

        // MOVQ RAX, XMM0 ; PUSH RAX ; POP RAX ; MOVQ XMM0, RAX
        assert_eq!(
            buf.code(),
            &[0x66, 0x48, 0x0F, 0x7E, 0xC0, 0x50, 0x58, 0x66, 0x48, 0x0F, 0x6E, 0xC0]
        );
        assert_eq!(pool.pending_spills(), 0);
        assert_eq!(pool.stats().stack_spills, 1);
    }

    #[test]
    #[should_panic(expected = "empty spill stack")]
    fn test_unstash_without_spill_panics() {
        let mut buf = CodeBuffer::new();
        let mut pool = RegisterPool::new(true);
        let mut asm = X86_64Assembler::new(&mut buf);
        pool.unstash(&mut asm, Stash::Spill, PRIMARY);
    }

    /// Runs `stash(force)` / clobber XMM0 / `unstash(dest)` natively and
    /// returns whatever came back.
    #[cfg(all(unix, target_arch = "x86_64"))]
    fn round_trip(value: f64, force_spill: bool, dest: u8) -> f64 {
        let mut buf = CodeBuffer::new();
        let mut pool = RegisterPool::new(true);
        {
            let mut asm = X86_64Assembler::new(&mut buf);
            asm.mov_ri64(Reg::Rax, value.to_bits());
            asm.movq_xmm_r64(PRIMARY, Reg::Rax);
            let handle = pool.stash(&mut asm, force_spill);
            asm.mov_ri64(Reg::Rax, 0);
            asm.movq_xmm_r64(PRIMARY, Reg::Rax);
            asm.movq_xmm_r64(SECONDARY, Reg::Rax);
            pool.unstash(&mut asm, handle, dest);
            if dest != PRIMARY {
                asm.movsd_xx(PRIMARY, dest);
            }
            asm.ret();
        }
        let mem = buf.finalize().unwrap();
        let f: extern "C" fn() -> f64 = unsafe { std::mem::transmute(mem.as_ptr()) };
        f()
    }

    #[test]
    #[cfg(all(unix, target_arch = "x86_64"))]
    fn test_round_trip_is_bit_exact() {
        for value in [1.5, -0.0, f64::MIN_POSITIVE, f64::NAN, f64::INFINITY] {
            for force_spill in [false, true] {
                for dest in [PRIMARY, SECONDARY] {
                    let back = round_trip(value, force_spill, dest);
                    assert_eq!(back.to_bits(), value.to_bits());
                }
            }
        }
    }
}
