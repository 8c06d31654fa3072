//! The per-architecture encoder contract.

use crate::common::{BuildError, BuildResult, Instruction, Register};
use crate::emit::Emitter;
use crate::op::Op;
use crate::operand::{Reg, Xmm};
use crate::target::Target;

/// One target architecture: maps portable operands to native registers and
/// portable ops to bit-exact native instructions.
pub trait Backend {
    /// Native instruction (`u32` word or x86 byte sequence)
    type Instruction: Instruction;
    /// Native general-purpose register, as reported by register tracking
    type Register: Register;

    fn target(&self) -> Target;

    /// Native register backing a portable one
    fn gpr(&self, reg: Reg) -> BuildResult<Self::Register>;

    /// Number of usable logical SIMD registers in the active mode
    fn simd_registers(&self) -> usize;

    /// Encode `op` (already validated) into `out`
    fn encode(&self, op: &Op, out: &mut Emitter<Self::Instruction, Self::Register>) -> BuildResult<()>;

    /// Rewrite the displacement of the branch `instr` located at byte
    /// offset `at` so that it lands on byte offset `dest`.
    fn relocate(&self, instr: Self::Instruction, at: usize, dest: usize) -> BuildResult<Self::Instruction>;

    /// Reject SIMD registers beyond `simd_registers()`
    fn check_xmm(&self, xmm: Xmm) -> BuildResult<()> {
        if xmm.index() < self.simd_registers() {
            Ok(())
        } else {
            Err(BuildError::InvalidRegister(xmm.index() as u32))
        }
    }
}

/// Scaled branch displacement `(dest - origin) / scale`, checked against a
/// signed field of `bits` bits.
pub(crate) fn branch_offset(origin: i64, dest: usize, scale: i64, bits: u32) -> BuildResult<i64> {
    let delta = dest as i64 - origin;
    if delta % scale != 0 {
        return Err(BuildError::BranchOutOfRange(delta));
    }
    let scaled = delta / scale;
    let limit = 1i64 << (bits - 1);
    if scaled < -limit || scaled >= limit {
        return Err(BuildError::BranchOutOfRange(delta));
    }
    Ok(scaled)
}

/// True if `value` fits a signed field of `bits` bits
pub(crate) const fn fits_signed(value: i64, bits: u32) -> bool {
    let limit = 1i64 << (bits - 1);
    value >= -limit && value < limit
}

/// True if `value` fits an unsigned field of `bits` bits
pub(crate) const fn fits_unsigned(value: i64, bits: u32) -> bool {
    value >= 0 && value < (1i64 << bits)
}
