use crate::backend::{branch_offset, Backend};
use crate::common::{BuildError, BuildResult};
use crate::emit::Emitter;
use crate::op::{AluOp, Op, ScalarOp, SimdOp, Src, VSrc};
use crate::operand::{Cond, Mem, Reg, Size, Xmm};
use crate::target::{Endian, Isa, SimdMode, Target};

#[cfg(feature = "std")]
use std::vec::Vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use super::instruction::{
    encode_add_sub_imm, encode_add_sub_reg, encode_b, encode_b_cond, encode_bitfield, encode_ldst_reg,
    encode_ldst_uimm, encode_ldst_unscaled, encode_logical_reg, encode_move_reg, encode_move_wide,
    encode_multiply, encode_ret, encode_vector_3reg, fp, is_b, is_b_cond, reg, simd, Access, Instruction,
    MoveWide, Register,
};

type Out = Emitter<Instruction, Register>;

/// Vector scratch for memory operands of packed ops
const VTMP: u8 = 31;

/// AArch64 backend: NEON, with 256X2 backing each logical register by a
/// pair of Q registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aarch64 {
    mode: SimdMode,
}

/// Instruction sequence that leaves `imm` (sign-extended for 64-bit) in `rd`.
///
/// One MOVZ or MOVN when the value has a single non-trivial halfword,
/// otherwise MOVZ/MOVN followed by MOVK for the upper halfword.
pub fn materialize(sf: bool, rd: Register, imm: i32) -> Vec<Instruction> {
    let value = imm as u32;
    let lo = value & 0xFFFF;
    let hi = value >> 16;
    let negative = if sf { imm < 0 } else { hi == 0xFFFF };

    let mut seq = Vec::with_capacity(2);
    if !negative {
        seq.push(encode_move_wide(sf, MoveWide::Z, 0, lo, rd));
        if hi != 0 {
            seq.push(encode_move_wide(sf, MoveWide::K, 1, hi, rd));
        }
    } else {
        seq.push(encode_move_wide(sf, MoveWide::N, 0, !lo & 0xFFFF, rd));
        if hi != 0xFFFF {
            seq.push(encode_move_wide(sf, MoveWide::K, 1, hi, rd));
        }
    }
    seq
}

/// Split an ADD/SUB immediate into `(sub, lsl12, imm12)` if it has a direct form
fn add_sub_imm(sub: bool, imm: i32) -> Option<(bool, bool, u32)> {
    let (sub, magnitude) = if imm < 0 { (!sub, imm.unsigned_abs()) } else { (sub, imm as u32) };
    if magnitude < 0x1000 {
        Some((sub, false, magnitude))
    } else if magnitude & 0xFFF == 0 && magnitude < 0x100_0000 {
        Some((sub, true, magnitude >> 12))
    } else {
        None
    }
}

fn condition_code(cond: Cond) -> u32 {
    match cond {
        Cond::Eq => 0x0,
        Cond::Ne => 0x1,
        Cond::Geu => 0x2,
        Cond::Ltu => 0x3,
        Cond::Gtu => 0x8,
        Cond::Leu => 0x9,
        Cond::Ge => 0xA,
        Cond::Lt => 0xB,
        Cond::Gt => 0xC,
        Cond::Le => 0xD,
    }
}

impl Aarch64 {
    pub fn new(mode: SimdMode) -> BuildResult<Self> {
        Isa::Aarch64.check_mode(mode)?;
        Ok(Self { mode })
    }

    pub fn mode(&self) -> SimdMode {
        self.mode
    }

    /// Native Q registers backing a logical SIMD register, low half first
    fn vregs(&self, xmm: Xmm) -> ([u8; 2], usize) {
        let k = xmm.index() as u8;
        if self.mode.factor == 2 {
            ([2 * k, 2 * k + 1], 2)
        } else {
            ([k, k], 1)
        }
    }

    fn mov_imm(&self, sf: bool, rd: Register, imm: i32, out: &mut Out) {
        for instr in materialize(sf, rd, imm) {
            out.emit(instr);
        }
        out.def(rd);
    }

    /// Load or store `rt` at `mem`, picking the scaled, unscaled or
    /// register-offset form by displacement.
    fn access(&self, access: Access, load: bool, rt: u8, mem: Mem, out: &mut Out) -> BuildResult<()> {
        let base = self.gpr(mem.base)?;
        out.uses(&[base]);
        let disp = mem.disp;
        let instr = if disp >= 0 && disp % access.bytes == 0 && disp / access.bytes < 0x1000 {
            encode_ldst_uimm(access, load, (disp / access.bytes) as u32, base, rt)
        } else if (-256..256).contains(&disp) {
            encode_ldst_unscaled(access, load, disp, base, rt)
        } else {
            self.mov_imm(true, reg::X17, disp, out);
            encode_ldst_reg(access, load, reg::X17, base, rt)
        };
        out.emit(instr);
        Ok(())
    }

    /// Bring an integer source into a register, using X16 for immediates and memory
    fn source(&self, sf: bool, src: Src, out: &mut Out) -> BuildResult<Register> {
        match src {
            Src::Reg(src) => {
                let s = self.gpr(src)?;
                out.uses(&[s]);
                Ok(s)
            }
            Src::Imm(imm) => {
                self.mov_imm(sf, reg::X16, imm, out);
                Ok(reg::X16)
            }
            Src::Mem(mem) => {
                let access = if sf { Access::X } else { Access::W };
                self.access(access, true, reg::X16.value(), mem, out)?;
                out.def(reg::X16);
                Ok(reg::X16)
            }
        }
    }

    fn alu(&self, op: AluOp, size: Size, dst: Reg, src: Src, out: &mut Out) -> BuildResult<()> {
        let sf = size.is_64();
        let d = self.gpr(dst)?;

        match (op, src) {
            (AluOp::Mov, Src::Imm(imm)) => self.mov_imm(sf, d, imm, out),
            (AluOp::Mov, Src::Reg(src)) => {
                let s = self.gpr(src)?;
                out.uses(&[s]);
                out.emit(encode_move_reg(sf, s, d));
            }
            (AluOp::Mov, Src::Mem(mem)) => {
                let access = if sf { Access::X } else { Access::W };
                self.access(access, true, d.value(), mem, out)?;
            }
            (AluOp::Add | AluOp::Sub, src) => {
                let sub = op == AluOp::Sub;
                out.uses(&[d]);
                let direct = match src {
                    Src::Imm(imm) => add_sub_imm(sub, imm),
                    _ => None,
                };
                match direct {
                    Some((sub, lsl12, imm12)) => out.emit(encode_add_sub_imm(sf, sub, false, lsl12, imm12, d, d)),
                    None => {
                        let s = self.source(sf, src, out)?;
                        out.emit(encode_add_sub_reg(sf, sub, false, s, d, d));
                    }
                }
            }
            (AluOp::And | AluOp::Orr | AluOp::Xor, src) => {
                let opc = match op {
                    AluOp::And => 0b00,
                    AluOp::Orr => 0b01,
                    _ => 0b10,
                };
                out.uses(&[d]);
                let s = self.source(sf, src, out)?;
                out.emit(encode_logical_reg(sf, opc, s, d, d));
            }
            (AluOp::Mul, src) => {
                out.uses(&[d]);
                let s = self.source(sf, src, out)?;
                out.emit(encode_multiply(sf, s, d, d));
            }
            (AluOp::Shl | AluOp::Shr | AluOp::Shn, Src::Imm(amount)) => {
                let bits = size.bits();
                let amount = amount as u32;
                out.uses(&[d]);
                let instr = match op {
                    AluOp::Shl => encode_bitfield(sf, 0b10, (bits - amount) % bits, bits - 1 - amount, d, d),
                    AluOp::Shr => encode_bitfield(sf, 0b10, amount, bits - 1, d, d),
                    _ => encode_bitfield(sf, 0b00, amount, bits - 1, d, d),
                };
                out.emit(instr);
            }
            (AluOp::Shl | AluOp::Shr | AluOp::Shn, _) => return Err(BuildError::InvalidOperands),
        }

        out.def(d);
        Ok(())
    }

    fn packed(&self, op: SimdOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let (d, halves) = self.vregs(dst);
        let base = match op {
            SimdOp::Mov => simd::ORR,
            SimdOp::Add => simd::FADD,
            SimdOp::Sub => simd::FSUB,
            SimdOp::Mul => simd::FMUL,
            SimdOp::Div => simd::FDIV,
            SimdOp::And => simd::AND,
            SimdOp::Orr => simd::ORR,
            SimdOp::Xor => simd::EOR,
        };

        for half in 0..halves {
            match src {
                VSrc::Reg(src) => {
                    let (s, _) = self.vregs(src);
                    let rn = if op == SimdOp::Mov { s[half] } else { d[half] };
                    out.emit(encode_vector_3reg(base, s[half], rn, d[half]));
                }
                VSrc::Mem(mem) => {
                    let mem = half_offset(mem, half)?;
                    if op == SimdOp::Mov {
                        self.access(Access::Q, true, d[half], mem, out)?;
                    } else {
                        self.access(Access::Q, true, VTMP, mem, out)?;
                        out.emit(encode_vector_3reg(base, VTMP, d[half], d[half]));
                    }
                }
            }
        }
        Ok(())
    }

    fn scalar(&self, op: ScalarOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let ([d, _], _) = self.vregs(dst);
        match src {
            VSrc::Mem(mem) => self.access(Access::S, true, d, mem, out),
            VSrc::Reg(src) => {
                let ([s, _], _) = self.vregs(src);
                let instr = match op {
                    ScalarOp::Mov => encode_vector_3reg(fp::FMOV, 0, s, d),
                    ScalarOp::Add => encode_vector_3reg(fp::FADD, s, d, d),
                    ScalarOp::Sub => encode_vector_3reg(fp::FSUB, s, d, d),
                    ScalarOp::Mul => encode_vector_3reg(fp::FMUL, s, d, d),
                    ScalarOp::Div => encode_vector_3reg(fp::FDIV, s, d, d),
                };
                out.emit(instr);
                Ok(())
            }
        }
    }

    fn compare(&self, size: Size, lhs: Reg, rhs: Src, out: &mut Out) -> BuildResult<()> {
        let sf = size.is_64();
        let l = self.gpr(lhs)?;
        out.uses(&[l]);
        match rhs {
            Src::Imm(imm) if (0..0x1000).contains(&imm) => {
                out.emit(encode_add_sub_imm(sf, true, true, false, imm as u32, l, reg::XZR));
            }
            Src::Imm(imm) if (-0xFFF..0).contains(&imm) => {
                // CMN
                out.emit(encode_add_sub_imm(sf, false, true, false, imm.unsigned_abs(), l, reg::XZR));
            }
            Src::Mem(_) => return Err(BuildError::InvalidOperands),
            _ => {
                let r = self.source(sf, rhs, out)?;
                out.emit(encode_add_sub_reg(sf, true, true, r, l, reg::XZR));
            }
        }
        Ok(())
    }
}

/// Address of the `half`-th 16-byte slice of a vector operand
fn half_offset(mem: Mem, half: usize) -> BuildResult<Mem> {
    mem.offset(16 * half as i32)
        .ok_or(BuildError::InvalidDisplacement(mem.disp as i64 + 16 * half as i64))
}

impl Backend for Aarch64 {
    type Instruction = Instruction;
    type Register = Register;

    fn target(&self) -> Target {
        Target { isa: Isa::Aarch64, mode: self.mode, endian: Endian::Little }
    }

    fn gpr(&self, reg: Reg) -> BuildResult<Register> {
        Ok(Register::new(reg.index() as u8))
    }

    fn simd_registers(&self) -> usize {
        16 / self.mode.factor as usize
    }

    fn encode(&self, op: &Op, out: &mut Out) -> BuildResult<()> {
        match *op {
            Op::Alu { op, size, dst, src } => self.alu(op, size, dst, src, out),
            Op::Store { size, src, dst } => {
                let s = self.gpr(src)?;
                out.uses(&[s]);
                let access = if size.is_64() { Access::X } else { Access::W };
                self.access(access, false, s.value(), dst, out)
            }
            Op::Packed { op, dst, src } => self.packed(op, dst, src, out),
            Op::PackedStore { src, dst } => {
                let (s, halves) = self.vregs(src);
                for half in 0..halves {
                    self.access(Access::Q, false, s[half], half_offset(dst, half)?, out)?;
                }
                Ok(())
            }
            Op::Scalar { op, dst, src } => self.scalar(op, dst, src, out),
            Op::ScalarStore { src, dst } => {
                let ([s, _], _) = self.vregs(src);
                self.access(Access::S, false, s, dst, out)
            }
            Op::Jump { target } => {
                out.emit_branch(encode_b(0), target);
                Ok(())
            }
            Op::CmpJump { size, cond, lhs, rhs, target } => {
                self.compare(size, lhs, rhs, out)?;
                out.emit_branch(encode_b_cond(condition_code(cond), 0), target);
                Ok(())
            }
            Op::Ret => {
                out.emit(encode_ret());
                Ok(())
            }
        }
    }

    fn relocate(&self, instr: Instruction, at: usize, dest: usize) -> BuildResult<Instruction> {
        if is_b(instr) {
            let imm26 = branch_offset(at as i64, dest, 4, 26)?;
            Ok(encode_b(imm26 as i32))
        } else if is_b_cond(instr) {
            let imm19 = branch_offset(at as i64, dest, 4, 19)?;
            Ok(encode_b_cond(instr.value() & 0xF, imm19 as i32))
        } else {
            Err(BuildError::UnsupportedInstruction)
        }
    }
}
