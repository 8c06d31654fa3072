use crate::backend::{branch_offset, fits_signed, fits_unsigned, Backend};
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
    bo, cr0, encode_b, encode_bc, encode_blr, encode_d, encode_ds, encode_fmr, encode_fp_single, encode_rldic,
    encode_rlwinm, encode_sradi, encode_x, encode_xx3, fp, is_b, is_bc, opcode, reg, vsx, with_branch_offset, xo,
    Instruction, Register,
};

type Out = Emitter<Instruction, Register>;

/// Portable register -> r3..r10, r14..r19
const GPR_MAP: [u8; 14] = [3, 4, 5, 6, 7, 8, 9, 10, 14, 15, 16, 17, 18, 19];

/// VSX scratch for packed memory sources
const VTMP: u8 = 31;

/// 64-bit POWER backend (ISA 2.07, VSX), either byte order.
///
/// 32-bit (`wx`) results are defined in the low word only; 32-bit compares
/// ignore the high word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Power {
    mode: SimdMode,
    endian: Endian,
}

/// Instruction sequence that leaves the sign-extended `imm` in `rd`:
/// `li` for 16-bit signed values, otherwise `lis` plus `ori` for a
/// non-zero low half.
pub fn materialize(endian: Endian, rd: Register, imm: i32) -> Vec<Instruction> {
    let mut seq = Vec::with_capacity(2);
    if fits_signed(imm as i64, 16) {
        seq.push(encode_d(endian, opcode::ADDI, rd.value(), reg::R0, imm as u32));
    } else {
        let value = imm as u32;
        seq.push(encode_d(endian, opcode::ADDIS, rd.value(), reg::R0, value >> 16));
        if value & 0xFFFF != 0 {
            seq.push(encode_d(endian, opcode::ORI, rd.value(), rd, value & 0xFFFF));
        }
    }
    seq
}

/// `branch if true` / `branch if false` on a CR0 bit
fn branch_condition(cond: Cond) -> (u32, u32) {
    match cond {
        Cond::Eq => (bo::IF_TRUE, cr0::EQ),
        Cond::Ne => (bo::IF_FALSE, cr0::EQ),
        Cond::Lt | Cond::Ltu => (bo::IF_TRUE, cr0::LT),
        Cond::Ge | Cond::Geu => (bo::IF_FALSE, cr0::LT),
        Cond::Gt | Cond::Gtu => (bo::IF_TRUE, cr0::GT),
        Cond::Le | Cond::Leu => (bo::IF_FALSE, cr0::GT),
    }
}

impl Power {
    pub fn new(mode: SimdMode, endian: Endian) -> BuildResult<Self> {
        Isa::Power64.check_mode(mode)?;
        Ok(Self { mode, endian })
    }

    pub fn mode(&self) -> SimdMode {
        self.mode
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// VSX registers backing a logical SIMD register, low half first
    fn vregs(&self, xmm: Xmm) -> ([u8; 2], usize) {
        let k = xmm.index() as u8;
        if self.mode.factor == 2 {
            ([2 * k, 2 * k + 1], 2)
        } else {
            ([k, k], 1)
        }
    }

    fn mov_imm(&self, rd: Register, imm: i32, out: &mut Out) {
        for instr in materialize(self.endian, rd, imm) {
            out.emit(instr);
        }
        out.def(rd);
    }

    /// D-form access when `disp` fits (and is word aligned for DS-form),
    /// else the indexed form with the displacement in r0
    fn access(&self, d_form: u32, x_form: u32, ds: bool, rt: u8, mem: Mem, out: &mut Out) -> BuildResult<()> {
        let base = self.gpr(mem.base)?;
        out.uses(&[base]);
        let direct = fits_signed(mem.disp as i64, 16) && (!ds || mem.disp % 4 == 0);
        if direct && ds {
            out.emit(encode_ds(self.endian, d_form, Register::new(rt), base, mem.disp));
        } else if direct {
            out.emit(encode_d(self.endian, d_form, rt, base, mem.disp as u32));
        } else {
            self.mov_imm(reg::R0, mem.disp, out);
            out.emit(encode_x(self.endian, x_form, rt, base, reg::R0));
        }
        Ok(())
    }

    fn load(&self, size: Size, rt: Register, mem: Mem, out: &mut Out) -> BuildResult<()> {
        match size {
            Size::S64 => self.access(opcode::LD, xo::LDX, true, rt.value(), mem, out),
            Size::S32 => self.access(opcode::LWZ, xo::LWZX, false, rt.value(), mem, out),
        }
    }

    /// `lxvw4x`/`stxvw4x` only have an indexed form
    fn vector_access(&self, load: bool, xt: u8, mem: Mem, out: &mut Out) -> BuildResult<()> {
        let base = self.gpr(mem.base)?;
        out.uses(&[base]);
        let op = if load { xo::LXVW4X } else { xo::STXVW4X };
        if mem.disp == 0 {
            out.emit(encode_x(self.endian, op, xt, reg::R0, base));
        } else {
            self.mov_imm(reg::R0, mem.disp, out);
            out.emit(encode_x(self.endian, op, xt, base, reg::R0));
        }
        Ok(())
    }

    fn alu(&self, op: AluOp, size: Size, dst: Reg, src: Src, out: &mut Out) -> BuildResult<()> {
        let wide = size.is_64();
        let d = self.gpr(dst)?;

        match (op, src) {
            (AluOp::Mov, Src::Imm(imm)) => self.mov_imm(d, imm, out),
            (AluOp::Mov, Src::Reg(src)) => {
                let s = self.gpr(src)?;
                out.uses(&[s]);
                // mr
                out.emit(encode_x(self.endian, xo::OR, s.value(), d, s));
            }
            (AluOp::Mov, Src::Mem(mem)) => self.load(size, d, mem, out)?,
            (AluOp::Shl | AluOp::Shr | AluOp::Shn, Src::Imm(amount)) => {
                let n = amount as u32;
                out.uses(&[d]);
                let instr = match (op, wide) {
                    (AluOp::Shl, true) => encode_rldic(self.endian, false, d, d, n, 63 - n),
                    (AluOp::Shr, true) => encode_rldic(self.endian, true, d, d, (64 - n) & 63, n),
                    (_, true) => encode_sradi(self.endian, d, d, n),
                    (AluOp::Shl, false) => encode_rlwinm(self.endian, d, d, n, 0, 31 - n),
                    (AluOp::Shr, false) => encode_rlwinm(self.endian, d, d, (32 - n) & 31, n, 31),
                    (_, false) => encode_x(self.endian, xo::SRAWI, d.value(), d, Register::new(n as u8)),
                };
                out.emit(instr);
            }
            (AluOp::Shl | AluOp::Shr | AluOp::Shn, _) => return Err(BuildError::InvalidOperands),
            (_, Src::Imm(imm)) => {
                out.uses(&[d]);
                let logical = fits_unsigned(imm as i64, 16);
                let direct = match op {
                    AluOp::Add if fits_signed(imm as i64, 16) => Some(encode_d(self.endian, opcode::ADDI, d.value(), d, imm as u32)),
                    AluOp::Sub if fits_signed(-(imm as i64), 16) => {
                        Some(encode_d(self.endian, opcode::ADDI, d.value(), d, imm.wrapping_neg() as u32))
                    }
                    AluOp::Mul if fits_signed(imm as i64, 16) => Some(encode_d(self.endian, opcode::MULLI, d.value(), d, imm as u32)),
                    // logical immediates take the source in the RT slot
                    AluOp::And if logical => Some(encode_d(self.endian, opcode::ANDI, d.value(), d, imm as u32)),
                    AluOp::Orr if logical => Some(encode_d(self.endian, opcode::ORI, d.value(), d, imm as u32)),
                    AluOp::Xor if logical => Some(encode_d(self.endian, opcode::XORI, d.value(), d, imm as u32)),
                    _ => None,
                };
                match direct {
                    Some(instr) => out.emit(instr),
                    None => {
                        self.mov_imm(reg::R0, imm, out);
                        out.emit(self.alu_reg(op, wide, d, reg::R0));
                    }
                }
            }
            (_, Src::Reg(src)) => {
                let s = self.gpr(src)?;
                out.uses(&[d, s]);
                out.emit(self.alu_reg(op, wide, d, s));
            }
            (_, Src::Mem(mem)) => {
                out.uses(&[d]);
                self.load(size, reg::R0, mem, out)?;
                out.def(reg::R0);
                out.emit(self.alu_reg(op, wide, d, reg::R0));
            }
        }

        out.def(d);
        Ok(())
    }

    /// `rd = rd <op> rb` for the register forms
    fn alu_reg(&self, op: AluOp, wide: bool, rd: Register, rb: Register) -> Instruction {
        let e = self.endian;
        match op {
            AluOp::Add => encode_x(e, xo::ADD, rd.value(), rd, rb),
            // subf rt, ra, rb is rb - ra
            AluOp::Sub => encode_x(e, xo::SUBF, rd.value(), rb, rd),
            AluOp::And => encode_x(e, xo::AND, rd.value(), rd, rb),
            AluOp::Orr => encode_x(e, xo::OR, rd.value(), rd, rb),
            AluOp::Xor => encode_x(e, xo::XOR, rd.value(), rd, rb),
            _ if wide => encode_x(e, xo::MULLD, rd.value(), rd, rb),
            _ => encode_x(e, xo::MULLW, rd.value(), rd, rb),
        }
    }

    fn packed(&self, op: SimdOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let (d, halves) = self.vregs(dst);
        let ext = match op {
            SimdOp::Mov | SimdOp::Orr => vsx::XXLOR,
            SimdOp::Add => vsx::XVADDSP,
            SimdOp::Sub => vsx::XVSUBSP,
            SimdOp::Mul => vsx::XVMULSP,
            SimdOp::Div => vsx::XVDIVSP,
            SimdOp::And => vsx::XXLAND,
            SimdOp::Xor => vsx::XXLXOR,
        };

        for half in 0..halves {
            let s = match src {
                VSrc::Reg(src) => self.vregs(src).0[half],
                VSrc::Mem(mem) => {
                    let mem = half_offset(mem, half)?;
                    if op == SimdOp::Mov {
                        self.vector_access(true, d[half], mem, out)?;
                        continue;
                    }
                    self.vector_access(true, VTMP, mem, out)?;
                    VTMP
                }
            };
            let instr = if op == SimdOp::Mov {
                encode_xx3(self.endian, ext, d[half], s, s)
            } else {
                encode_xx3(self.endian, ext, d[half], d[half], s)
            };
            out.emit(instr);
        }
        Ok(())
    }

    /// Scalars live in the FPR view of the low VSX register
    fn scalar(&self, op: ScalarOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let ([d, _], _) = self.vregs(dst);
        match src {
            VSrc::Mem(mem) => self.access(opcode::LFS, xo::LFSX, false, d, mem, out),
            VSrc::Reg(src) => {
                let ([s, _], _) = self.vregs(src);
                let instr = match op {
                    ScalarOp::Mov => encode_fmr(self.endian, d, s),
                    ScalarOp::Add => encode_fp_single(self.endian, fp::FADDS, d, d, s),
                    ScalarOp::Sub => encode_fp_single(self.endian, fp::FSUBS, d, d, s),
                    ScalarOp::Mul => encode_fp_single(self.endian, fp::FMULS, d, d, s),
                    ScalarOp::Div => encode_fp_single(self.endian, fp::FDIVS, d, d, s),
                };
                out.emit(instr);
                Ok(())
            }
        }
    }

    /// Set CR0 from `lhs` against `rhs`, signed or logical by `cond`
    fn compare(&self, size: Size, cond: Cond, lhs: Reg, rhs: Src, out: &mut Out) -> BuildResult<()> {
        let l = self.gpr(lhs)?;
        out.uses(&[l]);
        // crfD 0, L selects the doubleword compare
        let l_bit = if size.is_64() { 1 } else { 0 };
        let signed = cond.is_signed() || matches!(cond, Cond::Eq | Cond::Ne);

        let r = match rhs {
            Src::Reg(rhs) => {
                let r = self.gpr(rhs)?;
                out.uses(&[r]);
                r
            }
            Src::Imm(imm) if signed && fits_signed(imm as i64, 16) => {
                out.emit(encode_d(self.endian, opcode::CMPI, l_bit, l, imm as u32));
                return Ok(());
            }
            Src::Imm(imm) if !signed && fits_unsigned(imm as i64, 16) => {
                out.emit(encode_d(self.endian, opcode::CMPLI, l_bit, l, imm as u32));
                return Ok(());
            }
            Src::Imm(imm) => {
                self.mov_imm(reg::R0, imm, out);
                reg::R0
            }
            Src::Mem(_) => return Err(BuildError::InvalidOperands),
        };
        let cmp = if signed { xo::CMP } else { xo::CMPL };
        out.emit(encode_x(self.endian, cmp, l_bit, l, r));
        Ok(())
    }
}

/// Address of the `half`-th 16-byte slice of a vector operand
fn half_offset(mem: Mem, half: usize) -> BuildResult<Mem> {
    mem.offset(16 * half as i32)
        .ok_or(BuildError::InvalidDisplacement(mem.disp as i64 + 16 * half as i64))
}

impl Backend for Power {
    type Instruction = Instruction;
    type Register = Register;

    fn target(&self) -> Target {
        Target { isa: Isa::Power64, mode: self.mode, endian: self.endian }
    }

    fn gpr(&self, reg: Reg) -> BuildResult<Register> {
        Ok(Register::new(GPR_MAP[reg.index()]))
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
                match size {
                    Size::S64 => self.access(opcode::STD, xo::STDX, true, s.value(), dst, out),
                    Size::S32 => self.access(opcode::STW, xo::STWX, false, s.value(), dst, out),
                }
            }
            Op::Packed { op, dst, src } => self.packed(op, dst, src, out),
            Op::PackedStore { src, dst } => {
                let (s, halves) = self.vregs(src);
                for half in 0..halves {
                    self.vector_access(false, s[half], half_offset(dst, half)?, out)?;
                }
                Ok(())
            }
            Op::Scalar { op, dst, src } => self.scalar(op, dst, src, out),
            Op::ScalarStore { src, dst } => {
                let ([s, _], _) = self.vregs(src);
                self.access(opcode::STFS, xo::STFSX, false, s, dst, out)
            }
            Op::Jump { target } => {
                out.emit_branch(encode_b(self.endian), target);
                Ok(())
            }
            Op::CmpJump { size, cond, lhs, rhs, target } => {
                self.compare(size, cond, lhs, rhs, out)?;
                let (bo, bi) = branch_condition(cond);
                out.emit_branch(encode_bc(self.endian, bo, bi), target);
                Ok(())
            }
            Op::Ret => {
                out.emit(encode_blr(self.endian));
                Ok(())
            }
        }
    }

    /// Displacements are relative to the branch itself
    fn relocate(&self, instr: Instruction, at: usize, dest: usize) -> BuildResult<Instruction> {
        let bits = if is_b(instr) {
            24
        } else if is_bc(instr) {
            14
        } else {
            return Err(BuildError::UnsupportedInstruction);
        };
        let words = branch_offset(at as i64, dest, 4, bits)?;
        Ok(with_branch_offset(instr, words as i32))
    }
}
