use crate::backend::{branch_offset, fits_signed, Backend};
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
    encode_branch, encode_fpu_mem, encode_fpu_s, encode_i, encode_msa_3r, encode_msa_mem, encode_nop, encode_r,
    fpu, funct, is_branch, msa, opcode, reg, with_branch_offset, Instruction, Register,
};

type Out = Emitter<Instruction, Register>;

/// Portable register -> $a0..$a7, $t0..$t3, $s0, $s1
const GPR_MAP: [u8; 14] = [4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17];

/// Vector scratch for packed memory sources
const WTMP: u8 = 31;

/// MIPS64r6 backend with MSA, either byte order.
///
/// 32-bit (`wx`) results are sign-extended into the 64-bit register, as
/// the native 32-bit instructions do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mips {
    mode: SimdMode,
    endian: Endian,
}

/// Instruction sequence that leaves the sign-extended `imm` in `rd`:
/// `addiu` for 16-bit signed values, `ori` for 16-bit unsigned values,
/// otherwise `lui` plus `ori` for a non-zero low half.
pub fn materialize(endian: Endian, rd: Register, imm: i32) -> Vec<Instruction> {
    let mut seq = Vec::with_capacity(2);
    if fits_signed(imm as i64, 16) {
        seq.push(encode_i(endian, opcode::ADDIU, reg::ZERO, rd, imm as u32));
    } else if (0..0x10000).contains(&imm) {
        seq.push(encode_i(endian, opcode::ORI, reg::ZERO, rd, imm as u32));
    } else {
        let value = imm as u32;
        seq.push(encode_i(endian, opcode::LUI, reg::ZERO, rd, value >> 16));
        if value & 0xFFFF != 0 {
            seq.push(encode_i(endian, opcode::ORI, rd, rd, value & 0xFFFF));
        }
    }
    seq
}

impl Mips {
    pub fn new(mode: SimdMode, endian: Endian) -> BuildResult<Self> {
        Isa::Mips64.check_mode(mode)?;
        Ok(Self { mode, endian })
    }

    pub fn mode(&self) -> SimdMode {
        self.mode
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Native MSA registers backing a logical SIMD register, low half first
    fn vregs(&self, xmm: Xmm) -> ([u8; 2], usize) {
        let k = xmm.index() as u8;
        if self.mode.factor == 2 {
            ([2 * k, 2 * k + 1], 2)
        } else {
            ([k, k], 1)
        }
    }

    fn r(&self, rs: Register, rt: Register, rd: Register, sa: u32, funct: u32) -> Instruction {
        encode_r(self.endian, rs, rt, rd, sa, funct)
    }

    fn i(&self, op: u32, rs: Register, rt: Register, imm16: u32) -> Instruction {
        encode_i(self.endian, op, rs, rt, imm16)
    }

    fn mov_imm(&self, rd: Register, imm: i32, out: &mut Out) {
        for instr in materialize(self.endian, rd, imm) {
            out.emit(instr);
        }
        out.def(rd);
    }

    /// Base register and 16-bit offset for `mem`, computing the address in
    /// $at when the displacement does not fit.
    fn address(&self, mem: Mem, fits: impl Fn(i32) -> bool, out: &mut Out) -> BuildResult<(Register, i32)> {
        let base = self.gpr(mem.base)?;
        out.uses(&[base]);
        if fits(mem.disp) {
            Ok((base, mem.disp))
        } else {
            self.mov_imm(reg::AT, mem.disp, out);
            out.emit(self.r(reg::AT, base, reg::AT, 0, funct::DADDU));
            Ok((reg::AT, 0))
        }
    }

    fn load_store(&self, op: u32, rt: Register, mem: Mem, out: &mut Out) -> BuildResult<()> {
        let (base, offset) = self.address(mem, |disp| fits_signed(disp as i64, 16), out)?;
        out.emit(self.i(op, base, rt, offset as u32));
        Ok(())
    }

    fn vector_access(&self, load: bool, wd: u8, mem: Mem, out: &mut Out) -> BuildResult<()> {
        let (base, offset) = self.address(mem, |disp| disp % 4 == 0 && fits_signed(disp as i64 / 4, 10), out)?;
        let op = if load { msa::LD_W } else { msa::ST_W };
        out.emit(encode_msa_mem(self.endian, op, offset / 4, base, wd));
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
                // 32-bit moves re-sign-extend the low word
                let instr = if wide {
                    self.r(s, reg::ZERO, d, 0, funct::OR)
                } else {
                    self.r(reg::ZERO, s, d, 0, funct::SLL)
                };
                out.emit(instr);
            }
            (AluOp::Mov, Src::Mem(mem)) => {
                let load = if wide { opcode::LD } else { opcode::LW };
                self.load_store(load, d, mem, out)?;
            }
            (AluOp::Shl | AluOp::Shr | AluOp::Shn, Src::Imm(amount)) => {
                let amount = amount as u32;
                let funct = match (op, wide, amount >= 32) {
                    (AluOp::Shl, false, _) => funct::SLL,
                    (AluOp::Shr, false, _) => funct::SRL,
                    (_, false, _) => funct::SRA,
                    (AluOp::Shl, true, false) => funct::DSLL,
                    (AluOp::Shr, true, false) => funct::DSRL,
                    (_, true, false) => funct::DSRA,
                    (AluOp::Shl, true, true) => funct::DSLL32,
                    (AluOp::Shr, true, true) => funct::DSRL32,
                    (_, true, true) => funct::DSRA32,
                };
                out.uses(&[d]);
                out.emit(self.r(reg::ZERO, d, d, amount & 0x1F, funct));
            }
            (AluOp::Shl | AluOp::Shr | AluOp::Shn, _) => return Err(BuildError::InvalidOperands),
            (_, Src::Imm(imm)) => {
                out.uses(&[d]);
                let add = if wide { opcode::DADDIU } else { opcode::ADDIU };
                let direct = match op {
                    AluOp::Add if fits_signed(imm as i64, 16) => Some(self.i(add, d, d, imm as u32)),
                    AluOp::Sub if fits_signed(-(imm as i64), 16) => Some(self.i(add, d, d, imm.wrapping_neg() as u32)),
                    AluOp::And if (0..0x10000).contains(&imm) => Some(self.i(opcode::ANDI, d, d, imm as u32)),
                    AluOp::Orr if (0..0x10000).contains(&imm) => Some(self.i(opcode::ORI, d, d, imm as u32)),
                    AluOp::Xor if (0..0x10000).contains(&imm) => Some(self.i(opcode::XORI, d, d, imm as u32)),
                    _ => None,
                };
                match direct {
                    Some(instr) => out.emit(instr),
                    None => {
                        self.mov_imm(reg::AT, imm, out);
                        out.emit(self.alu_reg(op, wide, d, reg::AT));
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
                let load = if wide { opcode::LD } else { opcode::LW };
                self.load_store(load, reg::T8, mem, out)?;
                out.def(reg::T8);
                out.emit(self.alu_reg(op, wide, d, reg::T8));
            }
        }

        out.def(d);
        Ok(())
    }

    /// `rd = rd <op> rt` for the register forms
    fn alu_reg(&self, op: AluOp, wide: bool, rd: Register, rt: Register) -> Instruction {
        match (op, wide) {
            (AluOp::Add, true) => self.r(rd, rt, rd, 0, funct::DADDU),
            (AluOp::Add, false) => self.r(rd, rt, rd, 0, funct::ADDU),
            (AluOp::Sub, true) => self.r(rd, rt, rd, 0, funct::DSUBU),
            (AluOp::Sub, false) => self.r(rd, rt, rd, 0, funct::SUBU),
            (AluOp::And, _) => self.r(rd, rt, rd, 0, funct::AND),
            (AluOp::Orr, _) => self.r(rd, rt, rd, 0, funct::OR),
            (AluOp::Xor, _) => self.r(rd, rt, rd, 0, funct::XOR),
            (_, true) => self.r(rd, rt, rd, 2, funct::DMUL),
            (_, false) => self.r(rd, rt, rd, 2, funct::MUL),
        }
    }

    fn packed(&self, op: SimdOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let (d, halves) = self.vregs(dst);
        let base = match op {
            SimdOp::Mov => msa::MOVE_V,
            SimdOp::Add => msa::FADD_W,
            SimdOp::Sub => msa::FSUB_W,
            SimdOp::Mul => msa::FMUL_W,
            SimdOp::Div => msa::FDIV_W,
            SimdOp::And => msa::AND_V,
            SimdOp::Orr => msa::OR_V,
            SimdOp::Xor => msa::XOR_V,
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
                    self.vector_access(true, WTMP, mem, out)?;
                    WTMP
                }
            };
            let instr = if op == SimdOp::Mov {
                encode_msa_3r(self.endian, base, 0, s, d[half])
            } else {
                encode_msa_3r(self.endian, base, s, d[half], d[half])
            };
            out.emit(instr);
        }
        Ok(())
    }

    fn scalar(&self, op: ScalarOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let ([d, _], _) = self.vregs(dst);
        match src {
            VSrc::Mem(mem) => {
                let (base, offset) = self.address(mem, |disp| fits_signed(disp as i64, 16), out)?;
                out.emit(encode_fpu_mem(self.endian, opcode::LWC1, base, d, offset));
            }
            VSrc::Reg(src) => {
                let ([s, _], _) = self.vregs(src);
                let instr = match op {
                    ScalarOp::Mov => encode_fpu_s(self.endian, fpu::MOV_S, 0, s, d),
                    ScalarOp::Add => encode_fpu_s(self.endian, fpu::ADD_S, s, d, d),
                    ScalarOp::Sub => encode_fpu_s(self.endian, fpu::SUB_S, s, d, d),
                    ScalarOp::Mul => encode_fpu_s(self.endian, fpu::MUL_S, s, d, d),
                    ScalarOp::Div => encode_fpu_s(self.endian, fpu::DIV_S, s, d, d),
                };
                out.emit(instr);
            }
        }
        Ok(())
    }

    /// Compare and branch, followed by the delay-slot `nop`
    fn cmp_jump(&self, cond: Cond, lhs: Reg, rhs: Src, out: &mut Out) -> BuildResult<Instruction> {
        let l = self.gpr(lhs)?;
        out.uses(&[l]);
        let r = match rhs {
            Src::Reg(rhs) => {
                let r = self.gpr(rhs)?;
                out.uses(&[r]);
                r
            }
            Src::Imm(0) => reg::ZERO,
            Src::Imm(imm) => {
                self.mov_imm(reg::T8, imm, out);
                reg::T8
            }
            Src::Mem(_) => return Err(BuildError::InvalidOperands),
        };

        let branch = match cond {
            Cond::Eq => encode_branch(self.endian, opcode::BEQ, l, r),
            Cond::Ne => encode_branch(self.endian, opcode::BNE, l, r),
            _ => {
                let slt = if cond.is_signed() { funct::SLT } else { funct::SLTU };
                // `less` is set when the branch is taken (bne) or not taken (beq)
                let (a, b, taken_if_set) = match cond {
                    Cond::Lt | Cond::Ltu => (l, r, true),
                    Cond::Ge | Cond::Geu => (l, r, false),
                    Cond::Gt | Cond::Gtu => (r, l, true),
                    _ => (r, l, false),
                };
                out.emit(self.r(a, b, reg::AT, 0, slt));
                out.def(reg::AT);
                let op = if taken_if_set { opcode::BNE } else { opcode::BEQ };
                encode_branch(self.endian, op, reg::AT, reg::ZERO)
            }
        };
        Ok(branch)
    }
}

/// Address of the `half`-th 16-byte slice of a vector operand
fn half_offset(mem: Mem, half: usize) -> BuildResult<Mem> {
    mem.offset(16 * half as i32)
        .ok_or(BuildError::InvalidDisplacement(mem.disp as i64 + 16 * half as i64))
}

impl Backend for Mips {
    type Instruction = Instruction;
    type Register = Register;

    fn target(&self) -> Target {
        Target { isa: Isa::Mips64, mode: self.mode, endian: self.endian }
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
                let store = if size.is_64() { opcode::SD } else { opcode::SW };
                self.load_store(store, s, dst, out)
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
                let (base, offset) = self.address(dst, |disp| fits_signed(disp as i64, 16), out)?;
                out.emit(encode_fpu_mem(self.endian, opcode::SWC1, base, s, offset));
                Ok(())
            }
            Op::Jump { target } => {
                // b = beq $zero, $zero
                out.emit_branch(encode_branch(self.endian, opcode::BEQ, reg::ZERO, reg::ZERO), target);
                out.emit(encode_nop(self.endian));
                Ok(())
            }
            Op::CmpJump { cond, lhs, rhs, target, .. } => {
                let branch = self.cmp_jump(cond, lhs, rhs, out)?;
                out.emit_branch(branch, target);
                out.emit(encode_nop(self.endian));
                Ok(())
            }
            Op::Ret => {
                out.emit(self.r(reg::RA, reg::ZERO, reg::ZERO, 0, funct::JALR));
                out.emit(encode_nop(self.endian));
                Ok(())
            }
        }
    }

    fn relocate(&self, instr: Instruction, at: usize, dest: usize) -> BuildResult<Instruction> {
        if !is_branch(instr) {
            return Err(BuildError::UnsupportedInstruction);
        }
        let offset = branch_offset(at as i64 + 4, dest, 4, 16)?;
        Ok(with_branch_offset(instr, offset as i32))
    }
}
