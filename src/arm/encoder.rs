use crate::backend::{branch_offset, Backend};
use crate::common::{BuildError, BuildResult};
use crate::emit::Emitter;
use crate::op::{AluOp, Op, ScalarOp, SimdOp, Src, VSrc};
use crate::operand::{Cond, Mem, Reg, Xmm};
use crate::target::{Endian, Isa, SimdMode, Target};

#[cfg(feature = "std")]
use std::vec::Vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use super::instruction::{
    encode_branch, encode_bx_lr, encode_dp_imm, encode_dp_reg, encode_ldst_imm, encode_ldst_reg, encode_movw_movt,
    encode_mul, encode_neon_quad, encode_vfp_single, encode_vldst, is_branch, neon, reg, rotated_imm, vfp, DpOp,
    Instruction, Register, AL,
};

type Out = Emitter<Instruction, Register>;

/// Quad scratch for memory sources; its S lanes are S28-S31
const QTMP: u8 = 7;

/// Shift types for data-processing register operands
const LSL: u32 = 0;
const LSR: u32 = 1;
const ASR: u32 = 2;

/// AArch32 backend: ARMv7-A with NEON (packed) and VFPv3 (scalar and
/// per-lane division).
///
/// The native word is 32 bits, so `zx` ops behave like `wx` ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arm {
    mode: SimdMode,
}

/// Instruction sequence that leaves `imm` in `rd`: MOV or MVN with a
/// rotated immediate, otherwise MOVW plus MOVT when the top half is set.
pub fn materialize(rd: Register, imm: i32) -> Vec<Instruction> {
    let value = imm as u32;
    let mut seq = Vec::with_capacity(2);
    if let Some(operand) = rotated_imm(value) {
        seq.push(encode_dp_imm(DpOp::Mov, rd, Register::new(0), operand));
    } else if let Some(operand) = rotated_imm(!value) {
        seq.push(encode_dp_imm(DpOp::Mvn, rd, Register::new(0), operand));
    } else {
        seq.push(encode_movw_movt(false, rd, value & 0xFFFF));
        if value >> 16 != 0 {
            seq.push(encode_movw_movt(true, rd, value >> 16));
        }
    }
    seq
}

/// Register-operand form of a two-operand integer op, `rd = rd <op> rm`
fn alu_reg(op: AluOp, rd: Register, rm: Register) -> Instruction {
    match op {
        AluOp::Add => encode_dp_reg(DpOp::Add, rd, rd, rm, LSL, 0),
        AluOp::Sub => encode_dp_reg(DpOp::Sub, rd, rd, rm, LSL, 0),
        AluOp::And => encode_dp_reg(DpOp::And, rd, rd, rm, LSL, 0),
        AluOp::Orr => encode_dp_reg(DpOp::Orr, rd, rd, rm, LSL, 0),
        AluOp::Xor => encode_dp_reg(DpOp::Eor, rd, rd, rm, LSL, 0),
        _ => encode_mul(rd, rd, rm),
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

impl Arm {
    pub fn new(mode: SimdMode) -> BuildResult<Self> {
        Isa::Arm.check_mode(mode)?;
        Ok(Self { mode })
    }

    fn mov_imm(&self, rd: Register, imm: i32, out: &mut Out) {
        for instr in materialize(rd, imm) {
            out.emit(instr);
        }
        out.def(rd);
    }

    /// Data-processing op with an immediate, trying `op` then its
    /// complement form (`alt` applied to `alt_value`), else going through R12.
    fn dp_imm(
        &self,
        op: DpOp,
        rd: Register,
        rn: Register,
        value: u32,
        alt: Option<(DpOp, u32)>,
        out: &mut Out,
    ) {
        if let Some(operand) = rotated_imm(value) {
            out.emit(encode_dp_imm(op, rd, rn, operand));
            return;
        }
        if let Some((alt_op, alt_value)) = alt {
            if let Some(operand) = rotated_imm(alt_value) {
                out.emit(encode_dp_imm(alt_op, rd, rn, operand));
                return;
            }
        }
        self.mov_imm(reg::R12, value as i32, out);
        out.emit(encode_dp_reg(op, rd, rn, reg::R12, LSL, 0));
    }

    /// Word load/store with a 12-bit offset, or `[Rn, R12]` beyond that
    fn access(&self, load: bool, rt: Register, mem: Mem, out: &mut Out) -> BuildResult<()> {
        let base = self.gpr(mem.base)?;
        out.uses(&[base]);
        if mem.disp.unsigned_abs() < 0x1000 {
            out.emit(encode_ldst_imm(load, rt, base, mem.disp));
        } else {
            self.mov_imm(reg::R12, mem.disp, out);
            out.emit(encode_ldst_reg(load, rt, base, reg::R12));
        }
        Ok(())
    }

    /// Base register and offset usable by VLDR/VSTR for `len` bytes at `mem`
    fn vfp_address(&self, mem: Mem, len: i32, out: &mut Out) -> BuildResult<(Register, i32)> {
        let base = self.gpr(mem.base)?;
        out.uses(&[base]);
        let disp = mem.disp;
        if disp % 4 == 0 && disp > -1024 && i64::from(disp) + i64::from(len) - 4 < 1024 {
            Ok((base, disp))
        } else {
            self.mov_imm(reg::R12, disp, out);
            out.emit(encode_dp_reg(DpOp::Add, reg::R12, reg::R12, base, LSL, 0));
            Ok((reg::R12, 0))
        }
    }

    /// Move a Q register to or from memory as two D registers
    fn quad_access(&self, load: bool, q: u8, mem: Mem, out: &mut Out) -> BuildResult<()> {
        let (base, disp) = self.vfp_address(mem, 16, out)?;
        out.emit(encode_vldst(load, false, 2 * q, base, disp));
        out.emit(encode_vldst(load, false, 2 * q + 1, base, disp + 8));
        Ok(())
    }

    fn alu(&self, op: AluOp, dst: Reg, src: Src, out: &mut Out) -> BuildResult<()> {
        let d = self.gpr(dst)?;

        match (op, src) {
            (AluOp::Mov, Src::Imm(imm)) => self.mov_imm(d, imm, out),
            (AluOp::Mov, Src::Reg(src)) => {
                let s = self.gpr(src)?;
                out.uses(&[s]);
                out.emit(encode_dp_reg(DpOp::Mov, d, Register::new(0), s, LSL, 0));
            }
            (AluOp::Mov, Src::Mem(mem)) => self.access(true, d, mem, out)?,
            (AluOp::Shl | AluOp::Shr | AluOp::Shn, Src::Imm(amount)) => {
                if amount >= 32 {
                    return Err(BuildError::InvalidImmediate(amount as i64));
                }
                // LSR/ASR #0 would mean #32
                let kind = match op {
                    AluOp::Shr if amount != 0 => LSR,
                    AluOp::Shn if amount != 0 => ASR,
                    _ => LSL,
                };
                out.uses(&[d]);
                out.emit(encode_dp_reg(DpOp::Mov, d, Register::new(0), d, kind, amount as u32));
            }
            (AluOp::Shl | AluOp::Shr | AluOp::Shn, _) => return Err(BuildError::InvalidOperands),
            (_, Src::Imm(imm)) => {
                out.uses(&[d]);
                let value = imm as u32;
                match op {
                    AluOp::Add => self.dp_imm(DpOp::Add, d, d, value, Some((DpOp::Sub, value.wrapping_neg())), out),
                    AluOp::Sub => self.dp_imm(DpOp::Sub, d, d, value, Some((DpOp::Add, value.wrapping_neg())), out),
                    AluOp::And => self.dp_imm(DpOp::And, d, d, value, Some((DpOp::Bic, !value)), out),
                    AluOp::Orr => self.dp_imm(DpOp::Orr, d, d, value, None, out),
                    AluOp::Xor => self.dp_imm(DpOp::Eor, d, d, value, None, out),
                    _ => {
                        self.mov_imm(reg::R12, imm, out);
                        out.emit(encode_mul(d, d, reg::R12));
                    }
                }
            }
            (_, Src::Reg(src)) => {
                let s = self.gpr(src)?;
                out.uses(&[d, s]);
                out.emit(alu_reg(op, d, s));
            }
            (_, Src::Mem(mem)) => {
                out.uses(&[d]);
                self.access(true, reg::R12, mem, out)?;
                out.def(reg::R12);
                out.emit(alu_reg(op, d, reg::R12));
            }
        }

        out.def(d);
        Ok(())
    }

    fn packed(&self, op: SimdOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let d = dst.index() as u8;
        let s = match src {
            VSrc::Reg(src) => src.index() as u8,
            VSrc::Mem(mem) if op == SimdOp::Mov => return self.quad_access(true, d, mem, out),
            VSrc::Mem(mem) => {
                self.quad_access(true, QTMP, mem, out)?;
                QTMP
            }
        };

        match op {
            SimdOp::Mov => out.emit(encode_neon_quad(neon::VORR, d, s, s)),
            SimdOp::Div => {
                // NEON has no divide: four VFP divisions on the S lanes
                for lane in 0..4 {
                    out.emit(encode_vfp_single(vfp::VDIV, 4 * d + lane, 4 * d + lane, 4 * s + lane));
                }
            }
            _ => {
                let base = match op {
                    SimdOp::Add => neon::VADD,
                    SimdOp::Sub => neon::VSUB,
                    SimdOp::Mul => neon::VMUL,
                    SimdOp::And => neon::VAND,
                    SimdOp::Orr => neon::VORR,
                    _ => neon::VEOR,
                };
                out.emit(encode_neon_quad(base, d, d, s));
            }
        }
        Ok(())
    }

    fn scalar(&self, op: ScalarOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let d = 4 * dst.index() as u8;
        match src {
            VSrc::Mem(mem) => {
                let (base, disp) = self.vfp_address(mem, 4, out)?;
                out.emit(encode_vldst(true, true, d, base, disp));
            }
            VSrc::Reg(src) => {
                let s = 4 * src.index() as u8;
                let instr = match op {
                    ScalarOp::Mov => encode_vfp_single(vfp::VMOV, d, 0, s),
                    ScalarOp::Add => encode_vfp_single(vfp::VADD, d, d, s),
                    ScalarOp::Sub => encode_vfp_single(vfp::VSUB, d, d, s),
                    ScalarOp::Mul => encode_vfp_single(vfp::VMUL, d, d, s),
                    ScalarOp::Div => encode_vfp_single(vfp::VDIV, d, d, s),
                };
                out.emit(instr);
            }
        }
        Ok(())
    }

    fn compare(&self, lhs: Reg, rhs: Src, out: &mut Out) -> BuildResult<()> {
        let l = self.gpr(lhs)?;
        out.uses(&[l]);
        match rhs {
            Src::Reg(rhs) => {
                let r = self.gpr(rhs)?;
                out.uses(&[r]);
                out.emit(encode_dp_reg(DpOp::Cmp, Register::new(0), l, r, LSL, 0));
            }
            Src::Imm(imm) => {
                let value = imm as u32;
                self.dp_imm(DpOp::Cmp, Register::new(0), l, value, Some((DpOp::Cmn, value.wrapping_neg())), out);
            }
            Src::Mem(_) => return Err(BuildError::InvalidOperands),
        }
        Ok(())
    }
}

impl Backend for Arm {
    type Instruction = Instruction;
    type Register = Register;

    fn target(&self) -> Target {
        Target { isa: Isa::Arm, mode: self.mode, endian: Endian::Little }
    }

    /// `Reax`..`Reg11` are R0-R10; `Reg12`..`Reg14` have no backing register
    fn gpr(&self, reg: Reg) -> BuildResult<Register> {
        match reg.index() {
            index @ 0..=10 => Ok(Register::new(index as u8)),
            index => Err(BuildError::InvalidRegister(index as u32)),
        }
    }

    fn simd_registers(&self) -> usize {
        QTMP as usize
    }

    fn encode(&self, op: &Op, out: &mut Out) -> BuildResult<()> {
        match *op {
            Op::Alu { op, dst, src, .. } => self.alu(op, dst, src, out),
            Op::Store { src, dst, .. } => {
                let s = self.gpr(src)?;
                out.uses(&[s]);
                self.access(false, s, dst, out)
            }
            Op::Packed { op, dst, src } => self.packed(op, dst, src, out),
            Op::PackedStore { src, dst } => self.quad_access(false, src.index() as u8, dst, out),
            Op::Scalar { op, dst, src } => self.scalar(op, dst, src, out),
            Op::ScalarStore { src, dst } => {
                let (base, disp) = self.vfp_address(dst, 4, out)?;
                out.emit(encode_vldst(false, true, 4 * src.index() as u8, base, disp));
                Ok(())
            }
            Op::Jump { target } => {
                out.emit_branch(encode_branch(AL, 0), target);
                Ok(())
            }
            Op::CmpJump { cond, lhs, rhs, target, .. } => {
                self.compare(lhs, rhs, out)?;
                out.emit_branch(encode_branch(condition_code(cond), 0), target);
                Ok(())
            }
            Op::Ret => {
                out.emit(encode_bx_lr());
                Ok(())
            }
        }
    }

    fn relocate(&self, instr: Instruction, at: usize, dest: usize) -> BuildResult<Instruction> {
        if !is_branch(instr) {
            return Err(BuildError::UnsupportedInstruction);
        }
        let imm24 = branch_offset(at as i64 + 8, dest, 4, 24)?;
        Ok(encode_branch(instr.value() >> 28, imm24 as i32))
    }
}
