use crate::backend::{branch_offset, Backend};
use crate::common::{BuildError, BuildResult, Instruction as _};
use crate::emit::Emitter;
use crate::op::{AluOp, Op, ScalarOp, SimdOp, Src, VSrc};
use crate::operand::{Cond, Mem, Reg, Size, Xmm};
use crate::target::{Endian, Isa, SimdMode, Target};

use super::instruction::{
    encode_evex, encode_jcc, encode_jmp, encode_legacy, encode_mov_r32_imm, encode_ret, encode_vex, pp, rex,
    Instruction, Register, Rm,
};

type Out = Emitter<Instruction, Register>;

/// Portable register -> native register number
const GPR_MAP: [u8; 14] = [0, 1, 2, 3, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];

/// x86-64 backend: SSE for 128X1, AVX for 256X1, AVX-512F for 512X1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X86_64 {
    mode: SimdMode,
}

impl X86_64 {
    pub fn new(mode: SimdMode) -> BuildResult<Self> {
        Isa::X86_64.check_mode(mode)?;
        Ok(Self { mode })
    }

    pub fn mode(&self) -> SimdMode {
        self.mode
    }

    fn mem(&self, mem: Mem, out: &mut Out) -> BuildResult<Rm> {
        let base = self.gpr(mem.base)?;
        out.uses(&[base]);
        Ok(Rm::Mem { base: base.value(), disp: mem.disp })
    }

    fn alu(&self, op: AluOp, size: Size, dst: Reg, src: Src, out: &mut Out) -> BuildResult<()> {
        let w = size.is_64();
        let d = self.gpr(dst)?;
        let rd = d.value();

        let instr = match (op, src) {
            (AluOp::Mov, Src::Imm(imm)) if w => encode_legacy(None, true, &[0xC7], 0, Rm::Reg(rd), &imm.to_le_bytes()),
            (AluOp::Mov, Src::Imm(imm)) => encode_mov_r32_imm(rd, imm),
            (AluOp::Mov, Src::Reg(src)) => {
                let s = self.gpr(src)?;
                out.uses(&[s]);
                encode_legacy(None, w, &[0x89], s.value(), Rm::Reg(rd), &[])
            }
            (AluOp::Mov, Src::Mem(mem)) => {
                let rm = self.mem(mem, out)?;
                encode_legacy(None, w, &[0x8B], rd, rm, &[])
            }

            (AluOp::Mul, Src::Imm(imm)) => {
                out.uses(&[d]);
                match i8::try_from(imm) {
                    Ok(imm8) => encode_legacy(None, w, &[0x6B], rd, Rm::Reg(rd), &[imm8 as u8]),
                    Err(_) => encode_legacy(None, w, &[0x69], rd, Rm::Reg(rd), &imm.to_le_bytes()),
                }
            }
            (AluOp::Mul, Src::Reg(src)) => {
                let s = self.gpr(src)?;
                out.uses(&[d, s]);
                encode_legacy(None, w, &[0x0F, 0xAF], rd, Rm::Reg(s.value()), &[])
            }
            (AluOp::Mul, Src::Mem(mem)) => {
                out.uses(&[d]);
                let rm = self.mem(mem, out)?;
                encode_legacy(None, w, &[0x0F, 0xAF], rd, rm, &[])
            }

            (AluOp::Shl | AluOp::Shr | AluOp::Shn, Src::Imm(amount)) => {
                let digit = match op {
                    AluOp::Shl => 4,
                    AluOp::Shr => 5,
                    _ => 7,
                };
                out.uses(&[d]);
                encode_legacy(None, w, &[0xC1], digit, Rm::Reg(rd), &[amount as u8])
            }
            (AluOp::Shl | AluOp::Shr | AluOp::Shn, _) => return Err(BuildError::InvalidOperands),

            (_, Src::Imm(imm)) => {
                let (_, _, digit) = alu_opcodes(op);
                out.uses(&[d]);
                alu_imm(w, digit, rd, imm)
            }
            (_, Src::Reg(src)) => {
                let (opcode, _, _) = alu_opcodes(op);
                let s = self.gpr(src)?;
                out.uses(&[d, s]);
                encode_legacy(None, w, &[opcode], s.value(), Rm::Reg(rd), &[])
            }
            (_, Src::Mem(mem)) => {
                let (_, opcode, _) = alu_opcodes(op);
                out.uses(&[d]);
                let rm = self.mem(mem, out)?;
                encode_legacy(None, w, &[opcode], rd, rm, &[])
            }
        };

        out.def(d);
        out.emit(instr);
        Ok(())
    }

    fn packed(&self, op: SimdOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let reg = dst.index() as u8;
        let rm = match src {
            VSrc::Reg(src) => Rm::Reg(src.index() as u8),
            VSrc::Mem(mem) => self.mem(mem, out)?,
        };
        let mov_opcode = if matches!(src, VSrc::Reg(_)) { 0x28 } else { 0x10 };

        let instr = match self.mode {
            SimdMode::X128X1 => {
                let opcode = match op {
                    SimdOp::Mov => mov_opcode,
                    _ => packed_opcode(op),
                };
                encode_legacy(None, false, &[0x0F, opcode], reg, rm, &[])
            }
            SimdMode::X256X1 => match op {
                SimdOp::Mov => encode_vex(true, pp::NONE, mov_opcode, reg, 0, rm),
                _ => encode_vex(true, pp::NONE, packed_opcode(op), reg, reg, rm),
            },
            _ => match op {
                SimdOp::Mov => encode_evex(pp::NONE, false, mov_opcode, reg, 0, rm),
                // vpandd / vpord / vpxord: AVX-512F has no vandps
                SimdOp::And => encode_evex(pp::P66, false, 0xDB, reg, reg, rm),
                SimdOp::Orr => encode_evex(pp::P66, false, 0xEB, reg, reg, rm),
                SimdOp::Xor => encode_evex(pp::P66, false, 0xEF, reg, reg, rm),
                _ => encode_evex(pp::NONE, false, packed_opcode(op), reg, reg, rm),
            },
        };
        out.emit(instr);
        Ok(())
    }

    fn packed_store(&self, src: Xmm, dst: Mem, out: &mut Out) -> BuildResult<()> {
        let reg = src.index() as u8;
        let rm = self.mem(dst, out)?;
        let instr = match self.mode {
            SimdMode::X128X1 => encode_legacy(None, false, &[0x0F, 0x11], reg, rm, &[]),
            SimdMode::X256X1 => encode_vex(true, pp::NONE, 0x11, reg, 0, rm),
            _ => encode_evex(pp::NONE, false, 0x11, reg, 0, rm),
        };
        out.emit(instr);
        Ok(())
    }

    fn scalar(&self, op: ScalarOp, dst: Xmm, src: VSrc, out: &mut Out) -> BuildResult<()> {
        let opcode = match op {
            ScalarOp::Mov => 0x10,
            ScalarOp::Add => 0x58,
            ScalarOp::Sub => 0x5C,
            ScalarOp::Mul => 0x59,
            ScalarOp::Div => 0x5E,
        };
        let rm = match src {
            VSrc::Reg(src) => Rm::Reg(src.index() as u8),
            VSrc::Mem(mem) => self.mem(mem, out)?,
        };
        out.emit(encode_legacy(Some(0xF3), false, &[0x0F, opcode], dst.index() as u8, rm, &[]));
        Ok(())
    }

    fn compare(&self, size: Size, lhs: Reg, rhs: Src, out: &mut Out) -> BuildResult<()> {
        let w = size.is_64();
        let l = self.gpr(lhs)?;
        let instr = match rhs {
            Src::Reg(rhs) => {
                let r = self.gpr(rhs)?;
                out.uses(&[l, r]);
                encode_legacy(None, w, &[0x39], r.value(), Rm::Reg(l.value()), &[])
            }
            Src::Imm(imm) => {
                out.uses(&[l]);
                alu_imm(w, 7, l.value(), imm)
            }
            Src::Mem(_) => return Err(BuildError::InvalidOperands),
        };
        out.emit(instr);
        Ok(())
    }
}

/// (reg-to-reg opcode, load opcode, `83`/`81` digit)
fn alu_opcodes(op: AluOp) -> (u8, u8, u8) {
    match op {
        AluOp::Add => (0x01, 0x03, 0),
        AluOp::Orr => (0x09, 0x0B, 1),
        AluOp::And => (0x21, 0x23, 4),
        AluOp::Sub => (0x29, 0x2B, 5),
        _ => (0x31, 0x33, 6),
    }
}

/// Group-1 immediate form, `ib` when the value fits a byte
fn alu_imm(w: bool, digit: u8, rm: u8, imm: i32) -> Instruction {
    match i8::try_from(imm) {
        Ok(imm8) => encode_legacy(None, w, &[0x83], digit, Rm::Reg(rm), &[imm8 as u8]),
        // accumulator short form, `05`/`0D`/`25`/`2D`/`35`/`3D id`
        Err(_) if rm == 0 => {
            let [b0, b1, b2, b3] = imm.to_le_bytes();
            let bytes = [rex(true, false, false, false), digit << 3 | 0x05, b0, b1, b2, b3];
            Instruction::new(if w { &bytes[..] } else { &bytes[1..] })
        }
        Err(_) => encode_legacy(None, w, &[0x81], digit, Rm::Reg(rm), &imm.to_le_bytes()),
    }
}

/// `0F xx` opcode of a packed single arithmetic or logic op
fn packed_opcode(op: SimdOp) -> u8 {
    match op {
        SimdOp::Mov => 0x28,
        SimdOp::Add => 0x58,
        SimdOp::Sub => 0x5C,
        SimdOp::Mul => 0x59,
        SimdOp::Div => 0x5E,
        SimdOp::And => 0x54,
        SimdOp::Orr => 0x56,
        SimdOp::Xor => 0x57,
    }
}

fn condition_code(cond: Cond) -> u8 {
    match cond {
        Cond::Eq => 0x4,
        Cond::Ne => 0x5,
        Cond::Ltu => 0x2,
        Cond::Leu => 0x6,
        Cond::Gtu => 0x7,
        Cond::Geu => 0x3,
        Cond::Lt => 0xC,
        Cond::Le => 0xE,
        Cond::Gt => 0xF,
        Cond::Ge => 0xD,
    }
}

impl Backend for X86_64 {
    type Instruction = Instruction;
    type Register = Register;

    fn target(&self) -> Target {
        Target { isa: Isa::X86_64, mode: self.mode, endian: Endian::Little }
    }

    fn gpr(&self, reg: Reg) -> BuildResult<Register> {
        Ok(Register::new(GPR_MAP[reg.index()]))
    }

    fn simd_registers(&self) -> usize {
        16
    }

    fn encode(&self, op: &Op, out: &mut Out) -> BuildResult<()> {
        match *op {
            Op::Alu { op, size, dst, src } => self.alu(op, size, dst, src, out),
            Op::Store { size, src, dst } => {
                let s = self.gpr(src)?;
                out.uses(&[s]);
                let rm = self.mem(dst, out)?;
                out.emit(encode_legacy(None, size.is_64(), &[0x89], s.value(), rm, &[]));
                Ok(())
            }
            Op::Packed { op, dst, src } => self.packed(op, dst, src, out),
            Op::PackedStore { src, dst } => self.packed_store(src, dst, out),
            Op::Scalar { op, dst, src } => self.scalar(op, dst, src, out),
            Op::ScalarStore { src, dst } => {
                let rm = self.mem(dst, out)?;
                out.emit(encode_legacy(Some(0xF3), false, &[0x0F, 0x11], src.index() as u8, rm, &[]));
                Ok(())
            }
            Op::Jump { target } => {
                out.emit_branch(encode_jmp(), target);
                Ok(())
            }
            Op::CmpJump { size, cond, lhs, rhs, target } => {
                self.compare(size, lhs, rhs, out)?;
                out.emit_branch(encode_jcc(condition_code(cond)), target);
                Ok(())
            }
            Op::Ret => {
                out.emit(encode_ret());
                Ok(())
            }
        }
    }

    fn relocate(&self, instr: Instruction, at: usize, dest: usize) -> BuildResult<Instruction> {
        let rel = branch_offset((at + instr.size()) as i64, dest, 1, 32)?;
        Ok(instr.with_rel32(rel as i32))
    }
}
