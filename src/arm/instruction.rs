/// AArch32 (ARM state) instruction formats and encoding
use core::fmt;
use crate::common::{
    AbiClass,
    Instruction as InstructionTrait,
    Register as RegisterTrait,
};

#[cfg(feature = "std")]
use std::vec::Vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Condition field value for "always"
pub const AL: u32 = 0xE;

/// ARM core register (R0-R15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(pub u8);

impl Register {
    pub const fn new(reg: u8) -> Self {
        Self(reg)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    fn field(self) -> u32 {
        (self.0 & 0xF) as u32
    }
}

impl RegisterTrait for Register {
    fn id(&self) -> u32 {
        self.0 as u32
    }

    fn abi_class(&self) -> AbiClass {
        // AAPCS
        match self.0 {
            0..=3 | 12 => AbiClass::CallerSaved,
            4..=11 => AbiClass::CalleeSaved,
            _ => AbiClass::Special, // SP, LR, PC
        }
    }
}

/// ARM instruction (32-bit, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction(pub u32);

impl Instruction {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl InstructionTrait for Instruction {
    fn value(&self) -> u64 {
        self.0 as u64
    }

    fn bytes(&self) -> Vec<u8> {
        self.0.to_le_bytes().to_vec()
    }

    fn size(&self) -> usize {
        4
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Encode `value` as an 8-bit immediate rotated right by an even amount.
///
/// Returns the 12-bit operand field (`rotate << 8 | imm8`).
pub fn rotated_imm(value: u32) -> Option<u32> {
    (0..16).find_map(|rot| {
        let imm8 = value.rotate_left(2 * rot);
        (imm8 <= 0xFF).then_some(rot << 8 | imm8)
    })
}

/// Value of a 12-bit rotated immediate field
pub fn rotated_value(field: u32) -> u32 {
    (field & 0xFF).rotate_right(2 * ((field >> 8) & 0xF))
}

/// Data-processing opcodes (bits 24:21)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpOp {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Add = 0x4,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl DpOp {
    fn sets_flags(self) -> bool {
        matches!(self, DpOp::Cmp | DpOp::Cmn)
    }
}

/// Data processing, register operand shifted by an immediate
pub fn encode_dp_reg(op: DpOp, rd: Register, rn: Register, rm: Register, shift_type: u32, amount: u32) -> Instruction {
    Instruction::new(
        AL << 28
            | (op as u32) << 21
            | (op.sets_flags() as u32) << 20
            | rn.field() << 16
            | rd.field() << 12
            | (amount & 0x1F) << 7
            | (shift_type & 3) << 5
            | rm.field(),
    )
}

/// Data processing with a rotated immediate (`operand` from `rotated_imm`)
pub fn encode_dp_imm(op: DpOp, rd: Register, rn: Register, operand: u32) -> Instruction {
    Instruction::new(
        AL << 28
            | 1 << 25
            | (op as u32) << 21
            | (op.sets_flags() as u32) << 20
            | rn.field() << 16
            | rd.field() << 12
            | (operand & 0xFFF),
    )
}

/// MOVW (`top` = false) or MOVT (`top` = true) with a 16-bit immediate
pub fn encode_movw_movt(top: bool, rd: Register, imm16: u32) -> Instruction {
    Instruction::new(
        0xE300_0000 | (top as u32) << 22 | ((imm16 >> 12) & 0xF) << 16 | rd.field() << 12 | (imm16 & 0xFFF),
    )
}

/// MUL Rd, Rn, Rm
pub fn encode_mul(rd: Register, rn: Register, rm: Register) -> Instruction {
    Instruction::new(0xE000_0090 | rd.field() << 16 | rm.field() << 8 | rn.field())
}

/// LDR/STR word with a 12-bit offset
pub fn encode_ldst_imm(load: bool, rt: Register, rn: Register, offset: i32) -> Instruction {
    let up = offset >= 0;
    Instruction::new(
        0xE500_0000
            | (up as u32) << 23
            | (load as u32) << 20
            | rn.field() << 16
            | rt.field() << 12
            | offset.unsigned_abs() & 0xFFF,
    )
}

/// LDR/STR word, `[Rn, Rm]`
pub fn encode_ldst_reg(load: bool, rt: Register, rn: Register, rm: Register) -> Instruction {
    Instruction::new(0xE780_0000 | (load as u32) << 20 | rn.field() << 16 | rt.field() << 12 | rm.field())
}

/// NEON three-register quad opcodes (`.f32` / bitwise)
pub mod neon {
    pub const VADD: u32 = 0xF200_0D40;
    pub const VSUB: u32 = 0xF220_0D40;
    pub const VMUL: u32 = 0xF300_0D50;
    pub const VAND: u32 = 0xF200_0150;
    pub const VORR: u32 = 0xF220_0150;
    pub const VEOR: u32 = 0xF300_0150;
}

/// `base` with Q registers in the Vd/Vn/Vm fields
pub fn encode_neon_quad(base: u32, qd: u8, qn: u8, qm: u8) -> Instruction {
    let (d, n, m) = (2 * qd as u32, 2 * qn as u32, 2 * qm as u32);
    Instruction::new(
        base | (d >> 4) << 22 | (n & 0xF) << 16 | (d & 0xF) << 12 | (n >> 4) << 7 | (m >> 4) << 5 | (m & 0xF),
    )
}

/// VFP single-precision opcodes
pub mod vfp {
    pub const VADD: u32 = 0xEE30_0A00;
    pub const VSUB: u32 = 0xEE30_0A40;
    pub const VMUL: u32 = 0xEE20_0A00;
    pub const VDIV: u32 = 0xEE80_0A00;
    pub const VMOV: u32 = 0xEEB0_0A40;
}

/// `base` with S registers in the Vd/Vn/Vm fields
pub fn encode_vfp_single(base: u32, sd: u8, sn: u8, sm: u8) -> Instruction {
    let (d, n, m) = (sd as u32, sn as u32, sm as u32);
    Instruction::new(
        base | (d & 1) << 22 | (n >> 1) << 16 | (d >> 1) << 12 | (n & 1) << 7 | (m & 1) << 5 | (m >> 1),
    )
}

/// VLDR/VSTR of a D register (`single` = false) or an S register
/// (`single` = true). The offset must be a multiple of 4 within +/-1020.
pub fn encode_vldst(load: bool, single: bool, vd: u8, rn: Register, offset: i32) -> Instruction {
    let up = offset >= 0;
    let vd = vd as u32;
    let (field, d_bit) = if single { (vd >> 1, vd & 1) } else { (vd & 0xF, vd >> 4) };
    Instruction::new(
        0xED00_0A00
            | (up as u32) << 23
            | d_bit << 22
            | (load as u32) << 20
            | rn.field() << 16
            | field << 12
            | (!single as u32) << 8
            | (offset.unsigned_abs() / 4) & 0xFF,
    )
}

/// B<cond> with a word offset relative to PC+8
pub fn encode_branch(cond: u32, imm24: i32) -> Instruction {
    Instruction::new((cond & 0xF) << 28 | 0x0A00_0000 | (imm24 as u32) & 0x00FF_FFFF)
}

pub fn is_branch(instr: Instruction) -> bool {
    instr.0 & 0x0F00_0000 == 0x0A00_0000
}

/// BX LR
pub fn encode_bx_lr() -> Instruction {
    Instruction::new(0xE12F_FF1E)
}

/// Common registers
pub mod reg {
    use super::Register;

    pub const R0: Register = Register::new(0);
    pub const R1: Register = Register::new(1);
    pub const R2: Register = Register::new(2);
    pub const R3: Register = Register::new(3);
    pub const R4: Register = Register::new(4);
    pub const R10: Register = Register::new(10);
    /// IP: scratch for immediates and addresses
    pub const R12: Register = Register::new(12);
    pub const SP: Register = Register::new(13);
    pub const LR: Register = Register::new(14);
    pub const PC: Register = Register::new(15);
}
