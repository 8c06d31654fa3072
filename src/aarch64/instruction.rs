/// AArch64 instruction formats and encoding
use core::fmt;
use crate::common::{
    Instruction as InstructionTrait,
    Register as RegisterTrait,
};

#[cfg(feature = "std")]
use std::vec::Vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// AArch64 general-purpose register (X0-X30, 31 = SP/XZR)
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
        (self.0 & 0x1F) as u32
    }
}

impl RegisterTrait for Register {
    fn id(&self) -> u32 {
        self.0 as u32
    }

    fn abi_class(&self) -> crate::common::AbiClass {
        use crate::common::AbiClass;

        // AAPCS64
        match self.0 {
            0..=18 => AbiClass::CallerSaved,
            19..=28 => AbiClass::CalleeSaved,
            _ => AbiClass::Special, // FP, LR, SP/XZR
        }
    }
}

/// AArch64 instruction (32-bit fixed width, always little-endian)
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

/// ADD/SUB (shifted register, LSL #0)
pub fn encode_add_sub_reg(sf: bool, sub: bool, set_flags: bool, rm: Register, rn: Register, rd: Register) -> Instruction {
    Instruction::new(
        (sf as u32) << 31
            | (sub as u32) << 30
            | (set_flags as u32) << 29
            | 0b01011 << 24
            | rm.field() << 16
            | rn.field() << 5
            | rd.field(),
    )
}

/// ADD/SUB (immediate), `imm12` optionally shifted left by 12
pub fn encode_add_sub_imm(sf: bool, sub: bool, set_flags: bool, lsl12: bool, imm12: u32, rn: Register, rd: Register) -> Instruction {
    Instruction::new(
        (sf as u32) << 31
            | (sub as u32) << 30
            | (set_flags as u32) << 29
            | 0b10001 << 24
            | (lsl12 as u32) << 22
            | (imm12 & 0xFFF) << 10
            | rn.field() << 5
            | rd.field(),
    )
}

/// Logical (shifted register): `opc` 00 = AND, 01 = ORR, 10 = EOR
pub fn encode_logical_reg(sf: bool, opc: u32, rm: Register, rn: Register, rd: Register) -> Instruction {
    Instruction::new((sf as u32) << 31 | (opc & 3) << 29 | 0b01010 << 24 | rm.field() << 16 | rn.field() << 5 | rd.field())
}

/// MOV Rd, Rm (ORR Rd, ZR, Rm)
pub fn encode_move_reg(sf: bool, rm: Register, rd: Register) -> Instruction {
    encode_logical_reg(sf, 0b01, rm, reg::XZR, rd)
}

/// Move-wide opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveWide {
    /// MOVN: `~(imm16 << shift)`
    N = 0b00,
    /// MOVZ: `imm16 << shift`
    Z = 0b10,
    /// MOVK: insert `imm16` at `shift`, keep the other bits
    K = 0b11,
}

pub fn encode_move_wide(sf: bool, opc: MoveWide, hw: u32, imm16: u32, rd: Register) -> Instruction {
    Instruction::new(
        (sf as u32) << 31 | (opc as u32) << 29 | 0b100101 << 23 | (hw & 3) << 21 | (imm16 & 0xFFFF) << 5 | rd.field(),
    )
}

/// MUL Rd, Rn, Rm (MADD with Ra = ZR)
pub fn encode_multiply(sf: bool, rm: Register, rn: Register, rd: Register) -> Instruction {
    Instruction::new((sf as u32) << 31 | 0b11011 << 24 | rm.field() << 16 | 31 << 10 | rn.field() << 5 | rd.field())
}

/// Bitfield move: `opc` 00 = SBFM, 10 = UBFM
pub fn encode_bitfield(sf: bool, opc: u32, immr: u32, imms: u32, rn: Register, rd: Register) -> Instruction {
    Instruction::new(
        (sf as u32) << 31
            | (opc & 3) << 29
            | 0b100110 << 23
            | (sf as u32) << 22
            | (immr & 0x3F) << 16
            | (imms & 0x3F) << 10
            | rn.field() << 5
            | rd.field(),
    )
}

/// Shape of a load/store: access size, register file and opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub size: u32,
    pub vector: bool,
    pub load_opc: u32,
    pub store_opc: u32,
    /// Bytes moved, also the unsigned-offset scale
    pub bytes: i32,
}

impl Access {
    /// 64-bit GPR
    pub const X: Access = Access { size: 0b11, vector: false, load_opc: 0b01, store_opc: 0b00, bytes: 8 };
    /// 32-bit GPR
    pub const W: Access = Access { size: 0b10, vector: false, load_opc: 0b01, store_opc: 0b00, bytes: 4 };
    /// 128-bit SIMD&FP
    pub const Q: Access = Access { size: 0b00, vector: true, load_opc: 0b11, store_opc: 0b10, bytes: 16 };
    /// 32-bit SIMD&FP
    pub const S: Access = Access { size: 0b10, vector: true, load_opc: 0b01, store_opc: 0b00, bytes: 4 };

    fn head(self, load: bool) -> u32 {
        let opc = if load { self.load_opc } else { self.store_opc };
        self.size << 30 | 0b111 << 27 | (self.vector as u32) << 26 | opc << 22
    }
}

/// LDR/STR (unsigned offset); `imm12` is already divided by the access size
pub fn encode_ldst_uimm(access: Access, load: bool, imm12: u32, rn: Register, rt: u8) -> Instruction {
    Instruction::new(access.head(load) | 0b01 << 24 | (imm12 & 0xFFF) << 10 | rn.field() << 5 | (rt & 0x1F) as u32)
}

/// LDUR/STUR (unscaled signed 9-bit offset)
pub fn encode_ldst_unscaled(access: Access, load: bool, imm9: i32, rn: Register, rt: u8) -> Instruction {
    Instruction::new(access.head(load) | ((imm9 as u32) & 0x1FF) << 12 | rn.field() << 5 | (rt & 0x1F) as u32)
}

/// LDR/STR (register offset, `[Xn, Xm]`)
pub fn encode_ldst_reg(access: Access, load: bool, rm: Register, rn: Register, rt: u8) -> Instruction {
    Instruction::new(
        access.head(load) | 1 << 21 | rm.field() << 16 | 0b011 << 13 | 0b10 << 10 | rn.field() << 5 | (rt & 0x1F) as u32,
    )
}

/// Advanced SIMD three-same opcodes (`.4s` / `.16b`)
pub mod simd {
    pub const FADD: u32 = 0x4E20_D400;
    pub const FSUB: u32 = 0x4EA0_D400;
    pub const FMUL: u32 = 0x6E20_DC00;
    pub const FDIV: u32 = 0x6E20_FC00;
    pub const AND: u32 = 0x4E20_1C00;
    pub const ORR: u32 = 0x4EA0_1C00;
    pub const EOR: u32 = 0x6E20_1C00;
}

/// Scalar single-precision opcodes
pub mod fp {
    pub const FADD: u32 = 0x1E20_2800;
    pub const FSUB: u32 = 0x1E20_3800;
    pub const FMUL: u32 = 0x1E20_0800;
    pub const FDIV: u32 = 0x1E20_1800;
    pub const FMOV: u32 = 0x1E20_4000;
}

/// Three-register SIMD&FP form: `base | Vm << 16 | Vn << 5 | Vd`
pub fn encode_vector_3reg(base: u32, vm: u8, vn: u8, vd: u8) -> Instruction {
    Instruction::new(base | ((vm & 0x1F) as u32) << 16 | ((vn & 0x1F) as u32) << 5 | (vd & 0x1F) as u32)
}

/// B.cond with a word offset
pub fn encode_b_cond(cond: u32, imm19: i32) -> Instruction {
    Instruction::new(0x5400_0000 | ((imm19 as u32) & 0x7FFFF) << 5 | (cond & 0xF))
}

/// B with a word offset
pub fn encode_b(imm26: i32) -> Instruction {
    Instruction::new(0x1400_0000 | ((imm26 as u32) & 0x03FF_FFFF))
}

/// RET (X30)
pub fn encode_ret() -> Instruction {
    Instruction::new(0xD65F_0000 | reg::LR.field() << 5)
}

pub fn is_b(instr: Instruction) -> bool {
    instr.0 & 0xFC00_0000 == 0x1400_0000
}

pub fn is_b_cond(instr: Instruction) -> bool {
    instr.0 & 0xFF00_0010 == 0x5400_0000
}

/// Common registers
pub mod reg {
    use super::Register;

    pub const X0: Register = Register::new(0);
    pub const X1: Register = Register::new(1);
    pub const X2: Register = Register::new(2);
    pub const X3: Register = Register::new(3);
    pub const X4: Register = Register::new(4);
    pub const X5: Register = Register::new(5);
    pub const X6: Register = Register::new(6);
    pub const X7: Register = Register::new(7);
    pub const X8: Register = Register::new(8);
    pub const X9: Register = Register::new(9);
    pub const X10: Register = Register::new(10);
    pub const X11: Register = Register::new(11);
    pub const X12: Register = Register::new(12);
    pub const X13: Register = Register::new(13);
    /// IP0: value scratch
    pub const X16: Register = Register::new(16);
    /// IP1: address scratch
    pub const X17: Register = Register::new(17);

    pub const SP: Register = Register::new(31);
    pub const XZR: Register = Register::new(31);

    pub const FP: Register = Register::new(29);
    pub const LR: Register = Register::new(30);
}
