/// 64-bit POWER instruction formats and encoding
use core::fmt;
use crate::common::{
    AbiClass,
    Instruction as InstructionTrait,
    Register as RegisterTrait,
};
use crate::target::Endian;

#[cfg(feature = "std")]
use std::vec::Vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// POWER general-purpose register (r0-r31)
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

    fn abi_class(&self) -> AbiClass {
        // ELFv2
        match self.0 {
            0 | 3..=12 => AbiClass::CallerSaved,
            14..=31 => AbiClass::CalleeSaved,
            _ => AbiClass::Special, // r1 (sp), r2 (toc), r13 (thread pointer)
        }
    }
}

/// POWER instruction: a 32-bit word plus the byte order it is emitted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    word: u32,
    endian: Endian,
}

impl Instruction {
    pub fn new(word: u32, endian: Endian) -> Self {
        Self { word, endian }
    }

    pub fn value(self) -> u32 {
        self.word
    }

    pub fn endian(self) -> Endian {
        self.endian
    }
}

impl InstructionTrait for Instruction {
    fn value(&self) -> u64 {
        self.word as u64
    }

    fn bytes(&self) -> Vec<u8> {
        self.endian.word_bytes(self.word).to_vec()
    }

    fn size(&self) -> usize {
        4
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.word)
    }
}

/// Primary opcodes of D-form and DS-form instructions
pub mod opcode {
    pub const MULLI: u32 = 7;
    pub const CMPLI: u32 = 10;
    pub const CMPI: u32 = 11;
    pub const ADDI: u32 = 14;
    pub const ADDIS: u32 = 15;
    pub const ORI: u32 = 24;
    pub const XORI: u32 = 26;
    /// `andi.` (always records CR0)
    pub const ANDI: u32 = 28;
    pub const LWZ: u32 = 32;
    pub const STW: u32 = 36;
    pub const LFS: u32 = 48;
    pub const STFS: u32 = 52;
    /// `ld` (DS-form, xo 0)
    pub const LD: u32 = 58;
    /// `std` (DS-form, xo 0)
    pub const STD: u32 = 62;
}

/// Extended opcodes under primary opcode 31
pub mod xo {
    pub const CMP: u32 = 0;
    pub const LDX: u32 = 21;
    pub const LWZX: u32 = 23;
    pub const AND: u32 = 28;
    pub const CMPL: u32 = 32;
    pub const SUBF: u32 = 40;
    pub const STDX: u32 = 149;
    pub const STWX: u32 = 151;
    pub const MULLD: u32 = 233;
    pub const MULLW: u32 = 235;
    pub const ADD: u32 = 266;
    pub const XOR: u32 = 316;
    pub const OR: u32 = 444;
    pub const LFSX: u32 = 535;
    pub const STFSX: u32 = 663;
    pub const LXVW4X: u32 = 780;
    pub const SRAWI: u32 = 824;
    pub const STXVW4X: u32 = 908;
}

/// D-form: `op << 26 | rt << 21 | ra << 16 | imm16`
pub fn encode_d(endian: Endian, op: u32, rt: u8, ra: Register, imm16: u32) -> Instruction {
    Instruction::new(op << 26 | ((rt & 0x1F) as u32) << 21 | ra.field() << 16 | (imm16 & 0xFFFF), endian)
}

/// DS-form load/store: the displacement must be a multiple of 4
pub fn encode_ds(endian: Endian, op: u32, rt: Register, ra: Register, disp: i32) -> Instruction {
    Instruction::new(op << 26 | rt.field() << 21 | ra.field() << 16 | (disp as u32) & 0xFFFC, endian)
}

/// X-form under opcode 31: `rt << 21 | ra << 16 | rb << 11 | xo << 1`
pub fn encode_x(endian: Endian, xo: u32, rt: u8, ra: Register, rb: Register) -> Instruction {
    Instruction::new(31 << 26 | ((rt & 0x1F) as u32) << 21 | ra.field() << 16 | rb.field() << 11 | xo << 1, endian)
}

/// `rlwinm ra, rs, sh, mb, me`
pub fn encode_rlwinm(endian: Endian, ra: Register, rs: Register, sh: u32, mb: u32, me: u32) -> Instruction {
    Instruction::new(
        21 << 26 | rs.field() << 21 | ra.field() << 16 | (sh & 0x1F) << 11 | (mb & 0x1F) << 6 | (me & 0x1F) << 1,
        endian,
    )
}

/// MD-form rotate: `rldicl` when `left_clear`, else `rldicr`
pub fn encode_rldic(endian: Endian, left_clear: bool, ra: Register, rs: Register, sh: u32, mask: u32) -> Instruction {
    let xo = if left_clear { 0 } else { 1 };
    // 6-bit fields are stored split: low five bits first, then bit 5
    let mask_field = (mask & 0x1F) << 1 | (mask >> 5) & 1;
    Instruction::new(
        30 << 26
            | rs.field() << 21
            | ra.field() << 16
            | (sh & 0x1F) << 11
            | mask_field << 5
            | xo << 2
            | (sh >> 5 & 1) << 1,
        endian,
    )
}

/// `sradi ra, rs, sh`
pub fn encode_sradi(endian: Endian, ra: Register, rs: Register, sh: u32) -> Instruction {
    Instruction::new(
        31 << 26 | rs.field() << 21 | ra.field() << 16 | (sh & 0x1F) << 11 | 413 << 2 | (sh >> 5 & 1) << 1,
        endian,
    )
}

/// VSX XX3-form extended opcodes (primary opcode 60)
pub mod vsx {
    pub const XVADDSP: u32 = 64;
    pub const XVSUBSP: u32 = 72;
    pub const XVMULSP: u32 = 80;
    pub const XVDIVSP: u32 = 88;
    pub const XXLAND: u32 = 130;
    pub const XXLOR: u32 = 146;
    pub const XXLXOR: u32 = 154;
}

/// XX3-form on vs0-vs31
pub fn encode_xx3(endian: Endian, xo: u32, xt: u8, xa: u8, xb: u8) -> Instruction {
    Instruction::new(
        60 << 26 | ((xt & 0x1F) as u32) << 21 | ((xa & 0x1F) as u32) << 16 | ((xb & 0x1F) as u32) << 11 | xo << 3,
        endian,
    )
}

/// Single-precision A-form extended opcodes (primary opcode 59)
pub mod fp {
    pub const FDIVS: u32 = 18;
    pub const FSUBS: u32 = 20;
    pub const FADDS: u32 = 21;
    pub const FMULS: u32 = 25;
}

/// `frt = fra <op> frb`; `fmuls` takes its second operand in the C field
pub fn encode_fp_single(endian: Endian, xo: u32, frt: u8, fra: u8, frb: u8) -> Instruction {
    let (b, c) = if xo == fp::FMULS { (0, frb) } else { (frb, 0) };
    Instruction::new(
        59 << 26
            | ((frt & 0x1F) as u32) << 21
            | ((fra & 0x1F) as u32) << 16
            | ((b & 0x1F) as u32) << 11
            | ((c & 0x1F) as u32) << 6
            | xo << 1,
        endian,
    )
}

/// `fmr frt, frb`
pub fn encode_fmr(endian: Endian, frt: u8, frb: u8) -> Instruction {
    Instruction::new(63 << 26 | ((frt & 0x1F) as u32) << 21 | ((frb & 0x1F) as u32) << 11 | 72 << 1, endian)
}

/// Condition register bits of CR0
pub mod cr0 {
    pub const LT: u32 = 0;
    pub const GT: u32 = 1;
    pub const EQ: u32 = 2;
}

/// Branch-option codes for `bc`
pub mod bo {
    pub const IF_FALSE: u32 = 4;
    pub const IF_TRUE: u32 = 12;
}

/// Unconditional `b` with a zero displacement
pub fn encode_b(endian: Endian) -> Instruction {
    Instruction::new(18 << 26, endian)
}

/// Conditional `bc bo, bi` with a zero displacement
pub fn encode_bc(endian: Endian, bo: u32, bi: u32) -> Instruction {
    Instruction::new(16 << 26 | (bo & 0x1F) << 21 | (bi & 0x1F) << 16, endian)
}

pub fn is_b(instr: Instruction) -> bool {
    instr.word >> 26 == 18
}

pub fn is_bc(instr: Instruction) -> bool {
    instr.word >> 26 == 16
}

/// Fill in the word displacement of a `b` (24 bits) or `bc` (14 bits)
pub fn with_branch_offset(instr: Instruction, words: i32) -> Instruction {
    let mask = if is_b(instr) { 0x03FF_FFFC } else { 0xFFFC };
    Instruction::new(instr.word & !mask | ((words as u32) << 2) & mask, instr.endian)
}

pub fn encode_blr(endian: Endian) -> Instruction {
    Instruction::new(0x4E80_0020, endian)
}

/// Common registers
pub mod reg {
    use super::Register;

    /// r0: scratch; reads as zero when used as a base register
    pub const R0: Register = Register::new(0);
    pub const SP: Register = Register::new(1);
    pub const TOC: Register = Register::new(2);
    pub const R3: Register = Register::new(3);
    pub const R4: Register = Register::new(4);
    pub const R5: Register = Register::new(5);
    pub const R6: Register = Register::new(6);
    pub const R14: Register = Register::new(14);
}
