/// MIPS64 Release 6 instruction formats and encoding
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

/// MIPS general-purpose register ($0-$31)
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
        // n64
        match self.0 {
            1..=15 | 24 | 25 => AbiClass::CallerSaved,
            16..=23 | 30 => AbiClass::CalleeSaved,
            _ => AbiClass::Special, // zero, k0/k1, gp, sp, ra
        }
    }
}

/// MIPS instruction: a 32-bit word plus the byte order it is emitted in
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

    fn with_word(self, word: u32) -> Self {
        Self { word, ..self }
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

/// SPECIAL function codes
pub mod funct {
    pub const SLL: u32 = 0x00;
    pub const SRL: u32 = 0x02;
    pub const SRA: u32 = 0x03;
    /// JALR; `jr` in Release 6
    pub const JALR: u32 = 0x09;
    /// SOP30 with `sa` = 2: MUL
    pub const MUL: u32 = 0x18;
    /// SOP34 with `sa` = 2: DMUL
    pub const DMUL: u32 = 0x1C;
    pub const ADDU: u32 = 0x21;
    pub const SUBU: u32 = 0x23;
    pub const AND: u32 = 0x24;
    pub const OR: u32 = 0x25;
    pub const XOR: u32 = 0x26;
    pub const SLT: u32 = 0x2A;
    pub const SLTU: u32 = 0x2B;
    pub const DADDU: u32 = 0x2D;
    pub const DSUBU: u32 = 0x2F;
    pub const DSLL: u32 = 0x38;
    pub const DSRL: u32 = 0x3A;
    pub const DSRA: u32 = 0x3B;
    pub const DSLL32: u32 = 0x3C;
    pub const DSRL32: u32 = 0x3E;
    pub const DSRA32: u32 = 0x3F;
}

/// Major opcodes of I-type instructions
pub mod opcode {
    pub const BEQ: u32 = 0x04;
    pub const BNE: u32 = 0x05;
    pub const ADDIU: u32 = 0x09;
    pub const ANDI: u32 = 0x0C;
    pub const ORI: u32 = 0x0D;
    pub const XORI: u32 = 0x0E;
    pub const LUI: u32 = 0x0F;
    pub const DADDIU: u32 = 0x19;
    pub const LW: u32 = 0x23;
    pub const SW: u32 = 0x2B;
    pub const LWC1: u32 = 0x31;
    pub const LD: u32 = 0x37;
    pub const SWC1: u32 = 0x39;
    pub const SD: u32 = 0x3F;
}

/// R-type: `rs << 21 | rt << 16 | rd << 11 | sa << 6 | funct`
pub fn encode_r(endian: Endian, rs: Register, rt: Register, rd: Register, sa: u32, funct: u32) -> Instruction {
    Instruction::new(rs.field() << 21 | rt.field() << 16 | rd.field() << 11 | (sa & 0x1F) << 6 | (funct & 0x3F), endian)
}

/// I-type: `op << 26 | rs << 21 | rt << 16 | imm16`
pub fn encode_i(endian: Endian, op: u32, rs: Register, rt: Register, imm16: u32) -> Instruction {
    Instruction::new(op << 26 | rs.field() << 21 | rt.field() << 16 | (imm16 & 0xFFFF), endian)
}

/// Branch with a zero offset, patched at link time
pub fn encode_branch(endian: Endian, op: u32, rs: Register, rt: Register) -> Instruction {
    encode_i(endian, op, rs, rt, 0)
}

pub fn is_branch(instr: Instruction) -> bool {
    matches!(instr.word >> 26, opcode::BEQ | opcode::BNE)
}

/// Replace the 16-bit word offset of a branch
pub fn with_branch_offset(instr: Instruction, offset: i32) -> Instruction {
    instr.with_word(instr.word & 0xFFFF_0000 | (offset as u32) & 0xFFFF)
}

pub fn encode_nop(endian: Endian) -> Instruction {
    Instruction::new(0, endian)
}

/// MSA operations on `.w` / `.v` (`base | wt << 16 | ws << 11 | wd << 6`)
pub mod msa {
    pub const FADD_W: u32 = 0x7800_001B;
    pub const FSUB_W: u32 = 0x7840_001B;
    pub const FMUL_W: u32 = 0x7880_001B;
    pub const FDIV_W: u32 = 0x78C0_001B;
    pub const AND_V: u32 = 0x7800_001E;
    pub const OR_V: u32 = 0x7820_001E;
    pub const XOR_V: u32 = 0x7860_001E;
    /// `move.v wd, ws` (wt field unused)
    pub const MOVE_V: u32 = 0x78BE_0019;
    pub const LD_W: u32 = 0x7800_0022;
    pub const ST_W: u32 = 0x7800_0026;
}

pub fn encode_msa_3r(endian: Endian, base: u32, wt: u8, ws: u8, wd: u8) -> Instruction {
    Instruction::new(base | ((wt & 0x1F) as u32) << 16 | ((ws & 0x1F) as u32) << 11 | ((wd & 0x1F) as u32) << 6, endian)
}

/// `ld.w` / `st.w` with a signed 10-bit offset in words
pub fn encode_msa_mem(endian: Endian, base: u32, s10: i32, rs: Register, wd: u8) -> Instruction {
    Instruction::new(base | ((s10 as u32) & 0x3FF) << 16 | rs.field() << 11 | ((wd & 0x1F) as u32) << 6, endian)
}

/// FPU single-precision functions (COP1, fmt = S)
pub mod fpu {
    pub const ADD_S: u32 = 0x00;
    pub const SUB_S: u32 = 0x01;
    pub const MUL_S: u32 = 0x02;
    pub const DIV_S: u32 = 0x03;
    pub const MOV_S: u32 = 0x06;
}

pub fn encode_fpu_s(endian: Endian, funct: u32, ft: u8, fs: u8, fd: u8) -> Instruction {
    Instruction::new(
        0x4600_0000 | ((ft & 0x1F) as u32) << 16 | ((fs & 0x1F) as u32) << 11 | ((fd & 0x1F) as u32) << 6 | funct,
        endian,
    )
}

/// `lwc1` / `swc1`
pub fn encode_fpu_mem(endian: Endian, op: u32, base: Register, ft: u8, offset: i32) -> Instruction {
    Instruction::new(op << 26 | base.field() << 21 | ((ft & 0x1F) as u32) << 16 | (offset as u32) & 0xFFFF, endian)
}

/// Common registers
pub mod reg {
    use super::Register;

    pub const ZERO: Register = Register::new(0);
    /// $at: scratch for immediates and addresses
    pub const AT: Register = Register::new(1);
    pub const A0: Register = Register::new(4);
    pub const A1: Register = Register::new(5);
    pub const A2: Register = Register::new(6);
    pub const A3: Register = Register::new(7);
    pub const T0: Register = Register::new(12);
    pub const S0: Register = Register::new(16);
    pub const S1: Register = Register::new(17);
    /// $t8: scratch for values
    pub const T8: Register = Register::new(24);
    pub const SP: Register = Register::new(29);
    pub const RA: Register = Register::new(31);
}
