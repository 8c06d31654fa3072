/// x86-64 instruction formats and encoding
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

/// x86-64 general-purpose register (RAX = 0 .. R15 = 15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(pub u8);

impl Register {
    pub const fn new(reg: u8) -> Self {
        Self(reg)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Low three bits, as placed in ModRM/SIB/opcode fields
    pub fn low(self) -> u8 {
        self.0 & 7
    }

    /// True for R8..R15, which need a REX extension bit
    pub fn is_extended(self) -> bool {
        self.0 >= 8
    }
}

impl RegisterTrait for Register {
    fn id(&self) -> u32 {
        self.0 as u32
    }

    fn abi_class(&self) -> AbiClass {
        // System V AMD64
        match self.0 {
            0 | 1 | 2 | 6 | 7 | 8..=11 => AbiClass::CallerSaved,
            3 | 5 | 12..=15 => AbiClass::CalleeSaved,
            _ => AbiClass::Special, // RSP
        }
    }
}

/// A variable-length x86-64 instruction (at most 15 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    bytes: [u8; Instruction::MAX_LEN],
    len: u8,
}

impl Instruction {
    pub const MAX_LEN: usize = 15;

    const fn empty() -> Self {
        Self { bytes: [0; Self::MAX_LEN], len: 0 }
    }

    /// Build an instruction from raw bytes; anything past 15 bytes is dropped
    pub fn new(bytes: &[u8]) -> Self {
        let mut instr = Self::empty();
        instr.extend(&bytes[..bytes.len().min(Self::MAX_LEN)]);
        instr
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    fn push(&mut self, byte: u8) {
        self.bytes[self.len as usize] = byte;
        self.len += 1;
    }

    fn extend(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Replace the trailing 32-bit displacement of a `jmp`/`jcc rel32`
    pub fn with_rel32(mut self, rel: i32) -> Self {
        let end = self.len as usize;
        self.bytes[end - 4..end].copy_from_slice(&rel.to_le_bytes());
        self
    }
}

impl InstructionTrait for Instruction {
    fn value(&self) -> u64 {
        let mut word = [0u8; 8];
        let n = self.as_bytes().len().min(8);
        word[..n].copy_from_slice(&self.as_bytes()[..n]);
        u64::from_le_bytes(word)
    }

    fn bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn size(&self) -> usize {
        self.len as usize
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instruction({:02x?})", self.as_bytes())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// The r/m side of a ModRM-encoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rm {
    /// Register direct (mod = 11)
    Reg(u8),
    /// `[base + disp]`
    Mem { base: u8, disp: i32 },
}

impl Rm {
    /// Register number that goes in REX.B / VEX.B
    fn ext(self) -> u8 {
        match self {
            Rm::Reg(reg) => reg,
            Rm::Mem { base, .. } => base,
        }
    }
}

/// Opcode-map prefix bytes (`pp` field of VEX/EVEX)
pub mod pp {
    pub const NONE: u8 = 0b00;
    pub const P66: u8 = 0b01;
    pub const F3: u8 = 0b10;
}

pub const fn rex(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0x40 | (w as u8) << 3 | (r as u8) << 2 | (x as u8) << 1 | b as u8
}

pub const fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
    (mode & 3) << 6 | (reg & 7) << 3 | (rm & 7)
}

pub const fn sib(scale: u8, index: u8, base: u8) -> u8 {
    (scale & 3) << 6 | (index & 7) << 3 | (base & 7)
}

/// Append ModRM (+SIB) (+displacement).
///
/// `disp_scale` is the EVEX disp8*N compression factor; legacy and VEX
/// encodings pass 1.
fn push_rm(instr: &mut Instruction, reg: u8, rm: Rm, disp_scale: i32) {
    match rm {
        Rm::Reg(r) => instr.push(modrm(0b11, reg, r)),
        Rm::Mem { base, disp } => {
            let low = base & 7;
            // RBP/R13 with mod=00 means RIP-relative / no base
            if disp == 0 && low != 0b101 {
                instr.push(modrm(0b00, reg, low));
                if low == 0b100 {
                    instr.push(sib(0, 0b100, 0b100));
                }
            } else if disp % disp_scale == 0 && (-128..=127).contains(&(disp / disp_scale)) {
                instr.push(modrm(0b01, reg, low));
                if low == 0b100 {
                    instr.push(sib(0, 0b100, 0b100));
                }
                instr.push((disp / disp_scale) as i8 as u8);
            } else {
                instr.push(modrm(0b10, reg, low));
                if low == 0b100 {
                    instr.push(sib(0, 0b100, 0b100));
                }
                instr.extend(&disp.to_le_bytes());
            }
        }
    }
}

/// Legacy (non-VEX) encoding:
/// `[prefix] [REX] opcode ModRM [SIB] [disp] [imm]`
pub fn encode_legacy(prefix: Option<u8>, w: bool, opcode: &[u8], reg: u8, rm: Rm, imm: &[u8]) -> Instruction {
    let mut instr = Instruction::empty();
    if let Some(prefix) = prefix {
        instr.push(prefix);
    }
    let r = reg >= 8;
    let b = rm.ext() >= 8;
    if w || r || b {
        instr.push(rex(w, r, false, b));
    }
    instr.extend(opcode);
    push_rm(&mut instr, reg, rm, 1);
    instr.extend(imm);
    instr
}

/// `mov r32, imm32` (`B8+rd id`), zero-extends into the full register
pub fn encode_mov_r32_imm(reg: u8, imm: i32) -> Instruction {
    let mut instr = Instruction::empty();
    if reg >= 8 {
        instr.push(rex(false, false, false, true));
    }
    instr.push(0xB8 + (reg & 7));
    instr.extend(&imm.to_le_bytes());
    instr
}

/// VEX encoding in the `0F` map.
///
/// `vvvv` is the second source register (0 when unused, which encodes as
/// `1111`). The 2-byte `C5` form is used whenever REX.B and REX.W are clear.
pub fn encode_vex(l256: bool, pp: u8, opcode: u8, reg: u8, vvvv: u8, rm: Rm) -> Instruction {
    let mut instr = Instruction::empty();
    let r_bar = ((reg >> 3) & 1) ^ 1;
    let b_bar = ((rm.ext() >> 3) & 1) ^ 1;
    let v_bar = !vvvv & 0xF;
    let tail = v_bar << 3 | (l256 as u8) << 2 | (pp & 3);
    if b_bar == 1 {
        instr.push(0xC5);
        instr.push(r_bar << 7 | tail);
    } else {
        instr.push(0xC4);
        // X is always clear: no index register
        instr.push(r_bar << 7 | 1 << 6 | b_bar << 5 | 0b00001);
        instr.push(tail);
    }
    instr.push(opcode);
    push_rm(&mut instr, reg, rm, 1);
    instr
}

/// EVEX.512 encoding in the `0F` map, no masking, no broadcast.
///
/// Memory displacements use disp8*64 compression when possible.
pub fn encode_evex(pp: u8, w: bool, opcode: u8, reg: u8, vvvv: u8, rm: Rm) -> Instruction {
    let mut instr = Instruction::empty();
    let r_bar = ((reg >> 3) & 1) ^ 1;
    let r_hi_bar = ((reg >> 4) & 1) ^ 1;
    let b_bar = ((rm.ext() >> 3) & 1) ^ 1;
    let v_bar = !vvvv & 0xF;
    let v_hi_bar = ((vvvv >> 4) & 1) ^ 1;

    instr.push(0x62);
    instr.push(r_bar << 7 | 1 << 6 | b_bar << 5 | r_hi_bar << 4 | 0b01);
    instr.push((w as u8) << 7 | v_bar << 3 | 1 << 2 | (pp & 3));
    // z = 0, L'L = 10 (512-bit), b = 0, aaa = 000
    instr.push(0b10 << 5 | v_hi_bar << 3);
    instr.push(opcode);
    push_rm(&mut instr, reg, rm, 64);
    instr
}

/// `jcc rel32` with a zero displacement, patched at link time
pub fn encode_jcc(cc: u8) -> Instruction {
    Instruction::new(&[0x0F, 0x80 | (cc & 0xF), 0, 0, 0, 0])
}

/// `jmp rel32` with a zero displacement, patched at link time
pub fn encode_jmp() -> Instruction {
    Instruction::new(&[0xE9, 0, 0, 0, 0])
}

pub fn encode_ret() -> Instruction {
    Instruction::new(&[0xC3])
}

/// Common registers
pub mod reg {
    use super::Register;

    pub const RAX: Register = Register::new(0);
    pub const RCX: Register = Register::new(1);
    pub const RDX: Register = Register::new(2);
    pub const RBX: Register = Register::new(3);
    pub const RSP: Register = Register::new(4);
    pub const RBP: Register = Register::new(5);
    pub const RSI: Register = Register::new(6);
    pub const RDI: Register = Register::new(7);
    pub const R8: Register = Register::new(8);
    pub const R9: Register = Register::new(9);
    pub const R10: Register = Register::new(10);
    pub const R11: Register = Register::new(11);
    pub const R12: Register = Register::new(12);
    pub const R13: Register = Register::new(13);
    pub const R14: Register = Register::new(14);
    pub const R15: Register = Register::new(15);
}
