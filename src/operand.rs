//! Portable operand descriptors.
//!
//! These are the leaves of every portable instruction: register names,
//! base+displacement memory operands, branch conditions and labels. A
//! backend maps each of them to native register numbers and addressing
//! modes of its ISA.

use core::fmt;

/// Portable general-purpose register.
///
/// Names follow the x86 register file for familiarity; each backend maps
/// them through its own table (`Reax` is `x0` on AArch64, `r3` on POWER).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    Reax,
    Recx,
    Redx,
    Rebx,
    Rebp,
    Resi,
    Redi,
    Reg08,
    Reg09,
    Reg10,
    Reg11,
    Reg12,
    Reg13,
    Reg14,
}

impl Reg {
    pub const ALL: [Reg; 14] = [
        Reg::Reax, Reg::Recx, Reg::Redx, Reg::Rebx, Reg::Rebp, Reg::Resi, Reg::Redi,
        Reg::Reg08, Reg::Reg09, Reg::Reg10, Reg::Reg11, Reg::Reg12, Reg::Reg13, Reg::Reg14,
    ];

    /// Position in the portable register file
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Portable SIMD register.
///
/// In `X2` modes one logical register is a pair of native registers, so
/// fewer logical registers are usable; see `Backend::simd_registers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Xmm {
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
    Xmm4,
    Xmm5,
    Xmm6,
    Xmm7,
    Xmm8,
    Xmm9,
    XmmA,
    XmmB,
    XmmC,
    XmmD,
    XmmE,
    XmmF,
}

impl Xmm {
    pub const ALL: [Xmm; 16] = [
        Xmm::Xmm0, Xmm::Xmm1, Xmm::Xmm2, Xmm::Xmm3, Xmm::Xmm4, Xmm::Xmm5, Xmm::Xmm6, Xmm::Xmm7,
        Xmm::Xmm8, Xmm::Xmm9, Xmm::XmmA, Xmm::XmmB, Xmm::XmmC, Xmm::XmmD, Xmm::XmmE, Xmm::XmmF,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Memory operand: `[base + disp]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mem {
    pub base: Reg,
    pub disp: i32,
}

impl Mem {
    pub const fn new(base: Reg, disp: i32) -> Self {
        Self { base, disp }
    }

    /// `[base]` with no displacement
    pub const fn base(base: Reg) -> Self {
        Self { base, disp: 0 }
    }

    /// Same base, displacement moved by `delta`.
    ///
    /// Used to address the second half of a register pair.
    pub fn offset(self, delta: i32) -> Option<Self> {
        self.disp.checked_add(delta).map(|disp| Self { base: self.base, disp })
    }
}

/// Operand width of an integer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    /// 32-bit (`wx` mnemonics)
    S32,
    /// 64-bit (`zx` mnemonics)
    S64,
}

impl Size {
    pub const fn bits(self) -> u32 {
        match self {
            Size::S32 => 32,
            Size::S64 => 64,
        }
    }

    pub const fn bytes(self) -> i32 {
        match self {
            Size::S32 => 4,
            Size::S64 => 8,
        }
    }

    pub const fn is_64(self) -> bool {
        matches!(self, Size::S64)
    }
}

/// Compare-and-branch condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    Eq,
    Ne,
    /// unsigned <
    Ltu,
    /// unsigned <=
    Leu,
    /// unsigned >
    Gtu,
    /// unsigned >=
    Geu,
    /// signed <
    Lt,
    /// signed <=
    Le,
    /// signed >
    Gt,
    /// signed >=
    Ge,
}

impl Cond {
    pub const fn is_signed(self) -> bool {
        matches!(self, Cond::Lt | Cond::Le | Cond::Gt | Cond::Ge)
    }

    /// Condition that holds when the operands are swapped
    pub const fn swapped(self) -> Self {
        match self {
            Cond::Eq => Cond::Eq,
            Cond::Ne => Cond::Ne,
            Cond::Ltu => Cond::Gtu,
            Cond::Leu => Cond::Geu,
            Cond::Gtu => Cond::Ltu,
            Cond::Geu => Cond::Leu,
            Cond::Lt => Cond::Gt,
            Cond::Le => Cond::Ge,
            Cond::Gt => Cond::Lt,
            Cond::Ge => Cond::Le,
        }
    }
}

/// Symbolic branch target.
///
/// Labels are plain ids chosen by the caller (or handed out by
/// `Assembler::new_label`) and bound to a position with `Assembler::bind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl Label {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}
