//! Common types and traits shared across all target architectures.

use core::fmt;

/// Register usage tracking functionality
#[cfg(feature = "register-tracking")]
pub mod register_usage;

/// JIT execution of host-targeted code
#[cfg(feature = "std")]
pub mod jit;

#[cfg(feature = "std")]
use std::vec::Vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::operand::Label;

/// A native machine instruction produced by a backend.
///
/// Fixed-width ISAs produce one 32-bit word per instruction (`EMITW`),
/// x86-64 produces a variable-length byte sequence (`EMITB`).
pub trait Instruction: Copy + Clone + fmt::Debug + fmt::Display {
    /// Get the instruction as an integer (first 8 bytes for x86-64)
    fn value(&self) -> u64;

    /// Get the instruction bytes in target memory order
    fn bytes(&self) -> Vec<u8>;

    /// Get the size of this instruction in bytes
    fn size(&self) -> usize;
}

/// ABI classification for native registers based on preservation requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiClass {
    /// May be clobbered freely by generated code.
    CallerSaved,

    /// Must be saved on entry and restored before return if written.
    CalleeSaved,

    /// Stack pointer, link register, zero register, assembler temporaries
    /// reserved by the platform and similar.
    Special,
}

impl fmt::Display for AbiClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiClass::CallerSaved => write!(f, "caller-saved"),
            AbiClass::CalleeSaved => write!(f, "callee-saved"),
            AbiClass::Special => write!(f, "special"),
        }
    }
}

/// A native general-purpose register of a target architecture
pub trait Register: Copy + Clone + fmt::Debug + core::hash::Hash + Eq {
    /// Hardware register number
    fn id(&self) -> u32;

    /// Preservation class under the target's standard calling convention
    fn abi_class(&self) -> AbiClass;

    fn is_caller_saved(&self) -> bool {
        self.abi_class() == AbiClass::CallerSaved
    }

    fn is_callee_saved(&self) -> bool {
        self.abi_class() == AbiClass::CalleeSaved
    }

    fn is_special(&self) -> bool {
        self.abi_class() == AbiClass::Special
    }
}

/// Concatenate the bytes of a sequence of instructions
pub fn instructions_to_bytes<I: Instruction>(instructions: &[I]) -> Vec<u8> {
    let mut result = Vec::with_capacity(instructions_total_size(instructions));
    for instr in instructions {
        result.extend_from_slice(&instr.bytes());
    }
    result
}

/// Get the total size in bytes of a sequence of instructions
pub fn instructions_total_size<I: Instruction>(instructions: &[I]) -> usize {
    instructions.iter().map(|i| i.size()).sum()
}

/// An ordered run of encoded instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionCollection<I: Instruction> {
    instructions: Vec<I>,
}

impl<I: Instruction> InstructionCollection<I> {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
        }
    }

    pub fn from_vec(instructions: Vec<I>) -> Self {
        Self { instructions }
    }

    pub fn from_slice(instructions: &[I]) -> Self {
        Self {
            instructions: instructions.to_vec(),
        }
    }

    pub fn as_slice(&self) -> &[I] {
        &self.instructions
    }

    /// Flatten to a byte image ready to be copied into executable memory
    pub fn to_bytes(&self) -> Vec<u8> {
        instructions_to_bytes(&self.instructions)
    }

    /// Total encoded size in bytes
    pub fn total_size(&self) -> usize {
        instructions_total_size(&self.instructions)
    }

    /// Byte offset of each instruction, plus the end offset as the last entry
    pub fn offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.instructions.len() + 1);
        let mut at = 0;
        offsets.push(at);
        for instr in &self.instructions {
            at += instr.size();
            offsets.push(at);
        }
        offsets
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn push(&mut self, instruction: I) {
        self.instructions.push(instruction);
    }

    pub fn iter(&self) -> core::slice::Iter<'_, I> {
        self.instructions.iter()
    }

    pub fn into_vec(self) -> Vec<I> {
        self.instructions
    }

    /// Move all instructions of `other` to the end of this collection.
    ///
    /// Only position-independent code can be merged this way: branches are
    /// already resolved relative to their own sequence.
    pub fn append(&mut self, mut other: InstructionCollection<I>) {
        self.instructions.append(&mut other.instructions);
    }

    /// Consume both collections and return their concatenation
    pub fn concat(mut self, other: InstructionCollection<I>) -> Self {
        self.append(other);
        self
    }
}

impl<I: Instruction> Default for InstructionCollection<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Instruction> From<Vec<I>> for InstructionCollection<I> {
    fn from(instructions: Vec<I>) -> Self {
        Self::from_vec(instructions)
    }
}

impl<I: Instruction> AsRef<[I]> for InstructionCollection<I> {
    fn as_ref(&self) -> &[I] {
        &self.instructions
    }
}

impl<I: Instruction> core::ops::Index<usize> for InstructionCollection<I> {
    type Output = I;

    fn index(&self, index: usize) -> &Self::Output {
        &self.instructions[index]
    }
}

impl<I: Instruction> core::ops::Deref for InstructionCollection<I> {
    type Target = [I];

    fn deref(&self) -> &Self::Target {
        &self.instructions
    }
}

impl<'a, I: Instruction> IntoIterator for &'a InstructionCollection<I> {
    type Item = &'a I;
    type IntoIter = core::slice::Iter<'a, I>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

impl<I: Instruction> IntoIterator for InstructionCollection<I> {
    type Item = I;
    type IntoIter = <Vec<I> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.into_iter()
    }
}

impl<I: Instruction> core::ops::Add for InstructionCollection<I> {
    type Output = InstructionCollection<I>;

    fn add(self, other: InstructionCollection<I>) -> InstructionCollection<I> {
        self.concat(other)
    }
}

impl<I: Instruction> core::ops::AddAssign for InstructionCollection<I> {
    fn add_assign(&mut self, other: InstructionCollection<I>) {
        self.append(other);
    }
}

/// Common result type for instruction building
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors that can occur while encoding portable instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Portable register index with no native counterpart on this target
    #[error("register index {0} is not available on this target")]
    InvalidRegister(u32),
    /// Immediate outside the range accepted by the instruction
    #[error("invalid immediate value: {0}")]
    InvalidImmediate(i64),
    /// Memory displacement the target cannot address
    #[error("invalid displacement: {0}")]
    InvalidDisplacement(i64),
    /// Operand kinds not accepted by the mnemonic
    #[error("invalid operand combination")]
    InvalidOperands,
    /// Mnemonic has no encoding on this target
    #[error("unsupported instruction")]
    UnsupportedInstruction,
    /// SIMD mode not encodable on this target
    #[error("SIMD mode {width}X{factor} is not supported by this target")]
    UnsupportedMode { width: u16, factor: u8 },
    /// Target description could not be parsed
    #[error("invalid target description")]
    InvalidTarget,
    /// Label bound twice
    #[error("label {0} is already bound")]
    LabelRedefined(Label),
    /// Label referenced but never bound
    #[error("label {0} is never bound")]
    UnboundLabel(Label),
    /// Branch displacement exceeds the instruction's reach
    #[error("branch displacement {0} is out of range")]
    BranchOutOfRange(i64),
}
