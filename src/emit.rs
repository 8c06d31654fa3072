//! Instruction sink shared by all backends.
//!
//! `Emitter::emit` is the `EMITW`/`EMITB` of this crate: it appends one
//! native instruction to the stream. Branches additionally record a fixup
//! so their displacement can be filled in once every label is placed.

use core::marker::PhantomData;

use crate::common::{Instruction, Register};
use crate::operand::Label;

#[cfg(feature = "std")]
use std::vec::Vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// A branch whose displacement is not known yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixup {
    /// Index of the branch instruction in the stream
    pub index: usize,
    pub label: Label,
}

/// Collects the native instructions of one program
#[derive(Debug, Clone)]
pub struct Emitter<I: Instruction, R: Register> {
    instructions: Vec<I>,
    fixups: Vec<Fixup>,
    #[cfg(feature = "register-tracking")]
    register_usage: crate::common::register_usage::RegisterUsageInfo<R>,
    _register: PhantomData<R>,
}

impl<I: Instruction, R: Register> Emitter<I, R> {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            fixups: Vec::new(),
            #[cfg(feature = "register-tracking")]
            register_usage: crate::common::register_usage::RegisterUsageInfo::new(),
            _register: PhantomData,
        }
    }

    /// Append one instruction
    pub fn emit(&mut self, instr: I) {
        self.instructions.push(instr);
    }

    /// Append a branch to `label`; its displacement is patched later
    pub fn emit_branch(&mut self, instr: I, label: Label) {
        self.fixups.push(Fixup {
            index: self.instructions.len(),
            label,
        });
        self.instructions.push(instr);
    }

    pub fn instructions(&self) -> &[I] {
        &self.instructions
    }

    pub fn fixups(&self) -> &[Fixup] {
        &self.fixups
    }

    /// Number of instructions emitted so far; the position a label binds to
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn clear(&mut self) {
        self.instructions.clear();
        self.fixups.clear();
        #[cfg(feature = "register-tracking")]
        self.register_usage.clear();
    }

    /// Drop everything emitted after the first `len` instructions
    pub fn truncate(&mut self, len: usize) {
        self.instructions.truncate(len);
        self.fixups.retain(|fixup| fixup.index < len);
    }

    /// Record a written native register
    #[cfg(feature = "register-tracking")]
    pub fn def(&mut self, reg: R) {
        self.register_usage.add_written_register(reg);
    }

    /// Record read native registers
    #[cfg(feature = "register-tracking")]
    pub fn uses(&mut self, regs: &[R]) {
        for &reg in regs {
            self.register_usage.add_read_register(reg);
        }
    }

    #[cfg(not(feature = "register-tracking"))]
    pub fn def(&mut self, _reg: R) {
        // No-op
    }

    #[cfg(not(feature = "register-tracking"))]
    pub fn uses(&mut self, _regs: &[R]) {
        // No-op
    }

    #[cfg(feature = "register-tracking")]
    pub fn register_usage(&self) -> &crate::common::register_usage::RegisterUsageInfo<R> {
        &self.register_usage
    }
}

impl<I: Instruction, R: Register> Default for Emitter<I, R> {
    fn default() -> Self {
        Self::new()
    }
}
