//! Native register usage tracking.
//!
//! Backends report every native register an encoded sequence reads or
//! writes, including the scratch registers they reserve for immediate and
//! displacement materialisation. The result tells a caller which registers
//! generated code clobbers and whether a prologue has to preserve any of
//! them.

use core::fmt;
use crate::common::{AbiClass, Register};

#[cfg(feature = "std")]
use std::collections::HashSet;
#[cfg(not(feature = "std"))]
use hashbrown::HashSet;

#[cfg(feature = "std")]
use std::vec::Vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Registers read (use) and written (def) by a run of instructions.
#[derive(Debug, Clone)]
pub struct RegisterUsageInfo<R: Register> {
    written_registers: HashSet<R>,
    read_registers: HashSet<R>,
}

impl<R: Register> RegisterUsageInfo<R> {
    pub fn new() -> Self {
        Self {
            written_registers: HashSet::new(),
            read_registers: HashSet::new(),
        }
    }

    pub fn add_written_register(&mut self, register: R) {
        self.written_registers.insert(register);
    }

    pub fn add_read_register(&mut self, register: R) {
        self.read_registers.insert(register);
    }

    pub fn written_registers(&self) -> Vec<R> {
        self.written_registers.iter().copied().collect()
    }

    pub fn read_registers(&self) -> Vec<R> {
        self.read_registers.iter().copied().collect()
    }

    fn all(&self) -> HashSet<R> {
        let mut all_registers = self.written_registers.clone();
        all_registers.extend(&self.read_registers);
        all_registers
    }

    /// Union of written and read registers, in no particular order
    pub fn used_registers(&self) -> Vec<R> {
        self.all().into_iter().collect()
    }

    /// Callee-saved registers that are written and therefore need saving
    pub fn callee_saved_written(&self) -> Vec<R> {
        self.written_registers
            .iter()
            .filter(|reg| reg.is_callee_saved())
            .copied()
            .collect()
    }

    pub fn register_count(&self) -> usize {
        self.all().len()
    }

    pub fn has_used_registers(&self) -> bool {
        !self.written_registers.is_empty() || !self.read_registers.is_empty()
    }

    /// True when a callee-saved register is written, so the generated code
    /// needs a prologue/epilogue to be called under the platform ABI.
    pub fn needs_stack_frame(&self) -> bool {
        self.written_registers.iter().any(|reg| reg.is_callee_saved())
    }

    /// Returns (caller_saved, callee_saved, special) counts.
    pub fn count_by_abi_class(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for register in self.all() {
            match register.abi_class() {
                AbiClass::CallerSaved => counts.0 += 1,
                AbiClass::CalleeSaved => counts.1 += 1,
                AbiClass::Special => counts.2 += 1,
            }
        }
        counts
    }

    pub fn clear(&mut self) {
        self.written_registers.clear();
        self.read_registers.clear();
    }

    pub fn contains_register(&self, register: &R) -> bool {
        self.written_registers.contains(register) || self.read_registers.contains(register)
    }

    pub fn contains_written_register(&self, register: &R) -> bool {
        self.written_registers.contains(register)
    }

    pub fn contains_read_register(&self, register: &R) -> bool {
        self.read_registers.contains(register)
    }

    pub fn merge(&mut self, other: &RegisterUsageInfo<R>) {
        self.written_registers.extend(&other.written_registers);
        self.read_registers.extend(&other.read_registers);
    }
}

impl<R: Register> Default for RegisterUsageInfo<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Register> fmt::Display for RegisterUsageInfo<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (caller_saved, callee_saved, special) = self.count_by_abi_class();

        write!(f, "RegisterUsage(total: {}, caller-saved: {}, callee-saved: {}, special: {})",
               self.register_count(), caller_saved, callee_saved, special)?;

        if self.needs_stack_frame() {
            write!(f, " [needs stack frame]")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestRegister {
        T0,
        S0,
        Sp,
    }

    impl Register for TestRegister {
        fn id(&self) -> u32 {
            *self as u32
        }

        fn abi_class(&self) -> AbiClass {
            match self {
                TestRegister::T0 => AbiClass::CallerSaved,
                TestRegister::S0 => AbiClass::CalleeSaved,
                TestRegister::Sp => AbiClass::Special,
            }
        }
    }

    #[test]
    fn test_read_only_callee_saved_needs_no_frame() {
        let mut usage = RegisterUsageInfo::new();
        usage.add_written_register(TestRegister::T0);
        usage.add_read_register(TestRegister::S0);

        assert!(!usage.needs_stack_frame());
        assert!(usage.callee_saved_written().is_empty());
        assert_eq!(usage.register_count(), 2);
    }

    #[test]
    fn test_written_callee_saved_needs_frame() {
        let mut usage = RegisterUsageInfo::new();
        usage.add_written_register(TestRegister::S0);
        usage.add_read_register(TestRegister::Sp);

        assert!(usage.needs_stack_frame());
        assert_eq!(usage.count_by_abi_class(), (0, 1, 1));
        assert_eq!(
            usage.to_string(),
            "RegisterUsage(total: 2, caller-saved: 0, callee-saved: 1, special: 1) [needs stack frame]"
        );
    }

    #[test]
    fn test_merge_and_clear() {
        let mut first = RegisterUsageInfo::new();
        first.add_written_register(TestRegister::T0);
        let mut second = RegisterUsageInfo::new();
        second.add_read_register(TestRegister::T0);
        second.add_read_register(TestRegister::Sp);

        first.merge(&second);
        assert!(first.contains_written_register(&TestRegister::T0));
        assert!(first.contains_read_register(&TestRegister::T0));
        assert_eq!(first.register_count(), 2);

        first.clear();
        assert!(!first.has_used_registers());
    }
}
