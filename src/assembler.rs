//! Portable mnemonic front end.
//!
//! `Assembler<B>` turns calls like `addzx_ri(Reax, 5)` into `Op`s and feeds
//! them to the backend `B`. The target is fixed by the type parameter, so
//! the same function body can be instantiated for every architecture.

use crate::backend::Backend;
use crate::common::{BuildError, BuildResult, Instruction, InstructionCollection};
use crate::emit::Emitter;
use crate::op::{AluOp, Op, ScalarOp, SimdOp, Src, VSrc};
use crate::operand::{Cond, Label, Mem, Reg, Size, Xmm};
use crate::target::Target;

#[cfg(feature = "std")]
use std::{collections::{BTreeMap, BTreeSet}, vec::Vec};
#[cfg(not(feature = "std"))]
use alloc::{collections::{BTreeMap, BTreeSet}, vec::Vec};

/// Portable assembler for one target
pub struct Assembler<B: Backend> {
    backend: B,
    out: Emitter<B::Instruction, B::Register>,
    /// Label -> index of the first instruction after it
    labels: BTreeMap<Label, usize>,
    /// Label ids already in use
    used_labels: BTreeSet<Label>,
}

macro_rules! alu_forms {
    ($($op:ident $size:ident => $ri:ident, $rr:ident, $ld:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($ri), "`: register, immediate")]
            pub fn $ri(&mut self, dst: Reg, imm: i32) -> BuildResult<&mut Self> {
                self.emit(Op::Alu { op: AluOp::$op, size: Size::$size, dst, src: Src::Imm(imm) })
            }

            #[doc = concat!("`", stringify!($rr), "`: register, register")]
            pub fn $rr(&mut self, dst: Reg, src: Reg) -> BuildResult<&mut Self> {
                self.emit(Op::Alu { op: AluOp::$op, size: Size::$size, dst, src: Src::Reg(src) })
            }

            #[doc = concat!("`", stringify!($ld), "`: register, memory")]
            pub fn $ld(&mut self, dst: Reg, src: Mem) -> BuildResult<&mut Self> {
                self.emit(Op::Alu { op: AluOp::$op, size: Size::$size, dst, src: Src::Mem(src) })
            }
        )*
    };
}

macro_rules! shift_forms {
    ($($op:ident $size:ident => $ri:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($ri), "`: shift register by immediate")]
            pub fn $ri(&mut self, dst: Reg, amount: i32) -> BuildResult<&mut Self> {
                self.emit(Op::Alu { op: AluOp::$op, size: Size::$size, dst, src: Src::Imm(amount) })
            }
        )*
    };
}

macro_rules! packed_forms {
    ($($op:ident => $rr:ident, $ld:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($rr), "`: full-width packed op, register source")]
            pub fn $rr(&mut self, dst: Xmm, src: Xmm) -> BuildResult<&mut Self> {
                self.emit(Op::Packed { op: SimdOp::$op, dst, src: VSrc::Reg(src) })
            }

            #[doc = concat!("`", stringify!($ld), "`: full-width packed op, memory source")]
            pub fn $ld(&mut self, dst: Xmm, src: Mem) -> BuildResult<&mut Self> {
                self.emit(Op::Packed { op: SimdOp::$op, dst, src: VSrc::Mem(src) })
            }
        )*
    };
}

macro_rules! scalar_forms {
    ($($op:ident => $rr:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($rr), "`: scalar f32 op on lane 0")]
            pub fn $rr(&mut self, dst: Xmm, src: Xmm) -> BuildResult<&mut Self> {
                self.emit(Op::Scalar { op: ScalarOp::$op, dst, src: VSrc::Reg(src) })
            }
        )*
    };
}

impl<B: Backend> Assembler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            out: Emitter::new(),
            labels: BTreeMap::new(),
            used_labels: BTreeSet::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn target(&self) -> Target {
        self.backend.target()
    }

    /// Encode one portable op
    pub fn emit(&mut self, op: Op) -> BuildResult<&mut Self> {
        op.validate()?;
        self.check_simd_operands(&op)?;
        if let Some(label) = op.target() {
            self.note_label(label);
        }

        let before = self.out.len();
        if let Err(err) = self.backend.encode(&op, &mut self.out) {
            // a failed op leaves no partial sequence behind
            self.out.truncate(before);
            return Err(err);
        }
        log::trace!("{:?} -> {} instruction(s)", op, self.out.len() - before);
        Ok(self)
    }

    fn check_simd_operands(&self, op: &Op) -> BuildResult<()> {
        match *op {
            Op::Packed { dst, src, .. } | Op::Scalar { dst, src, .. } => {
                self.backend.check_xmm(dst)?;
                if let VSrc::Reg(src) = src {
                    self.backend.check_xmm(src)?;
                }
                Ok(())
            }
            Op::PackedStore { src, .. } | Op::ScalarStore { src, .. } => self.backend.check_xmm(src),
            _ => Ok(()),
        }
    }

    fn note_label(&mut self, label: Label) {
        self.used_labels.insert(label);
    }

    /// A label id not yet used by this assembler
    ///
    /// Ids count up from the highest one seen. Once `u32::MAX` is taken,
    /// the lowest free id is returned instead.
    pub fn new_label(&mut self) -> Label {
        let id = match self.used_labels.last() {
            None => 0,
            Some(last) if last.0 < u32::MAX => last.0 + 1,
            Some(_) => self
                .used_labels
                .iter()
                .zip(0u32..)
                .find(|(label, id)| label.0 != *id)
                .map_or(u32::MAX, |(_, id)| id),
        };
        let label = Label::new(id);
        self.note_label(label);
        label
    }

    /// Bind `label` to the current position (`LBL`)
    pub fn bind(&mut self, label: Label) -> BuildResult<&mut Self> {
        if self.labels.contains_key(&label) {
            return Err(BuildError::LabelRedefined(label));
        }
        self.note_label(label);
        self.labels.insert(label, self.out.len());
        Ok(self)
    }

    /// Resolve all branches and return the finished instruction stream
    pub fn finish(&self) -> BuildResult<InstructionCollection<B::Instruction>> {
        let mut instructions = self.out.instructions().to_vec();

        let mut offsets = Vec::with_capacity(instructions.len() + 1);
        let mut at = 0;
        for instr in &instructions {
            offsets.push(at);
            at += instr.size();
        }
        offsets.push(at);

        for fixup in self.out.fixups() {
            let dest = *self
                .labels
                .get(&fixup.label)
                .ok_or(BuildError::UnboundLabel(fixup.label))?;
            let instr = instructions[fixup.index];
            instructions[fixup.index] = self.backend.relocate(instr, offsets[fixup.index], offsets[dest])?;
        }

        log::debug!(
            "finished {} program: {} instructions, {} bytes, {} fixups",
            self.target(),
            instructions.len(),
            at,
            self.out.fixups().len()
        );
        Ok(InstructionCollection::from_vec(instructions))
    }

    /// Finished program as a byte image
    pub fn bytes(&self) -> BuildResult<Vec<u8>> {
        Ok(self.finish()?.to_bytes())
    }

    /// Number of native instructions emitted so far
    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Drop all code and labels, keeping the backend
    pub fn clear(&mut self) -> &mut Self {
        self.out.clear();
        self.labels.clear();
        self.used_labels.clear();
        self
    }

    #[cfg(feature = "register-tracking")]
    pub fn register_usage(&self) -> &crate::common::register_usage::RegisterUsageInfo<B::Register> {
        self.out.register_usage()
    }

    /// Map the finished program into executable memory.
    ///
    /// # Safety
    ///
    /// The code must follow the host C ABI for signature `F`.
    #[cfg(feature = "std")]
    pub unsafe fn function<F>(&self) -> Result<crate::common::jit::CallableJitFunction<F>, crate::common::jit::JitError> {
        let bytes = self.bytes()?;
        crate::common::jit::CallableJitFunction::<F>::new(self.target().isa, &bytes)
    }

    /// Map the finished program into executable memory without a typed
    /// signature.
    ///
    /// # Safety
    ///
    /// See `RawCallableJitFunction::as_fn`.
    #[cfg(feature = "std")]
    pub unsafe fn raw_function(&self) -> Result<crate::common::jit::RawCallableJitFunction, crate::common::jit::JitError> {
        let bytes = self.bytes()?;
        crate::common::jit::RawCallableJitFunction::new(self.target().isa, &bytes)
    }

    // Integer moves

    pub fn movwx_ri(&mut self, dst: Reg, imm: i32) -> BuildResult<&mut Self> {
        self.emit(Op::Alu { op: AluOp::Mov, size: Size::S32, dst, src: Src::Imm(imm) })
    }

    pub fn movwx_rr(&mut self, dst: Reg, src: Reg) -> BuildResult<&mut Self> {
        self.emit(Op::Alu { op: AluOp::Mov, size: Size::S32, dst, src: Src::Reg(src) })
    }

    pub fn movwx_ld(&mut self, dst: Reg, src: Mem) -> BuildResult<&mut Self> {
        self.emit(Op::Alu { op: AluOp::Mov, size: Size::S32, dst, src: Src::Mem(src) })
    }

    pub fn movwx_st(&mut self, src: Reg, dst: Mem) -> BuildResult<&mut Self> {
        self.emit(Op::Store { size: Size::S32, src, dst })
    }

    /// Load a sign-extended 32-bit immediate into a 64-bit register
    pub fn movzx_ri(&mut self, dst: Reg, imm: i32) -> BuildResult<&mut Self> {
        self.emit(Op::Alu { op: AluOp::Mov, size: Size::S64, dst, src: Src::Imm(imm) })
    }

    pub fn movzx_rr(&mut self, dst: Reg, src: Reg) -> BuildResult<&mut Self> {
        self.emit(Op::Alu { op: AluOp::Mov, size: Size::S64, dst, src: Src::Reg(src) })
    }

    pub fn movzx_ld(&mut self, dst: Reg, src: Mem) -> BuildResult<&mut Self> {
        self.emit(Op::Alu { op: AluOp::Mov, size: Size::S64, dst, src: Src::Mem(src) })
    }

    pub fn movzx_st(&mut self, src: Reg, dst: Mem) -> BuildResult<&mut Self> {
        self.emit(Op::Store { size: Size::S64, src, dst })
    }

    // Integer arithmetic and logic

    alu_forms! {
        Add S32 => addwx_ri, addwx_rr, addwx_ld;
        Add S64 => addzx_ri, addzx_rr, addzx_ld;
        Sub S32 => subwx_ri, subwx_rr, subwx_ld;
        Sub S64 => subzx_ri, subzx_rr, subzx_ld;
        And S32 => andwx_ri, andwx_rr, andwx_ld;
        And S64 => andzx_ri, andzx_rr, andzx_ld;
        Orr S32 => orrwx_ri, orrwx_rr, orrwx_ld;
        Orr S64 => orrzx_ri, orrzx_rr, orrzx_ld;
        Xor S32 => xorwx_ri, xorwx_rr, xorwx_ld;
        Xor S64 => xorzx_ri, xorzx_rr, xorzx_ld;
        Mul S32 => mulwx_ri, mulwx_rr, mulwx_ld;
        Mul S64 => mulzx_ri, mulzx_rr, mulzx_ld;
    }

    shift_forms! {
        Shl S32 => shlwx_ri;
        Shl S64 => shlzx_ri;
        Shr S32 => shrwx_ri;
        Shr S64 => shrzx_ri;
        Shn S32 => shnwx_ri;
        Shn S64 => shnzx_ri;
    }

    // Packed single precision

    pub fn movpx_rr(&mut self, dst: Xmm, src: Xmm) -> BuildResult<&mut Self> {
        self.emit(Op::Packed { op: SimdOp::Mov, dst, src: VSrc::Reg(src) })
    }

    pub fn movpx_ld(&mut self, dst: Xmm, src: Mem) -> BuildResult<&mut Self> {
        self.emit(Op::Packed { op: SimdOp::Mov, dst, src: VSrc::Mem(src) })
    }

    pub fn movpx_st(&mut self, src: Xmm, dst: Mem) -> BuildResult<&mut Self> {
        self.emit(Op::PackedStore { src, dst })
    }

    packed_forms! {
        Add => addps_rr, addps_ld;
        Sub => subps_rr, subps_ld;
        Mul => mulps_rr, mulps_ld;
        Div => divps_rr, divps_ld;
        And => andpx_rr, andpx_ld;
        Orr => orrpx_rr, orrpx_ld;
        Xor => xorpx_rr, xorpx_ld;
    }

    // Scalar single precision

    pub fn movrs_ld(&mut self, dst: Xmm, src: Mem) -> BuildResult<&mut Self> {
        self.emit(Op::Scalar { op: ScalarOp::Mov, dst, src: VSrc::Mem(src) })
    }

    pub fn movrs_st(&mut self, src: Xmm, dst: Mem) -> BuildResult<&mut Self> {
        self.emit(Op::ScalarStore { src, dst })
    }

    scalar_forms! {
        Mov => movrs_rr;
        Add => addrs_rr;
        Sub => subrs_rr;
        Mul => mulrs_rr;
        Div => divrs_rr;
    }

    // Control flow

    pub fn jmpxx_lb(&mut self, target: Label) -> BuildResult<&mut Self> {
        self.emit(Op::Jump { target })
    }

    pub fn cmjwx_rr(&mut self, lhs: Reg, rhs: Reg, cond: Cond, target: Label) -> BuildResult<&mut Self> {
        self.emit(Op::CmpJump { size: Size::S32, cond, lhs, rhs: Src::Reg(rhs), target })
    }

    pub fn cmjwx_ri(&mut self, lhs: Reg, imm: i32, cond: Cond, target: Label) -> BuildResult<&mut Self> {
        self.emit(Op::CmpJump { size: Size::S32, cond, lhs, rhs: Src::Imm(imm), target })
    }

    pub fn cmjzx_rr(&mut self, lhs: Reg, rhs: Reg, cond: Cond, target: Label) -> BuildResult<&mut Self> {
        self.emit(Op::CmpJump { size: Size::S64, cond, lhs, rhs: Src::Reg(rhs), target })
    }

    pub fn cmjzx_ri(&mut self, lhs: Reg, imm: i32, cond: Cond, target: Label) -> BuildResult<&mut Self> {
        self.emit(Op::CmpJump { size: Size::S64, cond, lhs, rhs: Src::Imm(imm), target })
    }

    /// Return to the caller
    pub fn retxx(&mut self) -> BuildResult<&mut Self> {
        self.emit(Op::Ret)
    }
}

#[cfg(all(test, feature = "aarch64"))]
mod tests {
    use super::*;
    use crate::aarch64::Aarch64;
    use crate::operand::Reg::*;
    use crate::operand::Xmm::*;
    use crate::target::SimdMode;

    fn assembler(mode: SimdMode) -> Assembler<Aarch64> {
        Assembler::new(Aarch64::new(mode).unwrap())
    }

    #[test]
    fn test_new_label_skips_used_ids() {
        let mut asm = assembler(SimdMode::X128X1);
        assert_eq!(asm.new_label(), Label::new(0));
        asm.bind(Label::new(5)).unwrap();
        assert_eq!(asm.new_label(), Label::new(6));
        asm.jmpxx_lb(Label::new(9)).unwrap();
        assert_eq!(asm.new_label(), Label::new(10));
    }

    #[test]
    fn test_new_label_after_top_id() {
        let mut asm = assembler(SimdMode::X128X1);
        asm.jmpxx_lb(Label::new(u32::MAX)).unwrap();
        assert_eq!(asm.new_label(), Label::new(0));
        asm.bind(Label::new(1)).unwrap();
        assert_eq!(asm.new_label(), Label::new(2));
        assert_eq!(asm.new_label(), Label::new(3));
    }

    #[test]
    fn test_label_bound_twice() {
        let mut asm = assembler(SimdMode::X128X1);
        let label = asm.new_label();
        asm.bind(label).unwrap().retxx().unwrap();
        assert_eq!(asm.bind(label).err(), Some(BuildError::LabelRedefined(label)));
    }

    #[test]
    fn test_unbound_label_fails_finish() {
        let mut asm = assembler(SimdMode::X128X1);
        asm.jmpxx_lb(Label::new(2)).unwrap();
        assert_eq!(asm.finish().err(), Some(BuildError::UnboundLabel(Label::new(2))));
        assert_eq!(asm.bytes().err(), Some(BuildError::UnboundLabel(Label::new(2))));
    }

    #[test]
    fn test_fixups_follow_multi_word_ops() {
        let mut asm = assembler(SimdMode::X128X1);
        let done = asm.new_label();
        // movz + movk in front of the branch target
        asm.jmpxx_lb(done)
            .unwrap()
            .movzx_ri(Reax, 0x12345)
            .unwrap()
            .bind(done)
            .unwrap()
            .retxx()
            .unwrap();
        let code = asm.finish().unwrap();
        assert_eq!(code.len(), 4);
        assert_eq!(code[0].value(), 0x14000003);
        assert_eq!(code.offsets(), [0, 4, 8, 12, 16]);
    }

    #[test]
    fn test_failed_op_leaves_no_code() {
        let mut asm = assembler(SimdMode::X256X2);
        asm.retxx().unwrap();
        let disp = i32::MAX - 8;
        // the second half overflows after the first was encoded
        assert_eq!(
            asm.movpx_ld(Xmm0, Mem::new(Reax, disp)).err(),
            Some(BuildError::InvalidDisplacement(disp as i64 + 16))
        );
        assert_eq!(asm.len(), 1);
    }

    #[test]
    fn test_validation_runs_before_encoding() {
        let mut asm = assembler(SimdMode::X128X1);
        assert_eq!(asm.shlzx_ri(Reax, 64).err(), Some(BuildError::InvalidImmediate(64)));
        assert_eq!(asm.shrwx_ri(Reax, 32).err(), Some(BuildError::InvalidImmediate(32)));
        assert!(asm.is_empty());
    }

    #[test]
    fn test_clear_resets_labels() {
        let mut asm = assembler(SimdMode::X128X1);
        let label = asm.new_label();
        asm.bind(label).unwrap().retxx().unwrap();
        asm.clear();
        assert!(asm.is_empty());
        assert_eq!(asm.new_label(), Label::new(0));
        assert!(asm.bind(label).is_ok());
    }

    #[test]
    fn test_target_reports_mode() {
        let asm = assembler(SimdMode::X256X2);
        assert_eq!(asm.target().to_string(), "aarch64:256X2");
    }

    #[cfg(feature = "register-tracking")]
    #[test]
    fn test_register_tracking_includes_temporaries() {
        use crate::aarch64::reg;

        let mut asm = assembler(SimdMode::X128X1);
        asm.addzx_rr(Reax, Recx).unwrap().addzx_ri(Redx, 0x12345).unwrap();

        let usage = asm.register_usage();
        assert!(usage.contains_written_register(&reg::X0));
        assert!(usage.contains_read_register(&reg::X1));
        // immediate staged in the scratch register
        assert!(usage.contains_written_register(&reg::X16));
        assert!(!usage.needs_stack_frame());
    }
}
