//! The portable instruction set.
//!
//! An `Op` is one symbolic instruction with its operands, independent of
//! any target. Backends turn an `Op` into one or more native instructions.

use crate::common::{BuildError, BuildResult};
use crate::operand::{Cond, Label, Mem, Reg, Size, Xmm};

/// Integer source operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Src {
    Reg(Reg),
    Imm(i32),
    Mem(Mem),
}

/// SIMD source operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VSrc {
    Reg(Xmm),
    Mem(Mem),
}

/// Two-operand integer operations: `dst = dst <op> src` (`Mov`: `dst = src`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluOp {
    Mov,
    Add,
    Sub,
    And,
    Orr,
    Xor,
    /// Low half of the product
    Mul,
    Shl,
    /// Logical shift right
    Shr,
    /// Arithmetic shift right
    Shn,
}

impl AluOp {
    pub const fn is_shift(self) -> bool {
        matches!(self, AluOp::Shl | AluOp::Shr | AluOp::Shn)
    }
}

/// Packed single-precision operations over the full SIMD width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimdOp {
    Mov,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Orr,
    Xor,
}

/// Scalar single-precision operations on lane 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarOp {
    Mov,
    Add,
    Sub,
    Mul,
    Div,
}

/// One portable instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Alu { op: AluOp, size: Size, dst: Reg, src: Src },
    Store { size: Size, src: Reg, dst: Mem },
    Packed { op: SimdOp, dst: Xmm, src: VSrc },
    PackedStore { src: Xmm, dst: Mem },
    Scalar { op: ScalarOp, dst: Xmm, src: VSrc },
    ScalarStore { src: Xmm, dst: Mem },
    Jump { target: Label },
    CmpJump { size: Size, cond: Cond, lhs: Reg, rhs: Src, target: Label },
    Ret,
}

impl Op {
    /// Check target-independent operand rules.
    pub fn validate(&self) -> BuildResult<()> {
        match *self {
            Op::Alu { op, size, src, .. } if op.is_shift() => match src {
                Src::Imm(amount) if (0..size.bits() as i32).contains(&amount) => Ok(()),
                Src::Imm(amount) => Err(BuildError::InvalidImmediate(amount as i64)),
                _ => Err(BuildError::InvalidOperands),
            },
            Op::CmpJump { rhs: Src::Mem(_), .. } => Err(BuildError::InvalidOperands),
            Op::Scalar { op, src: VSrc::Mem(_), .. } if op != ScalarOp::Mov => {
                Err(BuildError::InvalidOperands)
            }
            _ => Ok(()),
        }
    }

    /// Branch target, if this op transfers control to a label
    pub fn target(&self) -> Option<Label> {
        match *self {
            Op::Jump { target } | Op::CmpJump { target, .. } => Some(target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::Reg::*;
    use crate::operand::Xmm::*;

    #[test]
    fn test_shift_amount_bounds() {
        let shl = |size, amount| Op::Alu { op: AluOp::Shl, size, dst: Reax, src: Src::Imm(amount) };

        assert_eq!(shl(Size::S32, 31).validate(), Ok(()));
        assert_eq!(shl(Size::S32, 32).validate(), Err(BuildError::InvalidImmediate(32)));
        assert_eq!(shl(Size::S64, 63).validate(), Ok(()));
        assert_eq!(shl(Size::S64, -1).validate(), Err(BuildError::InvalidImmediate(-1)));
    }

    #[test]
    fn test_shift_by_register_is_rejected() {
        let op = Op::Alu { op: AluOp::Shr, size: Size::S64, dst: Reax, src: Src::Reg(Recx) };
        assert_eq!(op.validate(), Err(BuildError::InvalidOperands));
    }

    #[test]
    fn test_compare_with_memory_is_rejected() {
        let op = Op::CmpJump {
            size: Size::S64,
            cond: Cond::Eq,
            lhs: Reax,
            rhs: Src::Mem(Mem::base(Rebx)),
            target: Label::new(0),
        };
        assert_eq!(op.validate(), Err(BuildError::InvalidOperands));
        assert_eq!(op.target(), Some(Label::new(0)));
    }

    #[test]
    fn test_scalar_memory_source_only_for_mov() {
        let mov = Op::Scalar { op: ScalarOp::Mov, dst: Xmm0, src: VSrc::Mem(Mem::base(Reax)) };
        let add = Op::Scalar { op: ScalarOp::Add, dst: Xmm0, src: VSrc::Mem(Mem::base(Reax)) };
        assert_eq!(mov.validate(), Ok(()));
        assert_eq!(add.validate(), Err(BuildError::InvalidOperands));
    }
}
