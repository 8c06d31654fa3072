//! 64-bit POWER backend (Power ISA 2.07 with VSX).
//!
//! Instruction words are emitted in the byte order chosen at construction.
//! Compare-and-branch sets CR0 with `cmp`/`cmpl` (doubleword for `zx`,
//! word for `wx`) and branches with `bc` on one CR0 bit.
//!
//! ## Register mapping (ELFv2)
//!
//! - **r3-r10, r14-r19**: `Reax`..`Reg14`, in portable order
//! - **r0**: scratch for immediates, indexed displacements and memory sources
//! - **vs0-vs15**: `Xmm0`..`XmmF` in 128X1; `Xmm<k>` is `vs2k:vs2k+1` in 256X2
//! - **vs31**: scratch for packed memory sources
//!
//! Scalar ops use the FPR `f<n>` that overlays `vs<n>`. The FPR holds the
//! value in double format, so the scalar lane is only observable through
//! `movrs_ld`/`movrs_st`.

pub mod instruction;
pub mod encoder;

#[cfg(test)]
mod tests;

pub use instruction::{reg, Instruction, Register};
pub use encoder::{materialize, Power};
