//! AArch32 backend (ARMv7-A, ARM state, little-endian).
//!
//! Integer ops are 32-bit; `zx` forms operate on the same 32-bit registers.
//! Immediates use the rotated 8-bit form when possible, then the
//! complementary instruction (`mvn`, `bic`, `sub`/`add`, `cmn`), then a
//! `movw`/`movt` pair into the scratch register.
//!
//! ## Register mapping (AAPCS)
//!
//! - **R0-R10**: `Reax`..`Reg11`; `Reg12`..`Reg14` are rejected
//! - **R12**: scratch for immediates and addresses
//! - **Q0-Q6**: `Xmm0`..`Xmm6`, lane 0 of `Xmm<k>` is `S4k`
//! - **Q7**: scratch for packed memory sources
//!
//! Packed division has no NEON form and is issued as four VFP `vdiv.f32`.

pub mod instruction;
pub mod encoder;

#[cfg(test)]
mod tests;

pub use instruction::{reg, rotated_imm, rotated_value, Instruction, Register};
pub use encoder::{materialize, Arm};
