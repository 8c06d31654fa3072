//! AArch64 backend.
//!
//! All instructions are 32-bit little-endian words. Packed ops use NEON
//! `.4s` arithmetic and `.16b` logic; in 256X2 mode every logical SIMD
//! register is a pair of Q registers and each op is issued once per half.
//!
//! ## Register mapping (AAPCS64)
//!
//! - **X0-X13**: `Reax`..`Reg14`, in portable order
//! - **X16**: scratch for immediates and memory sources
//! - **X17**: scratch for out-of-range displacements
//! - **V0-V15**: `Xmm0`..`XmmF` in 128X1; `Xmm<k>` is `V2k:V2k+1` in 256X2
//! - **V31**: scratch for packed memory sources
//!
//! ```rust
//! use portasm::aarch64::Aarch64;
//! use portasm::operand::Reg::*;
//! use portasm::{Assembler, SimdMode};
//!
//! let mut asm = Assembler::new(Aarch64::new(SimdMode::X128X1).unwrap());
//! asm.addzx_rr(Reax, Recx).unwrap().retxx().unwrap();
//! assert_eq!(asm.bytes().unwrap(), [0x00, 0x00, 0x01, 0x8B, 0xC0, 0x03, 0x5F, 0xD6]);
//! ```

pub mod instruction;
pub mod encoder;

#[cfg(test)]
mod tests;

pub use instruction::{reg, Instruction, Register};
pub use encoder::{materialize, Aarch64};
