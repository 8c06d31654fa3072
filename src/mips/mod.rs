//! MIPS64 Release 6 backend with MSA.
//!
//! Instruction words are emitted in the byte order chosen at construction.
//! Every branch is followed by a `nop` in its delay slot. Compare-and-branch
//! conditions other than equality go through `slt`/`sltu` into `$at`.
//!
//! ## Register mapping (n64)
//!
//! - **$a0-$a7, $t0-$t3, $s0, $s1**: `Reax`..`Reg14`, in portable order
//! - **$at**: scratch for immediates, addresses and comparisons
//! - **$t8**: scratch for memory sources and compare immediates
//! - **$w0-$w15**: `Xmm0`..`XmmF` in 128X1; `Xmm<k>` is `$w2k:$w2k+1` in 256X2
//! - **$w31**: scratch for packed memory sources
//!
//! Scalar ops use the FPU view `$f<n>` of the low lane of `$w<n>`.

pub mod instruction;
pub mod encoder;


pub use instruction::{reg, Instruction, Register};
pub use encoder::{materialize, Mips};
