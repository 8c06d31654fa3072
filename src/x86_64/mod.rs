//! x86-64 backend.
//!
//! Emits variable-length byte sequences. The SIMD mode picks the vector
//! encoding:
//!
//! - **128X1**: legacy SSE (`0F` opcodes, REX where needed)
//! - **256X1**: AVX with the 2- or 3-byte VEX prefix
//! - **512X1**: AVX-512F with the EVEX prefix and disp8*64 compression
//!
//! Scalar single-precision ops always use the SSE `F3 0F` forms.
//!
//! ## Register mapping (System V AMD64)
//!
//! | portable | native | portable | native |
//! |----------|--------|----------|--------|
//! | `Reax`   | RAX    | `Reg08`  | R8     |
//! | `Recx`   | RCX    | `Reg09`  | R9     |
//! | `Redx`   | RDX    | `Reg10`  | R10    |
//! | `Rebx`   | RBX    | `Reg11`  | R11    |
//! | `Rebp`   | RBP    | `Reg12`  | R12    |
//! | `Resi`   | RSI    | `Reg13`  | R13    |
//! | `Redi`   | RDI    | `Reg14`  | R14    |
//!
//! RSP and R15 are never allocated. `Xmm0`..`XmmF` are XMM/YMM/ZMM 0-15.
//!
//! ```rust
//! use portasm::x86_64::X86_64;
//! use portasm::operand::Reg::*;
//! use portasm::{Assembler, SimdMode};
//!
//! let mut asm = Assembler::new(X86_64::new(SimdMode::X128X1).unwrap());
//! asm.addzx_rr(Reax, Recx).unwrap().retxx().unwrap();
//! assert_eq!(asm.bytes().unwrap(), [0x48, 0x01, 0xC8, 0xC3]);
//! ```

pub mod instruction;
pub mod encoder;


pub use instruction::{reg, Instruction, Register};
pub use encoder::X86_64;
