#![cfg_attr(not(feature = "std"), no_std)]

//! # Portable SIMD Assembler
//!
//! Write assembly once against a portable instruction set and encode it
//! bit-exactly for several target architectures and SIMD widths.
//!
//! ## Features
//!
//! - **Multi-architecture**: x86-64, AArch64, AArch32 (ARM), MIPS64r6, POWER (64-bit)
//! - **Multi-width SIMD**: 128, 256 and 512-bit packed single precision, plus scalar ops
//! - **Host-independent**: any host can generate code for any target
//! - **No-std compatible**: works in both `std` and `no_std` environments
//! - **Labels**: forward and backward branches resolved at `finish()`
//!
//! ## Naming
//!
//! Mnemonics follow `<op><size>_<form>`:
//!
//! | size | meaning               | form  | operands          |
//! |------|-----------------------|-------|-------------------|
//! | `wx` | 32-bit integer        | `_ri` | register, imm     |
//! | `zx` | 64-bit integer        | `_rr` | register, register|
//! | `ps` | packed f32 arithmetic | `_ld` | register, memory  |
//! | `px` | packed bitwise / move | `_st` | memory store      |
//! | `rs` | scalar f32            | `_lb` | label             |
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "aarch64")] {
//! use portasm::aarch64::Aarch64;
//! use portasm::operand::{Reg::*, Xmm::*, Mem, Cond, Label};
//! use portasm::{Assembler, SimdMode};
//!
//! let mut asm = Assembler::new(Aarch64::new(SimdMode::X128X1).unwrap());
//! let top = Label::new(0);
//! asm.movzx_ri(Recx, 0).unwrap();
//! asm.bind(top).unwrap();
//! asm.movpx_ld(Xmm0, Mem::new(Reax, 0)).unwrap()
//!     .addps_ld(Xmm0, Mem::new(Rebx, 0)).unwrap()
//!     .movpx_st(Xmm0, Mem::new(Reax, 0)).unwrap()
//!     .addzx_ri(Recx, 1).unwrap()
//!     .cmjzx_ri(Recx, 16, Cond::Ltu, top).unwrap()
//!     .retxx().unwrap();
//!
//! let code = asm.bytes().unwrap();
//! assert_eq!(code.len() % 4, 0);
//! # }
//! ```

#[cfg(not(feature = "std"))]
extern crate alloc;

// Shared traits, containers and errors
pub mod common;

// Portable instruction model
pub mod operand;
pub mod op;
pub mod target;
pub mod emit;
pub mod backend;
pub mod assembler;
pub mod macros;

#[cfg(all(test, feature = "std"))]
mod testing;

// Architecture backends
#[cfg(feature = "x86_64")]
pub mod x86_64;

#[cfg(feature = "aarch64")]
pub mod aarch64;

#[cfg(feature = "arm")]
pub mod arm;

#[cfg(feature = "mips")]
pub mod mips;

#[cfg(feature = "power")]
pub mod power;

pub use assembler::Assembler;
pub use backend::Backend;
pub use common::{BuildError, BuildResult, InstructionCollection};
pub use target::{Endian, Isa, SimdMode, Target};

/// Backend for the architecture this crate is compiled for.
#[cfg(all(feature = "x86_64", target_arch = "x86_64"))]
pub type HostBackend = x86_64::X86_64;

/// Backend for the architecture this crate is compiled for.
#[cfg(all(feature = "aarch64", target_arch = "aarch64"))]
pub type HostBackend = aarch64::Aarch64;

/// Backend for the architecture this crate is compiled for.
#[cfg(all(feature = "arm", target_arch = "arm"))]
pub type HostBackend = arm::Arm;

/// Backend for the architecture this crate is compiled for.
#[cfg(all(feature = "mips", any(target_arch = "mips64", target_arch = "mips64r6")))]
pub type HostBackend = mips::Mips;

/// Backend for the architecture this crate is compiled for.
#[cfg(all(feature = "power", target_arch = "powerpc64"))]
pub type HostBackend = power::Power;
