//! Macro interface over `Assembler`.

/// Assemble a block of portable mnemonics for one backend.
///
/// Each statement is a method call on a fresh `Assembler`; the first error
/// stops the block. Labels are resolved before returning.
///
/// ```rust
/// # #[cfg(feature = "x86_64")] {
/// use portasm::x86_64::X86_64;
/// use portasm::operand::Reg::*;
/// use portasm::SimdMode;
///
/// let code = portasm::asm_block! {
///     X86_64::new(SimdMode::X128X1).unwrap();
///     addzx_rr(Reax, Recx);
///     retxx();
/// }
/// .unwrap();
/// assert_eq!(code.to_bytes(), [0x48, 0x01, 0xC8, 0xC3]);
/// # }
/// ```
#[macro_export]
macro_rules! asm_block {
    ($backend:expr; $($method:ident($($args:expr),* $(,)?);)*) => {{
        (|| -> $crate::BuildResult<_> {
            let mut asm = $crate::Assembler::new($backend);
            $(asm.$method($($args),*)?;)*
            asm.finish()
        })()
    }};
}
