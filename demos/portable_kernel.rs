//! Portable kernel demo
//!
//! One generic function body is instantiated for every backend and SIMD
//! mode, and the resulting machine code is printed. On an x86-64 or
//! AArch64 host the integer kernel is also mapped and called.

use portasm::aarch64::Aarch64;
use portasm::arm::Arm;
use portasm::mips::Mips;
use portasm::operand::{Cond, Mem, Reg, Reg::*, Xmm::*};
use portasm::power::Power;
use portasm::x86_64::X86_64;
use portasm::{Assembler, Backend, BuildResult, Endian, Isa, SimdMode};

/// `dst[i] = (dst[i] + src[i]) * src[i]` over `Redx` bytes, one SIMD
/// register per iteration. `Reax` is `dst`, `Recx` is `src`.
fn vector_kernel<B: Backend>(asm: &mut Assembler<B>) -> BuildResult<()> {
    let step = asm.target().mode.vector_bytes();
    let top = asm.new_label();
    let done = asm.new_label();

    asm.bind(top)?
        .cmjzx_ri(Redx, 0, Cond::Le, done)?
        .movpx_ld(Xmm0, Mem::base(Reax))?
        .movpx_ld(Xmm1, Mem::base(Recx))?
        .addps_rr(Xmm0, Xmm1)?
        .mulps_ld(Xmm0, Mem::base(Recx))?
        .movpx_st(Xmm0, Mem::base(Reax))?
        .addzx_ri(Reax, step)?
        .addzx_ri(Recx, step)?
        .subzx_ri(Redx, step)?
        .jmpxx_lb(top)?
        .bind(done)?
        .retxx()?;
    Ok(())
}

/// Sum of `1..=n`, taking `n` in `arg` and returning in `Reax`
fn sum_kernel<B: Backend>(asm: &mut Assembler<B>, arg: Reg) -> BuildResult<()> {
    let top = asm.new_label();
    let done = asm.new_label();

    asm.movzx_rr(Recx, arg)?
        .movzx_ri(Reax, 0)?
        .bind(top)?
        .cmjzx_ri(Recx, 0, Cond::Eq, done)?
        .addzx_rr(Reax, Recx)?
        .subzx_ri(Recx, 1)?
        .jmpxx_lb(top)?
        .bind(done)?
        .retxx()?;
    Ok(())
}

fn show<B: Backend>(backend: B) -> BuildResult<()> {
    let mut asm = Assembler::new(backend);
    vector_kernel(&mut asm)?;
    let code = asm.finish()?;
    println!(
        "{:<16} {:>3} instructions, {:>4} bytes",
        asm.target().to_string(),
        code.len(),
        code.total_size()
    );
    let bytes = code.to_bytes();
    for chunk in bytes.chunks(16) {
        let line: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        println!("    {}", line.join(" "));
    }
    Ok(())
}

fn run_on_host() -> Result<(), Box<dyn std::error::Error>> {
    if Isa::X86_64.is_host() {
        let mut asm = Assembler::new(X86_64::new(SimdMode::X128X1)?);
        // SysV: first argument in rdi
        sum_kernel(&mut asm, Redi)?;
        let func = unsafe { asm.function::<fn(u64) -> u64>()? };
        println!("x86_64 host: sum(1..=100) = {}", func.call(100));
    } else if Isa::Aarch64.is_host() {
        let mut asm = Assembler::new(Aarch64::new(SimdMode::X128X1)?);
        sum_kernel(&mut asm, Reax)?;
        let func = unsafe { asm.function::<fn(u64) -> u64>()? };
        println!("aarch64 host: sum(1..=100) = {}", func.call(100));
    } else {
        println!("host is not x86-64 or AArch64, skipping execution");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Portable Kernel Demo ===\n");

    show(X86_64::new(SimdMode::X128X1)?)?;
    show(X86_64::new(SimdMode::X256X1)?)?;
    show(X86_64::new(SimdMode::X512X1)?)?;
    show(Aarch64::new(SimdMode::X128X1)?)?;
    show(Aarch64::new(SimdMode::X256X2)?)?;
    show(Arm::new(SimdMode::X128X1)?)?;
    show(Mips::new(SimdMode::X128X1, Endian::Little)?)?;
    show(Mips::new(SimdMode::X256X2, Endian::Big)?)?;
    show(Power::new(SimdMode::X128X1, Endian::Little)?)?;
    show(Power::new(SimdMode::X256X2, Endian::Big)?)?;

    // AArch32 only encodes 128X1
    match Arm::new(SimdMode::X256X2) {
        Ok(_) => println!("unexpected: AArch32 accepted 256X2"),
        Err(e) => println!("\nAArch32 256X2: {}", e),
    }

    println!();
    run_on_host()
}
