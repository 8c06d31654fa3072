use crate::aarch64::{materialize, reg, Aarch64, Instruction};
use crate::common::{BuildError, BuildResult, Register as _};
use crate::operand::{Cond, Label, Mem, Reg::*, Xmm::*};
use crate::{Assembler, SimdMode};

fn assemble(mode: SimdMode, build: impl FnOnce(&mut Assembler<Aarch64>) -> BuildResult<()>) -> Vec<u32> {
    let mut asm = Assembler::new(Aarch64::new(mode).unwrap());
    build(&mut asm).unwrap();
    asm.finish().unwrap().iter().map(|instr| instr.value()).collect()
}

fn neon(build: impl FnOnce(&mut Assembler<Aarch64>) -> BuildResult<()>) -> Vec<u32> {
    assemble(SimdMode::X128X1, build)
}

fn pairs(build: impl FnOnce(&mut Assembler<Aarch64>) -> BuildResult<()>) -> Vec<u32> {
    assemble(SimdMode::X256X2, build)
}

#[cfg(feature = "std")]
fn compare_gnu(words: &[u32], assembly: &str) {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    crate::testing::compare("aarch64-linux-gnu", &[], &bytes, assembly);
}

#[test]
fn test_register_values() {
    assert_eq!(reg::X0.value(), 0);
    assert_eq!(reg::X16.value(), 16);
    assert_eq!(reg::XZR.value(), 31);
    assert_eq!(reg::LR.value(), 30);
    assert!(reg::X17.is_caller_saved());
    assert!(crate::aarch64::Register::new(19).is_callee_saved());
}

#[test]
fn test_instruction_display() {
    assert_eq!(format!("{}", Instruction::new(0xd65f03c0)), "0xd65f03c0");
}

#[test]
fn test_unsupported_modes() {
    assert_eq!(
        Aarch64::new(SimdMode::X512X1),
        Err(BuildError::UnsupportedMode { width: 512, factor: 1 })
    );
}

#[test]
fn test_immediate_moves() {
    assert_eq!(neon(|a| { a.movzx_ri(Reax, 5)?; Ok(()) }), [0xD28000A0]);
    assert_eq!(neon(|a| { a.movzx_ri(Reax, -1)?; Ok(()) }), [0x92800000]);
    assert_eq!(neon(|a| { a.movzx_ri(Recx, 0x12345)?; Ok(()) }), [0xD28468A1, 0xF2A00021]);
    assert_eq!(neon(|a| { a.movwx_ri(Reax, -2)?; Ok(()) }), [0x12800020]);
}

#[test]
fn test_add_sub_immediates() {
    assert_eq!(neon(|a| { a.addzx_ri(Reax, 1)?; Ok(()) }), [0x91000400]);
    // negative immediates flip the operation
    assert_eq!(neon(|a| { a.addzx_ri(Reax, -8)?; Ok(()) }), [0xD1002000]);
    assert_eq!(neon(|a| { a.addzx_ri(Reax, 0x5000)?; Ok(()) }), [0x91401400]);
    // no direct form: materialise in X16
    assert_eq!(
        neon(|a| { a.addzx_ri(Reax, 0x12345)?; Ok(()) }),
        [0xD28468B0, 0xF2A00030, 0x8B100000]
    );
}

#[test]
fn test_register_alu() {
    assert_eq!(neon(|a| { a.subwx_rr(Recx, Redx)?; Ok(()) }), [0x4B020021]);
    assert_eq!(neon(|a| { a.andzx_ri(Reax, 0xFF)?; Ok(()) }), [0xD2801FF0, 0x8A100000]);
    assert_eq!(neon(|a| { a.xorzx_rr(Reax, Recx)?; Ok(()) }), [0xCA010000]);
    assert_eq!(neon(|a| { a.mulzx_rr(Reax, Recx)?; Ok(()) }), [0x9B017C00]);
    assert_eq!(neon(|a| { a.movzx_rr(Redx, Rebx)?; Ok(()) }), [0xAA0303E2]);
}

#[test]
fn test_shifts() {
    assert_eq!(neon(|a| { a.shlzx_ri(Reax, 3)?; Ok(()) }), [0xD37DF000]);
    assert_eq!(neon(|a| { a.shrzx_ri(Reax, 4)?; Ok(()) }), [0xD344FC00]);
    assert_eq!(neon(|a| { a.shnwx_ri(Recx, 31)?; Ok(()) }), [0x131F7C21]);
}

#[test]
fn test_memory_forms() {
    assert_eq!(neon(|a| { a.movzx_ld(Reax, Mem::new(Recx, 8))?; Ok(()) }), [0xF9400420]);
    assert_eq!(neon(|a| { a.movzx_ld(Reax, Mem::new(Recx, -8))?; Ok(()) }), [0xF85F8020]);
    assert_eq!(
        neon(|a| { a.movzx_ld(Reax, Mem::new(Recx, 0x10000))?; Ok(()) }),
        [0xD2800011, 0xF2A00031, 0xF8716820]
    );
    assert_eq!(neon(|a| { a.movwx_st(Redx, Mem::new(Rebx, 4))?; Ok(()) }), [0xB9000462]);
    // memory source goes through X16
    assert_eq!(
        neon(|a| { a.addzx_ld(Reax, Mem::new(Recx, 8))?; Ok(()) }),
        [0xF9400430, 0x8B100000]
    );
}

#[test]
fn test_packed_128() {
    assert_eq!(neon(|a| { a.addps_rr(Xmm0, Xmm1)?; Ok(()) }), [0x4E21D400]);
    assert_eq!(neon(|a| { a.movpx_rr(Xmm2, Xmm3)?; Ok(()) }), [0x4EA31C62]);
    assert_eq!(neon(|a| { a.movpx_ld(Xmm0, Mem::new(Reax, 32))?; Ok(()) }), [0x3DC00800]);
    assert_eq!(
        neon(|a| { a.mulps_ld(Xmm1, Mem::base(Rebx))?; Ok(()) }),
        [0x3DC0007F, 0x6E3FDC21]
    );
}

#[test]
fn test_packed_256_pairs() {
    assert_eq!(pairs(|a| { a.addps_rr(Xmm1, Xmm2)?; Ok(()) }), [0x4E24D442, 0x4E25D463]);
    assert_eq!(pairs(|a| { a.movpx_st(Xmm0, Mem::base(Reax))?; Ok(()) }), [0x3D800000, 0x3D800401]);
}

#[test]
fn test_pair_mode_has_eight_registers() {
    let mut asm = Assembler::new(Aarch64::new(SimdMode::X256X2).unwrap());
    assert_eq!(asm.addps_rr(Xmm8, Xmm0).err(), Some(BuildError::InvalidRegister(8)));
    assert!(asm.addps_rr(Xmm7, Xmm0).is_ok());
}

#[test]
fn test_scalar() {
    assert_eq!(neon(|a| { a.addrs_rr(Xmm0, Xmm1)?; Ok(()) }), [0x1E212800]);
    assert_eq!(neon(|a| { a.movrs_ld(Xmm2, Mem::new(Resi, 4))?; Ok(()) }), [0xBD4004A2]);
    assert_eq!(neon(|a| { a.movrs_rr(Xmm1, Xmm2)?; Ok(()) }), [0x1E204041]);
}

#[test]
fn test_backward_branch() {
    let code = neon(|a| {
        let top = a.new_label();
        a.bind(top)?
            .subzx_ri(Recx, 1)?
            .cmjzx_ri(Recx, 0, Cond::Ne, top)?
            .retxx()?;
        Ok(())
    });
    assert_eq!(code, [0xD1000421, 0xF100003F, 0x54FFFFC1, 0xD65F03C0]);
}

#[test]
fn test_forward_branch_and_cmn() {
    let code = neon(|a| {
        let out = Label::new(0);
        a.jmpxx_lb(out)?.retxx()?.bind(out)?.cmjwx_ri(Reax, -5, Cond::Lt, out)?;
        Ok(())
    });
    assert_eq!(code, [0x14000002, 0xD65F03C0, 0x3100141F, 0x54000000 | (0x7FFFF << 5) | 0xB]);
}

#[cfg(feature = "std")]
#[test]
fn test_binary_correctness() {
    let code = neon(|a| {
        a.movzx_ri(Recx, 0x12345)?
            .addzx_ri(Reax, 0x5000)?
            .subwx_rr(Recx, Redx)?
            .mulzx_rr(Reax, Recx)?
            .shlzx_ri(Reax, 3)?
            .shnwx_ri(Recx, 31)?
            .movzx_ld(Reax, Mem::new(Recx, -8))?
            .movwx_st(Redx, Mem::new(Rebx, 4))?
            .addps_rr(Xmm0, Xmm1)?
            .mulps_ld(Xmm1, Mem::base(Rebx))?
            .movrs_ld(Xmm2, Mem::new(Resi, 4))?
            .divrs_rr(Xmm2, Xmm3)?
            .retxx()?;
        Ok(())
    });
    compare_gnu(
        &code,
        "movz x1, #0x2345
         movk x1, #0x1, lsl #16
         add x0, x0, #0x5, lsl #12
         sub w1, w1, w2
         mul x0, x0, x1
         lsl x0, x0, #3
         asr w1, w1, #31
         ldur x0, [x1, #-8]
         str w2, [x3, #4]
         fadd v0.4s, v0.4s, v1.4s
         ldr q31, [x3]
         fmul v1.4s, v1.4s, v31.4s
         ldr s2, [x5, #4]
         fdiv s2, s2, s3
         ret",
    );
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    /// Evaluate a MOVZ/MOVN/MOVK sequence
    fn evaluate(seq: &[Instruction], sf: bool) -> u64 {
        let mut x: u64 = 0;
        for instr in seq {
            let word = instr.value();
            let imm = ((word >> 5) & 0xFFFF) as u64;
            let shift = ((word >> 21) & 3) * 16;
            x = match (word >> 29) & 3 {
                0b00 => !(imm << shift),
                0b10 => imm << shift,
                _ => (x & !(0xFFFF << shift)) | imm << shift,
            };
        }
        if sf { x } else { x & 0xFFFF_FFFF }
    }

    proptest! {
        #[test]
        fn materialize_64_reproduces_value(imm in any::<i32>()) {
            let seq = materialize(true, reg::X16, imm);
            prop_assert!(seq.len() <= 2);
            prop_assert_eq!(evaluate(&seq, true), imm as i64 as u64);
        }

        #[test]
        fn materialize_32_reproduces_value(imm in any::<i32>()) {
            let seq = materialize(false, reg::X16, imm);
            prop_assert!(seq.len() <= 2);
            prop_assert_eq!(evaluate(&seq, false), imm as u32 as u64);
        }
    }
}
