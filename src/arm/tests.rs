use crate::arm::{materialize, reg, rotated_imm, rotated_value, Arm, Instruction};
use crate::common::{BuildError, BuildResult, Register as _};
use crate::operand::{Cond, Label, Mem, Reg::*, Xmm::*};
use crate::{Assembler, SimdMode};

fn arm(build: impl FnOnce(&mut Assembler<Arm>) -> BuildResult<()>) -> Vec<u32> {
    let mut asm = Assembler::new(Arm::new(SimdMode::X128X1).unwrap());
    build(&mut asm).unwrap();
    asm.finish().unwrap().iter().map(|instr| instr.value()).collect()
}

#[cfg(feature = "std")]
fn compare_gnu(words: &[u32], assembly: &str) {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    crate::testing::compare(
        "arm-linux-gnueabihf",
        &["-march=armv7-a", "-mfpu=neon"],
        &bytes,
        &format!(".syntax unified\n.arm\n{}", assembly),
    );
}

#[test]
fn test_register_classes() {
    assert!(reg::R0.is_caller_saved());
    assert!(reg::R4.is_callee_saved());
    assert!(reg::R12.is_caller_saved());
    assert!(reg::LR.is_special());
}

#[test]
fn test_only_128_bit_mode() {
    assert!(Arm::new(SimdMode::X128X1).is_ok());
    assert_eq!(
        Arm::new(SimdMode::X256X2),
        Err(BuildError::UnsupportedMode { width: 256, factor: 2 })
    );
}

#[test]
fn test_register_limits() {
    let mut asm = Assembler::new(Arm::new(SimdMode::X128X1).unwrap());
    assert_eq!(asm.movwx_rr(Reg12, Reax).err(), Some(BuildError::InvalidRegister(11)));
    assert_eq!(asm.addps_rr(Xmm7, Xmm0).err(), Some(BuildError::InvalidRegister(7)));
    assert_eq!(asm.shlzx_ri(Reax, 40).err(), Some(BuildError::InvalidImmediate(40)));
    assert!(asm.is_empty());
}

#[test]
fn test_rotated_immediates() {
    assert_eq!(rotated_imm(0xFF), Some(0x0FF));
    assert_eq!(rotated_imm(0xFF000), Some(0xAFF));
    assert_eq!(rotated_imm(0xF000_000F), Some(0x2FF));
    assert_eq!(rotated_imm(0x101), None);
    assert_eq!(rotated_value(0xAFF), 0xFF000);
}

#[test]
fn test_immediate_moves() {
    assert_eq!(arm(|a| { a.movwx_ri(Reax, 5)?; Ok(()) }), [0xE3A00005]);
    assert_eq!(arm(|a| { a.movwx_ri(Reax, -1)?; Ok(()) }), [0xE3E00000]);
    assert_eq!(arm(|a| { a.movwx_ri(Reax, 0xFF000)?; Ok(()) }), [0xE3A00AFF]);
    assert_eq!(arm(|a| { a.movzx_ri(Recx, 0x12345)?; Ok(()) }), [0xE3021345, 0xE3401001]);
}

#[test]
fn test_immediate_fallbacks() {
    assert_eq!(arm(|a| { a.addwx_ri(Reax, 1)?; Ok(()) }), [0xE2800001]);
    assert_eq!(arm(|a| { a.addwx_ri(Reax, -1)?; Ok(()) }), [0xE2400001]);
    assert_eq!(arm(|a| { a.andwx_ri(Recx, -256)?; Ok(()) }), [0xE3C110FF]);
    assert_eq!(
        arm(|a| { a.orrwx_ri(Reax, 0x12345)?; Ok(()) }),
        [0xE302C345, 0xE340C001, 0xE180000C]
    );
}

#[test]
fn test_register_alu() {
    assert_eq!(arm(|a| { a.addwx_rr(Reax, Recx)?; Ok(()) }), [0xE0800001]);
    assert_eq!(arm(|a| { a.subzx_rr(Redx, Rebx)?; Ok(()) }), [0xE0422003]);
    assert_eq!(arm(|a| { a.xorwx_rr(Reax, Reax)?; Ok(()) }), [0xE0200000]);
    assert_eq!(arm(|a| { a.mulwx_rr(Reax, Recx)?; Ok(()) }), [0xE0000190]);
}

#[test]
fn test_shifts() {
    assert_eq!(arm(|a| { a.shlwx_ri(Reax, 4)?; Ok(()) }), [0xE1A00200]);
    assert_eq!(arm(|a| { a.shrwx_ri(Recx, 1)?; Ok(()) }), [0xE1A010A1]);
    assert_eq!(arm(|a| { a.shnwx_ri(Redx, 31)?; Ok(()) }), [0xE1A02FC2]);
    // LSR #0 is not encodable, a zero shift is a plain move
    assert_eq!(arm(|a| { a.shrwx_ri(Reax, 0)?; Ok(()) }), [0xE1A00000]);
}

#[test]
fn test_memory_forms() {
    assert_eq!(arm(|a| { a.movwx_ld(Reax, Mem::new(Recx, 8))?; Ok(()) }), [0xE5910008]);
    assert_eq!(arm(|a| { a.movwx_ld(Reax, Mem::new(Recx, -4))?; Ok(()) }), [0xE5110004]);
    assert_eq!(
        arm(|a| { a.movwx_st(Redx, Mem::new(Rebx, 0x2000))?; Ok(()) }),
        [0xE3A0CA02, 0xE783200C]
    );
}

#[test]
fn test_packed() {
    assert_eq!(arm(|a| { a.addps_rr(Xmm0, Xmm1)?; Ok(()) }), [0xF2000D42]);
    assert_eq!(arm(|a| { a.movpx_rr(Xmm1, Xmm2)?; Ok(()) }), [0xF2242154]);
    assert_eq!(
        arm(|a| { a.movpx_ld(Xmm1, Mem::new(Reax, 16))?; Ok(()) }),
        [0xED902B04, 0xED903B06]
    );
    assert_eq!(
        arm(|a| { a.mulps_ld(Xmm2, Mem::base(Rebx))?; Ok(()) }),
        [0xED93EB00, 0xED93FB02, 0xF3044D5E]
    );
    assert_eq!(
        arm(|a| { a.movpx_st(Xmm0, Mem::new(Reax, 2000))?; Ok(()) }),
        [0xE3A0CE7D, 0xE08CC000, 0xED8C0B00, 0xED8C1B02]
    );
}

#[test]
fn test_packed_divide_per_lane() {
    assert_eq!(
        arm(|a| { a.divps_rr(Xmm1, Xmm2)?; Ok(()) }),
        [0xEE822A04, 0xEEC22AA4, 0xEE833A05, 0xEEC33AA5]
    );
}

#[test]
fn test_scalar() {
    assert_eq!(arm(|a| { a.addrs_rr(Xmm1, Xmm2)?; Ok(()) }), [0xEE322A04]);
    assert_eq!(arm(|a| { a.movrs_ld(Xmm0, Mem::new(Recx, 4))?; Ok(()) }), [0xED910A01]);
    assert_eq!(arm(|a| { a.movrs_rr(Xmm0, Xmm1)?; Ok(()) }), [0xEEB00A42]);
}

#[test]
fn test_vfp_displacement_near_limit() {
    // mvn r12, #0x80000003; add r12, r12, r0
    assert_eq!(
        arm(|a| { a.movrs_ld(Xmm0, Mem::new(Reax, 0x7FFF_FFFC))?; Ok(()) }),
        [0xE3E0C10E, 0xE08CC000, 0xED9C0A00]
    );
    assert_eq!(
        arm(|a| { a.movpx_st(Xmm0, Mem::new(Reax, 0x7FFF_FFFC))?; Ok(()) }),
        [0xE3E0C10E, 0xE08CC000, 0xED8C0B00, 0xED8C1B02]
    );
    assert_eq!(
        arm(|a| { a.movrs_ld(Xmm0, Mem::new(Reax, 1020))?; Ok(()) }),
        [0xED900AFF]
    );
}

#[test]
fn test_branches() {
    let code = arm(|a| {
        let top = a.new_label();
        a.bind(top)?
            .subwx_ri(Reax, 1)?
            .cmjwx_ri(Reax, 0, Cond::Gt, top)?
            .retxx()?;
        Ok(())
    });
    assert_eq!(code, [0xE2400001, 0xE3500000, 0xCAFFFFFC, 0xE12FFF1E]);

    let code = arm(|a| {
        let out = Label::new(0);
        a.jmpxx_lb(out)?.bind(out)?.cmjwx_ri(Reax, -1, Cond::Eq, out)?;
        Ok(())
    });
    assert_eq!(code, [0xEAFFFFFF, 0xE3700001, 0x0AFFFFFD]);
}

#[cfg(feature = "std")]
#[test]
fn test_binary_correctness() {
    let code = arm(|a| {
        a.movwx_ri(Reax, 5)?
            .movwx_ri(Reax, -1)?
            .movwx_ri(Recx, 0x12345)?
            .addwx_ri(Reax, -1)?
            .andwx_ri(Recx, -256)?
            .mulwx_rr(Reax, Recx)?
            .shlwx_ri(Reax, 4)?
            .shnwx_ri(Redx, 31)?
            .movwx_ld(Reax, Mem::new(Recx, -4))?
            .addps_rr(Xmm0, Xmm1)?
            .mulps_ld(Xmm2, Mem::base(Rebx))?
            .movrs_rr(Xmm0, Xmm1)?
            .movrs_ld(Xmm0, Mem::new(Recx, 4))?
            .retxx()?;
        Ok(())
    });
    compare_gnu(
        &code,
        "mov r0, #5
         mvn r0, #0
         movw r1, #0x2345
         movt r1, #1
         sub r0, r0, #1
         bic r1, r1, #0xff
         mul r0, r0, r1
         lsl r0, r0, #4
         asr r2, r2, #31
         ldr r0, [r1, #-4]
         vadd.f32 q0, q0, q1
         vldr d14, [r3]
         vldr d15, [r3, #8]
         vmul.f32 q2, q2, q7
         vmov.f32 s0, s4
         vldr s0, [r1, #4]
         bx lr",
    );

    let code = arm(|a| { a.divps_rr(Xmm1, Xmm2)?; Ok(()) });
    compare_gnu(
        &code,
        "vdiv.f32 s4, s4, s8
         vdiv.f32 s5, s5, s9
         vdiv.f32 s6, s6, s10
         vdiv.f32 s7, s7, s11",
    );
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    /// Evaluate a MOV/MVN/MOVW/MOVT sequence
    fn evaluate(seq: &[Instruction]) -> u32 {
        let mut r: u32 = 0;
        for instr in seq {
            let word = instr.value();
            let imm16 = (word >> 4) & 0xF000 | word & 0xFFF;
            r = match word & 0x0FF0_0000 {
                0x03A0_0000 => rotated_value(word & 0xFFF),
                0x03E0_0000 => !rotated_value(word & 0xFFF),
                0x0300_0000 => imm16,
                0x0340_0000 => (r & 0xFFFF) | imm16 << 16,
                other => panic!("unexpected instruction {:#x}", other),
            };
        }
        r
    }

    proptest! {
        #[test]
        fn rotated_immediate_round_trips(value in any::<u32>()) {
            if let Some(field) = rotated_imm(value) {
                prop_assert!(field < 0x1000);
                prop_assert_eq!(rotated_value(field), value);
            }
        }

        #[test]
        fn every_rotated_byte_is_encodable(imm8 in 0u32..256, rot in 0u32..16) {
            let value = imm8.rotate_right(2 * rot);
            prop_assert!(rotated_imm(value).is_some());
        }

        #[test]
        fn materialize_reproduces_value(imm in any::<i32>()) {
            let seq = materialize(reg::R12, imm);
            prop_assert!(seq.len() <= 2);
            prop_assert_eq!(evaluate(&seq), imm as u32);
        }
    }
}
