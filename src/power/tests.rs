use crate::common::{BuildError, BuildResult, Register as _};
use crate::operand::{Cond, Label, Mem, Reg::*, Xmm::*};
use crate::power::{materialize, reg, Instruction, Power};
use crate::{Assembler, Endian, SimdMode};

fn assemble(mode: SimdMode, build: impl FnOnce(&mut Assembler<Power>) -> BuildResult<()>) -> Vec<u32> {
    let mut asm = Assembler::new(Power::new(mode, Endian::Little).unwrap());
    build(&mut asm).unwrap();
    asm.finish().unwrap().iter().map(|instr| instr.value()).collect()
}

fn vsx(build: impl FnOnce(&mut Assembler<Power>) -> BuildResult<()>) -> Vec<u32> {
    assemble(SimdMode::X128X1, build)
}

fn pairs(build: impl FnOnce(&mut Assembler<Power>) -> BuildResult<()>) -> Vec<u32> {
    assemble(SimdMode::X256X2, build)
}

#[cfg(feature = "std")]
fn compare_gnu(words: &[u32], assembly: &str) {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    crate::testing::compare("powerpc64le-linux-gnu", &["-mpower8"], &bytes, assembly);
}

#[test]
fn test_register_classes() {
    assert!(reg::R0.is_caller_saved());
    assert!(reg::R3.is_caller_saved());
    assert!(reg::R14.is_callee_saved());
    assert!(reg::SP.is_special());
    assert!(reg::TOC.is_special());
}

#[test]
fn test_word_byte_order() {
    for (endian, expected) in [
        (Endian::Little, [0x05, 0x00, 0x60, 0x38]),
        (Endian::Big, [0x38, 0x60, 0x00, 0x05]),
    ] {
        let mut asm = Assembler::new(Power::new(SimdMode::X128X1, endian).unwrap());
        asm.movzx_ri(Reax, 5).unwrap();
        assert_eq!(asm.bytes().unwrap(), expected);
    }
}

#[test]
fn test_unsupported_modes() {
    assert_eq!(
        Power::new(SimdMode::X256X1, Endian::Big),
        Err(BuildError::UnsupportedMode { width: 256, factor: 1 })
    );
}

#[test]
fn test_immediate_moves() {
    assert_eq!(vsx(|a| { a.movzx_ri(Reax, 5)?; Ok(()) }), [0x38600005]);
    assert_eq!(vsx(|a| { a.movzx_ri(Reax, -1)?; Ok(()) }), [0x3860FFFF]);
    assert_eq!(vsx(|a| { a.movzx_ri(Recx, 0x12345)?; Ok(()) }), [0x3C800001, 0x60842345]);
    assert_eq!(vsx(|a| { a.movzx_ri(Reax, 0x10000)?; Ok(()) }), [0x3C600001]);
    assert_eq!(vsx(|a| { a.movwx_ri(Reax, 0xFFFF)?; Ok(()) }), [0x3C600000, 0x6063FFFF]);
}

#[test]
fn test_immediate_alu() {
    assert_eq!(vsx(|a| { a.addzx_ri(Reax, 1)?; Ok(()) }), [0x38630001]);
    assert_eq!(vsx(|a| { a.subzx_ri(Recx, 8)?; Ok(()) }), [0x3884FFF8]);
    assert_eq!(vsx(|a| { a.mulzx_ri(Reax, 10)?; Ok(()) }), [0x1C63000A]);
    assert_eq!(vsx(|a| { a.andzx_ri(Reax, 0xFF)?; Ok(()) }), [0x706300FF]);
    assert_eq!(vsx(|a| { a.andzx_ri(Reax, -256)?; Ok(()) }), [0x3800FF00, 0x7C630038]);
}

#[test]
fn test_register_alu() {
    assert_eq!(vsx(|a| { a.addzx_rr(Reax, Recx)?; Ok(()) }), [0x7C632214]);
    assert_eq!(vsx(|a| { a.subzx_rr(Redx, Rebx)?; Ok(()) }), [0x7CA62850]);
    assert_eq!(vsx(|a| { a.xorzx_rr(Reax, Reax)?; Ok(()) }), [0x7C631A78]);
    assert_eq!(vsx(|a| { a.mulzx_rr(Reax, Recx)?; Ok(()) }), [0x7C6321D2]);
    assert_eq!(vsx(|a| { a.mulwx_rr(Reax, Recx)?; Ok(()) }), [0x7C6321D6]);
    assert_eq!(vsx(|a| { a.movzx_rr(Reax, Recx)?; Ok(()) }), [0x7C832378]);
}

#[test]
fn test_shifts() {
    assert_eq!(vsx(|a| { a.shlzx_ri(Reax, 4)?; Ok(()) }), [0x786326E4]);
    assert_eq!(vsx(|a| { a.shrzx_ri(Reax, 40)?; Ok(()) }), [0x7863C220]);
    assert_eq!(vsx(|a| { a.shnzx_ri(Reax, 3)?; Ok(()) }), [0x7C631E74]);
    assert_eq!(vsx(|a| { a.shlwx_ri(Reax, 4)?; Ok(()) }), [0x54632036]);
    assert_eq!(vsx(|a| { a.shrwx_ri(Recx, 1)?; Ok(()) }), [0x5484F87E]);
    assert_eq!(vsx(|a| { a.shnwx_ri(Recx, 31)?; Ok(()) }), [0x7C84FE70]);
}

#[test]
fn test_memory_forms() {
    assert_eq!(vsx(|a| { a.movzx_ld(Reax, Mem::new(Recx, 8))?; Ok(()) }), [0xE8640008]);
    assert_eq!(vsx(|a| { a.movwx_ld(Reax, Mem::new(Recx, -4))?; Ok(()) }), [0x8064FFFC]);
    assert_eq!(vsx(|a| { a.movwx_st(Redx, Mem::new(Rebx, 4))?; Ok(()) }), [0x90A60004]);
    // DS-form needs a multiple of four
    assert_eq!(
        vsx(|a| { a.movzx_ld(Reax, Mem::new(Recx, 6))?; Ok(()) }),
        [0x38000006, 0x7C64002A]
    );
    assert_eq!(
        vsx(|a| { a.movzx_st(Redx, Mem::new(Rebx, 0x10000))?; Ok(()) }),
        [0x3C000001, 0x7CA6012A]
    );
    assert_eq!(
        vsx(|a| { a.addzx_ld(Reax, Mem::new(Rebx, 16))?; Ok(()) }),
        [0xE8060010, 0x7C630214]
    );
}

#[test]
fn test_packed_128() {
    assert_eq!(vsx(|a| { a.addps_rr(Xmm0, Xmm1)?; Ok(()) }), [0xF0000A00]);
    assert_eq!(vsx(|a| { a.movpx_rr(Xmm1, Xmm2)?; Ok(()) }), [0xF0221490]);
    assert_eq!(vsx(|a| { a.xorpx_rr(Xmm3, Xmm3)?; Ok(()) }), [0xF0631CD0]);
    assert_eq!(vsx(|a| { a.divps_rr(Xmm1, Xmm2)?; Ok(()) }), [0xF02112C0]);
    assert_eq!(vsx(|a| { a.movpx_ld(Xmm1, Mem::base(Reax))?; Ok(()) }), [0x7C201E18]);
    assert_eq!(
        vsx(|a| { a.movpx_ld(Xmm1, Mem::new(Reax, 16))?; Ok(()) }),
        [0x38000010, 0x7C230618]
    );
    assert_eq!(
        vsx(|a| { a.mulps_ld(Xmm2, Mem::base(Rebx))?; Ok(()) }),
        [0x7FE03618, 0xF042FA80]
    );
    assert_eq!(vsx(|a| { a.movpx_st(Xmm0, Mem::base(Reax))?; Ok(()) }), [0x7C001F18]);
}

#[test]
fn test_packed_256_pairs() {
    assert_eq!(pairs(|a| { a.addps_rr(Xmm1, Xmm2)?; Ok(()) }), [0xF0422200, 0xF0632A00]);
    assert_eq!(
        pairs(|a| { a.movpx_st(Xmm0, Mem::base(Reax))?; Ok(()) }),
        [0x7C001F18, 0x38000010, 0x7C230718]
    );

    let mut asm = Assembler::new(Power::new(SimdMode::X256X2, Endian::Little).unwrap());
    assert_eq!(asm.movpx_rr(XmmA, Xmm0).err(), Some(BuildError::InvalidRegister(10)));
}

#[test]
fn test_scalar() {
    assert_eq!(vsx(|a| { a.addrs_rr(Xmm1, Xmm2)?; Ok(()) }), [0xEC21102A]);
    assert_eq!(vsx(|a| { a.mulrs_rr(Xmm1, Xmm2)?; Ok(()) }), [0xEC2100B2]);
    assert_eq!(vsx(|a| { a.movrs_rr(Xmm0, Xmm1)?; Ok(()) }), [0xFC000890]);
    assert_eq!(vsx(|a| { a.movrs_ld(Xmm0, Mem::new(Recx, 4))?; Ok(()) }), [0xC0040004]);
    assert_eq!(vsx(|a| { a.movrs_st(Xmm1, Mem::new(Reax, 8))?; Ok(()) }), [0xD0230008]);
}

#[test]
fn test_backward_branch() {
    let code = vsx(|a| {
        let top = a.new_label();
        a.bind(top)?
            .subzx_ri(Reax, 1)?
            .cmjzx_ri(Reax, 0, Cond::Gt, top)?
            .retxx()?;
        Ok(())
    });
    assert_eq!(code, [0x3863FFFF, 0x2C230000, 0x4181FFF8, 0x4E800020]);
}

#[test]
fn test_forward_branches() {
    let code = vsx(|a| {
        let out = Label::new(0);
        a.jmpxx_lb(out)?.bind(out)?.cmjwx_ri(Reax, -1, Cond::Eq, out)?;
        Ok(())
    });
    assert_eq!(code, [0x48000004, 0x2C03FFFF, 0x4182FFFC]);

    let code = vsx(|a| {
        let done = a.new_label();
        a.cmjzx_rr(Reax, Recx, Cond::Geu, done)?.bind(done)?;
        Ok(())
    });
    assert_eq!(code, [0x7C232040, 0x40800004]);
}

#[test]
fn test_compare_immediates() {
    let done = Label::new(0);
    // unsigned compares take a zero-extended immediate
    let code = vsx(|a| { a.cmjwx_ri(Reax, 0xFFFF, Cond::Ltu, done)?.bind(done)?; Ok(()) });
    assert_eq!(code[0], 0x2803FFFF);
    let code = vsx(|a| { a.cmjzx_ri(Reax, 0x12345, Cond::Lt, done)?.bind(done)?; Ok(()) });
    assert_eq!(code[..3], [0x3C000001, 0x60002345, 0x7C230000]);
}

#[cfg(feature = "std")]
#[test]
fn test_binary_correctness() {
    let code = vsx(|a| {
        a.movzx_ri(Reax, 5)?
            .movzx_ri(Recx, 0x12345)?
            .addzx_ri(Reax, 1)?
            .mulzx_ri(Reax, 10)?
            .andzx_ri(Reax, -256)?
            .addzx_rr(Reax, Recx)?
            .subzx_rr(Redx, Rebx)?
            .mulwx_rr(Reax, Recx)?
            .movzx_rr(Reax, Recx)?
            .shlzx_ri(Reax, 4)?
            .shrzx_ri(Reax, 40)?
            .shnzx_ri(Reax, 3)?
            .shrwx_ri(Recx, 1)?
            .shnwx_ri(Recx, 31)?
            .movzx_ld(Reax, Mem::new(Recx, 8))?
            .movzx_ld(Reax, Mem::new(Recx, 6))?
            .movwx_st(Redx, Mem::new(Rebx, 4))?
            .addps_rr(Xmm0, Xmm1)?
            .movpx_ld(Xmm1, Mem::new(Reax, 16))?
            .mulps_ld(Xmm2, Mem::base(Rebx))?
            .movpx_st(Xmm0, Mem::base(Reax))?
            .addrs_rr(Xmm1, Xmm2)?
            .mulrs_rr(Xmm1, Xmm2)?
            .movrs_ld(Xmm0, Mem::new(Recx, 4))?
            .retxx()?;
        Ok(())
    });
    compare_gnu(
        &code,
        "li 3, 5
         lis 4, 1
         ori 4, 4, 0x2345
         addi 3, 3, 1
         mulli 3, 3, 10
         li 0, -256
         and 3, 3, 0
         add 3, 3, 4
         subf 5, 6, 5
         mullw 3, 3, 4
         mr 3, 4
         sldi 3, 3, 4
         srdi 3, 3, 40
         sradi 3, 3, 3
         srwi 4, 4, 1
         srawi 4, 4, 31
         ld 3, 8(4)
         li 0, 6
         ldx 3, 4, 0
         stw 5, 4(6)
         xvaddsp 0, 0, 1
         li 0, 16
         lxvw4x 1, 3, 0
         lxvw4x 31, 0, 6
         xvmulsp 2, 2, 31
         stxvw4x 0, 0, 3
         fadds 1, 1, 2
         fmuls 1, 1, 2
         lfs 0, 4(4)
         blr",
    );
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    /// Evaluate an li/lis/ori sequence on a 64-bit register
    fn evaluate(seq: &[Instruction]) -> i64 {
        let mut r: i64 = 0;
        for instr in seq {
            let word = instr.value();
            let imm16 = (word & 0xFFFF) as i64;
            r = match word >> 26 {
                14 => imm16 as i16 as i64,
                15 => ((imm16 as u32) << 16) as i32 as i64,
                24 => r | imm16,
                other => panic!("unexpected opcode {}", other),
            };
        }
        r
    }

    proptest! {
        #[test]
        fn materialize_reproduces_value(imm in any::<i32>()) {
            let seq = materialize(Endian::Little, reg::R0, imm);
            prop_assert!(seq.len() <= 2);
            prop_assert_eq!(evaluate(&seq), imm as i64);
        }
    }
}
