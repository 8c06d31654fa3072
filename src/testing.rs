//! Cross-checking encoders against the GNU toolchain.
//!
//! Every helper degrades to a no-op (with a printed warning) when the
//! cross assembler for a target is not installed.

use std::fs;
use std::io::Write;
use std::process::Command;

/// Assemble `assembly` with `<prefix>-as` and return the raw `.text` bytes.
///
/// Returns an empty vector if the toolchain is missing or fails.
pub fn assemble(prefix: &str, as_args: &[&str], assembly: &str) -> Vec<u8> {
    let asm_content = format!(".text\n{}\n", assembly);
    let mut asm_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    asm_file.write_all(asm_content.as_bytes()).expect("Failed to write assembly");
    asm_file.flush().expect("Failed to flush temp file");

    let obj_file = tempfile::NamedTempFile::new().expect("Failed to create temp obj file");
    let assembler = format!("{}-as", prefix);
    let output = Command::new(&assembler)
        .args(as_args)
        .arg("-o")
        .arg(obj_file.path())
        .arg(asm_file.path())
        .output();

    match output {
        Ok(result) if result.status.success() => {}
        Ok(result) => {
            println!(
                "Warning: {} failed, skipping comparison: {}",
                assembler,
                String::from_utf8_lossy(&result.stderr)
            );
            return vec![];
        }
        Err(e) => {
            println!("Warning: {} not available, skipping comparison: {}", assembler, e);
            return vec![];
        }
    }

    let bin_file = tempfile::NamedTempFile::new().expect("Failed to create temp bin file");
    let objcopy = format!("{}-objcopy", prefix);
    let copied = Command::new(&objcopy)
        .arg("-O")
        .arg("binary")
        .arg("--only-section=.text")
        .arg(obj_file.path())
        .arg(bin_file.path())
        .output();

    match copied {
        Ok(result) if result.status.success() => {}
        _ => {
            println!("Warning: {} failed, skipping comparison", objcopy);
            return vec![];
        }
    }

    fs::read(bin_file.path()).unwrap_or_default()
}

/// Assert that `ours` is a prefix-exact match of what GNU as produces for
/// `assembly`. Trailing alignment padding from the object file is ignored.
pub fn compare(prefix: &str, as_args: &[&str], ours: &[u8], assembly: &str) {
    let gnu = assemble(prefix, as_args, assembly);
    if gnu.is_empty() {
        return;
    }

    assert!(
        gnu.len() >= ours.len(),
        "GNU output is shorter than ours\nours: {:02x?}\nGNU:  {:02x?}\nAssembly:\n{}",
        ours,
        gnu,
        assembly
    );
    assert_eq!(
        ours,
        &gnu[..ours.len()],
        "encoding does not match GNU assembler output\nours: {:02x?}\nGNU:  {:02x?}\nAssembly:\n{}",
        ours,
        &gnu[..ours.len()],
        assembly
    );
}
