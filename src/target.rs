//! Target selection: instruction set, SIMD mode and byte order.

use core::fmt;
use core::str::FromStr;

use crate::common::BuildError;

/// Instruction set architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Isa {
    X86_64,
    Aarch64,
    /// AArch32 (ARMv7-A with NEON and VFPv3)
    Arm,
    /// MIPS64 Release 6 with MSA
    Mips64,
    /// 64-bit POWER with VSX
    Power64,
}

impl Isa {
    /// True when code for this ISA can run on the machine this crate was built for
    pub fn is_host(self) -> bool {
        match self {
            Isa::X86_64 => cfg!(target_arch = "x86_64"),
            Isa::Aarch64 => cfg!(target_arch = "aarch64"),
            Isa::Arm => cfg!(target_arch = "arm"),
            Isa::Mips64 => cfg!(any(target_arch = "mips64", target_arch = "mips64r6")),
            Isa::Power64 => cfg!(target_arch = "powerpc64"),
        }
    }

    /// Byte order used when none is requested explicitly
    pub const fn default_endian(self) -> Endian {
        Endian::Little
    }

    /// True if the ISA can be configured for either byte order
    pub const fn is_bi_endian(self) -> bool {
        matches!(self, Isa::Mips64 | Isa::Power64)
    }

    /// SIMD modes this crate can encode for the ISA
    pub const fn modes(self) -> &'static [SimdMode] {
        match self {
            Isa::X86_64 => &[SimdMode::X128X1, SimdMode::X256X1, SimdMode::X512X1],
            Isa::Aarch64 | Isa::Mips64 | Isa::Power64 => &[SimdMode::X128X1, SimdMode::X256X2],
            Isa::Arm => &[SimdMode::X128X1],
        }
    }

    /// Reject `mode` unless this ISA can encode it
    pub fn check_mode(self, mode: SimdMode) -> Result<(), BuildError> {
        if self.modes().contains(&mode) {
            Ok(())
        } else {
            Err(BuildError::UnsupportedMode { width: mode.width, factor: mode.factor })
        }
    }
}

impl fmt::Display for Isa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Isa::X86_64 => "x86_64",
            Isa::Aarch64 => "aarch64",
            Isa::Arm => "arm",
            Isa::Mips64 => "mips64",
            Isa::Power64 => "ppc64",
        };
        f.write_str(name)
    }
}

/// Byte order of emitted instruction words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn word_bytes(self, word: u32) -> [u8; 4] {
        match self {
            Endian::Little => word.to_le_bytes(),
            Endian::Big => word.to_be_bytes(),
        }
    }
}

/// SIMD configuration: total vector width and how many native registers
/// back one logical register.
///
/// Written as `<width>X<factor>`, e.g. `256X2` is a 256-bit logical
/// register made of two native 128-bit registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimdMode {
    pub width: u16,
    pub factor: u8,
}

impl SimdMode {
    pub const X128X1: SimdMode = SimdMode { width: 128, factor: 1 };
    pub const X256X1: SimdMode = SimdMode { width: 256, factor: 1 };
    pub const X512X1: SimdMode = SimdMode { width: 512, factor: 1 };
    pub const X256X2: SimdMode = SimdMode { width: 256, factor: 2 };

    /// Bytes in one logical SIMD register
    pub const fn vector_bytes(self) -> i32 {
        self.width as i32 / 8
    }

    /// Bytes in one native register of the pair
    pub const fn native_bytes(self) -> i32 {
        self.vector_bytes() / self.factor as i32
    }

    /// Number of f32 lanes in one logical register
    pub const fn lanes(self) -> usize {
        self.width as usize / 32
    }
}

impl Default for SimdMode {
    fn default() -> Self {
        SimdMode::X128X1
    }
}

impl fmt::Display for SimdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}X{}", self.width, self.factor)
    }
}

impl FromStr for SimdMode {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, factor) = s
            .split_once(|c| c == 'X' || c == 'x')
            .ok_or(BuildError::InvalidTarget)?;
        let width: u16 = width.parse().map_err(|_| BuildError::InvalidTarget)?;
        let factor: u8 = factor.parse().map_err(|_| BuildError::InvalidTarget)?;
        if !matches!(width, 128 | 256 | 512) || !matches!(factor, 1 | 2) || width / u16::from(factor) < 128 {
            return Err(BuildError::InvalidTarget);
        }
        Ok(SimdMode { width, factor })
    }
}

/// Complete target description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub isa: Isa,
    pub mode: SimdMode,
    pub endian: Endian,
}

impl Target {
    pub fn new(isa: Isa, mode: SimdMode) -> Result<Self, BuildError> {
        Self::with_endian(isa, mode, isa.default_endian())
    }

    pub fn with_endian(isa: Isa, mode: SimdMode, endian: Endian) -> Result<Self, BuildError> {
        isa.check_mode(mode)?;
        if endian != isa.default_endian() && !isa.is_bi_endian() {
            return Err(BuildError::InvalidTarget);
        }
        Ok(Self { isa, mode, endian })
    }

    /// The machine this crate was compiled for, in its narrowest SIMD mode
    pub fn host() -> Option<Self> {
        let isa = [Isa::X86_64, Isa::Aarch64, Isa::Arm, Isa::Mips64, Isa::Power64]
            .into_iter()
            .find(|isa| isa.is_host())?;
        let endian = if cfg!(target_endian = "big") { Endian::Big } else { Endian::Little };
        Some(Self { isa, mode: SimdMode::X128X1, endian })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match (self.isa, self.endian) {
            (Isa::Mips64, Endian::Little) => "el",
            (Isa::Power64, Endian::Little) => "le",
            _ => "",
        };
        write!(f, "{}{}:{}", self.isa, suffix, self.mode)
    }
}

impl FromStr for Target {
    type Err = BuildError;

    /// Parses `<isa>[:<mode>]`, e.g. `aarch64:256X2`, `mips64el`, `ppc64:128X1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (isa, mode) = match s.split_once(':') {
            Some((isa, mode)) => (isa, mode.parse()?),
            None => (s, SimdMode::default()),
        };
        let (isa, endian) = match isa {
            "x86_64" | "x86-64" | "amd64" => (Isa::X86_64, Endian::Little),
            "aarch64" | "arm64" => (Isa::Aarch64, Endian::Little),
            "arm" | "armv7" => (Isa::Arm, Endian::Little),
            "mips64el" => (Isa::Mips64, Endian::Little),
            "mips64" => (Isa::Mips64, Endian::Big),
            "ppc64le" | "power64le" => (Isa::Power64, Endian::Little),
            "ppc64" | "power64" => (Isa::Power64, Endian::Big),
            _ => return Err(BuildError::InvalidTarget),
        };
        Target::with_endian(isa, mode, endian)
    }
}
