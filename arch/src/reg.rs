use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumString};

/// General purpose register. The discriminant is the 4-bit register field.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Reg {
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Self>().ok()
    }

    /// Register selected by the low 4 bits of `field`.
    pub fn from_field(field: u16) -> Self {
        Reg::try_from((field & 0xF) as u8).unwrap_or(Reg::R0)
    }

    pub fn field(self) -> u16 {
        u8::from(self) as u16
    }
}

/// Control and system registers that appear by name in operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum SysReg {
    SR,
    GBR,
    VBR,
    MACH,
    MACL,
    PR,
    PC,
}

impl SysReg {
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Self>().ok()
    }
}
