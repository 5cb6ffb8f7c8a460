use std::fmt;

use color_print::cformat;

use crate::reg::{Reg, SysReg};

/// Addressing mode tag. An ordered list of these is the operand shape that,
/// together with the mnemonic, selects exactly one table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// `#imm`
    Imm,
    /// `Rn`
    Reg,
    /// `@Rn`
    Ind,
    /// `@-Rn`
    PreDec,
    /// `@Rn+`
    PostInc,
    /// `@(disp,Rn)`
    DispReg,
    /// `@(disp,GBR)`
    DispGbr,
    /// `@(R0,GBR)`
    R0Gbr,
    /// `@(disp,PC)`
    DispPc,
    /// `@(R0,Rn)`
    R0Reg,
    Sys(SysReg),
    Label,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Imm => write!(f, "#imm"),
            Mode::Reg => write!(f, "Rn"),
            Mode::Ind => write!(f, "@Rn"),
            Mode::PreDec => write!(f, "@-Rn"),
            Mode::PostInc => write!(f, "@Rn+"),
            Mode::DispReg => write!(f, "@(disp,Rn)"),
            Mode::DispGbr => write!(f, "@(disp,GBR)"),
            Mode::R0Gbr => write!(f, "@(R0,GBR)"),
            Mode::DispPc => write!(f, "@(disp,PC)"),
            Mode::R0Reg => write!(f, "@(R0,Rn)"),
            Mode::Sys(reg) => write!(f, "{}", reg),
            Mode::Label => write!(f, "label"),
        }
    }
}

/// Renders a shape as `(Rn, @(disp,GBR))`.
pub fn shape_string(shape: &[Mode]) -> String {
    let modes: Vec<String> = shape.iter().map(|m| m.to_string()).collect();
    format!("({})", modes.join(", "))
}

/// An operand with its payload. Numeric payloads are kept as written;
/// masking to field width happens when the instruction is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Imm(i64),
    Reg(Reg),
    Ind(Reg),
    PreDec(Reg),
    PostInc(Reg),
    DispReg(i64, Reg),
    DispGbr(i64),
    R0Gbr,
    DispPc(i64),
    R0Reg(Reg),
    Sys(SysReg),
    Label(String),
}

impl Operand {
    pub fn mode(&self) -> Mode {
        match self {
            Operand::Imm(_) => Mode::Imm,
            Operand::Reg(_) => Mode::Reg,
            Operand::Ind(_) => Mode::Ind,
            Operand::PreDec(_) => Mode::PreDec,
            Operand::PostInc(_) => Mode::PostInc,
            Operand::DispReg(_, _) => Mode::DispReg,
            Operand::DispGbr(_) => Mode::DispGbr,
            Operand::R0Gbr => Mode::R0Gbr,
            Operand::DispPc(_) => Mode::DispPc,
            Operand::R0Reg(_) => Mode::R0Reg,
            Operand::Sys(reg) => Mode::Sys(*reg),
            Operand::Label(_) => Mode::Label,
        }
    }

    /// General register carried by the operand, if any.
    pub fn reg(&self) -> Option<Reg> {
        match self {
            Operand::Reg(r)
            | Operand::Ind(r)
            | Operand::PreDec(r)
            | Operand::PostInc(r)
            | Operand::DispReg(_, r)
            | Operand::R0Reg(r) => Some(*r),
            _ => None,
        }
    }

    pub fn disp(&self) -> Option<i64> {
        match self {
            Operand::DispReg(d, _) | Operand::DispGbr(d) | Operand::DispPc(d) => Some(*d),
            _ => None,
        }
    }

    pub fn imm(&self) -> Option<i64> {
        match self {
            Operand::Imm(v) => Some(*v),
            _ => None,
        }
    }

    pub fn cformat(&self) -> String {
        match self {
            Operand::Imm(_) | Operand::DispReg(_, _) | Operand::DispGbr(_) | Operand::DispPc(_) => {
                cformat!("<yellow>{}</>", self)
            }
            Operand::Label(_) => cformat!("<green>{}</>", self),
            _ => cformat!("<blue>{}</>", self),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(v) => write!(f, "#{}", v),
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Ind(r) => write!(f, "@{}", r),
            Operand::PreDec(r) => write!(f, "@-{}", r),
            Operand::PostInc(r) => write!(f, "@{}+", r),
            Operand::DispReg(d, r) => write!(f, "@({}, {})", d, r),
            Operand::DispGbr(d) => write!(f, "@({}, GBR)", d),
            Operand::R0Gbr => write!(f, "@(R0, GBR)"),
            Operand::DispPc(d) => write!(f, "@({}, PC)", d),
            Operand::R0Reg(r) => write!(f, "@(R0, {})", r),
            Operand::Sys(reg) => write!(f, "{}", reg),
            Operand::Label(name) => write!(f, "{}", name),
        }
    }
}
