use thiserror::Error;

use crate::operand::{Mode, Operand};
use crate::reg::Reg;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Value {value} does not fit in a {bits}-bit field")]
    OutOfRange { value: i64, bits: u32 },

    #[error("Branch displacement {disp} does not fit in a signed {bits}-bit field")]
    BranchOutOfRange { disp: i64, bits: u32 },

    #[error("Operand `{0}` must be R0 for this instruction")]
    RequiresR0(Reg),
}

/// Instruction format classes of the SH-1/SH-2 manual (Appendix A).
///
/// `n` is the destination register field, `m` the source register field,
/// `d` a displacement and `i` an immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `xxxx xxxx xxxx xxxx`
    Zero,
    /// `xxxx nnnn xxxx xxxx`
    N,
    /// `xxxx mmmm xxxx xxxx`
    M,
    /// `xxxx nnnn mmmm xxxx`
    NM,
    /// `xxxx xxxx mmmm dddd`, the other operand is R0
    MD,
    /// `xxxx xxxx nnnn dddd`, the other operand is R0
    ND4,
    /// `xxxx nnnn mmmm dddd`
    NMD,
    /// `xxxx xxxx dddd dddd`
    D,
    /// `xxxx dddd dddd dddd`
    D12,
    /// `xxxx nnnn dddd dddd`
    ND8,
    /// `xxxx xxxx iiii iiii`
    I,
    /// `xxxx nnnn iiii iiii`
    NI,
}

impl Format {
    /// Bits fixed by the opcode.
    pub fn mask(self) -> u16 {
        use Format::*;
        match self {
            Zero => 0xFFFF,
            N | M => 0xF0FF,
            NM => 0xF00F,
            MD | ND4 | D | I => 0xFF00,
            NMD | D12 | ND8 | NI => 0xF000,
        }
    }

    /// Formats with no general register field address R0 implicitly.
    pub fn implicit_r0(self) -> bool {
        matches!(self, Format::MD | Format::ND4 | Format::D | Format::I)
    }

    /// Width of the PC-relative displacement field when the format is used
    /// as a branch to a label.
    pub fn branch_bits(self) -> Option<u32> {
        match self {
            Format::D => Some(8),
            Format::D12 => Some(12),
            _ => None,
        }
    }

    pub fn encode(self, opcode: u16, ops: &[Operand]) -> Result<u16, EncodeError> {
        use Format::*;

        let implicit = self.implicit_r0();
        let mut regs = vec![];
        for op in ops {
            match op {
                Operand::Reg(r) if implicit => {
                    if *r != Reg::R0 {
                        return Err(EncodeError::RequiresR0(*r));
                    }
                }
                _ => {
                    if let Some(r) = op.reg() {
                        regs.push(r.field());
                    }
                }
            }
        }
        let reg = |i: usize| regs.get(i).copied().unwrap_or(0);
        // Label operands leave the displacement at zero until pass 2.
        let disp = ops.iter().find_map(Operand::disp).unwrap_or(0);
        let imm = ops.iter().find_map(Operand::imm).unwrap_or(0);

        Ok(match self {
            Zero => opcode,
            N | M => opcode | reg(0) << 8,
            NM => opcode | reg(1) << 8 | reg(0) << 4,
            MD | ND4 => opcode | reg(0) << 4 | field(disp, 4)?,
            NMD => opcode | reg(1) << 8 | reg(0) << 4 | field(disp, 4)?,
            D => opcode | field(disp, 8)?,
            D12 => opcode | field(disp, 12)?,
            ND8 => opcode | reg(0) << 8 | field(disp, 8)?,
            I => opcode | field(imm, 8)?,
            NI => opcode | reg(0) << 8 | field(imm, 8)?,
        })
    }

    /// Replaces the displacement field of an already encoded branch.
    pub fn splice(self, word: u16, disp: i64) -> Result<u16, EncodeError> {
        let bits = match self.branch_bits() {
            Some(bits) => bits,
            None => return Ok(word),
        };
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if disp < min || disp > max {
            return Err(EncodeError::BranchOutOfRange { disp, bits });
        }
        let mask = (1u16 << bits) - 1;
        Ok(word & !mask | (disp as u16) & mask)
    }

    /// Rebuilds the operands of `word` for the given shape. `pc` is the
    /// address of the word and is used to render branch targets.
    pub fn decode(self, word: u16, shape: &[Mode], pc: u32) -> Vec<Operand> {
        use Format::*;

        let hi = (word >> 8) & 0xF;
        let mid = (word >> 4) & 0xF;
        let mut regs = match self {
            N | M | ND8 | NI => vec![hi],
            NM | NMD => vec![mid, hi],
            MD | ND4 => vec![mid],
            _ => vec![],
        }
        .into_iter()
        .map(Reg::from_field);
        let mut next_reg = || regs.next().unwrap_or(Reg::R0);

        let disp = match self {
            MD | ND4 | NMD => (word & 0xF) as i64,
            D12 => ((((word & 0xFFF) << 4) as i16) >> 4) as i64,
            _ => (word & 0xFF) as i64,
        };
        let imm = match self {
            NI => (word as u8 as i8) as i64,
            _ => (word & 0xFF) as i64,
        };

        shape
            .iter()
            .map(|mode| match mode {
                Mode::Imm => Operand::Imm(imm),
                Mode::Reg if self.implicit_r0() => Operand::Reg(Reg::R0),
                Mode::Reg => Operand::Reg(next_reg()),
                Mode::Ind => Operand::Ind(next_reg()),
                Mode::PreDec => Operand::PreDec(next_reg()),
                Mode::PostInc => Operand::PostInc(next_reg()),
                Mode::DispReg => Operand::DispReg(disp, next_reg()),
                Mode::DispGbr => Operand::DispGbr(disp),
                Mode::R0Gbr => Operand::R0Gbr,
                Mode::DispPc => Operand::DispPc(disp),
                Mode::R0Reg => Operand::R0Reg(next_reg()),
                Mode::Sys(reg) => Operand::Sys(*reg),
                Mode::Label => {
                    let disp = match self {
                        D => (word as u8 as i8) as i64,
                        _ => disp,
                    };
                    let target = pc as i64 + disp * 2;
                    Operand::Label(format!("0x{:08X}", target as u32))
                }
            })
            .collect()
    }
}

/// Checks that `value` fits in a `bits` wide field, written either signed or
/// unsigned, and returns it masked to the field.
pub fn field(value: i64, bits: u32) -> Result<u16, EncodeError> {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << bits) - 1;
    if value < min || value > max {
        return Err(EncodeError::OutOfRange { value, bits });
    }
    Ok(value as u16 & ((1u16 << bits) - 1))
}
