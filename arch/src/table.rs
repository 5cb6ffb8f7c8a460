use std::collections::HashMap;

use color_print::cformat;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::inst::{EncodeError, Format};
use crate::operand::{shape_string, Mode, Operand};
use crate::reg::SysReg;

/// One row of the instruction table: the lookup key and how to encode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub mnemonic: &'static str,
    pub shape: &'static [Mode],
    pub opcode: u16,
    pub format: Format,
}

impl Entry {
    pub fn encode(&self, ops: &[Operand]) -> Result<u16, EncodeError> {
        self.format.encode(self.opcode, ops)
    }

    /// Displacement width for PC-relative branches to a label.
    pub fn branch_bits(&self) -> Option<u32> {
        match self.shape {
            [Mode::Label] => self.format.branch_bits(),
            _ => None,
        }
    }

    pub fn matches(&self, word: u16) -> bool {
        word & self.format.mask() == self.opcode
    }

    pub fn key(&self) -> String {
        format!("{} {}", self.mnemonic, shape_string(self.shape))
    }

    pub fn cformat(&self, ops: &[Operand]) -> String {
        let ops: Vec<String> = ops.iter().map(Operand::cformat).collect();
        cformat!("<red>{:<8}</>{}", self.mnemonic, ops.join(", "))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Duplicate instruction table entry: `{0}`")]
    DuplicateKey(String),

    #[error("Encodings of `{0}` and `{1}` overlap")]
    Overlap(String, String),
}

/// Instruction table indexed by mnemonic. Every (mnemonic, shape) key maps
/// to exactly one entry.
#[derive(Debug)]
pub struct Table {
    entries: Vec<Entry>,
    index: HashMap<&'static str, Vec<usize>>,
}

impl Table {
    pub fn new(entries: &[Entry]) -> Result<Self, TableError> {
        let mut index: HashMap<&'static str, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let same = index.entry(entry.mnemonic).or_default();
            if same.iter().any(|&i| entries[i].shape == entry.shape) {
                return Err(TableError::DuplicateKey(entry.key()));
            }
            same.push(idx);
        }

        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                let common = a.format.mask() & b.format.mask();
                if a.opcode & common == b.opcode & common {
                    return Err(TableError::Overlap(a.key(), b.key()));
                }
            }
        }

        Ok(Table {
            entries: entries.to_vec(),
            index,
        })
    }

    pub fn lookup(&self, mnemonic: &str, shape: &[Mode]) -> Option<&Entry> {
        self.index
            .get(mnemonic)?
            .iter()
            .map(|&i| &self.entries[i])
            .find(|entry| entry.shape == shape)
    }

    /// Disassembles `word` located at address `pc`.
    pub fn decode(&self, word: u16, pc: u32) -> Option<(&Entry, Vec<Operand>)> {
        let entry = self.entries.iter().find(|entry| entry.matches(word))?;
        Some((entry, entry.format.decode(word, entry.shape, pc)))
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

pub static TABLE: Lazy<Table> = Lazy::new(|| match Table::new(ENTRIES) {
    Ok(table) => table,
    Err(err) => panic!("invalid SH-2 instruction table: {err}"),
});

// ----------------------------------------------------------------------------
// SH-1/SH-2 Programming Manual, Appendix A

const IMM: Mode = Mode::Imm;
const REG: Mode = Mode::Reg;
const IND: Mode = Mode::Ind;
const DEC: Mode = Mode::PreDec;
const INC: Mode = Mode::PostInc;
const DISP: Mode = Mode::DispReg;
const DISP_GBR: Mode = Mode::DispGbr;
const R0_GBR: Mode = Mode::R0Gbr;
const DISP_PC: Mode = Mode::DispPc;
const R0_REG: Mode = Mode::R0Reg;
const LABEL: Mode = Mode::Label;
const SR: Mode = Mode::Sys(SysReg::SR);
const GBR: Mode = Mode::Sys(SysReg::GBR);
const VBR: Mode = Mode::Sys(SysReg::VBR);
const MACH: Mode = Mode::Sys(SysReg::MACH);
const MACL: Mode = Mode::Sys(SysReg::MACL);
const PR: Mode = Mode::Sys(SysReg::PR);

macro_rules! op {
    ($mnemonic:literal, [$($mode:expr),*], $opcode:literal, $format:ident) => {
        Entry {
            mnemonic: $mnemonic,
            shape: &[$($mode),*],
            opcode: $opcode,
            format: Format::$format,
        }
    };
}

pub static ENTRIES: &[Entry] = &[
    // 0 format (A.23)
    op!("CLRT", [], 0x0008, Zero),
    op!("CLRMAC", [], 0x0028, Zero),
    op!("DIV0U", [], 0x0019, Zero),
    op!("NOP", [], 0x0009, Zero),
    op!("RTE", [], 0x002B, Zero),
    op!("RTS", [], 0x000B, Zero),
    op!("SETT", [], 0x0018, Zero),
    op!("SLEEP", [], 0x001B, Zero),
    // n format, direct register (A.24)
    op!("CMP/PL", [REG], 0x4015, N),
    op!("CMP/PZ", [REG], 0x4011, N),
    op!("DT", [REG], 0x4010, N),
    op!("MOVT", [REG], 0x0029, N),
    op!("ROTL", [REG], 0x4004, N),
    op!("ROTR", [REG], 0x4005, N),
    op!("ROTCL", [REG], 0x4024, N),
    op!("ROTCR", [REG], 0x4025, N),
    op!("SHAL", [REG], 0x4020, N),
    op!("SHAR", [REG], 0x4021, N),
    op!("SHLL", [REG], 0x4000, N),
    op!("SHLR", [REG], 0x4001, N),
    op!("SHLL2", [REG], 0x4008, N),
    op!("SHLR2", [REG], 0x4009, N),
    op!("SHLL8", [REG], 0x4018, N),
    op!("SHLR8", [REG], 0x4019, N),
    op!("SHLL16", [REG], 0x4028, N),
    op!("SHLR16", [REG], 0x4029, N),
    // n format, store control/system register (A.25)
    op!("STC", [SR, REG], 0x0002, N),
    op!("STC", [GBR, REG], 0x0012, N),
    op!("STC", [VBR, REG], 0x0022, N),
    op!("STS", [MACH, REG], 0x000A, N),
    op!("STS", [MACL, REG], 0x001A, N),
    op!("STS", [PR, REG], 0x002A, N),
    // n format, indirect register (A.26)
    op!("TAS.B", [IND], 0x401B, N),
    // n format, pre-decrement (A.27)
    op!("STC.L", [SR, DEC], 0x4003, N),
    op!("STC.L", [GBR, DEC], 0x4013, N),
    op!("STC.L", [VBR, DEC], 0x4023, N),
    op!("STS.L", [MACH, DEC], 0x4002, N),
    op!("STS.L", [MACL, DEC], 0x4012, N),
    op!("STS.L", [PR, DEC], 0x4022, N),
    // m format, load control/system register (A.28)
    op!("LDC", [REG, SR], 0x400E, M),
    op!("LDC", [REG, GBR], 0x401E, M),
    op!("LDC", [REG, VBR], 0x402E, M),
    op!("LDS", [REG, MACH], 0x400A, M),
    op!("LDS", [REG, MACL], 0x401A, M),
    op!("LDS", [REG, PR], 0x402A, M),
    // m format, indirect register (A.29)
    op!("JMP", [IND], 0x402B, M),
    op!("JSR", [IND], 0x400B, M),
    // m format, post-increment (A.30)
    op!("LDC.L", [INC, SR], 0x4007, M),
    op!("LDC.L", [INC, GBR], 0x4017, M),
    op!("LDC.L", [INC, VBR], 0x4027, M),
    op!("LDS.L", [INC, MACH], 0x4006, M),
    op!("LDS.L", [INC, MACL], 0x4016, M),
    op!("LDS.L", [INC, PR], 0x4026, M),
    // m format, PC relative with Rm (A.31)
    op!("BRAF", [REG], 0x0023, M),
    op!("BSRF", [REG], 0x0003, M),
    // nm format, direct register (A.32)
    op!("ADD", [REG, REG], 0x300C, NM),
    op!("ADDC", [REG, REG], 0x300E, NM),
    op!("ADDV", [REG, REG], 0x300F, NM),
    op!("AND", [REG, REG], 0x2009, NM),
    op!("CMP/EQ", [REG, REG], 0x3000, NM),
    op!("CMP/HS", [REG, REG], 0x3002, NM),
    op!("CMP/GE", [REG, REG], 0x3003, NM),
    op!("CMP/HI", [REG, REG], 0x3006, NM),
    op!("CMP/GT", [REG, REG], 0x3007, NM),
    op!("CMP/STR", [REG, REG], 0x200C, NM),
    op!("DIV1", [REG, REG], 0x3004, NM),
    op!("DIV0S", [REG, REG], 0x2007, NM),
    op!("DMULS.L", [REG, REG], 0x300D, NM),
    op!("DMULU.L", [REG, REG], 0x3005, NM),
    op!("EXTS.B", [REG, REG], 0x600E, NM),
    op!("EXTS.W", [REG, REG], 0x600F, NM),
    op!("EXTU.B", [REG, REG], 0x600C, NM),
    op!("EXTU.W", [REG, REG], 0x600D, NM),
    op!("MOV", [REG, REG], 0x6003, NM),
    op!("MUL.L", [REG, REG], 0x0007, NM),
    op!("MULS.W", [REG, REG], 0x200F, NM),
    op!("MULU.W", [REG, REG], 0x200E, NM),
    op!("NEG", [REG, REG], 0x600B, NM),
    op!("NEGC", [REG, REG], 0x600A, NM),
    op!("NOT", [REG, REG], 0x6007, NM),
    op!("OR", [REG, REG], 0x200B, NM),
    op!("SUB", [REG, REG], 0x3008, NM),
    op!("SUBC", [REG, REG], 0x300A, NM),
    op!("SUBV", [REG, REG], 0x300B, NM),
    op!("SWAP.B", [REG, REG], 0x6008, NM),
    op!("SWAP.W", [REG, REG], 0x6009, NM),
    op!("TST", [REG, REG], 0x2008, NM),
    op!("XOR", [REG, REG], 0x200A, NM),
    op!("XTRCT", [REG, REG], 0x200D, NM),
    // nm format, indirect register (A.33)
    op!("MOV.B", [REG, IND], 0x2000, NM),
    op!("MOV.W", [REG, IND], 0x2001, NM),
    op!("MOV.L", [REG, IND], 0x2002, NM),
    op!("MOV.B", [IND, REG], 0x6000, NM),
    op!("MOV.W", [IND, REG], 0x6001, NM),
    op!("MOV.L", [IND, REG], 0x6002, NM),
    // nm format, multiply and accumulate (A.34)
    op!("MAC.L", [INC, INC], 0x000F, NM),
    op!("MAC.W", [INC, INC], 0x400F, NM),
    // nm format, post-increment (A.35)
    op!("MOV.B", [INC, REG], 0x6004, NM),
    op!("MOV.W", [INC, REG], 0x6005, NM),
    op!("MOV.L", [INC, REG], 0x6006, NM),
    // nm format, pre-decrement (A.36)
    op!("MOV.B", [REG, DEC], 0x2004, NM),
    op!("MOV.W", [REG, DEC], 0x2005, NM),
    op!("MOV.L", [REG, DEC], 0x2006, NM),
    // nm format, indexed register (A.37)
    op!("MOV.B", [REG, R0_REG], 0x0004, NM),
    op!("MOV.W", [REG, R0_REG], 0x0005, NM),
    op!("MOV.L", [REG, R0_REG], 0x0006, NM),
    op!("MOV.B", [R0_REG, REG], 0x000C, NM),
    op!("MOV.W", [R0_REG, REG], 0x000D, NM),
    op!("MOV.L", [R0_REG, REG], 0x000E, NM),
    // md format (A.38)
    op!("MOV.B", [DISP, REG], 0x8400, MD),
    op!("MOV.W", [DISP, REG], 0x8500, MD),
    // nd4 format (A.39)
    op!("MOV.B", [REG, DISP], 0x8000, ND4),
    op!("MOV.W", [REG, DISP], 0x8100, ND4),
    // nmd format (A.40)
    op!("MOV.L", [REG, DISP], 0x1000, NMD),
    op!("MOV.L", [DISP, REG], 0x5000, NMD),
    // d format, GBR indirect with displacement (A.41)
    op!("MOV.B", [REG, DISP_GBR], 0xC000, D),
    op!("MOV.W", [REG, DISP_GBR], 0xC100, D),
    op!("MOV.L", [REG, DISP_GBR], 0xC200, D),
    op!("MOV.B", [DISP_GBR, REG], 0xC400, D),
    op!("MOV.W", [DISP_GBR, REG], 0xC500, D),
    op!("MOV.L", [DISP_GBR, REG], 0xC600, D),
    // d format, PC relative with displacement (A.42)
    op!("MOVA", [DISP_PC, REG], 0xC700, D),
    // d format, PC relative branch (A.43)
    op!("BF", [LABEL], 0x8B00, D),
    op!("BF/S", [LABEL], 0x8F00, D),
    op!("BT", [LABEL], 0x8900, D),
    op!("BT/S", [LABEL], 0x8D00, D),
    // d12 format (A.44)
    op!("BRA", [LABEL], 0xA000, D12),
    op!("BSR", [LABEL], 0xB000, D12),
    // nd8 format (A.45)
    op!("MOV.W", [DISP_PC, REG], 0x9000, ND8),
    op!("MOV.L", [DISP_PC, REG], 0xD000, ND8),
    // i format, GBR indirect indexed (A.46)
    op!("AND.B", [IMM, R0_GBR], 0xCD00, I),
    op!("OR.B", [IMM, R0_GBR], 0xCF00, I),
    op!("TST.B", [IMM, R0_GBR], 0xCC00, I),
    op!("XOR.B", [IMM, R0_GBR], 0xCE00, I),
    // i format, immediate with R0 (A.47)
    op!("AND", [IMM, REG], 0xC900, I),
    op!("CMP/EQ", [IMM, REG], 0x8800, I),
    op!("OR", [IMM, REG], 0xCB00, I),
    op!("TST", [IMM, REG], 0xC800, I),
    op!("XOR", [IMM, REG], 0xCA00, I),
    // i format, exception vector (A.48)
    op!("TRAPA", [IMM], 0xC300, I),
    // ni format (A.49)
    op!("ADD", [IMM, REG], 0x7000, NI),
    op!("MOV", [IMM, REG], 0xE000, NI),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::Reg::*;

    macro_rules! test_encode {
        ($($name:ident: $mnemonic:literal [$($op:expr),*] => $word:literal,)*) => {
            $(
                #[test]
                fn $name() {
                    let ops: Vec<Operand> = vec![$($op),*];
                    let shape: Vec<Mode> = ops.iter().map(Operand::mode).collect();
                    let entry = TABLE.lookup($mnemonic, &shape).unwrap();
                    assert_eq!(entry.encode(&ops), Ok($word));
                    let (decoded, _) = TABLE.decode($word, 0).unwrap();
                    assert_eq!(decoded, entry);
                }
            )*
        }
    }

    use crate::operand::Operand::{DispGbr, DispPc, DispReg, Imm, Ind, PostInc, PreDec, R0Reg, Reg, Sys};

    test_encode! {
        test_nop: "NOP" [] => 0x0009,
        test_rte: "RTE" [] => 0x002B,
        test_rts: "RTS" [] => 0x000B,
        test_movt: "MOVT" [Reg(R4)] => 0x0429,
        test_dt: "DT" [Reg(R3)] => 0x4310,
        test_shll16: "SHLL16" [Reg(R15)] => 0x4F28,
        test_stc_gbr: "STC" [Sys(SysReg::GBR), Reg(R2)] => 0x0212,
        test_sts_pr: "STS" [Sys(SysReg::PR), Reg(R6)] => 0x062A,
        test_sts_l_pr: "STS.L" [Sys(SysReg::PR), PreDec(R15)] => 0x4F22,
        test_tas_b: "TAS.B" [Ind(R1)] => 0x411B,
        test_ldc_sr: "LDC" [Reg(R5), Sys(SysReg::SR)] => 0x450E,
        test_lds_pr: "LDS" [Reg(R7), Sys(SysReg::PR)] => 0x472A,
        test_lds_l_pr: "LDS.L" [PostInc(R15), Sys(SysReg::PR)] => 0x4F26,
        test_jsr: "JSR" [Ind(R9)] => 0x490B,
        test_braf: "BRAF" [Reg(R3)] => 0x0323,
        test_add: "ADD" [Reg(R1), Reg(R2)] => 0x321C,
        test_cmp_gt: "CMP/GT" [Reg(R4), Reg(R5)] => 0x3547,
        test_mov: "MOV" [Reg(R0), Reg(R15)] => 0x6F03,
        test_mul_l: "MUL.L" [Reg(R2), Reg(R3)] => 0x0327,
        test_mac_w: "MAC.W" [PostInc(R1), PostInc(R2)] => 0x421F,
        test_mov_b_store: "MOV.B" [Reg(R1), Ind(R2)] => 0x2210,
        test_mov_l_load: "MOV.L" [Ind(R3), Reg(R4)] => 0x6432,
        test_mov_w_postinc: "MOV.W" [PostInc(R3), Reg(R4)] => 0x6435,
        test_mov_l_predec: "MOV.L" [Reg(R1), PreDec(R15)] => 0x2F16,
        test_mov_b_r0_store: "MOV.B" [Reg(R1), R0Reg(R2)] => 0x0214,
        test_mov_l_r0_load: "MOV.L" [R0Reg(R2), Reg(R1)] => 0x012E,
        test_mov_b_disp_load: "MOV.B" [DispReg(4, R2), Reg(R0)] => 0x8424,
        test_mov_w_disp_load: "MOV.W" [DispReg(2, R3), Reg(R0)] => 0x8532,
        test_mov_w_disp_store: "MOV.W" [Reg(R0), DispReg(15, R1)] => 0x811F,
        test_mov_l_disp_store: "MOV.L" [Reg(R3), DispReg(1, R4)] => 0x1431,
        test_mov_l_disp_load: "MOV.L" [DispReg(1, R4), Reg(R3)] => 0x5341,
        test_mov_l_gbr_store: "MOV.L" [Reg(R0), DispGbr(8)] => 0xC208,
        test_mov_b_gbr_load: "MOV.B" [DispGbr(-1), Reg(R0)] => 0xC4FF,
        test_mova: "MOVA" [DispPc(4), Reg(R0)] => 0xC704,
        test_mov_w_pc: "MOV.W" [DispPc(3), Reg(R5)] => 0x9503,
        test_mov_l_pc: "MOV.L" [DispPc(3), Reg(R5)] => 0xD503,
        test_and_b: "AND.B" [Imm(0x0F), Operand::R0Gbr] => 0xCD0F,
        test_cmp_eq_imm: "CMP/EQ" [Imm(-1), Reg(R0)] => 0x88FF,
        test_trapa: "TRAPA" [Imm(32)] => 0xC320,
        test_add_imm: "ADD" [Imm(-2), Reg(R15)] => 0x7FFE,
        test_mov_imm: "MOV" [Imm(5), Reg(R0)] => 0xE005,
        test_bf: "BF" [Operand::Label("L".into())] => 0x8B00,
        test_bt_s: "BT/S" [Operand::Label("L".into())] => 0x8D00,
        test_bra: "BRA" [Operand::Label("L".into())] => 0xA000,
        test_bsr: "BSR" [Operand::Label("L".into())] => 0xB000,
    }

    #[test]
    fn table_builds() {
        assert_eq!(TABLE.entries().len(), ENTRIES.len());
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let entries = [
            op!("MOV.B", [DISP, REG], 0x8400, MD),
            op!("MOV.B", [DISP, REG], 0x8500, MD),
        ];
        assert_eq!(
            Table::new(&entries).unwrap_err(),
            TableError::DuplicateKey("MOV.B (@(disp,Rn), Rn)".to_string())
        );
    }

    #[test]
    fn overlapping_encodings_are_rejected() {
        let entries = [
            op!("RTE", [], 0x0029, Zero),
            op!("MOVT", [REG], 0x0029, N),
        ];
        assert!(matches!(
            Table::new(&entries),
            Err(TableError::Overlap(_, _))
        ));
    }

    #[test]
    fn unknown_key_misses() {
        assert!(TABLE.lookup("MOV", &[Mode::Imm, Mode::Imm]).is_none());
        assert!(TABLE.lookup("FOO", &[]).is_none());
    }

    #[test]
    fn branch_width_by_format() {
        let shape = [Mode::Label];
        assert_eq!(TABLE.lookup("BT", &shape).unwrap().branch_bits(), Some(8));
        assert_eq!(TABLE.lookup("BSR", &shape).unwrap().branch_bits(), Some(12));
        let mova = TABLE.lookup("MOVA", &[Mode::DispPc, Mode::Reg]).unwrap();
        assert_eq!(mova.branch_bits(), None);
    }

    #[test]
    fn decode_operands() {
        let (entry, ops) = TABLE.decode(0x5341, 0).unwrap();
        assert_eq!(entry.mnemonic, "MOV.L");
        assert_eq!(ops, vec![DispReg(1, R4), Reg(R3)]);

        let (entry, ops) = TABLE.decode(0x7FFE, 0).unwrap();
        assert_eq!(entry.mnemonic, "ADD");
        assert_eq!(ops, vec![Imm(-2), Reg(R15)]);

        assert!(TABLE.decode(0xFFFF, 0).is_none());
    }
}
