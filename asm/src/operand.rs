use arch::{Operand, Reg, SysReg};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::parser::{parse_number, rx};

const NUM: &str = r"([+-]?(?:0X[0-9A-F]+|0B[01]+|0O[0-7]+|[0-9]+))";
const REG: &str = r"(R(?:1[0-5]|[0-9]))";

struct Patterns {
    imm: Regex,
    pre_dec: Regex,
    post_inc: Regex,
    ind: Regex,
    disp_reg: Regex,
    disp_gbr: Regex,
    r0_gbr: Regex,
    disp_pc: Regex,
    r0_reg: Regex,
    reg: Regex,
    sys: Regex,
}

static PATTERNS: Lazy<Patterns> = Lazy::new(|| Patterns {
    imm: rx(&format!("^#{NUM}$")),
    pre_dec: rx(&format!("^@-{REG}$")),
    post_inc: rx(&format!(r"^@{REG}\+$")),
    ind: rx(&format!("^@{REG}$")),
    disp_reg: rx(&format!(r"^@\({NUM},{REG}\)$")),
    disp_gbr: rx(&format!(r"^@\({NUM},GBR\)$")),
    r0_gbr: rx(r"^@\(R0,GBR\)$"),
    disp_pc: rx(&format!(r"^@\({NUM},PC\)$")),
    r0_reg: rx(&format!(r"^@\(R0,{REG}\)$")),
    reg: rx(&format!("^{REG}$")),
    sys: rx("^(SR|GBR|VBR|MACH|MACL|PR|PC)$"),
});

fn num(caps: &Captures, idx: usize) -> Option<i64> {
    parse_number(caps.get(idx)?.as_str()).ok()
}

fn reg(caps: &Captures, idx: usize) -> Option<Reg> {
    Reg::parse(caps.get(idx)?.as_str())
}

/// Classifies one operand token. Anything that matches no addressing mode
/// is taken to be a label reference; whether that is acceptable is decided
/// when the instruction is encoded.
pub fn classify(token: &str) -> Operand {
    let token: String = token
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    match_mode(&token).unwrap_or(Operand::Label(token))
}

fn match_mode(token: &str) -> Option<Operand> {
    let p = &*PATTERNS;
    if let Some(c) = p.imm.captures(token) {
        return Some(Operand::Imm(num(&c, 1)?));
    }
    if let Some(c) = p.pre_dec.captures(token) {
        return Some(Operand::PreDec(reg(&c, 1)?));
    }
    if let Some(c) = p.post_inc.captures(token) {
        return Some(Operand::PostInc(reg(&c, 1)?));
    }
    if let Some(c) = p.ind.captures(token) {
        return Some(Operand::Ind(reg(&c, 1)?));
    }
    if let Some(c) = p.disp_reg.captures(token) {
        return Some(Operand::DispReg(num(&c, 1)?, reg(&c, 2)?));
    }
    if let Some(c) = p.disp_gbr.captures(token) {
        return Some(Operand::DispGbr(num(&c, 1)?));
    }
    if p.r0_gbr.is_match(token) {
        return Some(Operand::R0Gbr);
    }
    if let Some(c) = p.disp_pc.captures(token) {
        return Some(Operand::DispPc(num(&c, 1)?));
    }
    if let Some(c) = p.r0_reg.captures(token) {
        return Some(Operand::R0Reg(reg(&c, 1)?));
    }
    if let Some(c) = p.reg.captures(token) {
        return Some(Operand::Reg(reg(&c, 1)?));
    }
    if let Some(c) = p.sys.captures(token) {
        return Some(Operand::Sys(SysReg::parse(c.get(1)?.as_str())?));
    }
    None
}
