use std::fmt;

use crate::data::be_bytes;
use crate::error::{Diag, Error};
use crate::parser::{parse_value, strip_comment};

/// Expected memory contents: a start address followed by big-endian bytes.
///
/// ```text
/// ; header line: anything, then ": " and a hex address
/// start: 0x00000400
/// L.-1
/// W.0x1234
/// B.b1010
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected {
    pub start: u32,
    pub bytes: Vec<u8>,
}

impl Expected {
    pub fn parse(text: &str) -> Result<Self, Diag> {
        let mut start = None;
        let mut bytes = vec![];

        for (idx, raw) in text.lines().enumerate() {
            let diag = |e: Error| Diag::new(idx + 1, raw, e);
            let code = strip_comment(raw);
            if code.is_empty() {
                continue;
            }
            if start.is_none() {
                start = Some(parse_start(code).map_err(diag)?);
                continue;
            }

            let (width, value) = match (code.get(..2), code.get(2..)) {
                (Some(prefix), Some(value)) => match prefix.to_ascii_uppercase().as_str() {
                    "B." => (1, value),
                    "W." => (2, value),
                    "L." => (4, value),
                    _ => return Err(diag(unknown_line(code))),
                },
                _ => return Err(diag(unknown_line(code))),
            };
            let value = parse_value(value).map_err(diag)?;
            bytes.extend(be_bytes(value, width).map_err(diag)?);
        }

        let start = start.ok_or_else(|| {
            Diag::new(0, "", Error::Syntax("missing start address line".to_string()))
        })?;
        Ok(Expected { start, bytes })
    }
}

fn unknown_line(code: &str) -> Error {
    Error::Syntax(format!("expected `B.`, `W.` or `L.` value, found `{}`", code))
}

fn parse_start(code: &str) -> Result<u32, Error> {
    let addr = code
        .rsplit_once(':')
        .map(|(_, addr)| addr.trim())
        .ok_or_else(|| Error::Syntax(format!("expected `...: 0xADDR`, found `{}`", code)))?;
    let digits = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr);
    u32::from_str_radix(digits, 16).map_err(|_| Error::InvalidNumber(addr.to_string()))
}

/// Reads a memory dump in the assembler's output format. Only the binary
/// prefix before `;` is used. 16-bit lines give two bytes, 8-bit lines one.
pub fn parse_dump(text: &str) -> Result<Vec<u8>, Diag> {
    let mut bytes = vec![];
    for (idx, raw) in text.lines().enumerate() {
        let bits = strip_comment(raw);
        if bits.is_empty() {
            continue;
        }
        let invalid = || {
            Diag::new(
                idx + 1,
                raw,
                Error::Syntax(format!("expected 8 or 16 binary digits, found `{}`", bits)),
            )
        };
        if !matches!(bits.len(), 8 | 16) {
            return Err(invalid());
        }
        let value = u16::from_str_radix(bits, 2).map_err(|_| invalid())?;
        if bits.len() == 16 {
            bytes.extend_from_slice(&value.to_be_bytes());
        } else {
            bytes.push(value as u8);
        }
    }
    Ok(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub addr: u32,
    pub expected: u8,
    /// `None` when the dump does not cover the address.
    pub actual: Option<u8>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X} - expected {:08b} - actual ", self.addr, self.expected)?;
        match self.actual {
            Some(actual) => write!(f, "{:08b}", actual),
            None => write!(f, "--------"),
        }
    }
}

/// Compares `expected` against a dump whose first byte is at `dump_origin`.
pub fn compare(expected: &Expected, dump: &[u8], dump_origin: u32) -> Vec<Mismatch> {
    expected
        .bytes
        .iter()
        .enumerate()
        .filter_map(|(idx, &want)| {
            let addr = expected.start.wrapping_add(idx as u32);
            let actual = addr
                .checked_sub(dump_origin)
                .and_then(|offset| dump.get(offset as usize).copied());
            match actual {
                Some(got) if got == want => None,
                _ => Some(Mismatch {
                    addr,
                    expected: want,
                    actual,
                }),
            }
        })
        .collect()
}
