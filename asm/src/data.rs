use strum::{Display, EnumString};

use crate::error::Error;
use crate::parser::parse_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Directive {
    #[strum(serialize = ".byte")]
    Byte,
    #[strum(serialize = ".word")]
    Word,
    #[strum(serialize = ".long")]
    Long,
    #[strum(serialize = ".ascii")]
    Ascii,
    #[strum(serialize = ".asciiz")]
    Asciiz,
}

impl Directive {
    pub fn parse(s: &str) -> Result<Self, Error> {
        s.parse()
            .map_err(|_| Error::UnknownDirective(s.to_string()))
    }

    /// Width in bytes of each value.
    pub fn width(self) -> usize {
        match self {
            Directive::Byte | Directive::Ascii | Directive::Asciiz => 1,
            Directive::Word => 2,
            Directive::Long => 4,
        }
    }
}

/// Big-endian byte stream of the data section. Each byte remembers the
/// source line that produced it.
#[derive(Debug, Clone, Default)]
pub struct DataStream {
    bytes: Vec<u8>,
    lines: Vec<usize>,
}

impl DataStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn push(&mut self, byte: u8, line: usize) {
        self.bytes.push(byte);
        self.lines.push(line);
    }

    fn align(&mut self, line: usize) {
        if self.bytes.len() % 2 != 0 {
            self.push(0, line);
        }
    }

    /// Lowers one directive into the stream and returns the offset of its
    /// first byte.
    pub fn emit(&mut self, directive: Directive, args: &str, line: usize) -> Result<u32, Error> {
        let bytes = match directive {
            Directive::Ascii | Directive::Asciiz => {
                let mut bytes = unquote(args)?;
                if directive == Directive::Asciiz {
                    bytes.push(0);
                }
                bytes
            }
            _ => values(directive.width(), args)?,
        };

        if directive.width() > 1 {
            self.align(line);
        }
        let start = self.offset();
        for byte in bytes {
            self.push(byte, line);
        }
        Ok(start)
    }

    /// Packs the stream into 16-bit words, padding an odd tail with one zero
    /// byte. Each word carries the line of its high byte.
    pub fn words(&self) -> Vec<(u16, usize)> {
        self.bytes
            .chunks(2)
            .zip(self.lines.chunks(2))
            .map(|(pair, lines)| {
                let hi = pair[0] as u16;
                let lo = pair.get(1).copied().unwrap_or(0) as u16;
                (hi << 8 | lo, lines[0])
            })
            .collect()
    }
}

/// Parses comma separated values and lays each out big-endian in `width`
/// bytes, two's complement for negatives.
fn values(width: usize, args: &str) -> Result<Vec<u8>, Error> {
    if args.trim().is_empty() {
        return Err(Error::Syntax("data directive without values".to_string()));
    }

    let mut bytes = vec![];
    for arg in args.split(',') {
        bytes.extend_from_slice(&be_bytes(parse_value(arg)?, width)?);
    }
    Ok(bytes)
}

/// Lays `value` out big-endian in `width` bytes. Accepts the signed and the
/// unsigned spelling, `-(2^(w-1))..=2^w-1`.
pub(crate) fn be_bytes(value: i64, width: usize) -> Result<Vec<u8>, Error> {
    let bits = (width * 8) as u32;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << bits) - 1;
    if value < min || value > max {
        return Err(Error::OutOfRange { value, bits });
    }
    Ok(value.to_be_bytes()[8 - width..].to_vec())
}

fn unquote(args: &str) -> Result<Vec<u8>, Error> {
    let inner = args
        .trim()
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| Error::Syntax(format!("expected a quoted string, found `{}`", args)))?;

    let mut bytes = vec![];
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        let c = match c {
            '\\' => match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('0') => '\0',
                Some('\\') => '\\',
                Some('"') => '"',
                Some(other) => {
                    return Err(Error::Syntax(format!("unknown escape `\\{}`", other)))
                }
                None => return Err(Error::Syntax("dangling `\\` in string".to_string())),
            },
            c => c,
        };
        let mut buf = [0; 4];
        bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }
    Ok(bytes)
}
