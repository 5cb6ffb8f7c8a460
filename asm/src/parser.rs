use once_cell::sync::Lazy;
use regex::Regex;
use strum::{Display, EnumString};

use crate::error::Error;

/// Compiles a pattern that is part of the source code.
pub(crate) fn rx(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(r) => r,
        Err(e) => panic!("'{}' is not a valid regular expression: {e}", pattern),
    }
}

static IDENT: Lazy<Regex> = Lazy::new(|| rx(r"^[A-Za-z_][A-Za-z0-9_.]*$"));
static LABELED: Lazy<Regex> = Lazy::new(|| rx(r"^([^\s:]+)\s*:\s*(.*)$"));

// ----------------------------------------------------------------------------
// Section

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Section {
    #[strum(serialize = ".text")]
    Text,
    #[strum(serialize = ".data")]
    Data,
    #[strum(serialize = ".vectable")]
    Vectable,
}

impl Section {
    /// Recognizes a section directive as the first word of a line.
    pub fn parse(code: &str) -> Option<Section> {
        code.split_whitespace().next()?.parse().ok()
    }
}

/// Removes a `;` comment and surrounding whitespace. A `;` inside a quoted
/// string does not start a comment.
pub fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    let mut prev = '\0';
    for (idx, c) in line.char_indices() {
        match c {
            '"' if prev != '\\' => quoted = !quoted,
            ';' if !quoted => return line[..idx].trim(),
            _ => {}
        }
        prev = c;
    }
    line.trim()
}

pub fn is_ident(s: &str) -> bool {
    IDENT.is_match(s)
}

/// Splits `LABEL: rest` into the upper-cased label and the rest.
fn split_label(code: &str) -> Result<(Option<String>, &str), Error> {
    match LABELED.captures(code) {
        Some(caps) => {
            let (name, rest) = match (caps.get(1), caps.get(2)) {
                (Some(name), Some(rest)) => (name.as_str(), rest.as_str()),
                _ => return Ok((None, code)),
            };
            if !is_ident(name) {
                return Err(Error::Syntax(format!("invalid label name `{}`", name)));
            }
            Ok((Some(name.to_uppercase()), rest))
        }
        None => Ok((None, code)),
    }
}

// ----------------------------------------------------------------------------
// Text section

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inst {
    pub mnemonic: String,
    pub operands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub label: Option<String>,
    pub inst: Option<Inst>,
}

impl Stmt {
    /// Parses a comment-free, non-empty line of the text section.
    pub fn parse(code: &str) -> Result<Stmt, Error> {
        let (label, rest) = split_label(code)?;
        if rest.is_empty() {
            return Ok(Stmt { label, inst: None });
        }

        let (mnemonic, args) = match rest.split_once(char::is_whitespace) {
            Some((mnemonic, args)) => (mnemonic, args.trim()),
            None => (rest, ""),
        };
        if mnemonic.starts_with('.') {
            return Err(Error::UnknownDirective(mnemonic.to_string()));
        }

        Ok(Stmt {
            label,
            inst: Some(Inst {
                mnemonic: mnemonic.to_uppercase(),
                operands: split_operands(args)?,
            }),
        })
    }
}

/// Splits an operand list on top-level commas, keeping `@(disp, Rn)` whole.
pub fn split_operands(args: &str) -> Result<Vec<String>, Error> {
    if args.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut operands = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::MalformedOperand(args.trim().to_string()))?;
            }
            ',' if depth == 0 => {
                operands.push(args[start..idx].trim().to_string());
                start = idx + 1;
            }
            _ => {}
        }
    }
    operands.push(args[start..].trim().to_string());

    if operands.iter().any(String::is_empty) {
        return Err(Error::Syntax(format!("empty operand in `{}`", args.trim())));
    }
    Ok(operands)
}

// ----------------------------------------------------------------------------
// Data section

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStmt {
    pub label: Option<String>,
    pub directive: String,
    pub args: String,
}

impl DataStmt {
    /// Parses `[LABEL:] .directive args`.
    pub fn parse(code: &str) -> Result<DataStmt, Error> {
        let (label, rest) = split_label(code)?;
        let (directive, args) = match rest.split_once(char::is_whitespace) {
            Some((directive, args)) => (directive, args.trim()),
            None => (rest, ""),
        };
        if !directive.starts_with('.') {
            return Err(Error::Syntax(format!(
                "expected a data directive, found `{}`",
                directive
            )));
        }
        Ok(DataStmt {
            label,
            directive: directive.to_lowercase(),
            args: args.to_string(),
        })
    }
}

// ----------------------------------------------------------------------------
// Vector table section

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecStmt {
    pub name: String,
    pub address: u32,
}

impl VecStmt {
    /// Parses `NAME: 0xADDRESS`. The address is always hexadecimal.
    pub fn parse(code: &str) -> Result<VecStmt, Error> {
        let (name, rest) = match split_label(code)? {
            (Some(name), rest) => (name, rest),
            (None, _) => {
                return Err(Error::Syntax(format!(
                    "expected `NAME: 0xADDRESS`, found `{}`",
                    code
                )))
            }
        };
        let word = rest
            .split_whitespace()
            .next()
            .ok_or_else(|| Error::Syntax(format!("missing address for vector `{}`", name)))?;
        let digits = word
            .strip_prefix("0x")
            .or_else(|| word.strip_prefix("0X"))
            .unwrap_or(word);
        let address = u64::from_str_radix(digits, 16)
            .map_err(|_| Error::InvalidNumber(word.to_string()))?;
        let address = u32::try_from(address).map_err(|_| Error::OutOfRange {
            value: address as i64,
            bits: 32,
        })?;
        Ok(VecStmt { name, address })
    }
}

// ----------------------------------------------------------------------------
// Numbers

/// Parses a signed decimal, `0x`, `0b` or `0o` literal.
pub fn parse_number(s: &str) -> Result<i64, Error> {
    let invalid = || Error::InvalidNumber(s.to_string());
    let t = s.trim();
    let (negative, t) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };

    let lower = t.to_ascii_lowercase();
    let (digits, radix) = if let Some(d) = lower.strip_prefix("0x") {
        (d, 16)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (d, 2)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (d, 8)
    } else {
        (lower.as_str(), 10)
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(invalid());
    }

    let value = i64::from_str_radix(digits, radix).map_err(|_| invalid())?;
    Ok(if negative { -value } else { value })
}

/// Like [`parse_number`], and also accepts the `b1010` binary spelling.
pub fn parse_value(s: &str) -> Result<i64, Error> {
    let t = s.trim();
    match t.strip_prefix(['b', 'B']) {
        Some(bits) if !bits.is_empty() && bits.chars().all(|c| c == '0' || c == '1') => {
            i64::from_str_radix(bits, 2).map_err(|_| Error::InvalidNumber(s.to_string()))
        }
        _ => parse_number(t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_number {
        ($($name:ident: $src:literal => $value:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(parse_number($src).ok(), $value);
                }
            )*
        }
    }

    test_number! {
        number_decimal: "42" => Some(42),
        number_negative: "-5" => Some(-5),
        number_plus: "+7" => Some(7),
        number_hex: "0x1F" => Some(31),
        number_hex_upper: "0XFF" => Some(255),
        number_negative_hex: "-0x10" => Some(-16),
        number_binary: "0b101" => Some(5),
        number_octal: "0o17" => Some(15),
        number_empty_hex: "0x" => None,
        number_double_sign: "--1" => None,
        number_garbage: "12AB" => None,
        number_word: "LOOP" => None,
    }

    #[test]
    fn value_binary_spelling() {
        assert_eq!(parse_value("b1010").ok(), Some(10));
        assert_eq!(parse_value("B11111111").ok(), Some(255));
        assert_eq!(parse_value("0x10").ok(), Some(16));
        assert!(parse_value("b").is_err());
    }

    #[test]
    fn comments_are_stripped() {
        assert_eq!(strip_comment("  NOP ; comment"), "NOP");
        assert_eq!(strip_comment("; only comment"), "");
        assert_eq!(strip_comment(r#"S: .ascii "a;b" ; c"#), r#"S: .ascii "a;b""#);
    }

    #[test]
    fn section_directives() {
        assert_eq!(Section::parse(".text"), Some(Section::Text));
        assert_eq!(Section::parse("  .DATA  "), Some(Section::Data));
        assert_eq!(Section::parse(".vectable"), Some(Section::Vectable));
        assert_eq!(Section::parse(".byte 1"), None);
        assert_eq!(Section::parse("NOP"), None);
    }

    #[test]
    fn operands_keep_parenthesized_groups() {
        assert_eq!(
            split_operands("@(4, PC), R1").unwrap(),
            vec!["@(4, PC)".to_string(), "R1".to_string()]
        );
        assert_eq!(
            split_operands("#5,R0").unwrap(),
            vec!["#5".to_string(), "R0".to_string()]
        );
        assert!(split_operands("").unwrap().is_empty());
        assert!(matches!(split_operands("R1,,R2"), Err(Error::Syntax(_))));
        assert!(matches!(
            split_operands("@(4, R1)), R2"),
            Err(Error::MalformedOperand(_))
        ));
    }

    #[test]
    fn text_statements() {
        let stmt = Stmt::parse("start:").unwrap();
        assert_eq!(stmt.label.as_deref(), Some("START"));
        assert!(stmt.inst.is_none());

        let stmt = Stmt::parse("loop: dt r1").unwrap();
        assert_eq!(stmt.label.as_deref(), Some("LOOP"));
        let inst = stmt.inst.unwrap();
        assert_eq!(inst.mnemonic, "DT");
        assert_eq!(inst.operands, vec!["r1".to_string()]);

        let stmt = Stmt::parse("mov.l @(4, PC), R1").unwrap();
        assert_eq!(stmt.label, None);
        assert_eq!(stmt.inst.unwrap().mnemonic, "MOV.L");

        assert!(matches!(
            Stmt::parse(".org 0x100"),
            Err(Error::UnknownDirective(d)) if d == ".org"
        ));
        assert!(matches!(Stmt::parse("1abc: NOP"), Err(Error::Syntax(_))));
    }

    #[test]
    fn data_statements() {
        let stmt = DataStmt::parse("X: .long -1").unwrap();
        assert_eq!(stmt.label.as_deref(), Some("X"));
        assert_eq!(stmt.directive, ".long");
        assert_eq!(stmt.args, "-1");

        let stmt = DataStmt::parse(".BYTE 1, 2").unwrap();
        assert_eq!(stmt.label, None);
        assert_eq!(stmt.directive, ".byte");

        assert!(matches!(DataStmt::parse("X: 12"), Err(Error::Syntax(_))));
    }

    #[test]
    fn vector_statements() {
        let stmt = VecStmt::parse("reset: 0x00000020").unwrap();
        assert_eq!(stmt.name, "RESET");
        assert_eq!(stmt.address, 0x20);
        assert_eq!(VecStmt::parse("NMI: 400").unwrap().address, 0x400);
        assert!(VecStmt::parse("0x20").is_err());
        assert!(matches!(
            VecStmt::parse("V: 0x1FFFFFFFF"),
            Err(Error::OutOfRange { bits: 32, .. })
        ));
    }
}
