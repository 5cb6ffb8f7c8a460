use arch::{EncodeError, Reg};
use thiserror::Error;

use crate::msg::Msg;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported instruction: `{0} {1}`")]
    UnsupportedInstruction(String, String),

    #[error("Undefined label: `{0}`")]
    UndefinedLabel(String),

    #[error("Unknown directive: `{0}`")]
    UnknownDirective(String),

    #[error("Branch displacement {disp} does not fit in a signed {bits}-bit field")]
    DisplacementOutOfRange { disp: i64, bits: u32 },

    #[error("Segment `{segment}` overflows: {size} bytes do not fit in {capacity}")]
    SegmentOverflow {
        segment: String,
        size: u32,
        capacity: u32,
    },

    #[error("Malformed operand: `{0}`")]
    MalformedOperand(String),

    #[error("Value {value} does not fit in {bits} bits")]
    OutOfRange { value: i64, bits: u32 },

    #[error("Operand `{0}` must be R0 for this instruction")]
    RequiresR0(Reg),

    #[error("Cannot parse `{0}` as a number")]
    InvalidNumber(String),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Invalid layout: {0}")]
    Layout(String),

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to read file: {0}")]
    FileRead(String, #[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::OutOfRange { value, bits } => Error::OutOfRange { value, bits },
            EncodeError::BranchOutOfRange { disp, bits } => {
                Error::DisplacementOutOfRange { disp, bits }
            }
            EncodeError::RequiresR0(reg) => Error::RequiresR0(reg),
        }
    }
}

/// An assembly error bound to the source line that caused it.
#[derive(Error, Debug)]
#[error("line {line}: {error}")]
pub struct Diag {
    /// 1-based line number
    pub line: usize,
    pub raw: String,
    #[source]
    pub error: Error,
}

impl Diag {
    pub fn new(line: usize, raw: &str, error: Error) -> Self {
        Diag {
            line,
            raw: raw.to_string(),
            error,
        }
    }

    pub fn print(&self, file: &str) {
        Msg::Error(self.error.to_string()).print((file, self.line, &self.raw));
    }
}
