//! Two-pass assembler for the SH-2.
//!
//! Pass 1 ([`assembler`]) encodes instructions with zero branch
//! displacements and records labels. Pass 2 ([`backpatch`]) fills in the
//! displacements once every label address is known, and [`segment`] lays the
//! result out in fixed-size memory segments.

pub mod assembler;
pub mod backpatch;
pub mod compare;
pub mod data;
pub mod error;
pub mod label;
pub mod layout;
pub mod msg;
pub mod operand;
pub mod parser;
pub mod segment;
pub mod util;

use std::fs;

use thiserror::Error;
use tracing::info;

pub use assembler::{Assembler, Program};
pub use backpatch::{backpatch, Placement};
pub use error::{Diag, Error};
pub use layout::Layout;
pub use segment::{Image, Record};

#[derive(Error, Debug)]
pub enum Failure {
    /// The source has an error at a specific line.
    #[error(transparent)]
    Source(#[from] Diag),

    /// Setup or I/O failed.
    #[error(transparent)]
    Setup(#[from] Error),
}

#[derive(Debug, Clone)]
pub struct Output {
    pub program: Program,
    pub place: Placement,
    /// Backpatched instruction words.
    pub words: Vec<u16>,
    pub image: Image,
}

pub fn assemble(source: &str, layout: &Layout) -> Result<Output, Failure> {
    layout.validate()?;
    let program = Assembler::new().run(source)?;
    let place = Placement::new(layout, &program)?;
    let words = backpatch(&program, &place)?;
    let image = Image::build(&program, &words, &place, layout);
    Ok(Output {
        program,
        place,
        words,
        image,
    })
}

pub fn read_file(path: &str) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            Error::FileOpen(path.to_string(), e)
        }
        _ => Error::FileRead(path.to_string(), e),
    })
}

/// Assembles `input` and writes the segment files next to `base`. Nothing is
/// written when assembly fails.
pub fn assemble_file(
    input: &str,
    base: &str,
    layout: &Layout,
    bin: bool,
) -> Result<(Output, Vec<String>), Failure> {
    let source = read_file(input)?;
    let output = assemble(&source, layout)?;
    let written = output.image.write(base, bin)?;
    info!(input, files = ?written, "assembled");
    Ok((output, written))
}

/// Default output basename: the input path without its extension.
pub fn default_base(input: &str) -> String {
    let path = std::path::Path::new(input);
    path.with_extension("").to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_mov_immediate() {
        let output = assemble(".text\nMOV #5, R0\n", &Layout::default()).unwrap();
        assert_eq!(output.words, vec![0xE005]);
        assert_eq!(output.image.text[0].word, 0xE005);
    }

    #[test]
    fn invalid_layout_is_a_setup_failure() {
        let layout = Layout {
            segment_size: 3,
            ..Layout::default()
        };
        assert!(matches!(
            assemble(".text\nNOP\n", &layout),
            Err(Failure::Setup(Error::Layout(_)))
        ));
    }

    #[test]
    fn default_basename() {
        assert_eq!(default_base("tests/add.asm"), "tests/add");
        assert_eq!(default_base("prog"), "prog");
    }
}
