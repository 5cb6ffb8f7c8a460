use tracing::{debug, trace};

use crate::assembler::Program;
use crate::error::{Diag, Error};
use crate::label::{Space, Symbol};
use crate::layout::Layout;

/// Absolute addresses of the program pieces once the vector table size is
/// known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub vectable_origin: u32,
    pub vectable_bytes: u32,
    /// Address of the first instruction.
    pub text_base: u32,
    pub data_base: u32,
}

impl Placement {
    /// Sizes the vector table and checks that vectors and instructions fit
    /// the text segment and the data stream fits the data segment. Every
    /// address handed out afterwards lies inside a validated segment.
    pub fn new(layout: &Layout, program: &Program) -> Result<Self, Diag> {
        let at = |line: usize, e: Error| Diag::new(line, program.raw(line), e);
        let overflow = |segment: &str, size: u32| Error::SegmentOverflow {
            segment: segment.to_string(),
            size,
            capacity: layout.segment_size,
        };

        let vectable_bytes = layout
            .vectable_bytes(program.vectors.len())
            .map_err(|e| {
                let first_extra = layout.vectable_entries.unwrap_or(0) as usize;
                let line = program.vectors.get(first_extra).map_or(0, |v| v.line);
                at(line, e)
            })?;
        if vectable_bytes > layout.segment_size {
            // Entries are 4 bytes wide.
            let first_extra = (layout.segment_size / 4) as usize;
            let line = program.vectors.get(first_extra).map_or(0, |v| v.line);
            return Err(at(line, overflow("text", vectable_bytes)));
        }

        let room = ((layout.segment_size - vectable_bytes) / 2) as usize;
        if let Some(first) = program.text.get(room) {
            let text_bytes = (program.text.len() as u32).saturating_mul(2);
            let size = vectable_bytes.saturating_add(text_bytes);
            return Err(at(first.line, overflow("text", size)));
        }

        let packed = program.data.words();
        if let Some(&(_, line)) = packed.get((layout.segment_size / 2) as usize) {
            let size = (packed.len() as u32).saturating_mul(2);
            return Err(at(line, overflow("data", size)));
        }

        Ok(Placement {
            vectable_origin: layout.text_origin,
            vectable_bytes,
            text_base: layout.text_origin + vectable_bytes,
            data_base: layout.data_origin,
        })
    }

    pub fn address(&self, symbol: &Symbol) -> u32 {
        match symbol.section {
            Space::Text => self.text_base + symbol.offset,
            Space::Data => self.data_base + symbol.offset,
        }
    }

    pub fn instruction_address(&self, index: usize) -> u32 {
        self.text_base + index as u32 * 2
    }
}

/// Pass 2: fills the displacement of every recorded branch into a copy of the
/// pass 1 words.
///
/// The displacement is `(target - branch) / 2`, truncated toward zero, and
/// must fit the signed field of the branch format.
pub fn backpatch(program: &Program, place: &Placement) -> Result<Vec<u16>, Diag> {
    let words: Vec<u16> = program.text.iter().map(|e| e.word).collect();
    let words = program
        .branches
        .iter()
        .try_fold(words, |mut words, branch| -> Result<Vec<u16>, Diag> {
            let emitted = &program.text[branch.index];
            let diag = |e: Error| Diag::new(emitted.line, program.raw(emitted.line), e);

            let symbol = program.symbols.resolve(&branch.target).map_err(diag)?;
            let target = place.address(symbol) as i64;
            let here = place.instruction_address(branch.index) as i64;
            let disp = (target - here) / 2;
            trace!(line = emitted.line, target, here, disp, "{}", branch.target);

            words[branch.index] = branch
                .format
                .splice(words[branch.index], disp)
                .map_err(|e| diag(e.into()))?;
            Ok(words)
        })?;
    debug!(branches = program.branches.len(), "pass 2 done");
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;

    fn assemble(source: &str, layout: &Layout) -> Result<Vec<u16>, Diag> {
        let program = Assembler::new().run(source)?;
        let place = Placement::new(layout, &program)?;
        backpatch(&program, &place)
    }

    fn patched(source: &str) -> Vec<u16> {
        assemble(source, &Layout::default()).unwrap()
    }

    #[test]
    fn backward_bra() {
        let words = patched(".text\nstart: NOP\nNOP\nBRA start\n");
        assert_eq!(words, vec![0x0009, 0x0009, 0xAFFE]);
        let words = patched(".text\nstart: NOP\nBRA start\n");
        assert_eq!(words[1], 0xAFFF);
    }

    #[test]
    fn forward_and_backward_use_the_same_formula() {
        let forward = patched(".text\nBT there\nNOP\nthere: NOP\n");
        let backward = patched(".text\nthere: NOP\nNOP\nBT there\n");
        assert_eq!(forward[0], 0x8902);
        assert_eq!(backward[2], 0x89FE);
        assert_eq!(forward[0] & 0xFF00, backward[2] & 0xFF00);
    }

    #[test]
    fn vector_table_shifts_text_labels_uniformly() {
        let source = ".vectable\nreset: 0x10\n.text\nstart: NOP\nBRA start\n";
        assert_eq!(patched(source)[1], 0xAFFF);
    }

    #[test]
    fn branch_to_data_label_uses_absolute_addresses() {
        let layout = Layout {
            segment_size: 64,
            data_origin: 64,
            ..Layout::default()
        };
        let words = assemble(".data\nX: .word 1\n.text\nBRA X\n", &layout).unwrap();
        assert_eq!(words[0], 0xA020);
    }

    #[test]
    fn undefined_label() {
        let diag = assemble(".text\nNOP\nBSR missing\n", &Layout::default()).unwrap_err();
        assert_eq!(diag.line, 3);
        assert!(matches!(diag.error, Error::UndefinedLabel(ref n) if n == "MISSING"));
    }

    #[test]
    fn displacement_limits() {
        let nops = |n: usize| "NOP\n".repeat(n);

        // 8-bit: +127 fits, +128 does not.
        let ok = format!(".text\nBT far\n{}far: NOP\n", nops(126));
        assert_eq!(patched(&ok)[0], 0x897F);
        let bad = format!(".text\nBT far\n{}far: NOP\n", nops(127));
        let diag = assemble(&bad, &Layout::default()).unwrap_err();
        assert!(matches!(
            diag.error,
            Error::DisplacementOutOfRange { disp: 128, bits: 8 }
        ));

        // 8-bit: -128 fits, -129 does not.
        let ok = format!(".text\nback: NOP\n{}BF back\n", nops(127));
        assert_eq!(patched(&ok)[128], 0x8B80);
        let bad = format!(".text\nback: NOP\n{}BF back\n", nops(128));
        assert!(assemble(&bad, &Layout::default()).is_err());
    }

    #[test]
    fn fixed_vectable_overflow_names_the_extra_entry() {
        let layout = Layout {
            vectable_entries: Some(1),
            ..Layout::default()
        };
        let source = ".vectable\na: 0x10\nb: 0x20\n.text\nNOP\n";
        let diag = assemble(source, &layout).unwrap_err();
        assert_eq!(diag.line, 3);
        assert!(matches!(diag.error, Error::SegmentOverflow { .. }));
    }

    fn small() -> Layout {
        Layout {
            segment_size: 8,
            data_origin: 8,
            ..Layout::default()
        }
    }

    #[test]
    fn vector_table_alone_can_overflow_text() {
        let source = ".vectable\na: 0x10\nb: 0x20\nc: 0x30\n";
        let diag = assemble(source, &small()).unwrap_err();
        assert_eq!(diag.line, 4);
        assert_eq!(diag.raw, "c: 0x30");
        assert!(matches!(
            diag.error,
            Error::SegmentOverflow { size: 12, capacity: 8, .. }
        ));
        assert!(assemble(".vectable\na: 0x10\nb: 0x20\n", &small()).is_ok());
    }

    #[test]
    fn text_overflow_names_first_extra_instruction() {
        let source = ".vectable\na: 0x10\n.text\nNOP\nNOP\nRTS\n";
        let diag = assemble(source, &small()).unwrap_err();
        assert_eq!(diag.line, 6);
        assert_eq!(diag.raw, "RTS");
        assert!(matches!(
            diag.error,
            Error::SegmentOverflow { size: 10, capacity: 8, .. }
        ));
    }

    #[test]
    fn overflow_is_reported_before_branches() {
        // Branch distance also exceeds 8 bits; the segment is the real problem.
        let source = format!(".text\nBT end\n{}end: NOP\n", "NOP\n".repeat(200));
        let layout = Layout {
            segment_size: 256,
            data_origin: 256,
            ..Layout::default()
        };
        let diag = assemble(&source, &layout).unwrap_err();
        assert_eq!(diag.line, 130);
        assert!(matches!(diag.error, Error::SegmentOverflow { .. }));
    }

    #[test]
    fn text_near_the_top_of_the_address_space() {
        let layout = Layout {
            segment_size: 16,
            text_origin: 0xFFFF_FFE0,
            data_origin: 0,
            vectable_entries: None,
        };
        let fits = format!(".text\nBRA end\n{}end: NOP\n", "NOP\n".repeat(6));
        assert_eq!(assemble(&fits, &layout).unwrap()[0], 0xA007);

        let source = format!(".text\n{}BRA end\nend: NOP\n", "NOP\n".repeat(19));
        let diag = assemble(&source, &layout).unwrap_err();
        assert_eq!(diag.line, 10);
        assert!(matches!(diag.error, Error::SegmentOverflow { .. }));
    }

    #[test]
    fn data_overflow_names_the_line() {
        let diag = assemble(".data\nA: .long 1, 2\nB: .byte 5\n", &small()).unwrap_err();
        assert_eq!(diag.line, 3);
        assert_eq!(diag.raw, "B: .byte 5");
        assert!(matches!(
            diag.error,
            Error::SegmentOverflow { size: 10, capacity: 8, .. }
        ));
    }
}
