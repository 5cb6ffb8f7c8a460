use std::fmt;
use std::fs::File;
use std::io::Write;

use tracing::debug;

use crate::assembler::Program;
use crate::backpatch::Placement;
use crate::error::Error;
use crate::layout::Layout;

/// One 16-bit memory word with its annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub word: u16,
    pub note: Option<String>,
}

impl Record {
    fn padding(addr: u32) -> Self {
        Record {
            word: 0,
            note: Some(format!("0x{:08X} : 0x00", addr)),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016b}", self.word)?;
        if let Some(note) = &self.note {
            write!(f, "\t; {}", note)?;
        }
        Ok(())
    }
}

/// The program and data segments, each padded to the segment size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub text: Vec<Record>,
    pub data: Vec<Record>,
    pub text_origin: u32,
    pub data_origin: u32,
}

impl Image {
    /// Lays out the backpatched `words` and the data stream of `program`.
    /// `place` has already checked that both fit their segments.
    pub fn build(program: &Program, words: &[u16], place: &Placement, layout: &Layout) -> Image {
        let capacity = (layout.segment_size / 2) as usize;

        // Vector table, zero-filled up to its reserved size.
        let mut text = Vec::with_capacity(capacity);
        for vector in &program.vectors {
            text.push(Record {
                word: (vector.address >> 16) as u16,
                note: Some(vector.name.clone()),
            });
            text.push(Record {
                word: vector.address as u16,
                note: None,
            });
        }
        while (text.len() as u32) * 2 < place.vectable_bytes {
            let addr = place.vectable_origin + text.len() as u32 * 2;
            text.push(Record::padding(addr));
        }

        for (idx, (emitted, word)) in program.text.iter().zip(words).enumerate() {
            let addr = place.instruction_address(idx);
            text.push(Record {
                word: *word,
                note: Some(format!(
                    "0x{:08X} : {}",
                    addr,
                    program.raw(emitted.line).trim_start()
                )),
            });
        }
        while text.len() < capacity {
            text.push(Record::padding(layout.text_origin + text.len() as u32 * 2));
        }

        let packed = program.data.words();
        let mut data = Vec::with_capacity(capacity);
        for (word, _) in &packed {
            let addr = place.data_base + data.len() as u32 * 2;
            data.push(Record {
                word: *word,
                note: Some(format!(
                    "0x{:08X} : {},{} / {} / {:#x}",
                    addr,
                    word >> 8,
                    word & 0xFF,
                    word,
                    word
                )),
            });
        }
        while data.len() < capacity {
            data.push(Record::padding(place.data_base + data.len() as u32 * 2));
        }

        debug!(
            text_words = program.text.len(),
            data_words = packed.len(),
            vectable_bytes = place.vectable_bytes,
            "image built"
        );
        Image {
            text,
            data,
            text_origin: layout.text_origin,
            data_origin: layout.data_origin,
        }
    }

    pub fn render(records: &[Record]) -> String {
        let mut out = String::new();
        for record in records {
            out.push_str(&record.to_string());
            out.push('\n');
        }
        out
    }

    /// Raw big-endian image starting at the lower of the two origins. The
    /// gap between the segments is zero.
    pub fn to_bin(&self) -> Vec<u8> {
        let base = self.text_origin.min(self.data_origin);
        let end = |origin: u32, records: &[Record]| origin + records.len() as u32 * 2;
        let size = end(self.text_origin, &self.text).max(end(self.data_origin, &self.data)) - base;

        let mut bin = vec![0u8; size as usize];
        for (origin, records) in [(self.text_origin, &self.text), (self.data_origin, &self.data)] {
            let start = (origin - base) as usize;
            for (idx, record) in records.iter().enumerate() {
                let at = start + idx * 2;
                bin[at..at + 2].copy_from_slice(&record.word.to_be_bytes());
            }
        }
        bin
    }

    /// Writes `<base>_mem0.txt`, `<base>_mem1.txt` and optionally `<base>.bin`.
    pub fn write(&self, base: &str, bin: bool) -> Result<Vec<String>, Error> {
        let mut written = vec![];
        let mem0 = format!("{}_mem0.txt", base);
        write_file(&mem0, Self::render(&self.text).as_bytes())?;
        written.push(mem0);

        let mem1 = format!("{}_mem1.txt", base);
        write_file(&mem1, Self::render(&self.data).as_bytes())?;
        written.push(mem1);

        if bin {
            let path = format!("{}.bin", base);
            write_file(&path, &self.to_bin())?;
            written.push(path);
        }
        Ok(written)
    }
}

fn write_file(path: &str, contents: &[u8]) -> Result<(), Error> {
    let mut file = File::create(path).map_err(|e| Error::FileCreate(path.to_string(), e))?;
    file.write_all(contents)
        .map_err(|e| Error::FileWrite(path.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;
    use crate::backpatch::backpatch;
    use crate::error::Diag;

    fn image(source: &str, layout: &Layout) -> Result<Image, Diag> {
        let program = Assembler::new().run(source)?;
        let place = Placement::new(layout, &program)?;
        let words = backpatch(&program, &place)?;
        Ok(Image::build(&program, &words, &place, layout))
    }

    fn small() -> Layout {
        Layout {
            segment_size: 16,
            data_origin: 16,
            ..Layout::default()
        }
    }

    #[test]
    fn record_format() {
        let record = Record {
            word: 0xE005,
            note: Some("0x00000000 : MOV #5, R0".to_string()),
        };
        assert_eq!(
            record.to_string(),
            "1110000000000101\t; 0x00000000 : MOV #5, R0"
        );
        let bare = Record {
            word: 0x0020,
            note: None,
        };
        assert_eq!(bare.to_string(), "0000000000100000");
    }

    #[test]
    fn text_segment_is_padded() {
        let image = image(".text\n    MOV #5, R0 ; five\n", &small()).unwrap();
        assert_eq!(image.text.len(), 8);
        assert_eq!(image.text[0].word, 0xE005);
        assert_eq!(
            image.text[0].note.as_deref(),
            Some("0x00000000 : MOV #5, R0 ; five")
        );
        assert_eq!(image.text[1], Record::padding(2));
        assert_eq!(image.text[7].note.as_deref(), Some("0x0000000E : 0x00"));
    }

    #[test]
    fn vectors_come_first() {
        let source = ".text\nNOP\n.vectable\nreset: 0x12345678\n";
        let image = image(source, &small()).unwrap();
        assert_eq!(image.text[0].word, 0x1234);
        assert_eq!(image.text[0].note.as_deref(), Some("RESET"));
        assert_eq!(image.text[1].word, 0x5678);
        assert_eq!(image.text[1].note, None);
        assert_eq!(
            image.text[2].note.as_deref(),
            Some("0x00000004 : NOP")
        );
    }

    #[test]
    fn fixed_vectable_is_zero_filled() {
        let layout = Layout {
            vectable_entries: Some(2),
            ..small()
        };
        let image = image(".vectable\nreset: 0x10\n.text\nNOP\n", &layout).unwrap();
        assert_eq!(image.text[2], Record::padding(4));
        assert_eq!(image.text[3], Record::padding(6));
        assert_eq!(image.text[4].word, 0x0009);
    }

    #[test]
    fn data_notes() {
        let image = image(".data\nX: .long -1\nY: .word 0x0102\n", &small()).unwrap();
        assert_eq!(image.data.len(), 8);
        assert_eq!(
            image.data[0].to_string(),
            "1111111111111111\t; 0x00000010 : 255,255 / 65535 / 0xffff"
        );
        assert_eq!(
            image.data[2].note.as_deref(),
            Some("0x00000014 : 1,2 / 258 / 0x102")
        );
        assert_eq!(image.data[3], Record::padding(0x16));
    }

    #[test]
    fn binary_image() {
        let image = image(".text\nMOV #5, R0\n.data\n.byte 0xAB\n", &small()).unwrap();
        let bin = image.to_bin();
        assert_eq!(bin.len(), 32);
        assert_eq!(&bin[0..2], &[0xE0, 0x05]);
        assert_eq!(&bin[16..18], &[0xAB, 0x00]);
    }
}
