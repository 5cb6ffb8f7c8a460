use std::fs::File;
use std::io::BufReader;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Memory map of the output image.
///
/// ```yaml
/// segment_size: 1024
/// text_origin: 0
/// data_origin: 1024
/// vectable_entries: 4
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    /// Capacity of each segment in bytes.
    pub segment_size: u32,
    pub text_origin: u32,
    pub data_origin: u32,
    /// Fixed number of 32-bit vector table entries. When unset the table is
    /// as long as the entries in the source.
    pub vectable_entries: Option<u32>,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            segment_size: 1024,
            text_origin: 0,
            data_origin: 1024,
            vectable_entries: None,
        }
    }
}

impl Layout {
    pub fn load(path: &str) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
        let layout: Layout = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|e| Error::Layout(format!("{}: {}", path, e)))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.segment_size == 0 || self.segment_size % 2 != 0 {
            return Err(Error::Layout(format!(
                "segment_size must be a non-zero even number, got {}",
                self.segment_size
            )));
        }
        if self.text_origin % 2 != 0 || self.data_origin % 2 != 0 {
            return Err(Error::Layout(format!(
                "origins must be even, got text 0x{:X} and data 0x{:X}",
                self.text_origin, self.data_origin
            )));
        }
        if let Some(n) = self.vectable_entries {
            if n as u64 * 4 > self.segment_size as u64 {
                return Err(Error::Layout(format!(
                    "{} vector table entries do not fit in a {} byte segment",
                    n, self.segment_size
                )));
            }
        }
        let end = |origin: u32| origin.checked_add(self.segment_size);
        let (text_end, data_end) = match (end(self.text_origin), end(self.data_origin)) {
            (Some(t), Some(d)) => (t, d),
            _ => return Err(Error::Layout("segment exceeds the address space".to_string())),
        };
        if self.text_origin < data_end && self.data_origin < text_end {
            return Err(Error::Layout(format!(
                "text segment 0x{:X}..0x{:X} overlaps data segment 0x{:X}..0x{:X}",
                self.text_origin, text_end, self.data_origin, data_end
            )));
        }
        Ok(())
    }

    /// Bytes reserved for the vector table given the number of entries found
    /// in the source.
    pub fn vectable_bytes(&self, found: usize) -> Result<u32, Error> {
        match self.vectable_entries {
            Some(n) if found as u32 > n => Err(Error::SegmentOverflow {
                segment: "vectable".to_string(),
                size: found as u32 * 4,
                capacity: n * 4,
            }),
            Some(n) => Ok(n * 4),
            None => Ok(found as u32 * 4),
        }
    }
}
