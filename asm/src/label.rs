use indexmap::IndexMap;
use strum::Display;

use crate::error::Error;

/// Sections a label can point into. Vector table entries are not labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Space {
    #[strum(serialize = ".text")]
    Text,
    #[strum(serialize = ".data")]
    Data,
}

/// A label definition: the section it lives in, its byte offset from the
/// start of that section's content, and the 1-based source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub section: Space,
    pub offset: u32,
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Symbols {
    labels: IndexMap<String, Symbol>,
}

impl Symbols {
    pub fn new() -> Self {
        Symbols {
            labels: IndexMap::new(),
        }
    }

    /// Defines `name`, returning the definition it replaced.
    pub fn define(&mut self, name: &str, symbol: Symbol) -> Option<Symbol> {
        self.labels.insert(name.to_uppercase(), symbol)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.labels.get(&name.to_uppercase())
    }

    pub fn resolve(&self, name: &str) -> Result<&Symbol, Error> {
        self.get(name)
            .ok_or_else(|| Error::UndefinedLabel(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Symbol)> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
