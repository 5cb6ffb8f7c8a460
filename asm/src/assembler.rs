use arch::operand::shape_string;
use arch::{Format, Mode, Operand, TABLE};
use tracing::{debug, trace};

use crate::data::{DataStream, Directive};
use crate::error::{Diag, Error};
use crate::label::{Space, Symbol, Symbols};
use crate::msg::{Msg, Notice};
use crate::operand::classify;
use crate::parser::{is_ident, strip_comment, DataStmt, Section, Stmt, VecStmt};

/// An instruction word emitted in pass 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub word: u16,
    pub line: usize,
}

/// A branch whose displacement is filled in by pass 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Index of the branch in [`Program::text`].
    pub index: usize,
    pub target: String,
    pub format: Format,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vector {
    pub name: String,
    pub address: u32,
    pub line: usize,
}

/// Result of pass 1.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub lines: Vec<String>,
    pub text: Vec<Emitted>,
    pub branches: Vec<Branch>,
    pub data: DataStream,
    pub vectors: Vec<Vector>,
    pub symbols: Symbols,
    pub notices: Vec<Notice>,
}

impl Program {
    /// Source text of the 1-based `line`.
    pub fn raw(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map_or("", String::as_str)
    }
}

/// State of one assembly run. A fresh value is used for every source.
#[derive(Debug, Default)]
pub struct Assembler {
    section: Option<Section>,
    program: Program,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass 1: encodes every instruction, lays out data and records labels
    /// and branches. Stops at the first error.
    pub fn run(mut self, source: &str) -> Result<Program, Diag> {
        self.program.lines = source.lines().map(str::to_string).collect();
        for (idx, raw) in source.lines().enumerate() {
            self.line(idx + 1, raw)
                .map_err(|e| Diag::new(idx + 1, raw, e))?;
        }
        debug!(
            words = self.program.text.len(),
            branches = self.program.branches.len(),
            data_bytes = self.program.data.offset(),
            vectors = self.program.vectors.len(),
            labels = self.program.symbols.len(),
            "pass 1 done"
        );
        Ok(self.program)
    }

    fn line(&mut self, line: usize, raw: &str) -> Result<(), Error> {
        let code = strip_comment(raw);
        if code.is_empty() {
            return Ok(());
        }
        if let Some(section) = Section::parse(code) {
            trace!(line, %section, "section");
            self.section = Some(section);
            return Ok(());
        }

        match self.section {
            Some(Section::Text) => self.text(line, code),
            Some(Section::Data) => self.data(line, raw, code),
            Some(Section::Vectable) => self.vector(line, code),
            None => {
                self.notice(
                    Msg::Warn("Statement outside of any section is ignored".to_string()),
                    line,
                );
                Ok(())
            }
        }
    }

    fn text(&mut self, line: usize, code: &str) -> Result<(), Error> {
        let stmt = Stmt::parse(code)?;
        let index = self.program.text.len();
        if let Some(label) = &stmt.label {
            self.define(label, Space::Text, index as u32 * 2, line);
        }
        let inst = match stmt.inst {
            Some(inst) => inst,
            None => return Ok(()),
        };

        let ops: Vec<Operand> = inst.operands.iter().map(|token| classify(token)).collect();
        for op in &ops {
            if let Operand::Label(name) = op {
                if !is_ident(name) {
                    return Err(Error::MalformedOperand(name.clone()));
                }
            }
        }
        let shape: Vec<Mode> = ops.iter().map(Operand::mode).collect();
        let entry = TABLE.lookup(&inst.mnemonic, &shape).ok_or_else(|| {
            Error::UnsupportedInstruction(inst.mnemonic.clone(), shape_string(&shape))
        })?;
        let word = entry.encode(&ops)?;

        if entry.branch_bits().is_some() {
            if let Some(Operand::Label(target)) = ops.first() {
                self.program.branches.push(Branch {
                    index,
                    target: target.clone(),
                    format: entry.format,
                });
            }
        }
        trace!(line, word = format_args!("{:04X}", word), "{}", entry.key());
        self.program.text.push(Emitted { word, line });
        Ok(())
    }

    fn data(&mut self, line: usize, raw: &str, code: &str) -> Result<(), Error> {
        let stmt = DataStmt::parse(code)?;
        let directive = Directive::parse(&stmt.directive)?;
        let start = self.program.data.emit(directive, &stmt.args, line)?;
        trace!(line, start, "{}", raw.trim());
        if let Some(label) = &stmt.label {
            self.define(label, Space::Data, start, line);
        }
        Ok(())
    }

    fn vector(&mut self, line: usize, code: &str) -> Result<(), Error> {
        let stmt = VecStmt::parse(code)?;
        self.program.vectors.push(Vector {
            name: stmt.name,
            address: stmt.address,
            line,
        });
        Ok(())
    }

    fn define(&mut self, name: &str, section: Space, offset: u32, line: usize) {
        let symbol = Symbol {
            section,
            offset,
            line,
        };
        if let Some(prev) = self.program.symbols.define(name, symbol) {
            self.notice(Msg::Warn(format!("Re-defined label: `{}`", name)), line);
            self.notice(
                Msg::Note(
                    "Already defined here. The value has been overridden.".to_string(),
                ),
                prev.line,
            );
        }
    }

    fn notice(&mut self, msg: Msg, line: usize) {
        let raw = self.program.raw(line).to_string();
        self.program.notices.push(Notice { msg, line, raw });
    }
}
