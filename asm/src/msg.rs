use color_print::ceprintln;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Error(String),
    Warn(String),
    Note(String),
}

impl Msg {
    pub fn headline(&self) {
        match self {
            Msg::Error(msg) => ceprintln!("<red,bold>error</>: {}", msg),
            Msg::Warn(msg) => ceprintln!("<yellow,bold>warn</>: {}", msg),
            Msg::Note(msg) => ceprintln!("<green,bold>note</>: {}", msg),
        }
    }

    pub fn print(&self, info: (&str, usize, &str)) {
        let (file, line, raw) = info;
        self.headline();
        ceprintln!("     <blue>--></> <underline>{}:{}</>", file, line);
        ceprintln!("      <blue>|</>");
        ceprintln!(" <blue>{:>4} |</> {}", line, raw);
        ceprintln!("      <blue>|</>");
    }
}

/// A message bound to a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub msg: Msg,
    pub line: usize,
    pub raw: String,
}

impl Notice {
    pub fn print(&self, file: &str) {
        self.msg.print((file, self.line, &self.raw));
    }
}
