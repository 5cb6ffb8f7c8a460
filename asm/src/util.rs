use arch::TABLE;
use color_print::cformat;

use crate::assembler::Program;
use crate::backpatch::Placement;

/// Prints every source line next to the address, final word and
/// disassembly of the instruction it produced.
pub fn print_dump(path: &str, program: &Program, words: &[u16], place: &Placement) {
    println!(
        "{}+------[{}]{}",
        "-".repeat(17),
        path,
        "-".repeat(45usize.saturating_sub(path.len()))
    );

    let mut emitted = program.text.iter().zip(words).enumerate().peekable();
    for (idx, raw) in program.lines.iter().enumerate() {
        let line = idx + 1;
        match emitted.next_if(|(_, (e, _))| e.line == line) {
            Some((index, (_, &word))) => {
                let addr = place.instruction_address(index);
                let asm = match TABLE.decode(word, addr) {
                    Some((entry, ops)) => entry.cformat(&ops),
                    None => cformat!("<r,s>????</>"),
                };
                println!(
                    "[{:08X}] {:04X} | {:>4}: {}    {}",
                    addr,
                    word,
                    line,
                    asm,
                    cformat!("<dim>{}</>", raw.trim())
                );
            }
            None => println!("{:17}| {:>4}: {}", "", line, raw.trim_end()),
        }
    }
    println!("-----------------+-------------------------------------------------------");

    for (name, symbol) in program.symbols.iter() {
        println!(
            "{}",
            cformat!(
                "<g>{:<16}</> 0x{:08X} <dim>({} line {})</>",
                name,
                place.address(symbol),
                symbol.section,
                symbol.line
            )
        );
    }
}
