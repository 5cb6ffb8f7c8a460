use std::process::ExitCode;

use color_print::cprintln;
use sh2asm::compare::{compare, parse_dump, Expected};
use sh2asm::msg::Msg;
use sh2asm::parser::parse_number;
use sh2asm::{read_file, Failure};
use tracing::debug;
use tracing_subscriber::prelude::*;

/// Compares a memory dump against expected values
#[derive(Debug, clap::Parser)]
#[clap(version, about)]
struct Args {
    /// Expected values (`...: 0xADDR` then `B.`/`W.`/`L.` lines)
    expected: String,

    /// Memory dump in assembler output format
    dump: String,

    /// Address of the first byte of the dump
    #[clap(long, default_value = "0x400", value_parser = parse_origin)]
    origin: u32,
}

fn parse_origin(s: &str) -> Result<u32, String> {
    let value = parse_number(s).map_err(|e| e.to_string())?;
    u32::try_from(value).map_err(|_| format!("`{}` is not a valid address", s))
}

fn run(args: &Args) -> Result<usize, (String, Failure)> {
    let load = |path: &str| -> Result<String, (String, Failure)> {
        read_file(path).map_err(|e| (path.to_string(), Failure::from(e)))
    };
    let expected_text = load(&args.expected)?;
    let dump_text = load(&args.dump)?;

    let expected = Expected::parse(&expected_text)
        .map_err(|d| (args.expected.clone(), Failure::from(d)))?;
    let dump = parse_dump(&dump_text).map_err(|d| (args.dump.clone(), Failure::from(d)))?;
    debug!(
        start = expected.start,
        expected = expected.bytes.len(),
        dump = dump.len(),
        "comparing"
    );

    let mismatches = compare(&expected, &dump, args.origin);
    for mismatch in &mismatches {
        cprintln!("<red,bold>mismatch</> @ {}", mismatch);
    }
    if mismatches.is_empty() {
        cprintln!(
            "<green,bold>ok</>: {} bytes from 0x{:08X} match",
            expected.bytes.len(),
            expected.start
        );
    } else {
        cprintln!(
            "<red,bold>failed</>: {} of {} bytes differ",
            mismatches.len(),
            expected.bytes.len()
        );
    }
    Ok(mismatches.len())
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("warn"));
    if let Ok(filter) = filter {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err((file, Failure::Source(diag))) => {
            diag.print(&file);
            ExitCode::FAILURE
        }
        Err((_, Failure::Setup(err))) => {
            Msg::Error(err.to_string()).headline();
            ExitCode::FAILURE
        }
    }
}
