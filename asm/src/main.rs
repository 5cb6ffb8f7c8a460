use std::process::ExitCode;

use color_print::cprintln;
use sh2asm::msg::Msg;
use sh2asm::{assemble_file, default_base, util, Failure, Layout};
use tracing_subscriber::prelude::*;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input assembly file
    input: String,

    /// Output basename, `<base>_mem0.txt` and `<base>_mem1.txt` are written
    /// [default: input path without extension]
    #[clap(short, long)]
    output: Option<String>,

    /// Memory layout file (YAML)
    #[clap(short, long)]
    layout: Option<String>,

    /// Also write a raw big-endian image to `<base>.bin`
    #[clap(short, long)]
    bin: bool,

    /// Print an annotated listing
    #[clap(short, long)]
    dump: bool,
}

fn init_tracing() -> Result<(), String> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("warn"))
        .map_err(|e| format!("failed to initialise tracing filter: {e}"))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();
    if let Err(msg) = init_tracing() {
        Msg::Error(msg).headline();
        return ExitCode::FAILURE;
    }

    let layout = match &args.layout {
        Some(path) => match Layout::load(path) {
            Ok(layout) => layout,
            Err(err) => {
                Msg::Error(err.to_string()).headline();
                return ExitCode::FAILURE;
            }
        },
        None => Layout::default(),
    };
    let base = args.output.clone().unwrap_or_else(|| default_base(&args.input));

    match assemble_file(&args.input, &base, &layout, args.bin) {
        Ok((output, written)) => {
            for notice in &output.program.notices {
                notice.print(&args.input);
            }
            if args.dump {
                util::print_dump(&args.input, &output.program, &output.words, &output.place);
            }
            for path in written {
                cprintln!("  <green>></> {}", path);
            }
            ExitCode::SUCCESS
        }
        Err(Failure::Source(diag)) => {
            diag.print(&args.input);
            ExitCode::FAILURE
        }
        Err(Failure::Setup(err)) => {
            Msg::Error(err.to_string()).headline();
            ExitCode::FAILURE
        }
    }
}
