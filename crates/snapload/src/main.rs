//! CLI entry point for the snapload binary.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use loader_core as _;
use snapload::ingest_snapshot;
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: snapload <input.z80> [options]

Loads a snapshot file the way the network bootloader would and writes the
decoded RAM image next to it.

Options:
  -o, --output <file>  RAM dump path (default: input stem + .ram)
  -s, --slice <bytes>  Feed the stream in slices of this size (default: 512)
  -h, --help           Show this help message

Examples:
  snapload game.z80
  snapload game.z80 -o game.ram --slice 1
";

const DEFAULT_SLICE: usize = 512;

#[derive(Debug, PartialEq, Eq)]
struct LoadArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    slice: usize,
}

#[derive(Debug)]
enum ParseResult {
    Load(LoadArgs),
    Help,
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut slice = DEFAULT_SLICE;
    let mut seen_any = false;

    while let Some(arg) = args.next() {
        seen_any = true;

        if arg == "--help" || arg == "-h" {
            return Ok(ParseResult::Help);
        }

        if arg == "-o" || arg == "--output" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for -o".to_string())?;
            output = Some(PathBuf::from(value));
            continue;
        }

        if arg == "-s" || arg == "--slice" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --slice".to_string())?;
            slice = value
                .to_string_lossy()
                .parse::<usize>()
                .map_err(|_| format!("invalid slice size: {}", value.to_string_lossy()))?;
            if slice == 0 {
                return Err("slice size must be at least 1".to_string());
            }
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if input.is_some() {
            return Err("multiple input paths provided".to_string());
        }
        input = Some(PathBuf::from(arg));
    }

    if !seen_any {
        return Err("missing input path".to_string());
    }
    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(ParseResult::Load(LoadArgs {
        input,
        output,
        slice,
    }))
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}.ram"))
}

fn run_load(args: LoadArgs) -> Result<(), i32> {
    let stream = match fs::read(&args.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", args.input.display());
            return Err(1);
        }
    };

    let outcome = match ingest_snapshot(&stream, args.slice) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e} (halt code {})", e.halt_code());
            return Err(1);
        }
    };

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));
    let dump = outcome.ram_dump();

    if let Err(e) = fs::write(&output_path, &dump) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    print!("{}", outcome.summary());
    println!(
        "Loaded {} ({} bytes) -> {}",
        args.input.display(),
        dump.len(),
        output_path.display()
    );

    Ok(())
}

fn main() {
    let args: Vec<OsString> = env::args_os().skip(1).collect();

    match parse_args(args.into_iter()) {
        Ok(ParseResult::Help) => print!("{USAGE_TEXT}"),
        Ok(ParseResult::Load(load)) => {
            if let Err(code) = run_load(load) {
                std::process::exit(code);
            }
        }
        Err(message) => {
            eprintln!("error: {message}");
            eprint!("{USAGE_TEXT}");
            std::process::exit(2);
        }
    }
}
