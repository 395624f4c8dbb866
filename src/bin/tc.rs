//! Tho assembler CLI.
//!
//! Assembles Tho source files into binary programs for `tr`.
//!
//! # Usage
//! ```text
//! tc [-b DIR] [--listing] <FILES>...
//! ```
//!
//! Each `NAME.tc` is written to `DIR/NAME`. Inputs with any other extension
//! are written to `DIR/<file name>.bin`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tho::asm::encoding::{BinaryFormat, ObjFileFormat, TextFormat};
use tho::asm::{assemble_src, SourceInfo};
use tho::err::{Report, ThoErr};

#[derive(Parser, Debug)]
#[command(name = "tc", about = "A simple compiler for the Tho assembly language")]
struct Args {
    /// The directory to write assembled programs to.
    #[arg(short, long, default_value = ".")]
    bin: PathBuf,

    /// Print a listing of each assembled program.
    #[arg(long)]
    listing: bool,

    /// The files to assemble.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn setup_logger() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `NAME.tc` becomes `DIR/NAME`. Anything else keeps its file name and gains `.bin`.
fn output_path(dir: &Path, input: &Path) -> anyhow::Result<PathBuf> {
    let Some(file_name) = input.file_name() else {
        bail!("'{}' is not a file", input.display());
    };

    let path = match (input.extension(), input.file_stem()) {
        (Some(ext), Some(stem)) if ext == "tc" => dir.join(stem),
        _ => {
            let mut name = file_name.to_os_string();
            name.push(".bin");
            dir.join(name)
        }
    };
    Ok(path)
}

/// The file name on its own line, then the report,
/// so the caret stays under the offending column of the source line.
fn diagnostic(input: &Path, src: &str, err: &ThoErr) -> String {
    format!("{}:\n{}", input.display(), Report::new(err, &SourceInfo::new(src)))
}

/// Assembles one file. Returns `Ok(false)` if the source had an error (already reported).
fn compile(args: &Args, input: &Path) -> anyhow::Result<bool> {
    if !input.exists() {
        bail!("file '{}' does not exist", input.display());
    }
    let src = fs::read_to_string(input)
        .with_context(|| format!("failed to read '{}'", input.display()))?;

    let obj = match assemble_src(&src) {
        Ok(obj) => obj,
        Err(e) => {
            eprintln!("{}", diagnostic(input, &src, &e));
            return Ok(false);
        }
    };

    if args.listing {
        print!("{}", TextFormat::serialize(&obj));
    }

    let out = output_path(&args.bin, input)?;
    fs::write(&out, BinaryFormat::serialize(&obj))
        .with_context(|| format!("failed to write '{}'", out.display()))?;
    info!(input = %input.display(), output = %out.display(), words = obj.len(), "assembled");

    Ok(true)
}

fn main() -> ExitCode {
    setup_logger();
    let args = Args::parse();

    if let Err(e) = fs::create_dir_all(&args.bin) {
        error!("failed to create '{}': {e}", args.bin.display());
        return ExitCode::FAILURE;
    }

    let mut ok = true;
    for input in &args.files {
        match compile(&args, input) {
            Ok(success) => ok &= success,
            Err(e) => {
                eprintln!("Error: {e:#}");
                ok = false;
            }
        }
    }

    match ok {
        true  => ExitCode::SUCCESS,
        false => ExitCode::FAILURE,
    }
}
