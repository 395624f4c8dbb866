//! Tho runner CLI.
//!
//! Runs a binary program produced by `tc`.
//!
//! # Usage
//! ```text
//! tr [-v] [-s] [--max-steps N] [--forced-carry] <FILE>
//! ```
//!
//! By default, only the values from `OUT` are printed.
//! With `--verbose`, a trace of the machine state is printed after every instruction.

use std::fs;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use prettytable::format::consts::FORMAT_BOX_CHARS;
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator, TableFormat};
use prettytable::{Cell, Row, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tho::ast::OperandKind;
use tho::err::Error;
use tho::sim::observer::Location;
use tho::sim::{Arithmetic, MachineState, SimFlags, Simulator, Snapshot};

#[derive(Parser, Debug)]
#[command(name = "tr", about = "A simple simulator for the Tho assembly language")]
struct Args {
    /// The program to run.
    file: PathBuf,

    /// Print memory, register, and flags at each clock tick.
    #[arg(short, long)]
    verbose: bool,

    /// Wait for Enter between instructions (implies --verbose).
    #[arg(short, long)]
    step: bool,

    /// Stop after this many instructions.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Set the carry flag on every flag update, as the first Tho simulator did.
    #[arg(long)]
    forced_carry: bool,
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

const CHECK: &str = "\u{2713}";
const X: &str = "\u{2717}";

/// Every cell is padded to this width, so rows printed as separate tables line up.
const CELL_WIDTH: usize = 3;

/// Box-drawn columns with no row separators, for printing one row at a time.
fn step_format() -> TableFormat {
    FormatBuilder::new()
        .column_separator('\u{2502}')
        .borders('\u{2502}')
        .separators(&[LinePosition::Title], LineSeparator::new('\u{2500}', '\u{253C}', '\u{251C}', '\u{2524}'))
        .padding(1, 1)
        .build()
}

fn title_row() -> Row {
    let mut titles = vec!["CI", "INS", "p1", "p2", "p3", "REG"];
    let mem: Vec<_> = (0..16).map(|i| format!("0x{i:X}")).collect();
    titles.extend(mem.iter().map(String::as_str));
    titles.extend(["ZFl", "CFl", "OUT"]);

    Row::new(titles.into_iter().map(|t| Cell::new(&format!("{t:^CELL_WIDTH$}")).style_spec("bc")).collect())
}

fn cell(text: &str, modified: bool) -> Cell {
    match modified {
        true  => Cell::new(&format!("{:^CELL_WIDTH$}", format!("{text}*"))).style_spec("bc"),
        false => Cell::new(&format!("{text:^CELL_WIDTH$}")).style_spec("c"),
    }
}

fn flag(value: bool) -> &'static str {
    match value {
        true  => CHECK,
        false => X,
    }
}

fn trace_row(snap: &Snapshot) -> Row {
    let state = &snap.state;
    let modified = |loc| snap.accesses_at(loc).modified();

    let mut cells = vec![
        cell(&snap.pc.to_string(), modified(Location::PC)),
        cell(&snap.instr.opcode().to_string(), false),
    ];

    // Memory addresses are shown in hex, everything else in decimal.
    let kinds = snap.instr.opcode().spec().operands;
    for (i, nib) in snap.instr.operands().into_iter().enumerate() {
        let text = match kinds.get(i) {
            Some(OperandKind::Addr) => format!("{nib:X}"),
            Some(_) => nib.to_string(),
            None => String::new(),
        };
        cells.push(cell(&text, false));
    }

    cells.push(cell(&state.acc.to_string(), modified(Location::Acc)));
    for (i, value) in state.mem.iter().enumerate() {
        // Memory has 16 cells, so `i` fits in a nibble.
        cells.push(cell(&value.to_string(), modified(Location::Mem(i as u8))));
    }
    cells.push(cell(flag(state.zero), modified(Location::Zero)));
    cells.push(cell(flag(state.carry), modified(Location::Carry)));
    cells.push(cell(&snap.output.map(|n| n.to_string()).unwrap_or_default(), snap.output.is_some()));

    Row::new(cells)
}

fn print_state(state: &MachineState) {
    let mem: Vec<_> = state.mem.iter().map(ToString::to_string).collect();
    eprintln!("PC: {}  A: {}  Z: {}  C: {}", state.pc, state.acc, flag(state.zero), flag(state.carry));
    eprintln!("MEM: [{}]", mem.join(", "));
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    if !args.file.exists() {
        bail!("file '{}' does not exist", args.file.display());
    }
    let bytes = fs::read(&args.file)
        .with_context(|| format!("failed to read '{}'", args.file.display()))?;

    let flags = SimFlags {
        arithmetic: match args.forced_carry {
            true  => Arithmetic::ForcedCarry,
            false => Arithmetic::Nibble,
        },
        max_steps: args.max_steps,
    };
    let mut sim = Simulator::new(flags);
    sim.load_bytes(&bytes)?;
    debug!(words = sim.program().len(), "loaded {}", args.file.display());

    let verbose = args.verbose || args.step;
    let mut table = Table::new();
    table.set_format(*FORMAT_BOX_CHARS);
    table.set_titles(title_row());

    if args.step {
        let mut header = Table::new();
        header.set_format(step_format());
        header.set_titles(title_row());
        header.printstd();
    }

    let stdin = std::io::stdin();
    let mut fault = None;
    for result in sim.snapshots() {
        let snap = match result {
            Ok(snap) => snap,
            Err(e) => {
                fault = Some(e);
                break;
            }
        };

        if args.step {
            let mut line = Table::init(vec![trace_row(&snap)]);
            line.set_format(step_format());
            line.printstd();
            stdin.lock().read_line(&mut String::new())?;
        } else if verbose {
            table.add_row(trace_row(&snap));
        } else if let Some(value) = snap.output {
            println!("A REGISTER OUTPUT: {value}");
        }
    }

    if verbose && !args.step {
        table.printstd();
    }

    if let Some(e) = fault {
        eprintln!("Error: {e}");
        if let Some(help) = e.help() {
            eprintln!("help: {help}");
        }
        print_state(sim.state());
        return Ok(ExitCode::FAILURE);
    }

    if sim.hit_halt() {
        println!("HALT REACHED");
    } else if sim.pc() >= sim.program().len() {
        println!("END OF PROGRAM");
    } else {
        println!("STEP LIMIT REACHED");
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    setup_logger();
    let args = Args::parse();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use tho::asm::assemble_src;
    use tho::sim::Simulator;

    use super::{title_row, trace_row, CELL_WIDTH};

    #[test]
    fn test_rows_share_cell_width() {
        let obj = assemble_src("STO 0xF 15 LDA 15 ADD 15 OUT JIC 0").unwrap();
        let mut sim = Simulator::default();
        sim.load_obj_file(&obj);
        sim.flags.max_steps = Some(5);

        let rows: Vec<_> = sim.snapshots()
            .map(|r| trace_row(&r.unwrap()))
            .chain([title_row()])
            .collect();
        assert_eq!(rows.len(), 6);

        for row in rows {
            assert_eq!(row.len(), 25);
            for cell in row.iter() {
                assert_eq!(cell.get_content().chars().count(), CELL_WIDTH, "{:?}", cell.get_content());
            }
        }
    }
}
