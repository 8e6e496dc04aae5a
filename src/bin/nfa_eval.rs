//! `nfa-eval` — replays test traffic through a target and a reduced NFA and
//! reports their classification disagreement.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;

use ahofa::{array::ArrayNfa, eval, report, AhofaError, ErrorStats, EvalConfig, SymbolicNfa};

/// Measure the classification error a reduced NFA introduces over a target.
#[derive(Parser, Debug)]
#[command(name = "nfa-eval")]
struct Args {
    /// `.fa` file of the target (unreduced) automaton.
    target: PathBuf,

    /// `.fa` file of the reduced automaton.
    reduced: PathBuf,

    /// One or more test pcap files.
    #[arg(required = true)]
    pcaps: Vec<PathBuf>,

    /// Worker thread count.
    #[arg(short = 'n', long, default_value_t = 1)]
    workers: usize,

    /// Strict mode: verify the over-approximation invariant and fail loudly
    /// if it doesn't hold.
    #[arg(short = 'c', long)]
    strict: bool,

    /// Emit a single aggregate JSON record instead of a per-pcap CSV table.
    #[arg(short = 'a', long)]
    aggregate: bool,
}

fn main() {
    env_logger::init();
    match run() {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("nfa-eval: {e}");
            let code = if matches!(e, AhofaError::NotOverApproximation) { 2 } else { 1 };
            std::process::exit(code);
        }
    }
}

fn run() -> ahofa::Result<()> {
    let args = Args::parse();

    let target = SymbolicNfa::read_fa(BufReader::new(File::open(&args.target)?))?;
    let reduced = SymbolicNfa::read_fa(BufReader::new(File::open(&args.reduced)?))?;
    let target = ArrayNfa::build(&target);
    let reduced = ArrayNfa::build(&reduced);

    let stop = eval::install_cancellation();
    let cfg = EvalConfig {
        workers: args.workers,
        strict: args.strict,
    };
    let rows = eval::evaluate_corpus(&target, &reduced, &args.pcaps, cfg, stop)?;

    if args.aggregate {
        let refs: Vec<&ErrorStats> = rows.iter().map(|(_, s)| s).collect();
        if let Some(total) = eval::aggregate_all(refs)? {
            report::write_json(std::io::stdout(), &total)?;
            println!();
        }
    } else {
        report::write_csv(std::io::stdout(), &rows)?;
    }

    Ok(())
}
