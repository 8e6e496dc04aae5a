//! `freq` — dumps per-state packet-visit frequencies for an NFA over a pcap.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;

use ahofa::{array::ArrayNfa, capture::CaptureSource, freq, freqfile, SymbolicNfa};

/// Compute per-state packet-visit frequencies and write them to a file.
#[derive(Parser, Debug)]
#[command(name = "freq")]
struct Args {
    /// `.fa` file of the automaton to label.
    nfa: PathBuf,

    /// Training pcap.
    pcap: PathBuf,

    /// Output frequency-file path.
    out: PathBuf,

    /// Stop after this many packets; default processes the whole file.
    #[arg(short = 'n', long)]
    limit: Option<u64>,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("freq: {e}");
        std::process::exit(1);
    }
}

fn run() -> ahofa::Result<()> {
    let args = Args::parse();

    let nfa = SymbolicNfa::read_fa(BufReader::new(File::open(&args.nfa)?))?;
    let array = ArrayNfa::build(&nfa);
    let source = CaptureSource::open(&args.pcap)?;

    let (dense, processed) = freq::label_frequencies(&array, source, args.limit);
    log::info!("processed {processed} packets");

    let by_label = freq::to_label_map(&array, &dense);
    freqfile::write_freq_file(File::create(&args.out)?, &nfa, &by_label)?;
    Ok(())
}
