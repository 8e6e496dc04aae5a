//! `reduce` — shrinks a byte-alphabet NFA using packet-traffic frequencies.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;

use ahofa::reduce::{self, IterativeConfig, PruneMode};
use ahofa::{capture::CaptureSource, freqfile, SymbolicNfa};

/// Reduce an NFA's state count using per-state packet-visit frequencies.
#[derive(Parser, Debug)]
#[command(name = "reduce")]
struct Args {
    /// `.fa` file of the automaton to reduce.
    nfa: PathBuf,

    /// Training pcap, or (with `-s`) a pre-computed frequency file.
    training: PathBuf,

    /// Target reduction ratio, |Q|_new / |Q|_old.
    #[arg(short = 'p', long, default_value_t = 0.5)]
    ratio: f64,

    /// Number of merge iterations; 0 runs a single prune pass only.
    #[arg(short = 'i', long, default_value_t = 0)]
    iterations: usize,

    /// Merge frequency-ratio threshold.
    #[arg(short = 't', long, default_value_t = 0.9)]
    threshold: f64,

    /// Merge frequency upper-cap (predecessor's share of total traffic).
    #[arg(short = 'm', long)]
    cap: Option<f64>,

    /// Packets per merge window, in iterative mode.
    #[arg(short = 'w', long, default_value_t = 10_000)]
    window: u64,

    /// Treat `training` as a pre-computed frequency file, not a pcap.
    #[arg(short = 's', long)]
    freq_file: bool,

    /// Output path; defaults to stdout.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("reduce: {e}");
        std::process::exit(1);
    }
}

fn run() -> ahofa::Result<()> {
    let args = Args::parse();

    let mut nfa = SymbolicNfa::read_fa(BufReader::new(File::open(&args.nfa)?))?;

    if args.freq_file {
        let phi = freqfile::read_freq_file(BufReader::new(File::open(&args.training)?), &nfa)?;
        let predicted = reduce::prune(&mut nfa, &phi, PruneMode::Ratio(args.ratio))?;
        log::info!("predicted error: {predicted:.6}");
    } else if args.iterations == 0 {
        let source = CaptureSource::open(&args.training)?;
        let predicted = reduce::reduce_single_pass(&mut nfa, source, args.ratio)?;
        log::info!("predicted error: {predicted:.6}");
    } else {
        let source = CaptureSource::open(&args.training)?;
        let cfg = IterativeConfig {
            ratio: args.ratio,
            iterations: args.iterations,
            window_packets: args.window,
            tau: args.threshold,
            kappa: args.cap,
        };
        let (predicted, merged) = reduce::reduce_iterative(&mut nfa, source, cfg)?;
        log::info!("predicted error: {predicted:.6}, merged {merged} states");
    }

    match args.output {
        Some(path) => nfa.write_fa(File::create(path)?)?,
        None => nfa.write_fa(std::io::stdout().lock())?,
    }
    Ok(())
}
