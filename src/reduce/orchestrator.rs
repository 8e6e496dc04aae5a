//! Reducer orchestrator.
//!
//! Combines the frequency labeler, pruner and merger under either a single
//! ratio target or an iterative merge-then-prune schedule.

use crate::array::ArrayNfa;
use crate::automaton::SymbolicNfa;
use crate::error::Result;
use crate::freq;
use crate::reduce::merge;
use crate::reduce::prune::{self, PruneMode};

/// Computes φ once over the full training source and applies a single
/// prune pass at ratio `ratio`. Returns the predicted error.
pub fn reduce_single_pass<I, P>(nfa: &mut SymbolicNfa, payloads: I, ratio: f64) -> Result<f64>
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let array = ArrayNfa::build(nfa);
    let (dense, _processed) = freq::label_frequencies(&array, payloads, None);
    let phi = freq::to_label_map(&array, &dense);
    prune::prune(nfa, &phi, PruneMode::Ratio(ratio))
}

/// Parameters of the iterative merge+prune schedule.
#[derive(Clone, Copy, Debug)]
pub struct IterativeConfig {
    pub ratio: f64,
    pub iterations: usize,
    pub window_packets: u64,
    pub tau: f64,
    pub kappa: Option<f64>,
}

/// Runs `iterations` merge passes, each measuring φ on the automaton as it
/// stands at that iteration's start over the next `window_packets` payloads
/// pulled from the (single-pass, non-rewindable) `payloads` stream, then
/// recomputes φ over one more window on the final automaton and applies a
/// prune pass at the ratio-adjusted target. Returns
/// `(cumulative_predicted_error, total_merged)`.
pub fn reduce_iterative<I>(nfa: &mut SymbolicNfa, mut payloads: I, cfg: IterativeConfig) -> Result<(f64, usize)>
where
    I: Iterator<Item = Vec<u8>>,
{
    let original_states = nfa.num_states();
    let mut total_merged = 0usize;

    for iteration in 0..cfg.iterations {
        let array = ArrayNfa::build(nfa);
        let window: Vec<Vec<u8>> = (&mut payloads).take(cfg.window_packets as usize).collect();
        if window.is_empty() {
            log::debug!("iteration {iteration}: training source exhausted, stopping early");
            break;
        }
        let (dense, _processed) = freq::label_frequencies(&array, window, None);
        let phi = freq::to_label_map(&array, &dense);
        let merged = merge::merge(nfa, &phi, cfg.tau, cfg.kappa)?;
        total_merged += merged;
        log::debug!("iteration {iteration}: merged {merged} states, |Q| = {}", nfa.num_states());
    }

    let array = ArrayNfa::build(nfa);
    let window: Vec<Vec<u8>> = (&mut payloads).take(cfg.window_packets as usize).collect();
    let (dense, _processed) = freq::label_frequencies(&array, window, None);
    let phi = freq::to_label_map(&array, &dense);

    let now_states = nfa.num_states();
    let adjusted_ratio = if now_states == 0 {
        cfg.ratio
    } else {
        (cfg.ratio * original_states as f64 / now_states as f64).min(1.0)
    };

    let predicted = prune::prune(nfa, &phi, PruneMode::Ratio(adjusted_ratio))?;
    Ok((predicted, total_merged))
}
