//! Frequency labeler.
//!
//! Runs payloads through an [`ArrayNfa`] and accumulates packet-granular
//! per-state visit counts. The result is indexed by dense array indices;
//! [`to_label_map`] remaps it to state labels for the reducer, which
//! only ever sees the symbolic form.

use std::collections::HashMap;

use crate::array::ArrayNfa;
use crate::automaton::State;

/// Runs `payloads` through `nfa`, accumulating one visit per state per
/// packet. Stops at `limit` packets if given, otherwise exhausts the
/// iterator. Returns the dense frequency vector and the number of packets
/// actually processed.
pub fn label_frequencies<I, P>(nfa: &ArrayNfa, payloads: I, limit: Option<u64>) -> (Vec<u64>, u64)
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut freq = vec![0u64; nfa.num_states()];
    let mut processed = 0u64;
    for payload in payloads {
        if let Some(lim) = limit {
            if processed >= lim {
                break;
            }
        }
        nfa.label_states(&mut freq, payload.as_ref());
        processed += 1;
    }
    (freq, processed)
}

/// Remaps a dense frequency vector (indexed by [`crate::array::StateIndex`])
/// to a label-keyed map, for consumption by the pruner and merger.
pub fn to_label_map(nfa: &ArrayNfa, freq: &[u64]) -> HashMap<State, u64> {
    (0..nfa.num_states())
        .map(|i| (nfa.label_of(i as u32), freq[i]))
        .collect()
}
