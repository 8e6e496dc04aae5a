//! State pruning: redirects low-traffic states onto their rule's final
//! state.

use std::collections::HashMap;

use crate::automaton::{State, SymbolicNfa};
use crate::error::{AhofaError, Result};

/// Selects which stopping rule drives the prune loop. Ratio and budget are
/// mutually exclusive by construction (the caller picks one).
#[derive(Clone, Copy, Debug)]
pub enum PruneMode {
    /// Target `|Q|_new ≈ ρ · |Q|_old`.
    Ratio(f64),
    /// Target `predicted_error ≈ ε`.
    Budget(f64),
}

/// Redirects the lowest-traffic non-final, non-initial states onto their
/// rule's final state, stopping once `mode`'s target is met. Returns the
/// predicted error contributed by the states actually pruned.
pub fn prune(nfa: &mut SymbolicNfa, phi: &HashMap<State, u64>, mode: PruneMode) -> Result<f64> {
    let total = *phi.get(&nfa.initial()).unwrap_or(&0);
    if total == 0 {
        return Ok(0.0);
    }

    let rule_of = nfa.split_to_rules();
    let depth = nfa.state_depth();
    let old_states = nfa.num_states();

    let mut candidates: Vec<State> = nfa
        .states()
        .filter(|s| *s != nfa.initial() && !nfa.is_final(*s))
        .collect();

    for s in &candidates {
        if !phi.contains_key(s) {
            return Err(AhofaError::OutOfRange { state: *s });
        }
    }

    candidates.sort_unstable_by(|&a, &b| {
        let fa = phi[&a];
        let fb = phi[&b];
        fa.cmp(&fb).then_with(|| {
            let da = depth.get(&a).copied().unwrap_or(0);
            let db = depth.get(&b).copied().unwrap_or(0);
            // Deepest first on ties: reverse the natural depth order.
            db.cmp(&da)
        })
    });

    let budget_stop = match mode {
        PruneMode::Ratio(rho) => ((1.0 - rho) * old_states as f64).floor() as usize,
        PruneMode::Budget(_) => candidates.len(),
    };

    let mut merge_map: HashMap<State, State> = HashMap::new();
    let mut predicted_error = 0.0f64;

    for s in candidates {
        match mode {
            PruneMode::Ratio(_) => {
                if merge_map.len() >= budget_stop {
                    break;
                }
            }
            PruneMode::Budget(eps) => {
                if predicted_error >= eps {
                    break;
                }
            }
        }
        let f = rule_of[&s];
        merge_map.insert(s, f);
        predicted_error += phi[&s] as f64 / total as f64;
    }

    if !merge_map.is_empty() {
        nfa.merge_states(&merge_map)?;
    }
    Ok(predicted_error)
}
