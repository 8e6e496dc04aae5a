//! State merging: fuses a successor into a predecessor when their
//! packet-visit frequencies are nearly identical.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::automaton::{State, SymbolicNfa};
use crate::error::Result;

/// Forward BFS from q₀, fusing a successor into its predecessor's
/// representative whenever the successor's traffic is within `tau` of the
/// predecessor's and neither is, or leads directly into, a final state.
/// Returns the number of states merged.
pub fn merge(
    nfa: &mut SymbolicNfa,
    phi: &HashMap<State, u64>,
    tau: f64,
    kappa: Option<f64>,
) -> Result<usize> {
    let succ = nfa.succ();
    let phi_max = *phi.get(&nfa.initial()).unwrap_or(&0) as f64;

    let mut merge_map: HashMap<State, State> = HashMap::new();
    let mut visited: HashSet<State> = HashSet::new();
    let mut queue: VecDeque<State> = VecDeque::new();
    visited.insert(nfa.initial());
    queue.push_back(nfa.initial());

    while let Some(p) = queue.pop_front() {
        let Some(successors) = succ.get(&p) else {
            continue;
        };
        let phi_p = *phi.get(&p).unwrap_or(&0);
        let p_eligible = phi_p > 0
            && !nfa.is_final(p)
            && kappa.map_or(true, |k| phi_p as f64 <= k * phi_max);

        let mut ordered: Vec<State> = successors.iter().copied().collect();
        ordered.sort_unstable();

        for q in ordered {
            let newly_discovered = visited.insert(q);
            if newly_discovered {
                queue.push_back(q);
            }
            if !newly_discovered || !p_eligible {
                continue;
            }

            let phi_q = *phi.get(&q).unwrap_or(&0);
            let q_leads_to_final = succ
                .get(&q)
                .map(|qs| qs.iter().any(|s| nfa.is_final(*s)))
                .unwrap_or(false);

            if !nfa.is_final(q)
                && !q_leads_to_final
                && phi_q > 0
                && phi_q as f64 / phi_p as f64 >= tau
            {
                let rep = *merge_map.get(&p).unwrap_or(&p);
                merge_map.insert(q, rep);
            }
        }
    }

    let merged = merge_map.len();
    if merged > 0 {
        nfa.merge_states(&merge_map)?;
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_frequency_chain_collapses_until_a_final_guards_the_rest() {
        // 0 -a-> 1 -a-> 2 -b-> 3(final)
        let mut nfa = SymbolicNfa::new(0);
        nfa.add_transition(0, 1, b'a');
        nfa.add_transition(1, 2, b'a');
        nfa.add_transition(2, 3, b'b');
        nfa.add_final(3);

        let phi: HashMap<State, u64> =
            [(0u64, 3u64), (1u64, 3u64), (2u64, 3u64), (3u64, 3u64)]
                .into_iter()
                .collect();

        let merged = merge(&mut nfa, &phi, 0.99, None).unwrap();
        assert_eq!(merged, 1);
        assert!(!nfa.is_state(1));
        assert!(nfa.is_state(2));
        assert!(nfa.is_state(3));
    }

    #[test]
    fn state_leading_directly_into_a_final_is_never_merged() {
        // 0 -a-> 1 -a-> 2(final). 1's only successor is final, so 1 is
        // ineligible as a merge target even though its own frequency ratio
        // would otherwise qualify.
        let mut nfa = SymbolicNfa::new(0);
        nfa.add_transition(0, 1, b'a');
        nfa.add_transition(1, 2, b'a');
        nfa.add_final(2);
        let phi: HashMap<State, u64> =
            [(0u64, 5u64), (1u64, 5u64), (2u64, 5u64)].into_iter().collect();
        let merged = merge(&mut nfa, &phi, 0.5, None).unwrap();
        assert_eq!(merged, 0);
        assert!(nfa.is_state(1));
    }
}
