//! The array (executable, dense) NFA representation.
//!
//! Built once from a [`crate::automaton::SymbolicNfa`] snapshot; immutable
//! afterwards. Any edit to the symbolic form requires a fresh build.

use std::collections::{HashMap, HashSet};

use crate::automaton::{State, Symbol, SymbolicNfa, ALPHABET_SIZE};

/// A dense index into the transition table, as opposed to a [`State`] label.
pub type StateIndex = u32;

#[derive(Clone, Debug)]
pub struct ArrayNfa {
    initial_idx: StateIndex,
    finals: HashSet<StateIndex>,
    /// `transitions[(idx << 8) | byte]` holds the successor indices.
    transitions: Vec<Vec<StateIndex>>,
    state_map: HashMap<State, StateIndex>,
    labels: Vec<State>,
}

impl ArrayNfa {
    /// Assigns every label a dense index (sorted-label order, since the
    /// sparse form is a hash map and does not retain insertion order) and
    /// flattens δ into a `|Q| * 256` transition table.
    pub fn build(nfa: &SymbolicNfa) -> ArrayNfa {
        let labels = nfa.sorted_states();
        let mut state_map = HashMap::with_capacity(labels.len());
        for (i, &label) in labels.iter().enumerate() {
            state_map.insert(label, i as StateIndex);
        }

        let mut transitions = vec![Vec::new(); labels.len() * ALPHABET_SIZE];
        for (i, &label) in labels.iter().enumerate() {
            if let Some(trans) = nfa.transitions_from(label) {
                for (&byte, targets) in trans {
                    let mut idxs: Vec<StateIndex> =
                        targets.iter().map(|t| state_map[t]).collect();
                    idxs.sort_unstable();
                    transitions[(i << 8) | byte as usize] = idxs;
                }
            }
        }

        let initial_idx = state_map[&nfa.initial()];
        let finals = nfa.finals().iter().map(|f| state_map[f]).collect();

        ArrayNfa {
            initial_idx,
            finals,
            transitions,
            state_map,
            labels,
        }
    }

    pub fn num_states(&self) -> usize {
        self.labels.len()
    }

    pub fn initial_index(&self) -> StateIndex {
        self.initial_idx
    }

    pub fn label_of(&self, idx: StateIndex) -> State {
        self.labels[idx as usize]
    }

    pub fn index_of(&self, label: State) -> Option<StateIndex> {
        self.state_map.get(&label).copied()
    }

    pub fn is_final_index(&self, idx: StateIndex) -> bool {
        self.finals.contains(&idx)
    }

    pub fn final_indices(&self) -> impl Iterator<Item = StateIndex> + '_ {
        self.finals.iter().copied()
    }

    fn succ_of(&self, idx: StateIndex, byte: Symbol) -> &[StateIndex] {
        &self.transitions[((idx as usize) << 8) | byte as usize]
    }

    /// Classical subset-construction simulation with short-circuit on the
    /// first final reached.
    pub fn accept(&self, word: &[u8]) -> bool {
        let mut frontier: HashSet<StateIndex> = HashSet::new();
        frontier.insert(self.initial_idx);

        for &byte in word {
            let mut next: HashSet<StateIndex> = HashSet::new();
            for &idx in &frontier {
                for &s in self.succ_of(idx, byte) {
                    if self.finals.contains(&s) {
                        return true;
                    }
                    next.insert(s);
                }
            }
            if next.is_empty() {
                return false;
            }
            frontier = next;
        }
        false
    }

    /// Same simulation, without short-circuiting on finals: calls
    /// `on_visit` for every state entered and `on_step` once per byte
    /// actually consumed (consumption stops once the frontier is empty, as
    /// in `accept`).
    pub fn parse_word<V, S>(&self, word: &[u8], mut on_visit: V, mut on_step: S)
    where
        V: FnMut(StateIndex),
        S: FnMut(),
    {
        let mut frontier: HashSet<StateIndex> = HashSet::new();
        frontier.insert(self.initial_idx);

        for &byte in word {
            let mut next: HashSet<StateIndex> = HashSet::new();
            for &idx in &frontier {
                for &s in self.succ_of(idx, byte) {
                    on_visit(s);
                    next.insert(s);
                }
            }
            on_step();
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
    }

    /// Packet-granular labeling: every state entered at least
    /// once while parsing `word` contributes exactly 1 to `freq`, and
    /// `freq[initial_index]` is incremented unconditionally.
    ///
    /// `freq.len()` must equal `self.num_states()`.
    pub fn label_states(&self, freq: &mut [u64], word: &[u8]) {
        debug_assert_eq!(freq.len(), self.num_states());
        let mut visited = vec![false; self.num_states()];
        self.parse_word(
            word,
            |idx| visited[idx as usize] = true,
            || {},
        );
        for (idx, was_visited) in visited.into_iter().enumerate() {
            if was_visited {
                freq[idx] += 1;
            }
        }
        freq[self.initial_idx as usize] += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::SymbolicNfa;

    fn s1() -> SymbolicNfa {
        SymbolicNfa::read_fa("0\n0 0 0x61\n0 1 0x62\n1\n".as_bytes()).unwrap()
    }

    #[test]
    fn accept_follows_the_frontier_until_a_final_is_reached() {
        let arr = ArrayNfa::build(&s1());
        assert!(arr.accept(b"ab"));
        assert!(!arr.accept(b"b"));
        assert!(arr.accept(b"aab"));
    }

    #[test]
    fn label_counts_are_packet_granular() {
        let arr = ArrayNfa::build(&s1());
        let mut freq = vec![0u64; arr.num_states()];
        for payload in [&b"b"[..], &b"ab"[..], &b"xb"[..]] {
            arr.label_states(&mut freq, payload);
        }
        let init_idx = arr.initial_index() as usize;
        let other_idx = (0..arr.num_states()).find(|&i| i != init_idx).unwrap();
        assert_eq!(freq[init_idx], 3);
        assert_eq!(freq[other_idx], 2);
    }

    #[test]
    fn labeling_cardinality_never_exceeds_packet_count() {
        let arr = ArrayNfa::build(&s1());
        let mut freq = vec![0u64; arr.num_states()];
        let payloads: Vec<&[u8]> = vec![b"ab", b"aab", b"aaab"];
        for p in &payloads {
            arr.label_states(&mut freq, p);
        }
        assert_eq!(freq[arr.initial_index() as usize], payloads.len() as u64);
        for &f in &freq {
            assert!(f <= payloads.len() as u64);
        }
    }

    #[test]
    fn random_payloads_never_panic_and_respect_cardinality() {
        use rand::Rng;
        let arr = ArrayNfa::build(&s1());
        let mut freq = vec![0u64; arr.num_states()];
        let mut rng = rand::thread_rng();
        let mut packets = 0u64;
        for _ in 0..200 {
            let len: usize = rng.gen_range(0..16);
            let payload: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'c')).collect();
            arr.label_states(&mut freq, &payload);
            packets += 1;
        }
        assert_eq!(freq[arr.initial_index() as usize], packets);
        assert!(freq.iter().all(|&f| f <= packets));
    }
}
