//! State-frequency file I/O: `<state_label> <count>` lines, `#`
//! comments, blank lines ignored.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use crate::automaton::{State, SymbolicNfa};
use crate::error::{AhofaError, Result};

/// Parses a frequency file, checking every label against `nfa`.
pub fn read_freq_file<R: BufRead>(reader: R, nfa: &SymbolicNfa) -> Result<HashMap<State, u64>> {
    let mut freq = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let stripped = match line.find('#') {
            Some(i) => &line[..i],
            None => &line[..],
        };
        let stripped = stripped.trim();
        if stripped.is_empty() {
            continue;
        }
        let mut parts = stripped.split_whitespace();
        let label_tok = parts.next().ok_or_else(|| AhofaError::BadSyntax {
            line: 0,
            detail: format!("malformed frequency line {:?}", line),
        })?;
        let count_tok = parts.next().ok_or_else(|| AhofaError::BadSyntax {
            line: 0,
            detail: format!("missing count in frequency line {:?}", line),
        })?;
        if parts.next().is_some() {
            return Err(AhofaError::BadSyntax {
                line: 0,
                detail: format!("too many fields in frequency line {:?}", line),
            });
        }

        let label: State = label_tok.parse().map_err(|_| AhofaError::BadSyntax {
            line: 0,
            detail: format!("invalid state label {:?}", label_tok),
        })?;
        let count: u64 = count_tok.parse().map_err(|_| AhofaError::BadSyntax {
            line: 0,
            detail: format!("invalid count {:?}", count_tok),
        })?;

        if !nfa.is_state(label) {
            return Err(AhofaError::BadLabelFile { state: label });
        }
        freq.insert(label, count);
    }
    Ok(freq)
}

/// Writes every state of `nfa` with its recorded frequency (missing entries
/// default to 0), in ascending label order.
pub fn write_freq_file<W: Write>(
    mut w: W,
    nfa: &SymbolicNfa,
    freq: &HashMap<State, u64>,
) -> std::io::Result<()> {
    for state in nfa.sorted_states() {
        writeln!(w, "{} {}", state, freq.get(&state).copied().unwrap_or(0))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s1() -> SymbolicNfa {
        SymbolicNfa::read_fa("0\n0 0 0x61\n0 1 0x62\n1\n".as_bytes()).unwrap()
    }

    #[test]
    fn parses_counts_and_skips_comments_and_blanks() {
        let nfa = s1();
        let text = "# header\n0 3\n\n1 2 # final\n";
        let freq = read_freq_file(text.as_bytes(), &nfa).unwrap();
        assert_eq!(freq[&0], 3);
        assert_eq!(freq[&1], 2);
    }

    #[test]
    fn unknown_state_label_is_rejected() {
        let nfa = s1();
        let text = "99 4\n";
        let err = read_freq_file(text.as_bytes(), &nfa);
        assert!(matches!(err, Err(AhofaError::BadLabelFile { state: 99 })));
    }

    #[test]
    fn round_trips_through_write_and_read() {
        let nfa = s1();
        let mut freq = HashMap::new();
        freq.insert(0u64, 7u64);
        freq.insert(1u64, 5u64);
        let mut buf = Vec::new();
        write_freq_file(&mut buf, &nfa, &freq).unwrap();
        let reparsed = read_freq_file(&buf[..], &nfa).unwrap();
        assert_eq!(reparsed, freq);
    }
}
