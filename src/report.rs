//! Minimal report rendering for `nfa-eval`'s per-pcap and aggregate output.
//! Deliberately thin: one fixed CSV shape, one fixed summary block, and
//! JSON via `ErrorStats`'s own `Serialize` impl.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::eval::ErrorStats;
use crate::error::Result;

#[derive(Serialize)]
struct CsvRow {
    pcap: String,
    total: u64,
    accepted_target: u64,
    accepted_reduced: u64,
    false_positive_acceptance: u64,
    correct_classification: u64,
    wrong_classification: u64,
    packet_error: f64,
    classification_error: f64,
    positive_rate: f64,
}

impl CsvRow {
    fn from_stats(path: &Path, stats: &ErrorStats) -> CsvRow {
        CsvRow {
            pcap: path.display().to_string(),
            total: stats.total,
            accepted_target: stats.accepted_target,
            accepted_reduced: stats.accepted_reduced,
            false_positive_acceptance: stats.false_positive_acceptance,
            correct_classification: stats.correct_classification,
            wrong_classification: stats.wrong_classification,
            packet_error: stats.packet_error(),
            classification_error: stats.classification_error(),
            positive_rate: stats.positive_rate(),
        }
    }
}

/// Writes one CSV row per `(pcap, stats)` pair.
pub fn write_csv<W: Write>(w: W, rows: &[(PathBuf, ErrorStats)]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(w);
    for (path, stats) in rows {
        writer.serialize(CsvRow::from_stats(path, stats))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a fixed-shape, human-readable summary block for one `ErrorStats`.
pub fn write_summary<W: Write>(mut w: W, stats: &ErrorStats) -> std::io::Result<()> {
    writeln!(w, "total: {}", stats.total)?;
    writeln!(w, "accepted_target: {}", stats.accepted_target)?;
    writeln!(w, "accepted_reduced: {}", stats.accepted_reduced)?;
    writeln!(w, "false_positive_acceptance: {}", stats.false_positive_acceptance)?;
    writeln!(w, "correct_classification: {}", stats.correct_classification)?;
    writeln!(w, "wrong_classification: {}", stats.wrong_classification)?;
    writeln!(w, "packet_error: {:.6}", stats.packet_error())?;
    writeln!(w, "classification_error: {:.6}", stats.classification_error())?;
    writeln!(w, "positive_rate: {:.6}", stats.positive_rate())?;
    Ok(())
}

/// Writes the aggregate record as pretty JSON.
pub fn write_json<W: Write>(w: W, stats: &ErrorStats) -> Result<()> {
    serde_json::to_writer_pretty(w, stats)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayNfa;
    use crate::automaton::SymbolicNfa;
    use std::path::PathBuf;

    #[test]
    fn csv_report_has_one_row_per_pcap() {
        let nfa = SymbolicNfa::read_fa("0\n0 0 0x61\n0 1 0x62\n1\n".as_bytes()).unwrap();
        let arr = ArrayNfa::build(&nfa);
        let stats = ErrorStats::zero_for(&arr, &arr);
        let rows = vec![
            (PathBuf::from("a.pcap"), stats.clone()),
            (PathBuf::from("b.pcap"), stats),
        ];
        let mut buf = Vec::new();
        write_csv(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 3); // header + 2 rows
    }

    #[test]
    fn summary_contains_every_field() {
        let nfa = SymbolicNfa::read_fa("0\n0 0 0x61\n0 1 0x62\n1\n".as_bytes()).unwrap();
        let arr = ArrayNfa::build(&nfa);
        let stats = ErrorStats::zero_for(&arr, &arr);
        let mut buf = Vec::new();
        write_summary(&mut buf, &stats).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("total:"));
        assert!(text.contains("positive_rate:"));
    }
}
