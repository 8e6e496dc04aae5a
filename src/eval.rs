//! Parallel error evaluator: measures the classification disagreement
//! between a target automaton and a reduced one over held-out traffic.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::array::ArrayNfa;
use crate::automaton::State;
use crate::capture::CaptureSource;
use crate::error::{AhofaError, Result};

/// Per-(pcap, run) additive aggregate of classification outcomes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    pub total: u64,
    pub accepted_target: u64,
    pub accepted_reduced: u64,
    pub per_final_target: HashMap<State, u64>,
    pub per_final_reduced: HashMap<State, u64>,
    pub false_positive_acceptance: u64,
    pub correct_classification: u64,
    pub wrong_classification: u64,
}

impl ErrorStats {
    /// A zeroed record shaped for `target`/`reduced`'s final-state sets.
    pub fn zero_for(target: &ArrayNfa, reduced: &ArrayNfa) -> ErrorStats {
        ErrorStats {
            total: 0,
            accepted_target: 0,
            accepted_reduced: 0,
            per_final_target: target.final_indices().map(|i| (target.label_of(i), 0)).collect(),
            per_final_reduced: reduced
                .final_indices()
                .map(|i| (reduced.label_of(i), 0))
                .collect(),
            false_positive_acceptance: 0,
            correct_classification: 0,
            wrong_classification: 0,
        }
    }

    /// Componentwise sum. Fails with `ShapeMismatch` if the per-final maps
    /// don't cover the same keys (meaning the two records came from
    /// different automata).
    pub fn aggregate(&self, other: &ErrorStats) -> Result<ErrorStats> {
        if self.per_final_target.len() != other.per_final_target.len()
            || self.per_final_reduced.len() != other.per_final_reduced.len()
        {
            return Err(AhofaError::ShapeMismatch(
                "per-final maps have different sizes".to_string(),
            ));
        }

        let mut out = self.clone();
        out.total += other.total;
        out.accepted_target += other.accepted_target;
        out.accepted_reduced += other.accepted_reduced;
        out.false_positive_acceptance += other.false_positive_acceptance;
        out.correct_classification += other.correct_classification;
        out.wrong_classification += other.wrong_classification;

        for (k, v) in &other.per_final_target {
            let entry = out.per_final_target.get_mut(k).ok_or_else(|| {
                AhofaError::ShapeMismatch(format!("final {k} absent from target stats"))
            })?;
            *entry += v;
        }
        for (k, v) in &other.per_final_reduced {
            let entry = out.per_final_reduced.get_mut(k).ok_or_else(|| {
                AhofaError::ShapeMismatch(format!("final {k} absent from reduced stats"))
            })?;
            *entry += v;
        }
        Ok(out)
    }

    pub fn packet_error(&self) -> f64 {
        (self.accepted_reduced as f64 - self.accepted_target as f64) / self.total as f64
    }

    pub fn classification_error(&self) -> f64 {
        self.wrong_classification as f64 / self.total as f64
    }

    pub fn positive_rate(&self) -> f64 {
        let denom = self.correct_classification + self.wrong_classification;
        self.correct_classification as f64 / denom as f64
    }
}

/// Sums a whole slice of records via repeated `aggregate`.
pub fn aggregate_all<'a, I: IntoIterator<Item = &'a ErrorStats>>(stats: I) -> Result<Option<ErrorStats>> {
    let mut iter = stats.into_iter();
    let Some(first) = iter.next() else {
        return Ok(None);
    };
    let mut acc = first.clone();
    for s in iter {
        acc = acc.aggregate(s)?;
    }
    Ok(Some(acc))
}

#[derive(Clone, Copy, Debug)]
pub struct EvalConfig {
    pub workers: usize,
    pub strict: bool,
}

/// Replays `pcap_paths`, statically partitioned round-robin across
/// `cfg.workers` threads, through both `target` and `reduced`. Returns one
/// `ErrorStats` per pcap file actually opened.
pub fn evaluate_corpus(
    target: &ArrayNfa,
    reduced: &ArrayNfa,
    pcap_paths: &[PathBuf],
    cfg: EvalConfig,
    stop: Arc<AtomicBool>,
) -> Result<Vec<(PathBuf, ErrorStats)>> {
    let workers = cfg.workers.max(1);
    let mut buckets: Vec<Vec<PathBuf>> = vec![Vec::new(); workers];
    for (i, path) in pcap_paths.iter().enumerate() {
        buckets[i % workers].push(path.clone());
    }

    let mut slots: Vec<Result<Vec<(PathBuf, ErrorStats)>>> =
        (0..workers).map(|_| Ok(Vec::new())).collect();

    rayon::scope(|scope| {
        for (slot, bucket) in slots.iter_mut().zip(buckets.into_iter()) {
            let stop = Arc::clone(&stop);
            scope.spawn(move |_| {
                *slot = evaluate_bucket(target, reduced, bucket, cfg.strict, &stop);
            });
        }
    });

    let mut out = Vec::new();
    for slot in slots {
        out.extend(slot?);
    }
    Ok(out)
}

fn evaluate_bucket(
    target: &ArrayNfa,
    reduced: &ArrayNfa,
    paths: Vec<PathBuf>,
    strict: bool,
    stop: &AtomicBool,
) -> Result<Vec<(PathBuf, ErrorStats)>> {
    let mut out = Vec::new();
    for path in paths {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let source = match CaptureSource::open(&path) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("skipping capture file {path:?}: {e}");
                continue;
            }
        };

        let mut stats = ErrorStats::zero_for(target, reduced);
        let mut cancelled = false;
        for payload in source {
            evaluate_packet(&mut stats, target, reduced, &payload, strict)?;
            if stop.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
        }
        out.push((path, stats));
        if cancelled {
            break;
        }
    }
    Ok(out)
}

fn evaluate_packet(
    stats: &mut ErrorStats,
    target: &ArrayNfa,
    reduced: &ArrayNfa,
    payload: &[u8],
    strict: bool,
) -> Result<()> {
    stats.total += 1;

    let mut r_hits = HashSet::new();
    reduced.parse_word(
        payload,
        |idx| {
            if reduced.is_final_index(idx) {
                r_hits.insert(idx);
            }
        },
        || {},
    );
    let m_r = r_hits.len();

    let mut t_hits = HashSet::new();
    if m_r > 0 || strict {
        target.parse_word(
            payload,
            |idx| {
                if target.is_final_index(idx) {
                    t_hits.insert(idx);
                }
            },
            || {},
        );
    }
    let m_t = t_hits.len();

    for idx in &r_hits {
        *stats
            .per_final_reduced
            .get_mut(&reduced.label_of(*idx))
            .expect("zero_for pre-populates every final label") += 1;
    }
    for idx in &t_hits {
        *stats
            .per_final_target
            .get_mut(&target.label_of(*idx))
            .expect("zero_for pre-populates every final label") += 1;
    }

    if m_r == m_t {
        stats.correct_classification += 1;
    } else {
        stats.wrong_classification += 1;
        if strict && m_t > m_r {
            return Err(AhofaError::NotOverApproximation);
        }
    }

    if m_r > 0 {
        stats.accepted_reduced += 1;
    }
    if m_t > 0 {
        stats.accepted_target += 1;
    }
    if m_r > 0 && m_t == 0 {
        stats.false_positive_acceptance += 1;
    }

    Ok(())
}

/// Installs the `ctrlc` interrupt handler that flips a shared stop flag.
/// Returns the flag; workers observe it between packets.
pub fn install_cancellation() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("interrupt received, finishing in-flight packets and exiting");
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        log::warn!("failed to install signal handler: {e}");
    }
    stop
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::SymbolicNfa;

    fn target_and_reduced() -> (ArrayNfa, ArrayNfa) {
        let t = SymbolicNfa::read_fa("0\n0 0 0x61\n0 1 0x62\n1\n".as_bytes()).unwrap();

        let mut r = SymbolicNfa::new(0);
        for b in 0u16..256 {
            r.add_transition(1, 1, b as u8);
        }
        r.add_transition(0, 1, b'a');
        r.add_final(1);

        (ArrayNfa::build(&t), ArrayNfa::build(&r))
    }

    #[test]
    fn fast_mode_skips_target_simulation_when_reduced_rejects() {
        let (target, reduced) = target_and_reduced();
        let mut stats = ErrorStats::zero_for(&target, &reduced);
        for payload in [&b"ab"[..], &b"ax"[..], &b"b"[..]] {
            evaluate_packet(&mut stats, &target, &reduced, payload, false).unwrap();
        }
        assert_eq!(stats.total, 3);
        assert_eq!(stats.accepted_target, 1);
        assert_eq!(stats.accepted_reduced, 2);
        assert_eq!(stats.wrong_classification, 1);
        assert!((stats.packet_error() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn strict_mode_fails_when_reduced_does_not_over_approximate() {
        let target = SymbolicNfa::read_fa("0\n0 0 0x61\n0 1 0x62\n1\n".as_bytes()).unwrap();
        let reduced = SymbolicNfa::new(0); // accepts nothing
        let target = ArrayNfa::build(&target);
        let reduced = ArrayNfa::build(&reduced);
        let mut stats = ErrorStats::zero_for(&target, &reduced);
        let err = evaluate_packet(&mut stats, &target, &reduced, b"ab", true);
        assert!(matches!(err, Err(AhofaError::NotOverApproximation)));
    }

    #[test]
    fn aggregate_is_additive_and_associative() {
        let (target, reduced) = target_and_reduced();
        let a = ErrorStats::zero_for(&target, &reduced);
        let mut b = a.clone();
        b.total = 5;
        let mut c = a.clone();
        c.total = 7;

        let left = a.aggregate(&b).unwrap().aggregate(&c).unwrap();
        let right = a.aggregate(&b.aggregate(&c).unwrap()).unwrap();
        assert_eq!(left.total, right.total);
        assert_eq!(left.total, 12);
    }
}
