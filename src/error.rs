//! Crate-wide error type.
//!
//! Every fallible library operation returns `Result<T, AhofaError>`. The
//! three CLI binaries are the only place that turn a variant into a process
//! exit code (see `src/bin/*.rs`).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AhofaError {
    /// A `.fa` file or frequency file did not parse.
    #[error("bad syntax at line {line}: {detail}")]
    BadSyntax { line: usize, detail: String },

    /// A frequency file referenced a state label that isn't in the automaton.
    #[error("frequency file referenced unknown state {state}")]
    BadLabelFile { state: u64 },

    /// A capture file could not be opened, or its magic wasn't recognized.
    #[error("cannot open capture file {path:?}: {detail}")]
    BadCaptureFile { path: PathBuf, detail: String },

    /// `merge_states` was given a map whose domain or range touches a
    /// nonexistent state, or that tries to move the initial state.
    #[error("invalid merge map: {0}")]
    InvalidMerge(String),

    /// Two `ErrorStats` records of different shapes were aggregated.
    #[error("shape mismatch aggregating error stats: {0}")]
    ShapeMismatch(String),

    /// Strict-mode evaluation observed the reduced automaton reject a word
    /// the target automaton accepted.
    #[error("reduced automaton is not an over-approximation of the target")]
    NotOverApproximation,

    /// The cooperative cancellation flag was observed.
    #[error("cancelled")]
    Cancelled,

    /// A candidate state had no entry in the supplied frequency map.
    #[error("state {state} has no recorded frequency")]
    OutOfRange { state: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AhofaError>;
