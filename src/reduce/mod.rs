//! The reduction engine: state pruning, state merging, and their
//! orchestration into single-pass and iterative reduction schedules.

pub mod merge;
pub mod orchestrator;
pub mod prune;

pub use merge::merge as merge_states_by_frequency;
pub use orchestrator::{reduce_iterative, reduce_single_pass, IterativeConfig};
pub use prune::{prune, PruneMode};
