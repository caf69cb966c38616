//! Error types for graph construction and linking.
//!
//! Per spec: a topology violation (duplicate channel binding, unknown stage
//! name, dimension mismatch in a composite link) is fatal and aborts
//! construction. The Go original panics; a Rust *library* should not, so we
//! surface the same "fatal at construction" contract as a `Result` instead.
//! Scheduler infeasibility is deliberately not an error (see
//! [`crate::scheduler`]) - the next tick simply retries with fresher stats.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("output slot {slot} of stage '{stage}' is already bound to '{existing}'")]
    OutputSlotOccupied {
        stage: String,
        slot: usize,
        existing: String,
    },

    #[error("input slot {slot} of stage '{stage}' is already bound to '{existing}'")]
    InputSlotOccupied {
        stage: String,
        slot: usize,
        existing: String,
    },

    #[error("cannot link composite '{0}' with non-composite '{1}' lane-by-lane: lane count mismatch ({2} vs {3})")]
    CompositeLaneMismatch(String, String, usize, usize),

    #[error("graph topology is frozen after execute() and cannot be mutated")]
    GraphFrozen,
}
