//! Per-stage runtime state: identity, active function, fusion stacks,
//! pause/exit signalling, and the channel ends a stage reads/writes.
//!
//! Grounded in `loopy/processor.go`. Split across submodules along the same
//! lines as the original's sections (`ProcessorInfo`, `ProcessorStack`,
//! the `Wait`/`Resume` state machine, and `Processor` itself).

pub mod handle;
pub mod info;
pub mod stack;
pub mod state;

pub use handle::Processor;
pub use info::{Function, Kind, MapperFn, PredicateFn, ProcessorInfo, ReducerFn};
pub use stack::ProcessorStack;
pub use state::ProcessorState;
