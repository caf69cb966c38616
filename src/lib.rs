//! streamloom: a streaming-dataflow runtime.
//!
//! Pipelines are assembled by chaining operator constructors on a [`graph::Graph`].
//! Each constructor registers a stage and wires it to the previous stage's
//! outputs. Once the topology is complete, [`graph::Graph::execute`] allocates
//! the inter-stage channels and starts every stage's work task. A background
//! [`scheduler`] task periodically re-examines each branch's decayed service
//! time statistics and, when a branch is running hotter than its configured
//! thresholds, fuses contiguous stages into one execution task.

pub mod error;
pub mod geometry;
pub mod graph;
pub mod logging;
pub mod message;
pub mod ops;
pub mod payload;
pub mod processor;
pub mod scheduler;
pub mod sequence;
pub mod stats;
pub mod value;

pub use error::{Error, Result};
pub use graph::Graph;
pub use payload::{Params, Parameter, Payload, Vectorize};
