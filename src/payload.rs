//! Payload capability traits.
//!
//! The Go original carries payloads as `interface{}` and discovers
//! `Cloneable`/`Disposable` behaviour at runtime via type switches
//! (`loopy/messages.go`'s `DeepClone`/`DeepDispose`). Rust fixes the payload
//! type per [`crate::graph::Graph`] instance and makes the capability set
//! explicit at compile time instead of via reflection.

use std::collections::HashMap;

/// A value that can flow through a [`crate::graph::Graph`].
///
/// `Clone` gives every operator (`Copy`, `Latch`, `Cut`) the "deep clone"
/// capability the spec requires. `dispose` defaults to a no-op, matching the
/// Go original's fallback for payloads that aren't `Disposable`; override it
/// for payloads that own external resources (file handles, GPU buffers, ...).
pub trait Payload: Clone + Send + Sync + 'static {
    fn dispose(&mut self) {}
}

/// Payloads that can be assembled from, and decomposed into, a vector of
/// themselves. Required only by the no-combiner forms of `Multiply` and
/// `Scatter`, where the operator must manufacture (or read) a "vector of T"
/// as a `T` itself - the direct translation of the Go original emitting a
/// `[]T` onto a channel typed `chan T`.
pub trait Vectorize: Payload {
    fn from_elements(items: Vec<Self>) -> Self;
    fn into_elements(self) -> Vec<Self>;
}

/// A single tunable parameter with bounds, per spec §6's "named, bounded
/// parameter map (`value, low, high`)".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameter {
    pub value: f64,
    pub low: f64,
    pub high: f64,
}

impl Parameter {
    pub fn new(value: f64, low: f64, high: f64) -> Self {
        Self { value, low, high }
    }

    pub fn clamp(self) -> f64 {
        self.value.clamp(self.low, self.high)
    }
}

/// A named, bounded parameter map handed to a [`crate::processor::Function`]
/// on each invocation.
pub type Params = HashMap<String, Parameter>;
