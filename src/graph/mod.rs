//! Graph construction, branch extraction, and per-stage edge bookkeeping.
//!
//! A [`Graph`] is a fluent builder: each operator constructor registers a
//! stage, eagerly creates the `flume` channel(s) linking it to its declared
//! upstream lane(s), and returns a [`Stage`] handle usable as the next
//! constructor's input. [`Graph::execute`] freezes the topology, extracts
//! branches (`branch::scan`), spawns one task per stage, and starts the
//! background fusion scheduler.

pub mod branch;
pub mod builder;
pub mod edge;

pub use branch::{Branch, NodesGroup, OpKind};
pub use builder::{Graph, Lane, RunningGraph, Stage};
pub use edge::{ChanInfo, EdgeInfo};
