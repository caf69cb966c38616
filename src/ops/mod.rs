//! Operator task loops: one `run` function per primitive of the operator
//! algebra (spec §5), each spawned once per stage by [`crate::graph::Graph`]'s
//! matching constructor. `List`/`Group` have no task loop of their own - they
//! are graph-builder-level compositions of the other operators (see
//! [`crate::graph::Graph::list`]/[`crate::graph::Graph::group`]) and are
//! skipped when [`crate::graph::Graph::execute`] spawns tasks, exactly as
//! `loopy/exgraph.go`'s `Execute` skips `IsComposite` nodes.

pub(crate) mod common;

pub mod add;
pub mod copy;
pub mod cut;
pub mod filter;
pub mod ground;
pub mod latch;
pub mod left_multiply;
pub mod map;
pub mod merge;
pub mod multiply;
pub mod reduce;
pub mod scatter;
pub mod source;
pub mod split;
