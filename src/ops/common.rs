//! Shared helpers for the k-ary join operators (`Multiply`, `LeftMultiply`,
//! `Add`, `Merge`): none of these exist as a single function in the Go
//! original's `algebra.go` (each duplicates the pattern inline), but they all
//! need to fold several upstream messages' `TmInfo` maps into one outgoing
//! header before emitting a combined payload.

use crate::message::{Header, Message};
use crate::payload::Payload;

/// Unions the `tm_info` of every message into a fresh header. Per-stage
/// entries never collide across upstream messages (each was stamped by a
/// disjoint set of stages along its own branch), so a later entry winning a
/// key clash would only happen if the same stage name appeared on both
/// inputs - a topology that `graph::builder` never produces.
pub(crate) fn merge_headers<V: Payload>(msgs: &[Message<V>]) -> Header {
    let mut header = Header::new();
    for m in msgs {
        header.tm_info.extend(m.header.tm_info.clone());
        header.attribs.extend(m.header.attribs.clone());
    }
    header
}
