//! Fusion stacks: the list of upstream/downstream stages folded into one
//! carrier when the scheduler fuses a branch (spec §6).
//!
//! Grounded in `loopy/processor.go`'s `ProcessorStack`/`Element`, a manually
//! managed LIFO linked list pushed by `mergeForward`'s `for i := e-1; i >= s;
//! i--` loop and walked from `top` outward. Walking a reverse-pushed LIFO
//! list front-to-back visits stages in the same order they were pushed -
//! ascending `s..e-1` - so a plain `Vec` pushed in that same ascending order
//! and iterated front-to-back is bit-identical in behaviour and far easier to
//! read; this is a representation change, not a semantic one.
//!
//! `OutStack` exists in the original's `Processor` struct and is executed
//! (as a no-op on an always-empty stack) at every call site in
//! `algebra.go`, but nothing in the reference scheduler ever pushes to it -
//! only `InStack`, via `mergeForward`, is ever populated. We keep the field
//! for structural fidelity with the spec's "InStack, OutStack" pairing and
//! as the natural extension point a backward-fusing scheduler would use, but
//! no code in this crate pushes onto it.

use std::sync::Mutex;

use crate::message::Message;
use crate::payload::Payload;
use crate::processor::info::{Kind, ProcessorInfo};

/// An ordered list of fused-in stages, executed front-to-back ahead of (for
/// `InStack`) or behind (for `OutStack`) the carrying stage's own function.
pub struct ProcessorStack<V: Payload> {
    entries: Vec<Mutex<ProcessorInfo<V>>>,
}

impl<V: Payload> Default for ProcessorStack<V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<V: Payload> ProcessorStack<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a stage to the back of the stack - the scheduler calls this
    /// once per stage being folded in, in ascending branch-index order.
    pub fn push(&mut self, info: ProcessorInfo<V>) {
        self.entries.push(Mutex::new(info));
    }

    /// Removes every entry, handing each back to the caller (the scheduler
    /// un-fuses a branch by popping its stack and re-registering each stage
    /// as its own task).
    pub fn drain(&mut self) -> Vec<ProcessorInfo<V>> {
        self.entries
            .drain(..)
            .map(|m| m.into_inner().expect("processor stack mutex poisoned"))
            .collect()
    }

    /// Runs `msg` through every entry in order. A [`Kind::Reduce`] entry
    /// locks its own mutex for the call (serialising concurrent fused
    /// producers against that entry's running state); a [`Kind::Map`] entry
    /// needs no cross-call serialisation but still locks briefly to reach
    /// its `&mut self` (a settings hot-swap may be in flight).
    pub fn exec(&self, msg: Message<V>) -> Message<V> {
        let mut current = msg;
        for entry in &self.entries {
            let mut guard = entry.lock().expect("processor stack mutex poisoned");
            debug_assert!(
                !matches!(guard.kind(), Kind::Filter | Kind::Structural),
                "only Map/Reduce stages can be fused inline on a V -> V stack"
            );
            current = guard.apply_message(current);
        }
        current
    }
}
