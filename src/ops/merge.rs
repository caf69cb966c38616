//! `Merge(p)`: k inputs, 1 output. Maintains one buffered message per input;
//! whenever a buffer slot fills, the selection function `p` is consulted
//! with a snapshot of all buffers and may produce a value to emit. `p`
//! returns which buffer slot to clear (or all of them) alongside its
//! decision. Grounded in `loopy/algebra.go`'s `Merge`.

use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

use crate::graph::builder::ExecCtx;
use crate::message::Message;
use crate::ops::common::merge_headers;
use crate::payload::Payload;
use crate::processor::Processor;

/// Given the current per-input buffer snapshot, decide what (if anything)
/// to emit. Returns `(slot_to_clear, value)`: `slot_to_clear >= 0` clears
/// only that slot, `-1` clears every filled slot, and a `None` value means
/// "not enough buffered yet, emit nothing".
pub type Selector<V> = Arc<dyn Fn(&[Option<V>]) -> (i64, Option<V>) + Send + Sync>;

pub(crate) async fn run<V: Payload>(proc: Arc<Processor<V>>, select: Selector<V>, _ctx: ExecCtx<V>) {
    let k = proc.num_inputs();
    let mut buf: Vec<Option<Message<V>>> = (0..k).map(|_| None).collect();
    let mut closed = vec![false; k];

    loop {
        let mut pending = FuturesUnordered::new();
        for slot in 0..k {
            if buf[slot].is_none() && !closed[slot] {
                let proc = Arc::clone(&proc);
                pending.push(async move { (slot, proc.recv_data(slot).await) });
            }
        }
        if pending.is_empty() {
            break;
        }
        let Some((slot, received)) = pending.next().await else {
            break;
        };
        drop(pending);
        match received {
            Some(msg) => buf[slot] = Some(proc.apply_in_stack(msg)),
            None => closed[slot] = true,
        }

        let snapshot: Vec<Option<V>> = buf.iter().map(|m| m.as_ref().map(|m| m.value.clone())).collect();
        let (clear, value) = select(&snapshot);
        if let Some(value) = value {
            let filled: Vec<Message<V>> = buf.iter().flatten().cloned().collect();
            let mut header = merge_headers(&filled);
            proc.stamp_enter(&mut header);
            proc.stamp_leave(&mut header);
            proc.emit(0, Message { header, value }).await;
            if !proc.state.wait().await {
                break;
            }
        }
        if clear == -1 {
            for slot in buf.iter_mut() {
                *slot = None;
            }
        } else if clear >= 0 {
            buf[clear as usize] = None;
        }

        if closed.iter().all(|c| *c) && buf.iter().all(|b| b.is_none()) {
            break;
        }
    }
    proc.close_all_outputs();
}
