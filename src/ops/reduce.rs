//! `Reduce`: 1 input, 1 output. Holds state seeded by `u0`; each message
//! folds into the state via the active `Reducer` and emits the accompanying
//! output. Grounded in `loopy/algebra.go`'s `Reduce`.
//!
//! The Go original special-cases a `nil` input by forwarding it unchanged
//! without touching the reducer - meaningful there because `T = interface{}`
//! can carry a nil value as a *message*, distinct from the channel closing.
//! `V: Payload` has no such null state in this port, so every received
//! message is folded through the reducer; this is a documented narrowing,
//! not a silent drop, since the only operators that legitimately emit a nil
//! placeholder (`Latch`/`Cut`) are not meant to feed a `Reduce` directly.
use std::sync::Arc;

use crate::graph::builder::ExecCtx;
use crate::payload::Payload;
use crate::processor::Processor;

pub(crate) async fn run<V: Payload>(proc: Arc<Processor<V>>, _ctx: ExecCtx<V>) {
    loop {
        let Some(msg) = proc.recv_data(0).await else {
            break;
        };
        let msg = proc.apply_in_stack(msg);
        let msg = proc.info.lock().unwrap().apply_message_with_switch(msg);
        proc.emit(0, msg).await;
        if !proc.state.wait().await {
            break;
        }
    }
    proc.info.lock().unwrap().dispose_state();
    proc.close_all_outputs();
}
