//! `Copy(n)`: 1 input, n outputs. Emits the same message to every output
//! synchronously; outputs 1..n-1 receive a deep clone so each downstream
//! branch owns its copy, output 0 receives the original. Grounded in
//! `loopy/algebra.go`'s `Copy`.

use std::sync::Arc;

use crate::graph::builder::ExecCtx;
use crate::payload::Payload;
use crate::processor::Processor;

pub(crate) async fn run<V: Payload>(proc: Arc<Processor<V>>, _ctx: ExecCtx<V>) {
    let n = proc.num_outputs();
    loop {
        let Some(msg) = proc.recv_data(0).await else {
            break;
        };
        let mut msg = proc.apply_in_stack(msg);
        proc.stamp_enter(&mut msg.header);
        for i in 1..n {
            let mut clone = msg.deep_clone();
            proc.stamp_leave(&mut clone.header);
            proc.emit(i, clone).await;
        }
        proc.stamp_leave(&mut msg.header);
        proc.emit(0, msg).await;
        if !proc.state.wait().await {
            break;
        }
    }
    proc.close_all_outputs();
}
