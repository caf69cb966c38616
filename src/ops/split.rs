//! `Split(n)`: 1 input, n outputs. Round-robin: the k-th received message is
//! emitted on output `k mod n`. Grounded in `loopy/algebra.go`'s `Split`.

use std::sync::Arc;

use crate::graph::builder::ExecCtx;
use crate::payload::Payload;
use crate::processor::Processor;

pub(crate) async fn run<V: Payload>(proc: Arc<Processor<V>>, _ctx: ExecCtx<V>) {
    let n = proc.num_outputs();
    let mut k = 0usize;
    loop {
        let Some(msg) = proc.recv_data(0).await else {
            break;
        };
        let mut msg = proc.apply_in_stack(msg);
        let now = std::time::Instant::now();
        msg.header.stamp_enter(proc.name(), now);
        msg.header.stamp_leave(proc.name(), now);
        proc.emit(k, msg).await;
        k = (k + 1) % n;
        if !proc.state.wait().await {
            break;
        }
    }
    proc.close_all_outputs();
}
