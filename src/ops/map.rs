//! `Map`: 1 input, 1 output. Applies the active `Mapper` to every message.
//! Grounded in `loopy/algebra.go`'s `Map`.

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
    proc.close_all_outputs();
}
