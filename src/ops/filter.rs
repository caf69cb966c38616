//! `Filter`: 1 input, 2 outputs. Routes each message to output 0 when the
//! active predicate returns `true`, output 1 otherwise. Grounded in
//! `loopy/algebra.go`'s `Filter`.

use std::sync::Arc;

use crate::graph::builder::ExecCtx;
use crate::message::Message;
use crate::payload::Payload;
use crate::processor::Processor;

pub(crate) async fn run<V: Payload>(proc: Arc<Processor<V>>, _ctx: ExecCtx<V>) {
    loop {
        let Some(msg) = proc.recv_data(0).await else {
            break;
        };
        let msg = proc.apply_in_stack(msg);
        let Message { mut header, value } = msg;
        let decision = proc
            .info
            .lock()
            .unwrap()
            .predicate_with_switch(&value, &mut header);
        let msg = Message { header, value };
        if decision {
            proc.emit(0, msg).await;
        } else {
            proc.emit(1, msg).await;
        }
        if !proc.state.wait().await {
            break;
        }
    }
    proc.close_all_outputs();
}
