//! `Multiply`: k inputs, 1 output. Each cycle reads one message from every
//! input and combines them into a single outgoing payload via the supplied
//! combiner, or (absent one) by packing the cycle's values with
//! [`crate::payload::Vectorize::from_elements`]. A cycle in which every input
//! yields nothing (all inputs closed) ends the stage. Grounded in
//! `loopy/algebra.go`'s `Multiply`.

use std::sync::Arc;

use crate::graph::builder::ExecCtx;
use crate::message::Message;
use crate::ops::common::merge_headers;
use crate::payload::Vectorize;
use crate::processor::Processor;

pub type Combiner<V> = Arc<dyn Fn(Vec<V>) -> V + Send + Sync>;

pub(crate) async fn run<V: Vectorize>(
    proc: Arc<Processor<V>>,
    combiner: Option<Combiner<V>>,
    _ctx: ExecCtx<V>,
) {
    let k = proc.num_inputs();
    loop {
        let mut values = Vec::with_capacity(k);
        let mut msgs = Vec::with_capacity(k);
        for slot in 0..k {
            match proc.recv_data(slot).await {
                Some(msg) => {
                    let msg = proc.apply_in_stack(msg);
                    values.push(msg.value.clone());
                    msgs.push(msg);
                }
                None => {}
            }
        }
        if values.is_empty() {
            break;
        }

        let mut header = merge_headers(&msgs);
        let value = match &combiner {
            Some(f) => f(values),
            None => Vectorize::from_elements(values),
        };
        proc.stamp_enter(&mut header);
        proc.stamp_leave(&mut header);
        proc.emit(0, Message { header, value }).await;
        if !proc.state.wait().await {
            break;
        }
    }
    proc.close_all_outputs();
}
