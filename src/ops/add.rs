//! `Add`: k inputs, 1 output. Each input is forwarded independently and
//! concurrently onto the shared output; the output closes only once every
//! input has drained. Grounded in `loopy/algebra.go`'s `Add`, which spawns
//! one goroutine per input for the same reason.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::graph::builder::ExecCtx;
use crate::payload::Payload;
use crate::processor::Processor;

pub(crate) async fn run<V: Payload>(proc: Arc<Processor<V>>, _ctx: ExecCtx<V>) {
    let k = proc.num_inputs();
    let remaining = Arc::new(AtomicUsize::new(k));

    let tasks = (0..k).map(|slot| {
        let proc = Arc::clone(&proc);
        let remaining = Arc::clone(&remaining);
        async move {
            loop {
                let Some(msg) = proc.recv_data(slot).await else {
                    break;
                };
                let mut msg = proc.apply_in_stack(msg);
                proc.stamp_enter(&mut msg.header);
                proc.stamp_leave(&mut msg.header);
                proc.emit(0, msg).await;
                if !proc.state.wait().await {
                    break;
                }
            }
            if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                proc.close_output(0);
            }
        }
    });

    futures::future::join_all(tasks).await;
}
