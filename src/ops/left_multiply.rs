//! `LeftMultiply`: 2 inputs, 2 outputs. Input 1 is latched (as in
//! [`crate::ops::latch`]) rather than driving the cycle; input 0 drives.
//! Each message on input 0 is combined with the most recently latched value
//! from input 1 via the supplied combiner, or (absent one) packed with
//! [`crate::payload::Vectorize::from_elements`] as a two-element vector.
//! Output 1 carries input 1 unchanged, exactly like `Latch`'s output 1.
//! Grounded in `loopy/algebra.go`'s `LeftMultiply`, which builds an internal
//! hidden `Latch` on its second input for this purpose.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::graph::builder::ExecCtx;
use crate::message::Message;
use crate::ops::common::merge_headers;
use crate::payload::Vectorize;
use crate::processor::Processor;

pub type Combiner<V> = Arc<dyn Fn(V, V) -> V + Send + Sync>;

pub(crate) async fn run<V: Vectorize>(
    proc: Arc<Processor<V>>,
    combiner: Option<Combiner<V>>,
    _ctx: ExecCtx<V>,
) {
    let latest: Arc<AsyncMutex<Option<Message<V>>>> = Arc::new(AsyncMutex::new(None));
    let active = Arc::new(AtomicBool::new(true));

    let latching = {
        let proc = Arc::clone(&proc);
        let latest = Arc::clone(&latest);
        let active = Arc::clone(&active);
        async move {
            loop {
                let Some(msg) = proc.recv_data(1).await else {
                    break;
                };
                let mut msg = proc.apply_in_stack(msg);
                proc.stamp_enter(&mut msg.header);
                *latest.lock().await = Some(msg.deep_clone());
                proc.stamp_leave(&mut msg.header);
                proc.emit(1, msg).await;
                if !proc.state.wait().await {
                    break;
                }
            }
            active.store(false, Ordering::SeqCst);
            proc.close_output(1);
        }
    };

    let driving = {
        let proc = Arc::clone(&proc);
        let latest = Arc::clone(&latest);
        async move {
            loop {
                let Some(msg) = proc.recv_data(0).await else {
                    break;
                };
                let msg = proc.apply_in_stack(msg);

                let snapshot = latest.lock().await.as_ref().map(Message::deep_clone);
                let Some(right) = snapshot else {
                    if !proc.state.wait().await {
                        break;
                    }
                    continue;
                };

                let mut header = merge_headers(&[msg.clone(), right.clone()]);
                let value = match &combiner {
                    Some(f) => f(msg.value, right.value),
                    None => Vectorize::from_elements(vec![msg.value, right.value]),
                };
                proc.stamp_enter(&mut header);
                proc.stamp_leave(&mut header);
                proc.emit(0, Message { header, value }).await;
                if !proc.state.wait().await {
                    break;
                }
            }
            proc.close_output(0);
        }
    };

    tokio::join!(latching, driving);
}
