//! `Latch`: 1 input, 2 outputs. Output 1 passes the input straight through;
//! output 0 is produced by a second task that repeatedly emits a deep clone
//! of the most recently seen payload, bridging a slow consumer against a
//! fast (or independently paced) producer. Grounded in `loopy/algebra.go`'s
//! `Latch`.
//!
//! The Go original's latching goroutine spins as fast as the (unbuffered,
//! synchronous) output channel allows, re-emitting `nil` forever before the
//! first input arrives. `V: Payload` has no nil state to emit here, so this
//! port simply skips a cycle (yielding to the runtime) until the first value
//! lands - a narrower, but behaviourally equivalent for any `V`, reading of
//! "whenever asked, emits the latest payload seen".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::graph::builder::ExecCtx;
use crate::message::Message;
use crate::payload::Payload;
use crate::processor::Processor;

pub(crate) async fn run<V: Payload>(proc: Arc<Processor<V>>, _ctx: ExecCtx<V>) {
    let latest: Arc<AsyncMutex<Option<Message<V>>>> = Arc::new(AsyncMutex::new(None));
    let active = Arc::new(AtomicBool::new(true));

    let driven = {
        let proc = Arc::clone(&proc);
        let latest = Arc::clone(&latest);
        let active = Arc::clone(&active);
        async move {
            loop {
                let Some(msg) = proc.recv_data(0).await else {
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

    let latching = {
        let proc = Arc::clone(&proc);
        let latest = Arc::clone(&latest);
        let active = Arc::clone(&active);
        async move {
            while active.load(Ordering::SeqCst) {
                let snapshot = latest.lock().await.as_ref().map(Message::deep_clone);
                match snapshot {
                    Some(mut msg) => {
                        proc.stamp_enter(&mut msg.header);
                        proc.stamp_leave(&mut msg.header);
                        proc.emit(0, msg).await;
                    }
                    None => tokio::task::yield_now().await,
                }
            }
            proc.close_output(0);
        }
    };

    tokio::join!(driven, latching);
}
