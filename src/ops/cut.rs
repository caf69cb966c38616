//! `Cut`: 1 input, 2 outputs. Output 1 passes the input straight through;
//! output 0 is produced by a second task that takes the most recently
//! latched payload *once* and clears the slot, unlike `Latch` which keeps
//! re-emitting it. Grounded in `loopy/algebra.go`'s `Cut`.
//!
//! Same nil-passthrough divergence as [`crate::ops::latch`]: the cutting
//! task skips a cycle instead of emitting a sentinel while no value is
//! pending.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::graph::builder::ExecCtx;
use crate::message::Message;
use crate::payload::Payload;
use crate::processor::Processor;

pub(crate) async fn run<V: Payload>(proc: Arc<Processor<V>>, _ctx: ExecCtx<V>) {
    let pending: Arc<AsyncMutex<Option<Message<V>>>> = Arc::new(AsyncMutex::new(None));
    let active = Arc::new(AtomicBool::new(true));

    let driven = {
        let proc = Arc::clone(&proc);
        let pending = Arc::clone(&pending);
        let active = Arc::clone(&active);
        async move {
            loop {
                let Some(msg) = proc.recv_data(0).await else {
                    break;
                };
                let mut msg = proc.apply_in_stack(msg);
                proc.stamp_enter(&mut msg.header);
                *pending.lock().await = Some(msg.deep_clone());
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

    let cutting = {
        let proc = Arc::clone(&proc);
        let pending = Arc::clone(&pending);
        let active = Arc::clone(&active);
        async move {
            while active.load(Ordering::SeqCst) {
                let taken = pending.lock().await.take();
                match taken {
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

    tokio::join!(driven, cutting);
}
