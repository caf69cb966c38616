//! `Source`: 0 inputs, 1 output. Pulls from an external producer until it
//! yields `None`, then closes. Grounded in `loopy/algebra.go`'s `Source`.

use std::sync::Arc;

use crate::graph::builder::ExecCtx;
use crate::message::Message;
use crate::payload::Payload;
use crate::processor::Processor;

/// An external producer of payloads. `None` signals end-of-stream, the
/// translation of the Go original's `Read() T | nil` contract (spec §6).
pub trait Spout<V>: Send {
    fn read(&mut self) -> Option<V>;
}

impl<V, F: FnMut() -> Option<V> + Send> Spout<V> for F {
    fn read(&mut self) -> Option<V> {
        self()
    }
}

pub(crate) async fn run<V: Payload>(
    proc: Arc<Processor<V>>,
    mut spout: Box<dyn Spout<V>>,
    _ctx: ExecCtx<V>,
) {
    loop {
        let Some(value) = spout.read() else { break };
        let mut msg = Message::new(value);
        proc.stamp_enter(&mut msg.header);
        proc.stamp_leave(&mut msg.header);
        proc.emit(0, msg).await;
        if !proc.state.wait().await {
            break;
        }
    }
    proc.close_all_outputs();
    tracing::debug!(stage = proc.name(), "source exhausted");
}
