//! `Ground`: 1 input, 0 outputs. Disposes every payload it receives and
//! accumulates branch statistics from the timing stamps carried on it.
//! Grounded in `loopy/algebra.go`'s `Ground` and `AccumulateStats`.

use std::sync::Arc;
use std::time::Instant;

use crate::graph::branch::accumulate_stats;
use crate::graph::builder::ExecCtx;
use crate::payload::Payload;
use crate::processor::Processor;

pub(crate) async fn run<V: Payload>(proc: Arc<Processor<V>>, ctx: ExecCtx<V>) {
    let alpha = ctx.config.alpha;
    let decay_interval = ctx.config.decay_interval_ms;
    let branches = ctx.ground_branches;

    let mut last_decay = Instant::now();
    loop {
        let Some(msg) = proc.recv_data(0).await else {
            break;
        };
        let mut msg = proc.apply_in_stack(msg);
        proc.stamp_enter(&mut msg.header);
        let mut value = msg.value;
        value.dispose();
        proc.stamp_leave(&mut msg.header);

        let now = Instant::now();
        let dt = now.duration_since(last_decay).as_secs_f64() * 1000.0;
        if dt >= decay_interval {
            accumulate_stats(&branches, alpha, dt, &msg.header);
            last_decay = now;
        } else {
            accumulate_stats(&branches, 0.0, 0.0, &msg.header);
        }

        if !proc.state.wait().await {
            break;
        }
    }
    tracing::debug!(stage = proc.name(), "ground drained");
}
