//! `Scatter(n, f, p)`: 1 input, n outputs. Each input value is expanded via
//! `f` into zero or more elements; each element is then routed to an output
//! slot chosen by `p(element, index_in_expansion, expansion_len)`, or
//! dropped if `p` returns a negative index. Grounded in `loopy/algebra.go`'s
//! `Scatter`.

use std::sync::Arc;

use crate::graph::builder::ExecCtx;
use crate::payload::Payload;
use crate::processor::Processor;

pub type Expander<V> = Arc<dyn Fn(&V) -> Vec<V> + Send + Sync>;
pub type Router<V> = Arc<dyn Fn(&V, usize, usize) -> i64 + Send + Sync>;

pub(crate) async fn run<V: Payload>(
    proc: Arc<Processor<V>>,
    expand: Expander<V>,
    route: Router<V>,
    _ctx: ExecCtx<V>,
) {
    loop {
        let Some(msg) = proc.recv_data(0).await else {
            break;
        };
        let msg = proc.apply_in_stack(msg);
        let elements = expand(&msg.value);
        let n = elements.len();
        for (i, element) in elements.into_iter().enumerate() {
            let idx = route(&element, i, n);
            if idx < 0 {
                continue;
            }
            let mut out = msg.deep_clone();
            out.value = element;
            proc.stamp_enter(&mut out.header);
            proc.stamp_leave(&mut out.header);
            proc.emit(idx as usize, out).await;
        }
        if !proc.state.wait().await {
            break;
        }
    }
    proc.close_all_outputs();
}
