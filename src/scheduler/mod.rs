//! The adaptive fusion scheduler: CCP (chains-to-processors) partitioning,
//! and the periodic task that re-evaluates each branch and fuses it when it
//! runs hotter than its configured thresholds (spec §6/§7).
//!
//! Grounded in `loopy/schedule.go` (`calcBottleNeck`/`prefixSum`/`probe`/
//! `CCPSolveDB`) and `loopy/exgraph.go`'s `monitor`/`scheduleBranch`/
//! `mergeForward`.

pub mod tuning;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::graph::{Branch, NodesGroup};
use crate::message::{ErStatus, WrStatus};
use crate::payload::Payload;
use crate::processor::{Processor, ProcessorInfo};

pub use tuning::SchedulerConfig;

/// Cumulative sums of `T`, with a leading zero: `W[i] = T[0] + .. + T[i-1]`.
/// Mirrors `prefixSum`.
pub fn prefix_sum(t: &[f64]) -> Vec<f64> {
    let mut w = Vec::with_capacity(t.len() + 1);
    let mut acc = 0.0;
    w.push(0.0);
    for &x in t {
        acc += x;
        w.push(acc);
    }
    w
}

/// The optimal (minimal) bottleneck achievable partitioning `W`'s underlying
/// chain into `k` contiguous, non-empty groups, via the Choi-Narahari /
/// Pinar-Aykanat O(N(N-K)) DP. `w` is a prefix-sum array of length `n+1` (as
/// returned by [`prefix_sum`]); `k` must be in `1..=n`. Mirrors `calcBottleNeck`.
pub fn calc_bottleneck(w: &[f64], k: usize) -> f64 {
    let n = w.len() - 1;
    assert!(k >= 1 && k <= n, "k must be in 1..=n");

    // dp[j][i] = optimal bottleneck splitting w[0..i] into j groups.
    let mut dp = vec![vec![f64::INFINITY; n + 1]; k + 1];
    dp[0][0] = 0.0;
    for j in 1..=k {
        for i in j..=n {
            let mut best = f64::INFINITY;
            for m in (j - 1)..i {
                let candidate = dp[j - 1][m].max(w[i] - w[m]);
                if candidate < best {
                    best = candidate;
                }
            }
            dp[j][i] = best;
        }
    }
    dp[k][n]
}

/// Given a target bottleneck `b`, finds cut points `s[0] = 0 < s[1] < .. <
/// s[k] = n` such that every group's sum `w[s[i+1]] - w[s[i]]` is at most
/// `b`, via binary search per group (mirrors `probe`'s `sort.Search`).
/// Returns `(cut_points, true)` on success; `(.., false)` if `b` is
/// infeasible for `k` groups.
pub fn probe(w: &[f64], b: f64, k: usize) -> (Vec<usize>, bool) {
    let n = w.len() - 1;
    let mut cuts = vec![0usize];
    let mut start = 0usize;
    for _ in 0..k {
        // Greedily extend this group as far as it can go while its sum
        // stays within the bottleneck budget.
        let mut end = start;
        while end < n && w[end + 1] - w[start] <= b + 1e-9 {
            end += 1;
        }
        if end == start {
            return (cuts, false);
        }
        cuts.push(end);
        start = end;
    }
    (cuts, start == n)
}

/// Solves the chains-to-processors partitioning problem: find cut points
/// `s` and the minimal bottleneck `b*` splitting `t` into `k` contiguous
/// groups. Mirrors `CCPSolveDB`.
pub fn ccp_solve(t: &[f64], k: usize) -> (Vec<usize>, f64, bool) {
    let w = prefix_sum(t);
    let b_opt = calc_bottleneck(&w, k);
    let (s, ok) = probe(&w, b_opt, k);
    (s, b_opt, ok)
}

/// Spawns the background scheduler task: every `schedule_interval_ms`, each
/// branch's decayed service-time statistics are checked against `tp`/`tl`;
/// a branch running hotter than both thresholds is paused, partitioned via
/// CCP, and its interior groups fused onto a single carrier task.
pub fn spawn<V: Payload>(
    processors: HashMap<String, Arc<Processor<V>>>,
    branches: Vec<Arc<Mutex<Branch>>>,
    config: Arc<SchedulerConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(config.schedule_interval_ms.max(1.0) as u64));
        loop {
            tick.tick().await;
            for branch in &branches {
                schedule_branch(branch, &processors, &config).await;
            }
        }
    })
}

/// Re-evaluates one branch, fusing it if it is both running above the
/// period threshold `tp` and its measured latency exceeds `tl`. Mirrors
/// `scheduleBranch`.
async fn schedule_branch<V: Payload>(
    branch: &Arc<Mutex<Branch>>,
    processors: &HashMap<String, Arc<Processor<V>>>,
    config: &SchedulerConfig,
) {
    let (nodes, already_grouped, t): (Vec<String>, bool, Vec<f64>) = {
        let b = branch.lock().unwrap();
        if b.groups.is_some() || b.nodes.len() < 2 {
            return;
        }
        let t: Vec<f64> = b.stats.iter().map(|s| s.mean().x.max(1e-6)).collect();
        (b.nodes.clone(), b.groups.is_some(), t)
    };
    if already_grouped {
        return;
    }

    // `period`: total decayed service time across the branch - how much CPU
    // time one message costs end to end. `latency`: the same total plus the
    // decayed inter-stage forwarding gaps, i.e. wall-clock transit time.
    // Both derive from the same per-node `SStats`, unlike the reference
    // scheduler's separate bookkeeping - a deliberate simplification, noted
    // in the design ledger.
    let period: f64 = t.iter().sum();
    let gaps: f64 = {
        let b = branch.lock().unwrap();
        b.stats.iter().map(|s| s.mean().y.max(0.0)).sum()
    };
    let latency = period + gaps;
    {
        let mut b = branch.lock().unwrap();
        b.period = period;
        b.latency = latency;
    }
    if (period as usize) < config.tp && (latency as usize) < config.tl {
        return;
    }

    let n = nodes.len();
    let mut chosen: Option<(Vec<usize>, usize)> = None;
    for k in (1..=config.num_cpu.min(n)).rev() {
        let (s, _b_opt, ok) = ccp_solve(&t, k);
        if ok {
            chosen = Some((s, k));
            break;
        }
    }
    let Some((cuts, _k)) = chosen else { return };
    if cuts.len() <= 2 {
        // A single group spanning the whole branch: nothing to fuse.
        return;
    }

    for node in &nodes {
        if let Some(p) = processors.get(node) {
            p.state.request_wait();
        }
    }
    // spec §4.4 step 4: spin on each node's WRStatus until all are in WAIT
    // before fusing - mirrors `Branch.Wait()`. `request_wait` only flips a
    // flag a node checks after it finishes its current message cycle, so
    // fusing/resuming before every node has actually parked races whichever
    // node hasn't reached that check yet.
    wait_until_parked(&nodes, processors).await;

    let mut groups = Vec::with_capacity(cuts.len() - 1);
    for w in cuts.windows(2) {
        let (s, e) = (w[0], w[1] - 1);
        let group = NodesGroup {
            start: nodes[s].clone(),
            end: nodes[e].clone(),
            head: nodes[e].clone(),
            nodes: nodes[s..=e].to_vec(),
        };
        if s == e {
            if let Some(p) = processors.get(&nodes[s]) {
                p.state.resume(ErStatus::Run);
            }
        } else {
            merge_forward(&nodes[s..=e], processors);
        }
        groups.push(group);
    }

    branch.lock().unwrap().groups = Some(groups);
}

/// Blocks (cooperatively) until every named node's `WrStatus` has reached
/// `Wait`. A node missing from `processors` counts as already parked (it
/// cannot block the handshake).
async fn wait_until_parked<V: Payload>(nodes: &[String], processors: &HashMap<String, Arc<Processor<V>>>) {
    loop {
        let all_parked = nodes.iter().all(|n| {
            processors
                .get(n)
                .map(|p| p.state.wr_status() == WrStatus::Wait)
                .unwrap_or(true)
        });
        if all_parked {
            return;
        }
        tokio::task::yield_now().await;
    }
}

/// Fuses a contiguous run of single-in/single-out stages into their final
/// (`end`) processor: the carrier takes over the run's first node's input
/// channel so data keeps reaching it once the interior nodes are gone
/// (`eproc.Inputs = sproc.Inputs` in `mergeForward`), every interior stage's
/// [`ProcessorInfo`] is pushed onto the carrier's `in_stack` in ascending
/// order, then told to exit (its own task drains away); finally the carrier
/// resumes.
fn merge_forward<V: Payload>(run: &[String], processors: &HashMap<String, Arc<Processor<V>>>) {
    let Some(carrier) = processors.get(run.last().expect("merge_forward called with an empty run")) else {
        return;
    };
    let Some(head) = processors.get(&run[0]) else {
        return;
    };
    carrier.rewire_input(0, head.input_receiver(0));

    for name in &run[..run.len() - 1] {
        let Some(p) = processors.get(name) else { continue };
        let info = {
            let mut guard = p.info.lock().unwrap();
            std::mem::replace(&mut *guard, ProcessorInfo::structural(String::new(), 0))
        };
        carrier.in_stack.lock().unwrap().push(info);
        p.state.resume(ErStatus::Exit);
    }
    carrier.state.resume(ErStatus::Run);
}
