//! Branch extraction, ground attribution, and per-branch statistics.
//!
//! Grounded in `loopy/exgraph.go`'s `scan`/`traverseBranch`/`assignGrnds`/
//! `AccumulateStats` and spec §4.3. Operates purely over node names and the
//! lightweight [`TopologyView`] the graph builder exposes - no payload type
//! parameter needed here, unlike the rest of the crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::graph::edge::ChanInfo;
use crate::message::Header;
use crate::stats::SStats;

/// The operator tag a node was constructed with - mirrors `loopy/auxiliary.go`'s
/// `OP_*` constants, trimmed to what branch extraction needs to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Source,
    Ground,
    Map,
    Reduce,
    Filter,
    Copy,
    Split,
    Latch,
    Cut,
    Multiply,
    LeftMultiply,
    Add,
    Scatter,
    Merge,
    Composite,
}

impl OpKind {
    /// `Map`/`Reduce`/`Ground` are excluded from `split_nodes` in the Go
    /// original (only nodes that can plausibly *be* a fan - in/out-degree
    /// candidates other than a strict 1-in/1-out relay - are fan-node
    /// candidates); every other kind participates, sources included.
    pub fn is_fan_candidate(self) -> bool {
        !matches!(self, OpKind::Map | OpKind::Reduce | OpKind::Ground)
    }
}

/// Read-only view over the graph's topology that branch extraction needs:
/// degrees, downstream adjacency, and backward (upstream) edge detail.
/// Implemented by [`crate::graph::builder::Inner`].
pub trait TopologyView {
    fn kind(&self, name: &str) -> OpKind;
    fn all_names(&self) -> Vec<String>;
    fn ground_names(&self) -> Vec<String>;
    /// Downstream neighbours, in output-slot order (duplicates allowed, one
    /// entry per connected output slot).
    fn neighbors(&self, name: &str) -> Vec<String>;
    fn in_degree(&self, name: &str) -> usize;
    fn out_degree(&self, name: &str) -> usize;
    /// The edges feeding *into* `name`: upstream node name paired with the
    /// channel-slot correspondence, mirroring `EdgeInfo.Chans`.
    fn upstream_edges(&self, name: &str) -> Vec<(String, ChanInfo)>;
}

#[derive(Debug, Clone, Default)]
pub struct NodesGroup {
    pub start: String,
    pub end: String,
    pub head: String,
    pub nodes: Vec<String>,
}

/// A maximal chain of single-in/single-out stages between two fan points,
/// per spec §3/§4.3.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    pub start: String,
    pub end: String,
    pub br_start: String,
    pub br_end: Option<String>,
    pub nodes: Vec<String>,
    pub gnd: String,
    pub stats: Vec<SStats>,
    pub groups: Option<Vec<NodesGroup>>,
    pub latency: f64,
    pub period: f64,
}

impl Branch {
    fn new(br_start: String) -> Self {
        Self {
            br_start,
            ..Default::default()
        }
    }
}

/// Extracts every branch in the topology and groups them by attributed
/// ground name. Mirrors `scan()` + the ground-grouping tail of `scan()`.
pub fn scan(topo: &dyn TopologyView) -> (Vec<Branch>, HashMap<String, Vec<usize>>) {
    let mut branches: Vec<Branch> = Vec::new();
    let mut node_branch: HashMap<String, usize> = HashMap::new();

    for br_k in topo.all_names() {
        if !topo.kind(&br_k).is_fan_candidate() {
            continue;
        }
        for c in topo.neighbors(&br_k) {
            if topo.in_degree(&c) > 1 {
                continue;
            }
            let mut b = Branch::new(br_k.clone());
            let idx = branches.len();
            let start_is_anchor = topo.out_degree(&br_k) == 1;
            if start_is_anchor {
                b.start = br_k.clone();
                if topo.in_degree(&br_k) <= 1 {
                    node_branch.insert(br_k.clone(), idx);
                }
            } else {
                b.start = c.clone();
                node_branch.insert(c.clone(), idx);
            }
            b.nodes = vec![b.start.clone()];
            b.end = c.clone();
            if start_is_anchor {
                // `c` is the node immediately downstream of a single-output
                // fan/source and hasn't been classified or recorded yet -
                // do that before walking further, the same way a discovered
                // neighbor is handled inside `traverse_branch`. Without this
                // the node right after such an anchor is silently missing
                // from `Nodes` (spec §4.3 step 2: "walk forward from c:
                // every node with one input and one output extends
                // B.Nodes").
                if !extend_branch(topo, &c, &mut b, &mut node_branch, idx) {
                    traverse_branch(topo, &c, &mut b, &mut node_branch, idx);
                }
            } else {
                traverse_branch(topo, &c, &mut b, &mut node_branch, idx);
            }
            branches.push(b);
        }
    }

    for gnd in topo.ground_names() {
        assign_grnds(topo, &gnd, &gnd, &node_branch, &mut branches);
    }

    for b in &mut branches {
        b.stats = vec![SStats::new(); b.nodes.len()];
    }

    let mut gnd_branches: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, b) in branches.iter().enumerate() {
        gnd_branches.entry(b.gnd.clone()).or_default().push(i);
    }
    (branches, gnd_branches)
}

/// Classifies a just-discovered node `n` and extends `br` accordingly: a
/// fan-out (out-degree > 1) becomes `br_end`/`end`, a sink (out-degree 0)
/// becomes `end`/`gnd`, anything else is a plain relay that extends `nodes`.
/// Returns `true` if the branch terminated at `n` (no further walk needed).
fn extend_branch(
    topo: &dyn TopologyView,
    n: &str,
    br: &mut Branch,
    node_branch: &mut HashMap<String, usize>,
    idx: usize,
) -> bool {
    if topo.out_degree(n) > 1 {
        br.br_end = Some(n.to_string());
        br.end = if topo.in_degree(n) <= 1 {
            n.to_string()
        } else {
            br.nodes.last().cloned().unwrap_or_else(|| br.start.clone())
        };
        if br.end != br.start && br.nodes.last().map(String::as_str) != Some(br.end.as_str()) {
            br.nodes.push(br.end.clone());
            node_branch.insert(br.end.clone(), idx);
        }
        true
    } else if topo.out_degree(n) == 0 {
        node_branch.insert(n.to_string(), idx);
        br.end = n.to_string();
        br.gnd = n.to_string();
        if br.end != br.start {
            br.nodes.push(br.end.clone());
        }
        true
    } else {
        node_branch.insert(n.to_string(), idx);
        br.nodes.push(n.to_string());
        false
    }
}

fn traverse_branch(
    topo: &dyn TopologyView,
    c: &str,
    br: &mut Branch,
    node_branch: &mut HashMap<String, usize>,
    idx: usize,
) {
    for n in topo.neighbors(c) {
        if extend_branch(topo, &n, br, node_branch, idx) {
            return;
        }
        traverse_branch(topo, &n, br, node_branch, idx);
    }
}

/// Backward walk from a ground, attributing every branch it reaches to that
/// ground. Honors the primary-port rule for `Latch`/`Cut` (stop at an edge
/// fed by their latched output, slot 0) and `LeftMultiply` (follow only the
/// input-0-aligned upstream edge), per spec §4.3/§9 and `assignGrnds`.
fn assign_grnds(
    topo: &dyn TopologyView,
    c: &str,
    gnd: &str,
    node_branch: &HashMap<String, usize>,
    branches: &mut [Branch],
) {
    if topo.in_degree(c) <= 1 && topo.out_degree(c) <= 1 {
        if let Some(&idx) = node_branch.get(c) {
            branches[idx].gnd = gnd.to_string();
        }
    }
    if topo.kind(c) == OpKind::Source {
        return;
    }
    for (k_n, k_ch) in topo.upstream_edges(c) {
        if matches!(topo.kind(&k_n), OpKind::Latch | OpKind::Cut) && k_ch.out_idxs.contains(&0) {
            return;
        }
        let mut next = k_n.clone();
        if topo.kind(&k_n) == OpKind::LeftMultiply {
            for (u_n, u_ch) in topo.upstream_edges(&k_n) {
                if k_ch.out_idxs.first() == u_ch.in_idxs.first() {
                    next = u_n;
                    break;
                }
            }
        }
        assign_grnds(topo, &next, gnd, node_branch, branches);
    }
}

/// Folds one ground message's timing stamps into the decayed statistics of
/// every branch attributed to that ground, per `AccumulateStats`.
pub fn accumulate_stats(branches: &[Arc<Mutex<Branch>>], alpha: f64, dt_ms: f64, header: &Header) {
    for branch in branches {
        let mut b = branch.lock().unwrap();
        let node_count = b.nodes.len();
        for i in 0..node_count {
            let node = b.nodes[i].clone();
            let Some(t) = header.time_info(&node) else {
                continue;
            };
            let (Some(enter), Some(leave)) = (t.enter, t.leave) else {
                continue;
            };
            let s1 = leave.duration_since(enter).as_secs_f64() * 1000.0;
            let s2 = if i + 1 < node_count {
                header
                    .time_info(&b.nodes[i + 1])
                    .and_then(|t2| t2.enter)
                    .map(|next_enter| {
                        next_enter.saturating_duration_since(leave).as_secs_f64() * 1000.0
                    })
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            if dt_ms > 0.0 {
                b.stats[i].decay(alpha, dt_ms);
            }
            b.stats[i].add_val(
                crate::geometry::Vec2::new(s1, s2),
                crate::geometry::Vec2::new(s1 * s1, s2 * s2),
                1.0,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A hand-wired topology, built from a straight edge list, for exercising
    /// `scan`/`assign_grnds` without spinning up a full `Graph`.
    struct FakeTopo {
        kinds: HashMap<String, OpKind>,
        edges: Vec<(String, String)>,
    }

    impl FakeTopo {
        fn new(nodes: &[(&str, OpKind)], edges: &[(&str, &str)]) -> Self {
            Self {
                kinds: nodes.iter().map(|(n, k)| (n.to_string(), *k)).collect(),
                edges: edges.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
            }
        }
    }

    impl TopologyView for FakeTopo {
        fn kind(&self, name: &str) -> OpKind {
            self.kinds[name]
        }

        fn all_names(&self) -> Vec<String> {
            self.kinds.keys().cloned().collect()
        }

        fn ground_names(&self) -> Vec<String> {
            self.kinds
                .iter()
                .filter(|(_, k)| **k == OpKind::Ground)
                .map(|(n, _)| n.clone())
                .collect()
        }

        fn neighbors(&self, name: &str) -> Vec<String> {
            self.edges
                .iter()
                .filter(|(a, _)| a == name)
                .map(|(_, b)| b.clone())
                .collect()
        }

        fn in_degree(&self, name: &str) -> usize {
            self.edges.iter().filter(|(_, b)| b == name).count()
        }

        fn out_degree(&self, name: &str) -> usize {
            self.edges.iter().filter(|(a, _)| a == name).count()
        }

        fn upstream_edges(&self, name: &str) -> Vec<(String, ChanInfo)> {
            self.edges
                .iter()
                .filter(|(_, b)| b == name)
                .map(|(a, _)| (a.clone(), ChanInfo::default()))
                .collect()
        }
    }

    /// Source -> Map -> Ground: every interior node, including the relay
    /// right after the source, must end up in the branch's `Nodes` and be
    /// attributed to the ground.
    #[test]
    fn scan_includes_the_node_immediately_after_a_single_output_anchor() {
        let topo = FakeTopo::new(
            &[
                ("src", OpKind::Source),
                ("m1", OpKind::Map),
                ("gnd", OpKind::Ground),
            ],
            &[("src", "m1"), ("m1", "gnd")],
        );

        let (branches, gnd_branches) = scan(&topo);
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].nodes, vec!["src", "m1", "gnd"]);
        assert_eq!(branches[0].gnd, "gnd");
        assert_eq!(gnd_branches["gnd"], vec![0]);
    }

    /// Source -> Ground directly: the trivial one-edge branch still gets its
    /// ground attributed correctly.
    #[test]
    fn scan_handles_a_direct_source_to_ground_edge() {
        let topo = FakeTopo::new(
            &[("src", OpKind::Source), ("gnd", OpKind::Ground)],
            &[("src", "gnd")],
        );

        let (branches, _) = scan(&topo);
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].nodes, vec!["src", "gnd"]);
        assert_eq!(branches[0].gnd, "gnd");
    }

    /// Source -> Map -> Map -> Copy(2) -> two Grounds: both relays land in
    /// the shared branch's `Nodes`, and each post-fan leg is independently
    /// attributed to its own ground.
    #[test]
    fn scan_threads_a_multi_relay_chain_into_a_fan() {
        let topo = FakeTopo::new(
            &[
                ("src", OpKind::Source),
                ("m1", OpKind::Map),
                ("m2", OpKind::Map),
                ("cp", OpKind::Copy),
                ("g0", OpKind::Ground),
                ("g1", OpKind::Ground),
            ],
            &[
                ("src", "m1"),
                ("m1", "m2"),
                ("m2", "cp"),
                ("cp", "g0"),
                ("cp", "g1"),
            ],
        );

        let (branches, gnd_branches) = scan(&topo);

        let src_branch = branches
            .iter()
            .find(|b| b.nodes.first().map(String::as_str) == Some("src"))
            .expect("a branch rooted at src");
        assert_eq!(src_branch.nodes, vec!["src", "m1", "m2", "cp"]);

        assert_eq!(gnd_branches["g0"].len(), 1);
        assert_eq!(gnd_branches["g1"].len(), 1);
        let g0_branch = &branches[gnd_branches["g0"][0]];
        assert_eq!(g0_branch.nodes, vec!["g0"]);
        let g1_branch = &branches[gnd_branches["g1"][0]];
        assert_eq!(g1_branch.nodes, vec!["g1"]);
    }
}
